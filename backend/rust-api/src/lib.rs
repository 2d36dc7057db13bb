use axum::{
    http::{header, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

use repository::QuizRepository;

pub fn create_router<R: QuizRepository>(app_state: Arc<AppState<R>>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check::<R>))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1", api_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes<R: QuizRepository>(app_state: Arc<AppState<R>>) -> Router<Arc<AppState<R>>> {
    let public_routes = Router::new().route("/quizzes/{id}", get(handlers::quizzes::get_quiz::<R>));

    // Authors only
    let author_routes = Router::new()
        .route("/quizzes", post(handlers::quizzes::create_quiz::<R>))
        .route(
            "/quizzes/{id}",
            patch(handlers::quizzes::update_quiz::<R>).delete(handlers::quizzes::delete_quiz::<R>),
        )
        .route(
            "/quizzes/{id}/questions",
            post(handlers::quizzes::create_questions::<R>),
        )
        .route(
            "/questions/{id}",
            patch(handlers::questions::update_question::<R>)
                .delete(handlers::questions::delete_question::<R>),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware::<R>,
        ));

    // Any authenticated user
    let visitor_routes = Router::new()
        .route(
            "/visitor/quizzes",
            get(handlers::visitor::list_active_quizzes::<R>),
        )
        .route(
            "/visitor/quizzes/{id}/answers",
            post(handlers::visitor::submit_answers::<R>),
        )
        .route(
            "/visitor/answers",
            get(handlers::visitor::answer_history::<R>),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware::<R>,
        ));

    public_routes.merge(author_routes).merge(visitor_routes)
}
