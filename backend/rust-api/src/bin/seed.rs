use anyhow::Context;
use clap::Parser;

use quizdesk_api::{
    config::{Config, StorageBackend},
    middlewares::auth::{JwtClaims, JwtService, TOKEN_TTL_SECS},
    models::NewUser,
    repository::MongoRepository,
    services::bootstrap,
};

/// Seeds question types and creates users, printing a bearer token for each.
#[derive(Parser, Debug)]
#[command(name = "quizdesk-seed", version)]
struct Cli {
    /// Create (or reuse) an author account
    #[arg(long, value_name = "name")]
    admin: Vec<String>,

    /// Create (or reuse) a visitor account
    #[arg(long, value_name = "name")]
    visitor: Vec<String>,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = TOKEN_TTL_SECS)]
    ttl: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    if config.storage_backend == StorageBackend::Memory {
        anyhow::bail!("seeding requires the mongo storage backend");
    }

    let client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let repo = MongoRepository::new(client, &config.mongo_database);
    repo.ensure_indexes().await?;
    bootstrap::ensure_question_types(&repo).await?;

    let jwt = JwtService::new(&config.jwt_secret);
    let seeds = cli
        .admin
        .into_iter()
        .map(|username| NewUser {
            username,
            is_superuser: true,
        })
        .chain(cli.visitor.into_iter().map(|username| NewUser {
            username,
            is_superuser: false,
        }));

    for seed in seeds {
        let (user, created) = bootstrap::ensure_user(&repo, seed).await?;
        let token = jwt
            .generate_token(&JwtClaims::for_user(&user, cli.ttl))
            .context("Failed to sign token")?;
        println!(
            "{} user={} id={} role={} token={}",
            if created { "created" } else { "existing" },
            user.username,
            user.id,
            user.role().as_str(),
            token
        );
    }

    Ok(())
}
