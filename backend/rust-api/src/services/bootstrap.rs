//! Reference data and user seeding, run at startup and by the seed binary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::config::Config;
use crate::models::{NewUser, QuestionKind, QuestionType, User};
use crate::repository::QuizRepository;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<NewUser>,
}

/// Inserts the three question types unless they already exist.
pub async fn ensure_question_types<R: QuizRepository>(repo: &R) -> Result<()> {
    let mut tx = repo.begin().await?;
    for kind in QuestionKind::ALL {
        repo.upsert_question_type(&mut tx, QuestionType::from(kind))
            .await
            .with_context(|| format!("Failed to seed question type {}", kind.id()))?;
    }
    repo.commit(tx).await?;
    tracing::info!("Question types ensured");
    Ok(())
}

/// Returns the user with this name, creating it first if needed.
/// The second value tells whether the user was created.
pub async fn ensure_user<R: QuizRepository>(repo: &R, seed: NewUser) -> Result<(User, bool)> {
    let mut tx = repo.begin().await?;
    if let Some(existing) = repo.find_user_by_name(&mut tx, &seed.username).await? {
        return Ok((existing, false));
    }

    let user = repo
        .insert_user(&mut tx, seed)
        .await
        .context("Failed to insert user")?;
    repo.commit(tx).await?;
    Ok((user, true))
}

/// Creates the users listed in the configured seed file, if any.
pub async fn bootstrap<R: QuizRepository>(config: &Config, repo: &R) -> Result<()> {
    ensure_question_types(repo).await?;

    let path = match &config.seed_file {
        Some(path) => Path::new(path),
        None => {
            tracing::debug!("No seed file configured, skipping user bootstrap");
            return Ok(());
        }
    };

    if !path.exists() {
        tracing::warn!("Seed file {} not found, skipping bootstrap", path.display());
        return Ok(());
    }

    let contents = fs::read_to_string(path)
        .await
        .context("Failed to read seed file")?;
    let seed: SeedFile =
        serde_json::from_str(&contents).context("Failed to deserialize seed payload")?;

    for entry in seed.users {
        let (user, created) = ensure_user(repo, entry).await?;
        if created {
            tracing::info!(
                "Seeded user {} (id={}, role={})",
                user.username,
                user.id,
                user.role().as_str()
            );
        } else {
            tracing::info!("User {} already exists, seed skipped", user.username);
        }
    }

    Ok(())
}
