//! Teammate roster: the seed file read at startup and the insert path shared
//! with `POST /users`.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    auth::password::hash_password,
    error::AppError,
    model::user::{NewUser, User},
    store::{Collection, RecordStore, RecordStoreExt},
};

/// One teammate, as listed in the seed file or posted by an admin.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct Teammate {
    #[schema(example = "rahim")]
    pub username: String,
    #[schema(example = "Rahim Uddin")]
    pub name: String,
    #[schema(example = "rahim@example.com")]
    pub email: String,
    /// Job title; "Admin" grants admin access.
    #[schema(example = "Tech")]
    pub role: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub skillset: Vec<String>,
}

impl Teammate {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() || self.name.trim().is_empty() {
            return Err(AppError::validation("username and name must not be empty"));
        }
        if !self.email.contains('@') {
            return Err(AppError::validation("email is not valid"));
        }
        Ok(())
    }
}

/// Hashes `password` and stores the teammate. Email is the unique key, so
/// a second insert with the same address fails with `Conflict`.
pub async fn provision(
    store: &dyn RecordStore,
    teammate: &Teammate,
    password: &str,
) -> Result<User, AppError> {
    teammate.validate()?;

    let password_hash = hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        AppError::Internal
    })?;

    let new_user = NewUser {
        username: teammate.username.trim().to_string(),
        name: teammate.name.trim().to_string(),
        email: teammate.email.trim().to_lowercase(),
        role: teammate.role.trim().to_string(),
        contact: teammate.contact.clone(),
        skillset: teammate.skillset.clone(),
        password_hash,
    };

    Ok(store.insert_as(Collection::Users, &new_user).await?)
}

pub fn load_roster(path: &Path) -> anyhow::Result<Vec<Teammate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Roster file {} is not a JSON list of users", path.display()))
}

/// Provisions every roster entry that is not stored yet. Returns how many
/// users were created.
pub async fn seed_roster(
    store: &dyn RecordStore,
    roster: &[Teammate],
    temp_password: &str,
) -> anyhow::Result<usize> {
    let mut created = 0;
    for teammate in roster {
        match provision(store, teammate, temp_password).await {
            Ok(user) => {
                info!(user_id = %user.id, email = %user.email, "Seeded user");
                created += 1;
            }
            Err(AppError::Conflict(_)) => {
                info!(email = %teammate.email, "User already present, skipping");
            }
            Err(AppError::Validation(reason)) => {
                warn!(email = %teammate.email, %reason, "Skipping invalid roster entry");
            }
            Err(e) => {
                return Err(anyhow::anyhow!(e)).context("Failed to seed roster");
            }
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    fn teammate(email: &str, role: &str) -> Teammate {
        Teammate {
            username: "asha".into(),
            name: "Asha".into(),
            email: email.into(),
            role: role.into(),
            contact: None,
            skillset: vec!["rust".into()],
        }
    }

    #[actix_web::test]
    async fn seeding_twice_creates_each_user_once() {
        let store = MemoryRecordStore::new();
        let roster = vec![teammate("Asha@Example.com", "Admin"), teammate("bo@example.com", "Tech")];

        assert_eq!(seed_roster(&store, &roster, "temp").await.unwrap(), 2);
        assert_eq!(seed_roster(&store, &roster, "temp").await.unwrap(), 0);

        let users: Vec<User> = store
            .find_as(Collection::Users, crate::store::Query::new())
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "asha@example.com");
    }

    #[actix_web::test]
    async fn invalid_entries_are_skipped() {
        let store = MemoryRecordStore::new();
        let roster = vec![teammate("not-an-email", "Tech")];

        assert_eq!(seed_roster(&store, &roster, "temp").await.unwrap(), 0);
    }
}
