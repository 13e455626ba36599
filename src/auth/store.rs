//! User persistence seam and an in-memory implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::schema::normalize_email;
use super::user::{NewUser, Role, UserRecord};
use crate::error::Result;

/// Errors from a user store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A user with this normalized email already exists
    #[error("Duplicate email: {0}")]
    Duplicate(String),

    /// The store could not be reached or answered with an error
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup and creation of user records.
///
/// Emails passed in are already normalized. Implementations must enforce
/// uniqueness of the normalized email and report a clash as
/// [`StoreError::Duplicate`].
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find the user with this normalized email.
    async fn find_by_email(&self, email: &str) -> std::result::Result<Option<UserRecord>, StoreError>;

    /// Create a user with the default role.
    async fn create(&self, user: NewUser) -> std::result::Result<UserRecord, StoreError>;
}

/// On-disk shape of a user fixture file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UserFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// Users held in memory, keyed by normalized email.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing records. Later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert or replace a record, normalizing its email.
    pub fn insert(&self, mut record: UserRecord) {
        record.email = normalize_email(&record.email);
        self.users.write().insert(record.email.clone(), record);
    }

    /// Load users from a YAML file of the form `users: [...]`.
    pub fn load_yaml(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: UserFile = serde_yaml::from_str(&contents)?;
        let store = Self::from_records(file.users);
        info!(path = %path.display(), users = store.len(), "Loaded user store");
        Ok(store)
    }

    /// Write all users to a YAML file, sorted by email.
    pub fn save_yaml(&self, path: &Path) -> Result<()> {
        let file = UserFile {
            users: self.records(),
        };
        std::fs::write(path, serde_yaml::to_string(&file)?)?;
        debug!(path = %path.display(), users = file.users.len(), "Saved user store");
        Ok(())
    }

    /// Snapshot of every record, sorted by email.
    pub fn records(&self) -> Vec<UserRecord> {
        let mut records: Vec<UserRecord> = self.users.read().values().cloned().collect();
        records.sort_by(|a, b| a.email.cmp(&b.email));
        records
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the store holds no users.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> std::result::Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().get(&normalize_email(email)).cloned())
    }

    async fn create(&self, user: NewUser) -> std::result::Result<UserRecord, StoreError> {
        let email = normalize_email(&user.email);
        let mut users = self.users.write();

        if users.contains_key(&email) {
            return Err(StoreError::Duplicate(email));
        }

        let record = UserRecord {
            id: uuid::Uuid::new_v4(),
            name: Some(user.name),
            email: email.clone(),
            password_hash: Some(user.password_hash),
            role: Role::User,
            image: None,
            email_verified: None,
            created_at: chrono::Utc::now(),
        };
        users.insert(email, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Jane".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("jane@example.com")).await.unwrap();
        assert_eq!(created.role, Role::User);

        let found = store.find_by_email("jane@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("jane@example.com")).await.unwrap();

        let err = store.create(new_user("JANE@example.com")).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate("jane@example.com".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("liftlog-users-{}.yaml", uuid::Uuid::new_v4()));

        let store = MemoryUserStore::new();
        store.insert(UserRecord {
            id: uuid::Uuid::new_v4(),
            name: None,
            email: "OAuth@Example.com".to_string(),
            password_hash: None,
            role: Role::Admin,
            image: Some("https://example.com/a.png".to_string()),
            email_verified: None,
            created_at: chrono::Utc::now(),
        });
        store.save_yaml(&path).unwrap();

        let loaded = MemoryUserStore::load_yaml(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.records(), store.records());
        assert_eq!(loaded.records()[0].email, "oauth@example.com");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = MemoryUserStore::load_yaml(Path::new("/nonexistent/users.yaml"));
        assert!(result.is_err());
    }
}
