use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::UserStatus;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{NewUser, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // Every pooled connection to an in-memory database sees its own empty schema.
        let in_memory = db_url.contains(":memory:");
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn create_user(&self, new_user: NewUser, status: UserStatus) -> Result<User> {
        self.user_repo().create(new_user, status).await
    }

    pub async fn list_users(&self, status: Option<UserStatus>) -> Result<Vec<User>> {
        self.user_repo().list(status).await
    }

    pub async fn list_approved_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_approved().await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get(id).await
    }

    pub async fn update_user_status(&self, id: i32, status: UserStatus) -> Result<Option<User>> {
        self.user_repo().update_status(id, status).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryId;

    fn new_user(name: &str, entry_id: i64) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            company: None,
            entry_id: EntryId::new(entry_id),
        }
    }

    #[tokio::test]
    async fn user_lifecycle() {
        let store = Store::new("sqlite::memory:").await.unwrap();

        let alice = store
            .create_user(new_user("Alice", 101), UserStatus::Pending)
            .await
            .unwrap();
        let bob = store
            .create_user(new_user("Bob", 202), UserStatus::Approved)
            .await
            .unwrap();

        assert_eq!(store.list_users(None).await.unwrap().len(), 2);
        let pending = store.list_users(Some(UserStatus::Pending)).await.unwrap();
        assert_eq!(pending, vec![alice.clone()]);

        let approved = store.list_approved_users().await.unwrap();
        assert_eq!(approved.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob.id]);

        let updated = store
            .update_user_status(alice.id, UserStatus::Approved)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, UserStatus::Approved);

        let approved = store.list_approved_users().await.unwrap();
        assert_eq!(
            approved.iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![alice.id, bob.id]
        );

        assert!(store.delete_user(bob.id).await.unwrap());
        assert!(!store.delete_user(bob.id).await.unwrap());
        assert!(store.get_user(bob.id).await.unwrap().is_none());
        assert!(
            store
                .update_user_status(bob.id, UserStatus::Blocked)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let first = store
            .create_user(new_user("First", 1), UserStatus::Pending)
            .await
            .unwrap();
        let second = store
            .create_user(new_user("Second", 2), UserStatus::Pending)
            .await
            .unwrap();

        let ids: Vec<i32> = store
            .list_users(None)
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
