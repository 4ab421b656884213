use anyhow::{Context, Result};
use chrono::SecondsFormat;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::info;

use crate::domain::{EntryId, UserStatus};
use crate::entities::{prelude::*, users};

/// Registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub entry_id: EntryId,
    pub status: UserStatus,
    pub created_at: String,
}

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        let status = model
            .status
            .parse()
            .map_err(|e: String| anyhow::anyhow!("user {}: {e}", model.id))?;

        Ok(Self {
            id: model.id,
            name: model.name,
            email: model.email,
            company: model.company,
            entry_id: EntryId::new(model.entry_id),
            status,
            created_at: model.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub entry_id: EntryId,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_all(rows: Vec<users::Model>) -> Result<Vec<User>> {
        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn create(&self, new_user: NewUser, status: UserStatus) -> Result<User> {
        let active_model = users::ActiveModel {
            name: Set(new_user.name),
            email: Set(new_user.email),
            company: Set(new_user.company),
            entry_id: Set(new_user.entry_id.value()),
            status: Set(status.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            ..Default::default()
        };

        let model = active_model
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        info!(
            user_id = model.id,
            entry_id = model.entry_id,
            status = %status,
            "User created"
        );
        User::try_from(model)
    }

    /// Newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<UserStatus>) -> Result<Vec<User>> {
        let mut query = Users::find();
        if let Some(status) = status {
            query = query.filter(users::Column::Status.eq(status.as_str()));
        }

        let rows = query
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Self::map_all(rows)
    }

    /// Approved users in registration order. Leaderboard ties keep this order.
    pub async fn list_approved(&self) -> Result<Vec<User>> {
        let rows = Users::find()
            .filter(users::Column::Status.eq(UserStatus::Approved.as_str()))
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list approved users")?;

        Self::map_all(rows)
    }

    pub async fn get(&self, id: i32) -> Result<Option<User>> {
        let row = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        row.map(User::try_from).transpose()
    }

    pub async fn update_status(&self, id: i32, status: UserStatus) -> Result<Option<User>> {
        let Some(model) = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = model.into();
        active.status = Set(status.to_string());
        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update user status")?;

        info!(user_id = id, status = %status, "User status changed");
        User::try_from(updated).map(Some)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Users::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        if result.rows_affected > 0 {
            info!(user_id = id, "User removed");
        }
        Ok(result.rows_affected > 0)
    }
}
