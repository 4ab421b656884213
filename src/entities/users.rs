use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub email: String,

    pub company: Option<String>,

    /// Upstream team id
    pub entry_id: i64,

    /// PENDING, APPROVED or BLOCKED
    pub status: String,

    /// RFC 3339, fixed-width UTC so it sorts lexically
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
