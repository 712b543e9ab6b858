use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::two_factors;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = two_factors)]
pub struct TwoFactorEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret: String,
    pub backup_codes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = two_factors)]
pub struct InsertTwoFactorEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret: String,
    pub backup_codes: Vec<String>,
}
