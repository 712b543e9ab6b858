use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::accounts;

/// Provider id used for email + password accounts.
pub const CREDENTIAL_PROVIDER_ID: &str = "credential";

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = accounts)]
pub struct AccountEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: String,
    pub account_id: String,
    pub password_hash: Option<String>,
    pub access_token: Option<String>,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = accounts)]
pub struct InsertAccountEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: String,
    pub account_id: String,
    pub password_hash: Option<String>,
    pub access_token: Option<String>,
    pub scope: Option<String>,
}

impl InsertAccountEntity {
    pub fn credential(user_id: Uuid, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider_id: CREDENTIAL_PROVIDER_ID.to_string(),
            account_id: user_id.to_string(),
            password_hash: Some(password_hash),
            access_token: None,
            scope: None,
        }
    }
}
