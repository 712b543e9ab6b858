use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::accounts},
};
use domain::{
    entities::accounts::{AccountEntity, CREDENTIAL_PROVIDER_ID, InsertAccountEntity},
    repositories::accounts::AccountRepository,
};

pub struct AccountPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AccountPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AccountRepository for AccountPostgres {
    async fn find_credential(&self, user_id: Uuid) -> Result<Option<AccountEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = accounts::table
            .filter(accounts::user_id.eq(user_id))
            .filter(accounts::provider_id.eq(CREDENTIAL_PROVIDER_ID))
            .select(AccountEntity::as_select())
            .first::<AccountEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_provider_account(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<AccountEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = accounts::table
            .filter(accounts::provider_id.eq(provider_id))
            .filter(accounts::account_id.eq(account_id))
            .select(AccountEntity::as_select())
            .first::<AccountEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(&self, account: InsertAccountEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(accounts::table)
            .values(&account)
            .returning(accounts::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            accounts::table
                .filter(accounts::user_id.eq(user_id))
                .filter(accounts::provider_id.eq(CREDENTIAL_PROVIDER_ID)),
        )
        .set((
            accounts::password_hash.eq(Some(password_hash)),
            accounts::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }
}
