use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::two_factors},
};
use domain::{
    entities::two_factors::{InsertTwoFactorEntity, TwoFactorEntity},
    repositories::two_factors::TwoFactorRepository,
};

pub struct TwoFactorPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TwoFactorPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TwoFactorRepository for TwoFactorPostgres {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<TwoFactorEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = two_factors::table
            .filter(two_factors::user_id.eq(user_id))
            .select(TwoFactorEntity::as_select())
            .first::<TwoFactorEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert(&self, two_factor: InsertTwoFactorEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(two_factors::table)
            .values(&two_factor)
            .on_conflict(two_factors::user_id)
            .do_update()
            .set((
                two_factors::secret.eq(&two_factor.secret),
                two_factors::backup_codes.eq(&two_factor.backup_codes),
                two_factors::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_backup_codes(&self, user_id: Uuid, backup_codes: Vec<String>) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(two_factors::table.filter(two_factors::user_id.eq(user_id)))
            .set((
                two_factors::backup_codes.eq(backup_codes),
                two_factors::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(two_factors::table.filter(two_factors::user_id.eq(user_id))).execute(&mut conn)?;

        Ok(())
    }
}
