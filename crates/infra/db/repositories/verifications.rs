use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::verifications},
};
use domain::{
    entities::verifications::{InsertVerificationEntity, VerificationEntity},
    repositories::verifications::VerificationRepository,
};

pub struct VerificationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl VerificationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl VerificationRepository for VerificationPostgres {
    async fn upsert(&self, verification: InsertVerificationEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), diesel::result::Error, _>(|tx| {
            delete(
                verifications::table
                    .filter(verifications::identifier.eq(&verification.identifier)),
            )
            .execute(tx)?;

            insert_into(verifications::table)
                .values(&verification)
                .execute(tx)?;

            Ok(())
        })?;

        Ok(())
    }

    async fn find(&self, identifier: &str) -> Result<Option<VerificationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = verifications::table
            .filter(verifications::identifier.eq(identifier))
            .order(verifications::created_at.desc())
            .select(VerificationEntity::as_select())
            .first::<VerificationEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn update_value(&self, verification_id: Uuid, value: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(verifications::table.filter(verifications::id.eq(verification_id)))
            .set((
                verifications::value.eq(value),
                verifications::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(verifications::table.filter(verifications::identifier.eq(identifier)))
            .execute(&mut conn)?;

        Ok(())
    }
}
