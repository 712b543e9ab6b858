use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::sessions},
};
use domain::{
    entities::sessions::{InsertSessionEntity, SessionEntity},
    repositories::sessions::SessionRepository,
};

pub struct SessionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SessionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SessionRepository for SessionPostgres {
    async fn create(&self, session: InsertSessionEntity) -> Result<SessionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(sessions::table)
            .values(&session)
            .returning(SessionEntity::as_returning())
            .get_result::<SessionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_valid_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = sessions::table
            .filter(sessions::token.eq(token))
            .filter(sessions::expires_at.gt(now))
            .select(SessionEntity::as_select())
            .first::<SessionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn extend(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(sessions::table.filter(sessions::id.eq(session_id)))
            .set((
                sessions::expires_at.eq(expires_at),
                sessions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(sessions::table.filter(sessions::token.eq(token))).execute(&mut conn)?;

        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted =
            delete(sessions::table.filter(sessions::user_id.eq(user_id))).execute(&mut conn)?;

        Ok(deleted)
    }

    async fn delete_others_for_user(&self, user_id: Uuid, keep_token: &str) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(
            sessions::table
                .filter(sessions::user_id.eq(user_id))
                .filter(sessions::token.ne(keep_token)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }
}
