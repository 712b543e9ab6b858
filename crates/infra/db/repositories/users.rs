use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::users},
};
use domain::{
    entities::users::{InsertUserEntity, UpdateUserProfileEntity, UserEntity},
    repositories::users::UserRepository,
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::id.eq(user_id))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(&self, user: InsertUserEntity) -> Result<UserEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(users::table)
            .values(&user)
            .returning(UserEntity::as_returning())
            .get_result::<UserEntity>(&mut conn)?;

        Ok(result)
    }

    async fn update_profile(&self, user_id: Uuid, changes: UpdateUserProfileEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changes = UpdateUserProfileEntity {
            updated_at: Some(Utc::now()),
            ..changes
        };

        update(users::table.filter(users::id.eq(user_id)))
            .set(&changes)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn set_two_factor_enabled(&self, user_id: Uuid, enabled: bool) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::two_factor_enabled.eq(enabled),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn set_email_verified(&self, user_id: Uuid, verified: bool) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::email_verified.eq(verified),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn set_stripe_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::stripe_customer_id.eq(Some(customer_id)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
