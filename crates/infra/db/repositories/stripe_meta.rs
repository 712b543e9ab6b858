use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::users},
};
use domain::{
    repositories::stripe_meta::StripeMetaRepository,
    value_objects::stripe_meta::{StripeMeta, StripeMetaPatch},
};

pub struct StripeMetaPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl StripeMetaPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    fn decode(value: serde_json::Value) -> Result<StripeMeta> {
        serde_json::from_value(value).context("stored stripe_meta is not a valid document")
    }

    /// Loads the document of the user owning `subscription_id` under a row lock,
    /// lets `change` edit it and writes it back. `false` when nobody owns it.
    fn modify_by_subscription_id(
        &self,
        subscription_id: &str,
        change: impl FnOnce(&mut StripeMeta),
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<bool, anyhow::Error, _>(|tx| {
            let row = users::table
                .filter(users::stripe_subscription_id.eq(subscription_id))
                .select((users::id, users::stripe_meta))
                .for_update()
                .first::<(Uuid, Option<serde_json::Value>)>(tx)
                .optional()?;

            let Some((user_id, Some(stored))) = row else {
                return Ok(false);
            };

            let mut meta = Self::decode(stored)?;
            change(&mut meta);

            update(users::table.filter(users::id.eq(user_id)))
                .set((
                    users::stripe_meta.eq(Some(serde_json::to_value(&meta)?)),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(tx)?;

            Ok(true)
        })
    }
}

#[async_trait]
impl StripeMetaRepository for StripeMetaPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<StripeMeta>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let stored = users::table
            .filter(users::id.eq(user_id))
            .select(users::stripe_meta)
            .first::<Option<serde_json::Value>>(&mut conn)
            .optional()?
            .flatten();

        stored.map(Self::decode).transpose()
    }

    async fn replace(&self, user_id: Uuid, meta: StripeMeta) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let document = serde_json::to_value(&meta)?;

        let updated = update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::stripe_meta.eq(Some(document)),
                users::stripe_subscription_id.eq(Some(&meta.subscription_id)),
                users::stripe_customer_id.eq(Some(&meta.customer_id)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if updated == 0 {
            anyhow::bail!("user {user_id} not found while writing stripe_meta");
        }

        Ok(())
    }

    async fn patch_by_subscription_id(
        &self,
        subscription_id: &str,
        patch: StripeMetaPatch,
    ) -> Result<bool> {
        let now = Utc::now();
        self.modify_by_subscription_id(subscription_id, |meta| meta.apply_patch(patch, now))
    }

    async fn mark_cancelled(&self, subscription_id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.modify_by_subscription_id(subscription_id, |meta| meta.mark_cancelled(at))
    }

    async fn set_cancel_at_period_end(
        &self,
        user_id: Uuid,
        cancel_at_period_end: bool,
    ) -> Result<()> {
        let Some(mut meta) = self.find_by_user_id(user_id).await? else {
            anyhow::bail!("user {user_id} has no stripe_meta to update");
        };

        meta.cancel_at_period_end = cancel_at_period_end;
        meta.updated_at = Utc::now();

        self.replace(user_id, meta).await
    }
}
