use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, dsl::exists, insert_into, prelude::*, select};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::processed_webhook_events},
};
use domain::{
    entities::webhook_events::InsertProcessedWebhookEventEntity,
    repositories::webhook_events::WebhookEventRepository,
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let processed = select(exists(
            processed_webhook_events::table
                .filter(processed_webhook_events::event_id.eq(event_id)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(processed)
    }

    async fn mark_processed(&self, event_id: &str, event_type: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = InsertProcessedWebhookEventEntity {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
        };

        // Concurrent deliveries of the same event race here; the loser is a no-op.
        insert_into(processed_webhook_events::table)
            .values(&entity)
            .on_conflict(processed_webhook_events::event_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(
            processed_webhook_events::table
                .filter(processed_webhook_events::processed_at.lt(cutoff)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }
}
