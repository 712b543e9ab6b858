use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::processed_webhook_events;

#[derive(Debug, Clone, Selectable, Queryable)]
#[diesel(table_name = processed_webhook_events)]
pub struct ProcessedWebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = processed_webhook_events)]
pub struct InsertProcessedWebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
}
