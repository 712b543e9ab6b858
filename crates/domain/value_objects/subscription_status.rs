use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stripe_meta::StripeMeta;

const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusSummary {
    pub is_active: bool,
    pub plan_name: Option<String>,
    pub status: Option<String>,
    pub days_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_cancel_at_period_end: Option<bool>,
}

impl SubscriptionStatusSummary {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            plan_name: None,
            status: None,
            days_remaining: None,
            amount: None,
            interval: None,
            will_cancel_at_period_end: None,
        }
    }

    pub fn from_meta(meta: Option<&StripeMeta>, now: DateTime<Utc>) -> Self {
        let Some(meta) = meta else {
            return Self::inactive();
        };

        let remaining_ms = (meta.current_period_end - now).num_milliseconds() as f64;
        let days_remaining = (remaining_ms / MILLIS_PER_DAY).ceil() as i64;

        Self {
            is_active: meta.is_active(),
            plan_name: meta.plan_name.clone(),
            status: Some(meta.status.clone()),
            days_remaining: Some(days_remaining.max(0)),
            amount: Some(meta.amount),
            interval: Some(meta.interval.clone()),
            will_cancel_at_period_end: Some(meta.cancel_at_period_end),
        }
    }
}
