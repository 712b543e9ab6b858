use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CANCELLED_STATUS: &str = "cancelled";
pub const DEFAULT_INTERVAL: &str = "month";

/// Denormalized copy of the Stripe subscription, embedded in the user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeMeta {
    pub subscription_id: String,
    pub customer_id: String,
    pub price_id: String,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub interval: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Price fields carried by a subscription item.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePatch {
    pub price_id: String,
    pub amount: f64,
    pub currency: String,
    pub interval: String,
}

/// Fields a `customer.subscription.updated` delivery may change.
#[derive(Debug, Clone, PartialEq)]
pub struct StripeMetaPatch {
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub price: Option<PricePatch>,
    pub plan_name: Option<String>,
}

impl StripeMeta {
    pub fn is_active(&self) -> bool {
        is_active_status(&self.status)
    }

    pub fn apply_patch(&mut self, patch: StripeMetaPatch, now: DateTime<Utc>) {
        self.status = patch.status;
        if let Some(start) = patch.current_period_start {
            self.current_period_start = start;
        }
        if let Some(end) = patch.current_period_end {
            self.current_period_end = end;
        }
        self.cancel_at_period_end = patch.cancel_at_period_end;

        // A name from subscription metadata may predate an in-place swap, so
        // it only lands together with a price change or into an empty slot.
        let price_changed = patch
            .price
            .as_ref()
            .is_some_and(|price| price.price_id != self.price_id);
        if let Some(price) = patch.price {
            self.price_id = price.price_id;
            self.amount = price.amount;
            self.currency = price.currency;
            self.interval = price.interval;
        }
        if let Some(plan_name) = patch.plan_name.filter(|name| !name.is_empty()) {
            if price_changed || self.plan_name.is_none() {
                self.plan_name = Some(plan_name);
            }
        }

        self.updated_at = now;
    }

    pub fn mark_cancelled(&mut self, at: DateTime<Utc>) {
        self.status = CANCELLED_STATUS.to_string();
        self.cancelled_at = Some(at);
        self.updated_at = at;
    }
}

pub fn is_active_status(status: &str) -> bool {
    matches!(status, "active" | "trialing")
}

/// Stripe amounts are integers in the currency's minor unit.
pub fn amount_from_minor(unit_amount: Option<i64>) -> f64 {
    unit_amount.map(|minor| minor as f64 / 100.0).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_meta() -> StripeMeta {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        StripeMeta {
            subscription_id: "sub_123".to_string(),
            customer_id: "cus_123".to_string(),
            price_id: "price_basic_month".to_string(),
            plan_name: Some("Basic".to_string()),
            status: "active".to_string(),
            amount: 9.99,
            currency: "usd".to_string(),
            interval: "month".to_string(),
            current_period_start: created,
            current_period_end: created + Duration::days(30),
            cancel_at_period_end: false,
            created_at: created,
            updated_at: created,
            cancelled_at: None,
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let value = serde_json::to_value(sample_meta()).unwrap();
        assert_eq!(value["subscriptionId"], "sub_123");
        assert_eq!(value["cancelAtPeriodEnd"], false);
        assert!(value.get("cancelledAt").is_none());
    }

    #[test]
    fn trialing_counts_as_active() {
        let mut meta = sample_meta();
        meta.status = "trialing".to_string();
        assert!(meta.is_active());

        meta.status = "past_due".to_string();
        assert!(!meta.is_active());
    }

    #[test]
    fn patch_keeps_periods_when_delivery_omits_them() {
        let mut meta = sample_meta();
        let original_end = meta.current_period_end;
        let now = Utc::now();

        meta.apply_patch(
            StripeMetaPatch {
                status: "past_due".to_string(),
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: true,
                price: None,
                plan_name: None,
            },
            now,
        );

        assert_eq!(meta.status, "past_due");
        assert_eq!(meta.current_period_end, original_end);
        assert!(meta.cancel_at_period_end);
        assert_eq!(meta.updated_at, now);
        assert_eq!(meta.price_id, "price_basic_month");
    }

    #[test]
    fn patch_swaps_price_after_in_place_upgrade() {
        let mut meta = sample_meta();
        meta.apply_patch(
            StripeMetaPatch {
                status: "active".to_string(),
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: false,
                price: Some(PricePatch {
                    price_id: "price_pro_year".to_string(),
                    amount: 199.0,
                    currency: "usd".to_string(),
                    interval: "year".to_string(),
                }),
                plan_name: Some("Pro".to_string()),
            },
            Utc::now(),
        );

        assert_eq!(meta.price_id, "price_pro_year");
        assert_eq!(meta.interval, "year");
        assert_eq!(meta.plan_name.as_deref(), Some("Pro"));
    }

    #[test]
    fn stale_plan_name_does_not_undo_upgrade() {
        let mut meta = sample_meta();
        meta.price_id = "price_pro_month".to_string();
        meta.plan_name = Some("Pro".to_string());

        meta.apply_patch(
            StripeMetaPatch {
                status: "active".to_string(),
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: false,
                price: Some(PricePatch {
                    price_id: "price_pro_month".to_string(),
                    amount: 25.0,
                    currency: "usd".to_string(),
                    interval: "month".to_string(),
                }),
                plan_name: Some("Basic".to_string()),
            },
            Utc::now(),
        );

        assert_eq!(meta.price_id, "price_pro_month");
        assert_eq!(meta.plan_name.as_deref(), Some("Pro"));
    }

    #[test]
    fn plan_name_fills_empty_slot_without_price_change() {
        let mut meta = sample_meta();
        meta.plan_name = None;

        meta.apply_patch(
            StripeMetaPatch {
                status: "active".to_string(),
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: false,
                price: None,
                plan_name: Some("Basic".to_string()),
            },
            Utc::now(),
        );

        assert_eq!(meta.plan_name.as_deref(), Some("Basic"));
    }

    #[test]
    fn mark_cancelled_sets_status_and_timestamp() {
        let mut meta = sample_meta();
        let at = Utc::now();
        meta.mark_cancelled(at);
        assert_eq!(meta.status, CANCELLED_STATUS);
        assert_eq!(meta.cancelled_at, Some(at));
        assert!(!meta.is_active());
    }

    #[test]
    fn minor_amounts_convert_to_major_units() {
        assert_eq!(amount_from_minor(Some(1999)), 19.99);
        assert_eq!(amount_from_minor(None), 0.0);
    }
}
