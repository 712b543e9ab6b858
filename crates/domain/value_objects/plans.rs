use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringDto {
    pub interval: String,
    pub interval_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPriceDto {
    pub id: String,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub recurring: Option<RecurringDto>,
}

impl PlanPriceDto {
    pub fn interval(&self) -> Option<&str> {
        self.recurring.as_ref().map(|recurring| recurring.interval.as_str())
    }
}

/// A Stripe product offered as a plan, with all of its prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub prices: Vec<PlanPriceDto>,
}

impl PlanDto {
    /// Lowest unit amount across the plan's prices; plans without prices sort last.
    pub fn lowest_unit_amount(&self) -> i64 {
        self.prices
            .iter()
            .filter_map(|price| price.unit_amount)
            .min()
            .unwrap_or(i64::MAX)
    }

    pub fn price_for_interval(&self, interval: &str) -> Option<&PlanPriceDto> {
        self.prices
            .iter()
            .find(|price| price.interval() == Some(interval))
    }

    pub fn has_price(&self, price_id: &str) -> bool {
        self.prices.iter().any(|price| price.id == price_id)
    }
}

pub fn sort_by_lowest_price(plans: &mut [PlanDto]) {
    plans.sort_by_key(PlanDto::lowest_unit_amount);
}
