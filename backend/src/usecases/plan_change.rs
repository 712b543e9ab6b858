//! Plan resolution and the checkout-versus-upgrade decision.

use crates::domain::value_objects::{
    plans::{PlanDto, PlanPriceDto},
    stripe_meta::StripeMeta,
};

pub const MONTHLY_INTERVAL: &str = "month";
pub const ANNUAL_INTERVAL: &str = "year";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanChange {
    /// No live subscription: start a new one through Checkout.
    Checkout,
    AlreadySubscribed,
    /// Swap the price on the existing subscription.
    SwapPrice { subscription_id: String },
}

pub fn decide_plan_change(current: Option<&StripeMeta>, target_price_id: &str) -> PlanChange {
    match current {
        Some(meta) if meta.is_active() && !meta.subscription_id.is_empty() => {
            if meta.price_id == target_price_id {
                PlanChange::AlreadySubscribed
            } else {
                PlanChange::SwapPrice {
                    subscription_id: meta.subscription_id.clone(),
                }
            }
        }
        _ => PlanChange::Checkout,
    }
}

/// Looks `plan` up first as a price id, then as a product name
/// (case-insensitive) with the price for the requested interval.
pub fn resolve_plan_price<'a>(
    plans: &'a [PlanDto],
    plan: &str,
    annual: bool,
) -> Option<(&'a PlanDto, &'a PlanPriceDto)> {
    let plan = plan.trim();

    let by_price_id = plans.iter().find_map(|candidate| {
        candidate
            .prices
            .iter()
            .find(|price| price.id == plan)
            .map(|price| (candidate, price))
    });
    if by_price_id.is_some() {
        return by_price_id;
    }

    let interval = if annual {
        ANNUAL_INTERVAL
    } else {
        MONTHLY_INTERVAL
    };
    plans
        .iter()
        .filter(|candidate| candidate.name.eq_ignore_ascii_case(plan))
        .find_map(|candidate| {
            candidate
                .price_for_interval(interval)
                .map(|price| (candidate, price))
        })
}
