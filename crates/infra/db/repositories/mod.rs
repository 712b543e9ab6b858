pub mod accounts;
pub mod sessions;
pub mod stripe_meta;
pub mod two_factors;
pub mod users;
pub mod verifications;
pub mod webhook_events;
