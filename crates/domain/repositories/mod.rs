pub mod accounts;
pub mod email;
pub mod sessions;
pub mod social_identity;
pub mod storage;
pub mod stripe_meta;
pub mod two_factors;
pub mod users;
pub mod verifications;
pub mod webhook_events;
