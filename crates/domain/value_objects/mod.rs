pub mod emails;
pub mod otp_types;
pub mod plans;
pub mod social_providers;
pub mod stripe_meta;
pub mod subscription_status;
pub mod users;
pub mod validation;
