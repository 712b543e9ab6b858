pub mod auth;
pub mod email_otp;
pub mod emails;
pub mod plan_change;
pub mod profile_image;
pub mod sessions;
pub mod social_login;
pub mod stripe_gateway;
pub mod subscription_sync;
pub mod subscriptions;
pub mod two_factor;
