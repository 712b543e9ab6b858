use crates::infra::db::repositories::{sessions::SessionPostgres, users::UserPostgres};

use crate::usecases::sessions::SessionService;

pub mod auth;
pub mod billing_portal;
pub mod email_otp;
pub mod emails;
pub mod profile_image;
pub mod social_login;
pub mod stripe_webhook;
pub mod subscriptions;
pub mod two_factor;

pub type PgSessionService = SessionService<SessionPostgres, UserPostgres>;
