pub mod db;
pub mod mailer;
pub mod oauth;
pub mod storages;
