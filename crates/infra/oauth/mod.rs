pub mod social_client;
