pub mod client;
pub mod config;
pub mod config_path;
pub mod error;
pub mod events;
pub mod http;
pub mod localstore;
pub mod quotes;
pub mod secret;

pub mod ecash;
pub mod registry;
pub mod router;
pub mod wallet;
