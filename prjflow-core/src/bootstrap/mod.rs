//! Server start-up: configuration discovery, the database pool and the
//! wiring of every service the HTTP layer needs

pub mod config;
pub mod database;
pub mod services;

pub use config::load_config;
pub use database::init_database;
pub use services::{assemble, init_services, Services};
