pub mod api;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod services;
