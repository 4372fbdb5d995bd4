pub mod client;
pub mod error;
pub mod types;
pub mod webhook;

pub use client::XenditClient;
pub use error::GatewayError;
