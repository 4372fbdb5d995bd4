pub mod accounts;
pub mod checkout;
pub mod webhook_processor;
