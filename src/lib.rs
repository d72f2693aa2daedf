pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod webhook;

pub use error::{AppError, Result};
pub use webhook::{Outcome, WebhookProcessor};
