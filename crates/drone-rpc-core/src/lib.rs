//! drone-rpc Core Library
//!
//! Shared functionality for the drone-rpc plugin clients:
//! - Service result codes and their classification
//! - The subscription adapter for server-streaming calls
//! - The unary adapter for one-shot calls
//! - Client configuration and retry policy
//! - Common error types

pub mod config;
pub mod error;
pub mod result;
pub mod retry;
pub mod subscription;
pub mod tracing_init;
pub mod unary;

#[cfg(test)]
mod subscription_tests;

pub use config::ClientConfig;
pub use error::{ConfigError, Error};
pub use result::{Outcome, ReportedResult, ResultCode};
pub use retry::RetryPolicy;
pub use subscription::{SharedSubscription, Step, Subscription, SubscriptionBuilder};
