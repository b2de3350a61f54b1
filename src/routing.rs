//! Subscription storage and message dispatch
//!
//! The registry keeps every filter with its callback and the ordered
//! replay log; the dispatcher fans inbound messages out to the callbacks
//! the registry returns.

/// Message dispatch
pub mod dispatcher;
/// Routing error types
pub mod error;
/// Inbound message types
pub mod message;
pub mod subscription_registry;

#[cfg(test)]
mod subscription_registry_tests;

pub use dispatcher::Dispatcher;
pub use error::SubscriptionError;
pub use message::{DeliveryMetadata, IncomingMessage, MessageCallback};
pub use subscription_registry::{ReplayReport, Subscription, SubscriptionRegistry};
