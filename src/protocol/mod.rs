//! # Notifications
//!
//! The typed events the transport raises and the hub that delivers them.
//!
//! Delivery is synchronous: an event is fully handled by every subscriber
//! before the operation that raised it returns. Subscribers are detached with
//! the [`SubscriptionId`] token `subscribe` handed out, never by comparing
//! closures.

pub mod event;
pub mod event_hub;

pub use event::Event;
pub use event_hub::{EventHub, SubscriptionId};

#[cfg(test)]
mod tests;
