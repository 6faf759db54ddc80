//! Cross-wiring between the registry and the components that keep their own
//! connection views.
//!
//! Subscriptions are made on the registry's hub in a fixed order: reader view,
//! sender view, then the forwarder to the public hub. Because delivery is
//! synchronous and ordered, both views already reflect a mutation by the time
//! any host handler hears about it, and certainly before the next tick.
//!
//! For `Disconnected` this means the connection has already left both views
//! while it is still listed in the registry: `send_to` no longer reaches it,
//! but the handler can still write through the [`Connection`] it was handed.
//!
//! [`Connection`]: crate::core::Connection
//!
//! Every subscription is kept as a [`SubscriptionId`] and detached by token.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::protocol::{Event, EventHub, SubscriptionId};
use crate::transport::{ConnectionRegistry, ConnectionView};

#[derive(Debug)]
pub struct Wiring {
    subscriptions: Vec<SubscriptionId>,
    views: Vec<ConnectionView>,
}

impl Wiring {
    /// Subscribe `views` to registry mutations and forward them to `public`.
    ///
    /// Views are seeded with the registry's current contents. Attach before
    /// anything starts mutating the registry.
    pub fn attach(
        registry: &ConnectionRegistry,
        views: &[&ConnectionView],
        public: &Arc<EventHub<Event>>,
    ) -> Result<Self> {
        let hub = registry.events();
        let mut subscriptions = Vec::with_capacity(views.len() + 1);

        for view in views {
            let view = (*view).clone();
            subscriptions.push(hub.subscribe(move |event| match event {
                Event::Connected(conn) => view.insert(conn),
                Event::Disconnected(conn) => view.remove(conn),
                _ => {}
            }));
        }

        let forward = Arc::clone(public);
        subscriptions.push(hub.subscribe(move |event| {
            if matches!(event, Event::Connected(_) | Event::Disconnected(_)) {
                forward.emit(event);
            }
        }));

        for conn in registry.snapshot()?.iter().filter(|c| c.is_live()) {
            for view in views {
                view.insert(conn);
            }
        }

        debug!(subscriptions = subscriptions.len(), "Wiring attached");
        Ok(Self {
            subscriptions,
            views: views.iter().map(|v| (*v).clone()).collect(),
        })
    }

    /// Detach every subscription by token and empty the views.
    ///
    /// Returns how many subscriptions were actually removed.
    pub fn detach(self, registry: &ConnectionRegistry) -> usize {
        let hub = registry.events();
        let removed = self
            .subscriptions
            .iter()
            .filter(|id| hub.unsubscribe(**id))
            .count();
        for view in &self.views {
            view.clear();
        }
        debug!(removed, "Wiring detached");
        removed
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
