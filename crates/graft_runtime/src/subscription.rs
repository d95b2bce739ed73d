//! Subscriptions.
//!
//! A subscription field resolves to a [`Subscriber`]. The executor captures
//! the field, its declared type and the request variables, and every later
//! event whose id the subscriber matches is resolved against that capture
//! and sent as a complete response object.

use graft_core::{Error, Map, Result, Value};
use graft_schema::{Executable, Field, TypeRef};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// The receiving end of a subscription.
///
/// Events are resolved and sent without holding the root's subscription
/// lock, so `send` and `unsubscribe` may call back into the root.
pub trait Subscriber: Send + Sync {
    /// Delivers one resolved payload. An error unsubscribes.
    fn send(&self, payload: Value) -> Result<()>;

    /// Returns true if events with `id` are meant for this subscriber.
    fn matches(&self, id: &str) -> bool;

    /// Called once when the subscription is removed.
    fn unsubscribe(&self) {}
}

/// A [`Subscriber`] that forwards payloads into an unbounded channel.
///
/// Dropping the receiver makes the next delivery fail, which removes the
/// subscription.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    id: String,
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelSubscriber {
    /// Creates a subscriber for events with `id`, returning the receiver.
    pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id: id.into(), tx }, rx)
    }

    /// Returns the event id this subscriber matches.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Subscriber for ChannelSubscriber {
    fn send(&self, payload: Value) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| Error::resolve(format!("subscriber {} is closed", self.id)))
    }

    fn matches(&self, id: &str) -> bool {
        self.id == id
    }
}

/// Lifecycle of a registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered and waiting for events.
    Registered,
    /// At least one event was delivered.
    Delivered,
    /// Removed, either on request or after a failed delivery.
    Unsubscribed,
}

/// A registered subscription.
pub(crate) struct Subscription {
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) doc: Arc<Executable>,
    pub(crate) field: Field,
    pub(crate) ty: TypeRef,
    pub(crate) vars: Map,
    state: Mutex<SubscriptionState>,
}

impl Subscription {
    pub(crate) fn new(
        subscriber: Arc<dyn Subscriber>,
        doc: Arc<Executable>,
        field: Field,
        ty: TypeRef,
        vars: Map,
    ) -> Self {
        Self {
            subscriber,
            doc,
            field,
            ty,
            vars,
            state: Mutex::new(SubscriptionState::Registered),
        }
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a delivery unless the subscription was removed meanwhile.
    pub(crate) fn delivered(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SubscriptionState::Registered {
            *state = SubscriptionState::Delivered;
        }
    }

    /// Marks the subscription removed and notifies the subscriber once.
    pub(crate) fn close(&self) {
        let was = std::mem::replace(
            &mut *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            SubscriptionState::Unsubscribed,
        );
        if was != SubscriptionState::Unsubscribed {
            self.subscriber.unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("field", &self.field.key())
            .field("ty", &self.ty)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
