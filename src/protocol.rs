//! The capabilities a channel exposes so that it can take part in a select.
//!
//! A channel never sees a [Case](crate::Case). It only sees callbacks: a select registers one
//! callback per case, and the channel invokes it (at most once) when it is ready to complete
//! the operation, either synchronously during registration or later from whatever task pushes
//! or pulls on the channel.
//!
//! Implementations must follow two rules:
//!
//!   1) No internal borrow may be held while a callback runs. The winning callback unregisters
//!      every losing sibling before it returns, and a sibling may live on the same channel.
//!   2) After `unregister_*` returns, the callback for that registration must never run.
//!
//! A callback can still be refused without either rule being broken, e.g. when a select offers
//! both a send and a receive on one channel and the channel pairs them. The refusal is visible
//! in the return value, so the channel keeps (or never produces) the value.

use std::rc::Rc;

use crate::error::RegisterError;

/// Produces the value for a pending send.
///
/// Returns None if the offer was withdrawn because another case already won. The channel must
/// then behave as if this sender had never registered.
pub type SenderCallback<T> = Box<dyn FnOnce() -> Option<T>>;

/// Accepts the outcome of a pending receive.
///
/// Returns the delivery back as `Err` if the receive was withdrawn because another case already
/// won, so the channel can keep the value (e.g. hand it to its next receiver).
pub type ReceiverCallback<T> = Box<dyn FnOnce(Received<T>) -> Result<(), Received<T>>>;

/// What a channel hands to a receiver callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received<T> {
    /// A value was taken from the channel.
    Value(T),
    /// The channel is exhausted. Carries the channel's declared default value, if it has one.
    Closed(Option<T>),
}

impl<T> Received<T> {
    /// Split into the `(next, ok)` pair recorded on a receive case.
    #[inline]
    pub fn into_parts(self) -> (Option<T>, bool) {
        match self {
            Received::Value(v) => (Some(v), true),
            Received::Closed(default) => (default, false),
        }
    }
}

/// An opaque handle identifying one registration on one channel.
///
/// The channel chooses the id; the select only stores it and passes it back to `unregister_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Registration(u64);

impl Registration {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// The sending half of a channel, as seen by a select.
pub trait Sender<T> {
    /// Add a pending sender. The channel calls `callback` once it can accept a value, which may
    /// happen before this function returns.
    fn register_sender(&self, callback: SenderCallback<T>) -> Result<Registration, RegisterError>;

    /// Remove a pending sender. Unknown or already-consumed registrations are ignored.
    fn unregister_sender(&self, registration: Registration);
}

/// The receiving half of a channel, as seen by a select.
pub trait Receiver<T> {
    /// Add a pending receiver. The channel calls `callback` once a value (or end of stream) is
    /// available, which may happen before this function returns.
    fn register_receiver(
        &self,
        callback: ReceiverCallback<T>,
    ) -> Result<Registration, RegisterError>;

    /// Remove a pending receiver. Unknown or already-consumed registrations are ignored.
    fn unregister_receiver(&self, registration: Registration);
}

/// Anything that can hand out a [Sender] capability.
///
/// Returns None if the object has no sending side.
pub trait Sendable<T> {
    fn sender(&self) -> Option<Rc<dyn Sender<T>>>;
}

/// Anything that can hand out a [Receiver] capability.
///
/// Returns None if the object has no receiving side.
pub trait Receivable<T> {
    fn receiver(&self) -> Option<Rc<dyn Receiver<T>>>;
}

impl<T, S> Sendable<T> for Rc<S>
where
    S: Sender<T> + 'static,
{
    #[inline]
    fn sender(&self) -> Option<Rc<dyn Sender<T>>> {
        let s: Rc<dyn Sender<T>> = self.clone();
        Some(s)
    }
}

impl<T, R> Receivable<T> for Rc<R>
where
    R: Receiver<T> + 'static,
{
    #[inline]
    fn receiver(&self) -> Option<Rc<dyn Receiver<T>>> {
        let r: Rc<dyn Receiver<T>> = self.clone();
        Some(r)
    }
}
