//! An instrumented in-memory channel for exercising selects.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use superselect::{
    Receivable, Received, Receiver, ReceiverCallback, RegisterError, Registration, Sendable,
    Sender, SenderCallback,
};

struct State<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    closed: bool,
    default: Option<T>,
    receivers: VecDeque<(Registration, ReceiverCallback<T>)>,
    senders: VecDeque<(Registration, SenderCallback<T>)>,
    next_id: u64,
    refuse: Option<RegisterError>,
}

/// A FIFO channel. Selecting senders only complete while the buffer is below `capacity`, or
/// when a receiver is waiting. `push` from outside a select always succeeds.
pub struct Chan<T> {
    state: RefCell<State<T>>,
    registered: Cell<usize>,
    unregistered: Cell<usize>,
    // Simulates a channel that fails to drop withdrawn callbacks.
    ignore_unregister: Cell<bool>,
}

impl<T: Clone + 'static> Chan<T> {
    pub fn new() -> Rc<Self> {
        Self::build(0, None)
    }

    pub fn with_capacity(capacity: usize) -> Rc<Self> {
        Self::build(capacity, None)
    }

    /// Receivers see `default` once the channel is closed and drained.
    pub fn with_default(default: T) -> Rc<Self> {
        Self::build(0, Some(default))
    }

    fn build(capacity: usize, default: Option<T>) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(State {
                buffer: VecDeque::new(),
                capacity,
                closed: false,
                default,
                receivers: VecDeque::new(),
                senders: VecDeque::new(),
                next_id: 0,
                refuse: None,
            }),
            registered: Cell::new(0),
            unregistered: Cell::new(0),
            ignore_unregister: Cell::new(false),
        })
    }

    pub fn refuse(&self, err: Option<RegisterError>) {
        self.state.borrow_mut().refuse = err;
    }

    pub fn ignore_unregister(&self, yes: bool) {
        self.ignore_unregister.set(yes);
    }

    pub fn registered(&self) -> usize {
        self.registered.get()
    }

    pub fn unregistered(&self) -> usize {
        self.unregistered.get()
    }

    pub fn pending_receivers(&self) -> usize {
        self.state.borrow().receivers.len()
    }

    pub fn pending_senders(&self) -> usize {
        self.state.borrow().senders.len()
    }

    pub fn buffered(&self) -> usize {
        self.state.borrow().buffer.len()
    }

    /// Hand `value` to the oldest waiting receiver, or buffer it.
    pub fn push(&self, value: T) {
        if let Some(value) = self.deliver(value) {
            self.state.borrow_mut().buffer.push_back(value);
        }
    }

    /// Take the oldest buffered value, or one from a waiting sender.
    pub fn pull(&self) -> Option<T> {
        let buffered = self.state.borrow_mut().buffer.pop_front();
        match buffered {
            Some(v) => {
                self.refill();
                Some(v)
            }
            None => self.take_from_sender(),
        }
    }

    /// Close the channel. Every waiting receiver sees end of stream; waiting senders are dropped.
    pub fn close(&self) {
        let (receivers, senders, default) = {
            let mut st = self.state.borrow_mut();
            st.closed = true;
            (
                std::mem::take(&mut st.receivers),
                std::mem::take(&mut st.senders),
                st.default.clone(),
            )
        };
        drop(senders);
        for (_, cb) in receivers {
            let _ = cb(Received::Closed(default.clone()));
        }
    }

    /// Offer `value` to waiting receivers until one accepts it. Returns it if nobody did.
    fn deliver(&self, mut value: T) -> Option<T> {
        loop {
            let next = self.state.borrow_mut().receivers.pop_front();
            let Some((_, cb)) = next else {
                return Some(value);
            };
            match cb(Received::Value(value)) {
                Ok(()) => return None,
                Err(back) => match back.into_parts() {
                    (Some(v), _) => value = v,
                    (None, _) => unreachable!("a value delivery came back empty"),
                },
            }
        }
    }

    fn take_from_sender(&self) -> Option<T> {
        loop {
            let next = self.state.borrow_mut().senders.pop_front();
            let (_, cb) = next?;
            if let Some(v) = cb() {
                return Some(v);
            }
        }
    }

    /// Move values from waiting senders into free buffer space.
    fn refill(&self) {
        loop {
            let room = {
                let st = self.state.borrow();
                st.buffer.len() < st.capacity && !st.senders.is_empty()
            };
            if !room {
                return;
            }
            if let Some(v) = self.take_from_sender() {
                self.state.borrow_mut().buffer.push_back(v);
            }
        }
    }

    fn next_registration(&self) -> Registration {
        let mut st = self.state.borrow_mut();
        st.next_id += 1;
        self.registered.set(self.registered.get() + 1);
        Registration::new(st.next_id)
    }
}

impl<T: Clone + 'static> Receiver<T> for Chan<T> {
    fn register_receiver(
        &self,
        callback: ReceiverCallback<T>,
    ) -> Result<Registration, RegisterError> {
        if let Some(err) = self.state.borrow().refuse.clone() {
            return Err(err);
        }
        let reg = self.next_registration();

        let buffered = self.state.borrow_mut().buffer.pop_front();
        let available = match buffered {
            Some(v) => Some(v),
            None => self.take_from_sender(),
        };
        if let Some(v) = available {
            if let Err(back) = callback(Received::Value(v)) {
                if let (Some(v), _) = back.into_parts() {
                    self.state.borrow_mut().buffer.push_front(v);
                }
            }
            self.refill();
            return Ok(reg);
        }

        let closed = {
            let st = self.state.borrow();
            st.closed.then(|| st.default.clone())
        };
        match closed {
            Some(default) => {
                let _ = callback(Received::Closed(default));
            }
            None => self.state.borrow_mut().receivers.push_back((reg, callback)),
        }
        Ok(reg)
    }

    fn unregister_receiver(&self, registration: Registration) {
        self.unregistered.set(self.unregistered.get() + 1);
        if self.ignore_unregister.get() {
            return;
        }
        self.state
            .borrow_mut()
            .receivers
            .retain(|(r, _)| *r != registration);
    }
}

impl<T: Clone + 'static> Sender<T> for Chan<T> {
    fn register_sender(&self, callback: SenderCallback<T>) -> Result<Registration, RegisterError> {
        {
            let st = self.state.borrow();
            if let Some(err) = st.refuse.clone() {
                return Err(err);
            }
            if st.closed {
                return Err(RegisterError::Closed);
            }
        }
        let reg = self.next_registration();

        let (has_receiver, has_room) = {
            let st = self.state.borrow();
            (!st.receivers.is_empty(), st.buffer.len() < st.capacity)
        };
        if has_receiver || has_room {
            if let Some(v) = callback() {
                self.push(v);
            }
        } else {
            self.state.borrow_mut().senders.push_back((reg, callback));
        }
        Ok(reg)
    }

    fn unregister_sender(&self, registration: Registration) {
        self.unregistered.set(self.unregistered.get() + 1);
        if self.ignore_unregister.get() {
            return;
        }
        self.state
            .borrow_mut()
            .senders
            .retain(|(r, _)| *r != registration);
    }
}

/// Exposes only the receiving side of a channel.
pub struct ReadOnly<T>(pub Rc<Chan<T>>);

impl<T: Clone + 'static> Receivable<T> for ReadOnly<T> {
    fn receiver(&self) -> Option<Rc<dyn Receiver<T>>> {
        self.0.receiver()
    }
}

impl<T> Sendable<T> for ReadOnly<T> {
    fn sender(&self) -> Option<Rc<dyn Sender<T>>> {
        None
    }
}

/// Polls a future exactly once, on the current thread.
pub fn poll_once<F: std::future::Future + Unpin>(fut: &mut F) -> Option<F::Output> {
    futures_lite::future::block_on(futures_lite::future::poll_once(fut))
}

/// Sets a flag when dropped. Lets a test observe that a future was released.
pub struct DropFlag(pub Rc<Cell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}
