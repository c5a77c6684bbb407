//! The select engine.
//!
//! A select runs in rounds. Each invocation owns one [Round]: the cases are bound to it
//! (getting their index), then registered in caller order on the first poll. The first case to
//! be notified claims the round; its notification then unregisters every other pending case
//! before returning, so no sibling can complete afterwards.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures_intrusive::sync::LocalManualResetEvent;

use crate::case::{CaseKind, SelectCase, Slot};
use crate::error::SelectError;
use crate::trace::{RoundId, Tracer};

/// Runs select invocations. Reusable indefinitely; no state is shared between rounds except the
/// tracer and the round counter.
#[derive(Default)]
pub struct Selector {
    tracer: Option<Rc<dyn Tracer>>,
    rounds: RoundId,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracer(tracer: Rc<dyn Tracer>) -> Self {
        Self {
            tracer: Some(tracer),
            rounds: 0,
        }
    }

    pub fn set_tracer(&mut self, tracer: Option<Rc<dyn Tracer>>) {
        self.tracer = tracer;
    }

    /// Number of select invocations started by this selector.
    #[inline]
    pub fn rounds(&self) -> RoundId {
        self.rounds
    }

    /// Bind `cases` to a new select. Nothing is registered until the returned future is polled.
    ///
    /// Fails if `cases` is empty, or if a case already belongs to a select (including appearing
    /// twice in `cases`). On failure no case is left bound.
    pub fn select(&mut self, cases: &[&dyn SelectCase]) -> Result<Select, SelectError> {
        if cases.is_empty() {
            return Err(SelectError::NoCases);
        }

        let id = self.rounds;
        self.rounds += 1;
        let round = Rc::new(Round::new(id, self.tracer.clone()));

        let mut slots: Vec<Rc<dyn Slot>> = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let slot = case.erase().0;
            if !slot.bind(index, &round) {
                for s in &slots {
                    s.unbind();
                }
                return Err(SelectError::CaseInUse { index });
            }
            slots.push(slot);
        }

        round.trace(|t| t.on_select(id, slots.len()));
        Ok(Select {
            round,
            slots,
            phase: Phase::Fresh,
        })
    }
}

/// Bind `cases` to a new select, using a default [Selector].
pub fn select(cases: &[&dyn SelectCase]) -> Result<Select, SelectError> {
    Selector::new().select(cases)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Waiting,
    Done,
}

/// A select in progress. Resolves to the index of the winning case.
///
/// Dropping it before it resolves withdraws every registration it made.
pub struct Select {
    round: Rc<Round>,
    slots: Vec<Rc<dyn Slot>>,
    phase: Phase,
}

impl Select {
    #[inline]
    pub fn round(&self) -> RoundId {
        self.round.id()
    }

    /// Number of cases in the select.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn is_decided(&self) -> bool {
        self.round.winner().is_some()
    }

    #[inline]
    pub fn winner(&self) -> Option<usize> {
        self.round.winner()
    }

    /// Register every case in order, stopping as soon as one settles.
    fn register_all(&mut self, cx: &mut Context<'_>) -> Result<(), SelectError> {
        self.round.registering.set(true);
        let mut res = Ok(());
        for (index, slot) in self.slots.iter().enumerate() {
            if self.round.is_done() {
                break;
            }
            if let Err(source) = slot.clone().register(&self.round, cx) {
                log::debug!(
                    "round {}: case {index} refused registration: {source}",
                    self.round.id()
                );
                res = Err(SelectError::Registration { index, source });
                break;
            }
        }
        self.round.registering.set(false);

        if res.is_err() {
            self.round.abandon();
        }
        res
    }
}

impl Future for Select {
    type Output = Result<usize, SelectError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.phase {
            Phase::Done => {
                return Poll::Ready(this.round.winner().ok_or(SelectError::Abandoned));
            }
            Phase::Fresh => {
                this.round.set_waker(cx.waker());
                this.phase = Phase::Waiting;
                if let Err(e) = this.register_all(cx) {
                    this.phase = Phase::Done;
                    return Poll::Ready(Err(e));
                }
            }
            Phase::Waiting => {
                this.round.set_waker(cx.waker());
                this.round.poll_promises(cx);
            }
        }

        match this.round.winner() {
            Some(winner) => {
                this.phase = Phase::Done;
                Poll::Ready(Ok(winner))
            }
            None => Poll::Pending,
        }
    }
}

impl Drop for Select {
    fn drop(&mut self) {
        if !self.round.is_done() {
            self.round.abandon();
        }
    }
}

impl std::fmt::Debug for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Select")
            .field("round", &self.round.id())
            .field("cases", &self.slots.len())
            .field("phase", &self.phase)
            .field("winner", &self.round.winner())
            .finish()
    }
}

/// State of one select invocation, shared with the callbacks of its cases.
pub(crate) struct Round {
    id: RoundId,
    winner: Cell<Option<usize>>,
    // Set once a case claims the round, or once it is abandoned.
    done: Cell<bool>,
    registering: Cell<bool>,
    decided: LocalManualResetEvent,
    waker: RefCell<Option<Waker>>,
    // Indexed by pidx.
    pending: RefCell<Vec<Rc<dyn Slot>>>,
    tracer: Option<Rc<dyn Tracer>>,
}

impl Round {
    fn new(id: RoundId, tracer: Option<Rc<dyn Tracer>>) -> Self {
        Self {
            id,
            winner: Cell::new(None),
            done: Cell::new(false),
            registering: Cell::new(false),
            decided: LocalManualResetEvent::new(false),
            waker: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            tracer,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> RoundId {
        self.id
    }

    #[inline]
    pub(crate) fn winner(&self) -> Option<usize> {
        self.winner.get()
    }

    #[inline]
    pub(crate) fn is_done(&self) -> bool {
        self.done.get()
    }

    #[inline]
    pub(crate) fn trace(&self, f: impl FnOnce(&dyn Tracer)) {
        if let Some(t) = &self.tracer {
            f(&**t);
        }
    }

    /// Append to the pending list and return the new pidx.
    pub(crate) fn enqueue(&self, slot: Rc<dyn Slot>) -> usize {
        let mut pending = self.pending.borrow_mut();
        pending.push(slot);
        pending.len() - 1
    }

    /// Try to become the winner. Only the first caller succeeds.
    ///
    /// A refused claim is not necessarily a channel bug: a send and a receive on the same
    /// channel can meet inside one select, and the second of the pair then arrives late.
    pub(crate) fn claim(&self, cidx: usize) -> bool {
        if self.done.get() {
            log::debug!(
                "round {}: case {cidx} notified after the round was decided, refusing",
                self.id
            );
            self.trace(|t| t.on_late(self.id, cidx));
            return false;
        }
        self.done.set(true);
        self.winner.set(Some(cidx));
        true
    }

    /// Called by the winner once its outcome is recorded: cancel every other pending case, then
    /// release everyone waiting on the decision.
    pub(crate) fn finish(&self, winner: usize, ok: bool) {
        self.trace(|t| t.on_settle(self.id, winner, ok));

        let losers: Vec<Rc<dyn Slot>> = self
            .pending
            .borrow_mut()
            .drain(..)
            .filter(|s| s.cidx() != Some(winner))
            .collect();
        for slot in &losers {
            slot.cancel();
        }

        let immediate = self.registering.get();
        log::debug!(
            "round {}: case {winner} won (ok={ok}, immediate={immediate}, cancelled={})",
            self.id,
            losers.len()
        );
        self.trace(|t| t.on_decided(self.id, winner, immediate));

        self.decided.set();
        let waker = self.waker.borrow_mut().take();
        if let Some(w) = waker {
            w.wake();
        }
    }

    /// Give up without a winner, withdrawing every pending registration.
    pub(crate) fn abandon(&self) {
        self.done.set(true);
        let pending: Vec<Rc<dyn Slot>> = self.pending.borrow_mut().drain(..).collect();
        for slot in &pending {
            slot.cancel();
        }
        log::debug!("round {}: abandoned, cancelled={}", self.id, pending.len());
        self.trace(|t| t.on_abandon(self.id));
        self.decided.set();
    }

    fn set_waker(&self, waker: &Waker) {
        let mut slot = self.waker.borrow_mut();
        match slot.as_ref() {
            Some(w) if w.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    /// Poll the pending promise cases, in pending order, until one settles.
    fn poll_promises(&self, cx: &mut Context<'_>) {
        let promises: Vec<Rc<dyn Slot>> = self
            .pending
            .borrow()
            .iter()
            .filter(|s| s.kind() == CaseKind::Promise)
            .cloned()
            .collect();
        for slot in promises {
            if self.is_done() {
                break;
            }
            slot.poll_settle(cx);
        }
    }

    /// Resolves once the round is decided or abandoned.
    pub(crate) async fn decision(self: Rc<Self>) -> Option<usize> {
        self.decided.wait().await;
        self.winner.get()
    }
}
