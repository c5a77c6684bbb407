//! Hooks for observing what a select does to its cases.

use std::cell::RefCell;

use crate::case::CaseKind;

/// Identifies one select invocation. Unique per [Selector](crate::Selector).
pub type RoundId = u64;

/// Observer of select internals. Every hook has an empty default.
///
/// Hooks may run from inside channel callbacks, so implementations must not start another
/// select or touch the cases.
pub trait Tracer {
    fn on_select(&self, _round: RoundId, _cases: usize) {}

    /// A case was handed to its backing primitive. `pidx` is None when it settled immediately
    /// or when the round was already decided.
    fn on_register(&self, _round: RoundId, _cidx: usize, _kind: CaseKind, _pidx: Option<usize>) {}

    fn on_settle(&self, _round: RoundId, _cidx: usize, _ok: bool) {}
    fn on_unregister(&self, _round: RoundId, _cidx: usize, _kind: CaseKind) {}

    /// A notification arrived after the round was decided, and was refused.
    fn on_late(&self, _round: RoundId, _cidx: usize) {}

    fn on_decided(&self, _round: RoundId, _winner: usize, _immediate: bool) {}
    fn on_abandon(&self, _round: RoundId) {}
}

/// Forwards every event to the `log` facade at trace level.
pub struct LogTracer;

impl Tracer for LogTracer {
    fn on_select(&self, round: RoundId, cases: usize) {
        log::trace!("[select] round={round} cases={cases}");
    }
    fn on_register(&self, round: RoundId, cidx: usize, kind: CaseKind, pidx: Option<usize>) {
        log::trace!("[register] round={round} case={cidx} kind={kind:?} pidx={pidx:?}");
    }
    fn on_settle(&self, round: RoundId, cidx: usize, ok: bool) {
        log::trace!("[settle] round={round} case={cidx} ok={ok}");
    }
    fn on_unregister(&self, round: RoundId, cidx: usize, kind: CaseKind) {
        log::trace!("[unregister] round={round} case={cidx} kind={kind:?}");
    }
    fn on_late(&self, round: RoundId, cidx: usize) {
        log::trace!("[late] round={round} case={cidx}");
    }
    fn on_decided(&self, round: RoundId, winner: usize, immediate: bool) {
        log::trace!("[decided] round={round} winner={winner} immediate={immediate}");
    }
    fn on_abandon(&self, round: RoundId) {
        log::trace!("[abandon] round={round}");
    }
}

/// Stores trace lines in memory instead of printing them.
#[derive(Default)]
pub struct BufferTracer {
    lines: RefCell<Vec<String>>,
}

impl BufferTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, s: impl Into<String>) {
        self.lines.borrow_mut().push(s.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }

    /// Count lines starting with `prefix`, e.g. `"[unregister]"`.
    pub fn count(&self, prefix: &str) -> usize {
        self.lines
            .borrow()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }
}

impl Tracer for BufferTracer {
    fn on_select(&self, round: RoundId, cases: usize) {
        self.push(format!("[select] {round} cases={cases}"));
    }
    fn on_register(&self, round: RoundId, cidx: usize, kind: CaseKind, pidx: Option<usize>) {
        self.push(format!("[register] {round} {cidx} {kind:?} pidx={pidx:?}"));
    }
    fn on_settle(&self, round: RoundId, cidx: usize, ok: bool) {
        self.push(format!("[settle] {round} {cidx} ok={ok}"));
    }
    fn on_unregister(&self, round: RoundId, cidx: usize, kind: CaseKind) {
        self.push(format!("[unregister] {round} {cidx} {kind:?}"));
    }
    fn on_late(&self, round: RoundId, cidx: usize) {
        self.push(format!("[late] {round} {cidx}"));
    }
    fn on_decided(&self, round: RoundId, winner: usize, immediate: bool) {
        self.push(format!("[decided] {round} {winner} immediate={immediate}"));
    }
    fn on_abandon(&self, round: RoundId) {
        self.push(format!("[abandon] {round}"));
    }
}
