//! Cases: the candidate operations offered to a select.
//!
//! A [Case] is a handle to state shared between the caller, the select that owns it, and the
//! callbacks registered on its channel. The constructors only capture the target; everything
//! else (index, callbacks, pending slot) is filled in by the select.

use std::cell::{Ref, RefCell};
use std::error::Error;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::rc::Rc;
use std::task::Context;

use futures_lite::future::BoxedLocal;
use futures_lite::FutureExt;

use crate::error::{PromiseRejection, RegisterError, SelectError};
use crate::futures::OnSettle;
use crate::protocol::{
    Receivable, Received, Receiver, ReceiverCallback, Registration, Sendable, Sender,
    SenderCallback,
};
use crate::select::Round;

/// Which operation a case performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseKind {
    Send,
    Recv,
    Promise,
}

enum Op<T> {
    Send {
        to: Rc<dyn Sender<T>>,
        scb: Option<Box<dyn FnOnce() -> T>>,
        hscb: bool,
        reg: Option<Registration>,
    },
    Recv {
        from: Rc<dyn Receiver<T>>,
        hrcb: bool,
        reg: Option<Registration>,
    },
    Promise {
        // The caller's future with failures caught, until the select attaches a continuation.
        src: Option<BoxedLocal<Result<T, PromiseRejection>>>,
        prom: Option<BoxedLocal<()>>,
        attached: bool,
        rejection: Option<PromiseRejection>,
    },
}

struct CaseState<T> {
    op: Op<T>,
    cidx: Option<usize>,
    pidx: Option<usize>,
    round: Option<Rc<Round>>,
    next: Option<T>,
    ok: Option<bool>,
}

struct Inner<T> {
    state: RefCell<CaseState<T>>,
}

/// One candidate operation for a select. Single use: a case can be bound to one select only.
///
/// Cloning yields another handle to the same case.
pub struct Case<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Case<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Case<T> {
    fn new(op: Op<T>) -> Self {
        let state = CaseState {
            op,
            cidx: None,
            pidx: None,
            round: None,
            next: None,
            ok: None,
        };
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(state),
            }),
        }
    }

    #[inline]
    pub fn kind(&self) -> CaseKind {
        self.inner.kind()
    }

    /// Position in the case list of the select this case is bound to.
    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.inner.state.borrow().cidx
    }

    /// Position in the select's pending list, while the case is registered and unsettled.
    #[inline]
    pub fn pending_index(&self) -> Option<usize> {
        self.inner.state.borrow().pidx
    }

    /// True once the case was handed to its channel (or its future was attached).
    pub fn is_registered(&self) -> bool {
        match &self.inner.state.borrow().op {
            Op::Send { hscb, .. } => *hscb,
            Op::Recv { hrcb, .. } => *hrcb,
            Op::Promise { attached, .. } => *attached,
        }
    }

    /// None until the case settles.
    ///
    /// Send cases only ever settle with `true`. Receive cases settle with `false` when the
    /// channel was exhausted, promise cases when the future failed. A failed promise leaves
    /// `next` empty; its error is kept apart, see [Case::take_rejection].
    #[inline]
    pub fn ok(&self) -> Option<bool> {
        self.inner.state.borrow().ok
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.ok().is_some()
    }

    /// The received or resolved value, or the channel's default after end of stream.
    pub fn next(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.inner.state.borrow(), |st| st.next.as_ref()).ok()
    }

    pub fn take_next(&self) -> Option<T> {
        self.inner.state.borrow_mut().next.take()
    }

    /// The failure captured by a promise case that settled with `ok == Some(false)`.
    pub fn take_rejection(&self) -> Option<PromiseRejection> {
        match &mut self.inner.state.borrow_mut().op {
            Op::Promise { rejection, .. } => rejection.take(),
            _ => None,
        }
    }

    /// Resolves to the index of the case that won the select this case is bound to.
    ///
    /// That is not necessarily this case. Resolves to None if the case was never bound, or if
    /// its select was abandoned before any case won.
    pub fn winner(&self) -> impl Future<Output = Option<usize>> {
        let round = self.inner.state.borrow().round.clone();
        async move {
            match round {
                Some(round) => round.decision().await,
                None => None,
            }
        }
    }
}

/// Awaiting a case yields the same as [Case::winner].
impl<T: 'static> IntoFuture for &Case<T> {
    type Output = Option<usize>;
    type IntoFuture = BoxedLocal<Option<usize>>;

    fn into_future(self) -> Self::IntoFuture {
        self.winner().boxed_local()
    }
}

impl<T> fmt::Debug for Case<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.state.borrow();
        f.debug_struct("Case")
            .field("kind", &self.inner.kind())
            .field("cidx", &st.cidx)
            .field("pidx", &st.pidx)
            .field("ok", &st.ok)
            .finish()
    }
}

/// Prepare a receive case.
///
/// The receiver is resolved once, here. Fails with [SelectError::InvalidTarget] if `from` has no
/// receiving side.
pub fn recv<T, R>(from: &R) -> Result<Case<T>, SelectError>
where
    T: 'static,
    R: Receivable<T> + ?Sized,
{
    let from = from
        .receiver()
        .ok_or(SelectError::InvalidTarget {
            expected: "receiver",
        })?;
    Ok(Case::new(Op::Recv {
        from,
        hrcb: false,
        reg: None,
    }))
}

/// Prepare a send case. `scb` produces the value, and only runs once the channel can take it.
///
/// Fails with [SelectError::InvalidTarget] if `to` has no sending side.
pub fn send<T, S, F>(to: &S, scb: F) -> Result<Case<T>, SelectError>
where
    T: 'static,
    S: Sendable<T> + ?Sized,
    F: FnOnce() -> T + 'static,
{
    let to = to.sender().ok_or(SelectError::InvalidTarget {
        expected: "sender",
    })?;
    Ok(Case::new(Op::Send {
        to,
        scb: Some(Box::new(scb)),
        hscb: false,
        reg: None,
    }))
}

/// Prepare a case that settles when `fut` completes.
pub fn promise<T, F>(fut: F) -> Case<T>
where
    T: 'static,
    F: Future<Output = T> + 'static,
{
    from_source(async move { Ok::<T, PromiseRejection>(fut.await) }.boxed_local())
}

/// Prepare a case that settles when `fut` completes. An `Err` output settles the case with
/// `ok == Some(false)`, and the error is kept as a [PromiseRejection].
pub fn try_promise<T, E, F>(fut: F) -> Case<T>
where
    T: 'static,
    E: Error + 'static,
    F: Future<Output = Result<T, E>> + 'static,
{
    from_source(async move { fut.await.map_err(PromiseRejection::new) }.boxed_local())
}

fn from_source<T>(src: BoxedLocal<Result<T, PromiseRejection>>) -> Case<T> {
    Case::new(Op::Promise {
        src: Some(src),
        prom: None,
        attached: false,
        rejection: None,
    })
}

mod sealed {
    pub trait Sealed {}
}

/// Anything that can be listed in a select. Implemented by [Case].
pub trait SelectCase: sealed::Sealed {
    #[doc(hidden)]
    fn erase(&self) -> ErasedCase;
}

#[doc(hidden)]
pub struct ErasedCase(pub(crate) Rc<dyn Slot>);

impl<T> sealed::Sealed for Case<T> {}

impl<T: 'static> SelectCase for Case<T> {
    fn erase(&self) -> ErasedCase {
        let slot: Rc<dyn Slot> = self.inner.clone();
        ErasedCase(slot)
    }
}

/// The type-erased view of a case that a [Round] works with.
pub(crate) trait Slot {
    fn kind(&self) -> CaseKind;
    fn cidx(&self) -> Option<usize>;

    /// Assign the case its index. Returns false if it already belongs to a select.
    fn bind(&self, cidx: usize, round: &Rc<Round>) -> bool;
    fn unbind(&self);

    /// Hand the case to its backing primitive. A promise case is polled once, here.
    fn register(self: Rc<Self>, round: &Rc<Round>, cx: &mut Context<'_>)
        -> Result<(), RegisterError>;

    /// Poll an attached promise. No-op for channel cases.
    fn poll_settle(&self, cx: &mut Context<'_>);

    /// Undo the registration of a losing case, and drop its future if it has one.
    fn cancel(&self);
}

enum Prepared<T> {
    Send(Rc<dyn Sender<T>>, Box<dyn FnOnce() -> T>),
    Recv(Rc<dyn Receiver<T>>),
    Promise(BoxedLocal<Result<T, PromiseRejection>>),
    Spent,
}

enum Undo<T> {
    Send(Rc<dyn Sender<T>>, Registration),
    Recv(Rc<dyn Receiver<T>>, Registration),
}

impl<T: 'static> Inner<T> {
    /// Move out what registration needs, so no borrow is held while a channel runs callbacks.
    fn prepare(&self) -> Prepared<T> {
        match &mut self.state.borrow_mut().op {
            Op::Send { to, scb, .. } => match scb.take() {
                Some(scb) => Prepared::Send(to.clone(), scb),
                None => Prepared::Spent,
            },
            Op::Recv { from, hrcb, .. } if !*hrcb => Prepared::Recv(from.clone()),
            Op::Recv { .. } => Prepared::Spent,
            Op::Promise { src, .. } => match src.take() {
                Some(src) => Prepared::Promise(src),
                None => Prepared::Spent,
            },
        }
    }

    fn sender_callback(
        self: &Rc<Self>,
        round: &Rc<Round>,
        cidx: usize,
        scb: Box<dyn FnOnce() -> T>,
    ) -> SenderCallback<T> {
        let case = self.clone();
        let round = round.clone();
        Box::new(move || {
            if !round.claim(cidx) {
                return None;
            }
            let value = scb();
            case.settle(None, true);
            round.finish(cidx, true);
            Some(value)
        })
    }

    fn receiver_callback(self: &Rc<Self>, round: &Rc<Round>, cidx: usize) -> ReceiverCallback<T> {
        let case = self.clone();
        let round = round.clone();
        Box::new(move |got: Received<T>| {
            if !round.claim(cidx) {
                return Err(got);
            }
            let (next, ok) = got.into_parts();
            case.settle(next, ok);
            round.finish(cidx, ok);
            Ok(())
        })
    }

    fn continuation(
        self: &Rc<Self>,
        round: &Rc<Round>,
        cidx: usize,
        src: BoxedLocal<Result<T, PromiseRejection>>,
    ) -> BoxedLocal<()> {
        let case = self.clone();
        let round = round.clone();
        OnSettle::new(src, move |res: Result<T, PromiseRejection>| {
            // A promise in flight cannot be withdrawn, only ignored.
            if !round.claim(cidx) {
                return;
            }
            let ok = res.is_ok();
            match res {
                Ok(v) => case.settle(Some(v), true),
                Err(e) => {
                    if let Op::Promise { rejection, .. } = &mut case.state.borrow_mut().op {
                        *rejection = Some(e);
                    }
                    case.settle(None, false);
                }
            }
            round.finish(cidx, ok);
        })
        .boxed_local()
    }

    fn settle(&self, next: Option<T>, ok: bool) {
        let mut st = self.state.borrow_mut();
        st.next = next;
        st.ok = Some(ok);
        st.pidx = None;
        match &mut st.op {
            Op::Send { reg, .. } | Op::Recv { reg, .. } => *reg = None,
            Op::Promise { .. } => {}
        }
    }

    /// Finish registration: enqueue the case, or undo the registration if a sibling won while
    /// it was being made.
    fn park(self: &Rc<Self>, round: &Rc<Round>, cidx: usize, reg: Option<Registration>) {
        let kind = self.kind();
        if round.winner() == Some(cidx) {
            round.trace(|t| t.on_register(round.id(), cidx, kind, None));
            return;
        }

        {
            let mut st = self.state.borrow_mut();
            match &mut st.op {
                Op::Send { reg: slot, .. } | Op::Recv { reg: slot, .. } => *slot = reg,
                Op::Promise { .. } => {}
            }
        }

        if round.is_done() {
            round.trace(|t| t.on_register(round.id(), cidx, kind, None));
            self.cancel();
            return;
        }

        let erased: Rc<dyn Slot> = self.clone();
        let pidx = round.enqueue(erased);
        self.state.borrow_mut().pidx = Some(pidx);
        log::trace!("round {}: case {cidx} ({kind:?}) pending at {pidx}", round.id());
        round.trace(|t| t.on_register(round.id(), cidx, kind, Some(pidx)));
    }
}

impl<T: 'static> Slot for Inner<T> {
    fn kind(&self) -> CaseKind {
        Inner::kind(self)
    }

    fn cidx(&self) -> Option<usize> {
        self.state.borrow().cidx
    }

    fn bind(&self, cidx: usize, round: &Rc<Round>) -> bool {
        let mut st = self.state.borrow_mut();
        if st.cidx.is_some() {
            return false;
        }
        st.cidx = Some(cidx);
        st.round = Some(round.clone());
        true
    }

    fn unbind(&self) {
        let mut st = self.state.borrow_mut();
        st.cidx = None;
        st.round = None;
    }

    fn register(
        self: Rc<Self>,
        round: &Rc<Round>,
        cx: &mut Context<'_>,
    ) -> Result<(), RegisterError> {
        let Some(cidx) = self.cidx() else {
            return Ok(());
        };

        let reg = match self.prepare() {
            Prepared::Send(to, scb) => {
                let cb = self.sender_callback(round, cidx, scb);
                let reg = to.register_sender(cb)?;
                if let Op::Send { hscb, .. } = &mut self.state.borrow_mut().op {
                    *hscb = true;
                }
                Some(reg)
            }
            Prepared::Recv(from) => {
                let cb = self.receiver_callback(round, cidx);
                let reg = from.register_receiver(cb)?;
                if let Op::Recv { hrcb, .. } = &mut self.state.borrow_mut().op {
                    *hrcb = true;
                }
                Some(reg)
            }
            Prepared::Promise(src) => {
                let prom = self.continuation(round, cidx, src);
                if let Op::Promise {
                    prom: slot,
                    attached,
                    ..
                } = &mut self.state.borrow_mut().op
                {
                    *slot = Some(prom);
                    *attached = true;
                }
                self.poll_settle(cx);
                None
            }
            Prepared::Spent => return Ok(()),
        };

        self.park(round, cidx, reg);
        Ok(())
    }

    fn poll_settle(&self, cx: &mut Context<'_>) {
        let prom = match &mut self.state.borrow_mut().op {
            Op::Promise { prom, .. } => prom.take(),
            _ => None,
        };
        let Some(mut prom) = prom else {
            return;
        };

        if prom.as_mut().poll(cx).is_ready() {
            return;
        }

        // Put it back, unless a sibling won while it was being polled.
        let mut st = self.state.borrow_mut();
        let live = st.round.as_ref().is_some_and(|r| !r.is_done());
        if live {
            if let Op::Promise { prom: slot, .. } = &mut st.op {
                *slot = Some(prom);
            }
        } else {
            drop(st);
            drop(prom);
        }
    }

    fn cancel(&self) {
        let (undo, prom, round, cidx, kind) = {
            let mut st = self.state.borrow_mut();
            st.pidx = None;
            let (undo, prom) = match &mut st.op {
                Op::Send { to, reg, .. } => (reg.take().map(|r| Undo::Send(to.clone(), r)), None),
                Op::Recv { from, reg, .. } => {
                    (reg.take().map(|r| Undo::Recv(from.clone(), r)), None)
                }
                Op::Promise { prom, .. } => (None, prom.take()),
            };
            (undo, prom, st.round.clone(), st.cidx, Inner::kind_of(&st.op))
        };

        match undo {
            Some(Undo::Send(to, reg)) => to.unregister_sender(reg),
            Some(Undo::Recv(from, reg)) => from.unregister_receiver(reg),
            None => {}
        }
        drop(prom);

        if let (Some(round), Some(cidx)) = (round, cidx) {
            log::trace!("round {}: case {cidx} ({kind:?}) unregistered", round.id());
            round.trace(|t| t.on_unregister(round.id(), cidx, kind));
        }
    }
}

impl<T> Inner<T> {
    fn kind(&self) -> CaseKind {
        Self::kind_of(&self.state.borrow().op)
    }

    fn kind_of(op: &Op<T>) -> CaseKind {
        match op {
            Op::Send { .. } => CaseKind::Send,
            Op::Recv { .. } => CaseKind::Recv,
            Op::Promise { .. } => CaseKind::Promise,
        }
    }
}
