//! Closures as wakers, without `Send` or `Sync`.
//!
//! `std::task::Wake` requires `Arc` and a thread-safe closure. The executor's wakers only ever
//! run on the thread that owns the executor, so they are built on `Rc` instead. Sending one of
//! these wakers to another thread is not supported.

use std::mem::ManuallyDrop;
use std::rc::Rc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Converts a closure into a [`Waker`]. The closure runs every time the waker is woken.
#[inline]
pub fn waker_fn<F: Fn() + 'static>(f: F) -> Waker {
    let data = Rc::into_raw(Rc::new(f)) as *const ();
    // SAFETY: the vtable below matches the data pointer's type.
    unsafe { Waker::from_raw(RawWaker::new(data, vtable::<F>())) }
}

fn vtable<F: Fn() + 'static>() -> &'static RawWakerVTable {
    &RcWaker::<F>::VTABLE
}

struct RcWaker<F>(F);

impl<F: Fn() + 'static> RcWaker<F> {
    const VTABLE: RawWakerVTable =
        RawWakerVTable::new(Self::clone, Self::wake, Self::wake_by_ref, Self::drop_waker);

    unsafe fn clone(data: *const ()) -> RawWaker {
        Rc::increment_strong_count(data as *const F);
        RawWaker::new(data, &Self::VTABLE)
    }

    unsafe fn wake(data: *const ()) {
        let f = Rc::from_raw(data as *const F);
        (f)();
    }

    unsafe fn wake_by_ref(data: *const ()) {
        let f = ManuallyDrop::new(Rc::from_raw(data as *const F));
        (f)();
    }

    unsafe fn drop_waker(data: *const ()) {
        drop(Rc::from_raw(data as *const F));
    }
}
