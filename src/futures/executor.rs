//! A deterministic, single-threaded task executor where the caller picks every step.
//!
//! Selects are driven entirely by callbacks and wakers, so the interesting bugs live in the
//! interleavings between a select task and the tasks that feed its channels. This executor
//! makes those interleavings explicit: the ready set is an ordered list, and each step polls
//! exactly the task the caller chose.
//!
//! Originally a simplified fork of the LocalExecutor in stjepang's multitask crate.

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures_lite::future::BoxedLocal;
use futures_lite::FutureExt;

use super::waker;

/// Assigned to each task at spawn, in spawn order.
pub type TaskId = usize;

/// A detached future that the executor will run.
struct Task {
    id: TaskId,
    fut: BoxedLocal<()>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

#[derive(Default, Debug)]
struct Inner {
    next_id: TaskId,
    // Parked tasks: not currently being polled.
    tasks: Vec<Task>,
    // Woken task ids, oldest first, without duplicates.
    ready: Vec<TaskId>,
    unfinished_tasks: isize,
    polls: u64,
}

impl Inner {
    #[inline]
    fn wake(&mut self, id: TaskId) {
        if !self.ready.contains(&id) {
            self.ready.push(id);
        }
    }
}

/// Launches tasks on an [Executor]. Clone it as many times as needed.
#[derive(Clone)]
pub struct Spawner {
    inner: Rc<RefCell<Inner>>,
}

impl Spawner {
    /// Spawn a task. It is ready to run immediately.
    pub fn spawn_detach(&self, fut: impl Future<Output = ()> + 'static) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;

        inner.tasks.push(Task {
            id,
            fut: fut.boxed_local(),
        });
        inner.ready.push(id);
        inner.unfinished_tasks += 1;
        id
    }
}

#[derive(Default)]
pub struct Executor {
    inner: Rc<RefCell<Inner>>,
}

impl Executor {
    #[inline]
    pub fn spawner(&self) -> Spawner {
        Spawner {
            inner: self.inner.clone(),
        }
    }

    #[inline]
    pub fn spawn_detach(&self, fut: impl Future<Output = ()> + 'static) -> TaskId {
        self.spawner().spawn_detach(fut)
    }

    /// The number of ready tasks. Any index in `0..choices()` is a valid argument to `choose`.
    ///
    /// Zero means the trajectory is finished.
    #[inline]
    pub fn choices(&self) -> usize {
        self.inner.borrow().ready.len()
    }

    /// The ready task ids, oldest wake first.
    pub fn ready(&self) -> Vec<TaskId> {
        self.inner.borrow().ready.clone()
    }

    /// Poll the ready task at position `idx` once, and return its id.
    ///
    /// Panics if `idx` is not below `choices()`.
    pub fn choose(&self, idx: usize) -> TaskId {
        let mut task = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.ready.remove(idx);
            let pos = inner
                .tasks
                .iter()
                .position(|t| t.id == id)
                .expect("logic error: ready task is not parked");
            inner.polls += 1;
            inner.tasks.swap_remove(pos)
        };

        // The waker holds a weak reference, so a waker stored in a channel does not keep the
        // executor (and every task in it) alive.
        let id = task.id;
        let w = waker::waker_fn({
            let inner = Rc::downgrade(&self.inner);
            move || wake(&inner, id)
        });

        let poll = task.fut.as_mut().poll(&mut Context::from_waker(&w));

        let mut inner = self.inner.borrow_mut();
        match poll {
            Poll::Ready(()) => {
                inner.unfinished_tasks -= 1;
                // It may have woken itself on the way out.
                inner.ready.retain(|&r| r != id);
            }
            Poll::Pending => inner.tasks.push(task),
        }
        id
    }

    /// Step the most recently woken task. Returns false if nothing is ready.
    #[inline]
    pub fn choose_any(&self) -> bool {
        match self.choices() {
            0 => false,
            n => {
                self.choose(n - 1);
                true
            }
        }
    }

    /// Step the task that has been ready the longest. Returns false if nothing is ready.
    #[inline]
    pub fn choose_oldest(&self) -> bool {
        match self.choices() {
            0 => false,
            _ => {
                self.choose(0);
                true
            }
        }
    }

    /// Run with `choose_any` until no task is ready. Returns the number of steps taken.
    pub fn run(&self) -> usize {
        let mut steps = 0;
        while self.choose_any() {
            steps += 1;
        }
        steps
    }

    /// Run with `choose_oldest` (round robin) until no task is ready.
    pub fn run_fifo(&self) -> usize {
        let mut steps = 0;
        while self.choose_oldest() {
            steps += 1;
        }
        steps
    }

    /// Drop every task and clear all state, so the executor can start a new trajectory.
    pub fn reset(&self) {
        let tasks = {
            let mut inner = self.inner.borrow_mut();
            inner.next_id = 0;
            inner.ready.clear();
            inner.unfinished_tasks = 0;
            inner.polls = 0;
            std::mem::take(&mut inner.tasks)
        };
        // Dropping a task may run destructors that wake other tasks; no borrow may be held.
        drop(tasks);
        self.inner.borrow_mut().ready.clear();
    }

    /// Tasks spawned and not yet completed. Once nothing is ready, these are stuck.
    #[inline]
    pub fn unfinished_tasks(&self) -> isize {
        self.inner.borrow().unfinished_tasks
    }

    /// Total number of polls since the last reset.
    #[inline]
    pub fn polls(&self) -> u64 {
        self.inner.borrow().polls
    }
}

fn wake(inner: &Weak<RefCell<Inner>>, id: TaskId) {
    if let Some(inner) = inner.upgrade() {
        // A wake that arrives while the executor itself is borrowed can only come from a
        // destructor during reset, which clears the ready set anyway.
        if let Ok(mut g) = inner.try_borrow_mut() {
            g.wake(id);
        }
    }
}
