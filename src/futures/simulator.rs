use std::cell::{Ref, RefCell};

use crate::futures::{Controller, Executor};
use crate::KripkeStructure;

/// Combine an Executor with a Controller to deterministically and repeatedly run async code.
pub struct Simulator<C> {
    executor: Executor,
    controller: RefCell<C>,
}

impl<C> Simulator<C> {
    pub fn new(controller: C) -> Self {
        Self {
            executor: Executor::default(),
            controller: RefCell::new(controller),
        }
    }

    #[inline]
    pub fn controller(&self) -> Ref<'_, C> {
        self.controller.borrow()
    }

    #[inline]
    pub fn into_controller(self) -> C {
        self.executor.reset();
        self.controller.into_inner()
    }
}

impl<C> Default for Simulator<C>
where
    C: Default,
{
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C> KripkeStructure for &Simulator<C>
where
    C: Controller,
{
    type Label = usize;
    type LabelIterator = std::ops::Range<usize>;

    #[inline]
    fn transition(self, label: Self::Label) {
        let task = self.executor.choose(label);
        self.controller.borrow_mut().on_transition(task);
    }

    #[inline]
    fn successors(self) -> Option<Self::LabelIterator> {
        match self.executor.choices() {
            0 => {
                self.controller
                    .borrow_mut()
                    .on_end_of_trajectory(&self.executor);
                None
            }
            n => Some(0..n),
        }
    }

    #[inline]
    fn restart(self) {
        self.executor.reset();
        self.controller
            .borrow_mut()
            .on_restart(&self.executor.spawner());
    }
}
