//! Defines the Controller trait that provides user hooks.

use super::executor::{Executor, Spawner, TaskId};

/// Sets up and checks one scenario, so that a [Simulator](super::Simulator) can replay it under
/// every interleaving.
pub trait Controller {
    /// Triggers when a trajectory is restarted from scratch.
    ///
    /// # Example uses:
    ///
    /// - Creating fresh channels and cases.
    /// - Spawning the select task and the tasks feeding its channels.
    fn on_restart(&mut self, spawner: &Spawner);

    /// Triggers after every step, with the id of the task that was polled.
    fn on_transition(&mut self, _task: TaskId) {}

    /// Triggers when no task is ready any more.
    ///
    /// # Example uses:
    ///
    /// - Checking that exactly one case won and no value was lost.
    /// - Counting trajectories.
    fn on_end_of_trajectory(&mut self, ex: &Executor);
}
