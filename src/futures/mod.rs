//! Single-threaded async plumbing: the adapter a select uses to attach to a future, and a
//! deterministic executor for driving selects step by step.

pub mod controller;
pub mod executor;
pub mod settle;
pub mod simulator;
pub mod utils;
pub mod waker;

pub use controller::Controller;
pub use executor::{Executor, Spawner, TaskId};
pub use settle::OnSettle;
pub use simulator::Simulator;
