//! Multi-way select over channel sends, channel receives and futures.
//!
//! A select waits on several [Case]s at once and resolves exactly one of them. Channels take
//! part through the callback capabilities in [Sender] and [Receiver]; a select registers one
//! callback per case, and the first callback to fire wins. Everything else is withdrawn before
//! that callback returns.
//!
//! ```ignore
//! let a = recv(&chan_a)?;
//! let b = recv(&chan_b)?;
//! let winner = select(&[&a, &b])?.await?;
//! ```
//!
//! The [futures] module holds a deterministic single-threaded executor, and [dfs] explores every
//! interleaving of the tasks on it, which is how selects are tested against racing producers.

pub mod dfs;
pub mod futures;
pub mod trace;

mod case;
mod error;
mod kripke_structure;
mod protocol;
mod select;

#[doc(hidden)]
pub use case::ErasedCase;
pub use case::{promise, recv, send, try_promise, Case, CaseKind, SelectCase};
pub use error::{PromiseRejection, RegisterError, SelectError};
pub use kripke_structure::KripkeStructure;
pub use protocol::{
    Receivable, Received, Receiver, ReceiverCallback, Registration, Sendable, Sender,
    SenderCallback,
};
pub use select::{select, Select, Selector};
pub use trace::{BufferTracer, LogTracer, RoundId, Tracer};
