use std::error::Error;
use std::fmt;

/// Failures surfaced by the case constructors and by a select.
#[derive(thiserror::Error, Debug)]
pub enum SelectError {
    #[error("target does not expose a {expected} capability")]
    InvalidTarget { expected: &'static str },

    #[error("select needs at least one case")]
    NoCases,

    #[error("case {index} is already bound to a select")]
    CaseInUse { index: usize },

    #[error("case {index} could not be registered")]
    Registration {
        index: usize,
        #[source]
        source: RegisterError,
    },

    #[error("select was abandoned before a case won")]
    Abandoned,
}

/// Returned by a channel that refuses a registration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("channel is closed")]
    Closed,

    #[error("registration refused: {0}")]
    Refused(String),
}

/// The failure reason of a promise case. Captured on the case, never thrown.
pub struct PromiseRejection(Box<dyn Error + 'static>);

impl PromiseRejection {
    #[inline]
    pub fn new<E: Error + 'static>(err: E) -> Self {
        Self(Box::new(err))
    }

    #[inline]
    pub fn get_ref(&self) -> &(dyn Error + 'static) {
        &*self.0
    }

    /// Attempt to recover the concrete error type.
    pub fn downcast<E: Error + 'static>(self) -> Result<E, Self> {
        self.0.downcast::<E>().map(|e| *e).map_err(Self)
    }
}

impl fmt::Debug for PromiseRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PromiseRejection").field(&self.0).finish()
    }
}

impl fmt::Display for PromiseRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise rejected: {}", self.0)
    }
}

impl Error for PromiseRejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.0)
    }
}
