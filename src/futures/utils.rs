/// Re-export an implementation of an async function to yield immediately.
pub use futures_lite::future::yield_now;

/// A timer measured in polls instead of wall-clock time: completes after `ticks` yields.
///
/// Use this as the timeout case of a select, so that tests stay deterministic under the
/// [Executor](super::Executor).
#[inline]
pub async fn sleep_ticks(ticks: usize) {
    for _ in 0..ticks {
        yield_now().await;
    }
}

/// Wrap a function call with an async yield_now.
///
/// Use this to put a scheduling point in front of a synchronous channel operation (a push or a
/// close), so that the executor can interleave it with the select waiting on that channel.
#[inline]
pub async fn asyncify<F: FnOnce() -> T, T>(f: F) -> T {
    yield_now().await;
    f()
}
