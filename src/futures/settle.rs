use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

pin_project! {
    /// Hand the output of a future to a continuation, synchronously, when it polls Ready.
    ///
    /// This is how a select attaches to a promise case: the future itself becomes `()`-valued,
    /// and its outcome flows through the same path as a channel callback.
    ///
    /// Must not be polled again after it resolved.
    pub struct OnSettle<F, G> {
        #[pin]
        fut: F,
        continuation: Option<G>,
    }
}

impl<F, G> OnSettle<F, G> {
    pub fn new(fut: F, continuation: G) -> Self {
        Self {
            fut,
            continuation: Some(continuation),
        }
    }
}

impl<F, G> Future for OnSettle<F, G>
where
    F: Future,
    G: FnOnce(F::Output),
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        match this.fut.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(out) => {
                if let Some(g) = this.continuation.take() {
                    g(out);
                }
                Poll::Ready(())
            }
        }
    }
}
