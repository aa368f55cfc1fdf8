use std::future::Future;
use std::pin::pin;
use std::task::Poll;

use futures::future::{poll_fn, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::trace;

use crate::context::BraidContext;

/// Drives `execution` to completion, dispatching the request's loaders every
/// time it stalls on them and no batch is in flight.
///
/// Nothing is spawned: the batches are polled by this future, so execution of
/// one request stays on the task that awaits it.
pub async fn dispatching<'a, T>(
    context: &'a BraidContext,
    execution: impl Future<Output = T> + 'a,
) -> T {
    let mut execution = pin!(execution);
    let mut batches: FuturesUnordered<BoxFuture<'a, ()>> = FuturesUnordered::new();
    let state = context.dispatch_state();

    poll_fn(move |cx| loop {
        if let Poll::Ready(output) = execution.as_mut().poll(cx) {
            return Poll::Ready(output);
        }

        if state.should_dispatch() {
            let dispatched = context.loaders().dispatch_all(context);
            if !dispatched.is_empty() {
                trace!(batches = dispatched.len(), "dispatching loaders");
            }
            for batch in dispatched {
                state.batch_started();
                batches.push(batch.map(move |()| state.batch_finished()).boxed());
            }
        }

        let mut completed = false;
        while let Poll::Ready(Some(())) = batches.poll_next_unpin(cx) {
            completed = true;
        }
        if !completed {
            return Poll::Pending;
        }
    })
    .await
}
