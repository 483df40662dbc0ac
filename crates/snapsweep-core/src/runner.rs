use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

/// Sliding-window task runner with at most `limit` futures in flight.
///
/// Tasks are admitted in input order. Once the window is full the runner
/// waits for any one in-flight task to settle and immediately admits the
/// next, so a slow task never holds back a whole batch. Results come back in
/// input order regardless of completion order.
///
/// Tasks are infallible from the runner's point of view: anything that can
/// fail must be turned into a value of `R` inside the task.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRunner {
    limit: usize,
}

impl BoundedRunner {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `task(item, index)` for every item and collect all results.
    ///
    /// An empty `items` resolves immediately without calling `task`.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, mut task: F) -> Vec<R>
    where
        F: FnMut(T, usize) -> Fut,
        Fut: Future<Output = R>,
    {
        let mut slots: Vec<Option<R>> = Vec::with_capacity(items.len());
        slots.resize_with(items.len(), || None);

        let mut in_flight = FuturesUnordered::new();

        for (index, item) in items.into_iter().enumerate() {
            if in_flight.len() >= self.limit
                && let Some((done, result)) = in_flight.next().await
            {
                slots[done] = Some(result);
            }

            let fut = task(item, index);
            in_flight.push(async move { (index, fut.await) });
        }

        while let Some((done, result)) = in_flight.next().await {
            slots[done] = Some(result);
        }

        // Every index was pushed exactly once and drained above.
        slots.into_iter().flatten().collect()
    }
}
