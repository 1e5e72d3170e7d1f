//! Bounded fan-out over independent items.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cancel::CancelSignal;

/// What happened to one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<R> {
    /// The operation ran to completion (its own result may still be an error).
    Finished(R),
    /// Cancellation was observed before the item started.
    Cancelled,
    /// The task panicked or was aborted.
    Crashed(String),
}

impl<R> ItemOutcome<R> {
    pub fn finished(self) -> Option<R> {
        match self {
            Self::Finished(r) => Some(r),
            _ => None,
        }
    }
}

/// Run `op` over every item with at most `limit` in flight at once.
///
/// Each item gets its own task and writes only its own slot, so the result
/// is in input order whatever order tasks complete in. `on_joined(done,
/// total)` fires as each slot is filled. Cancellation is checked when an
/// item acquires its permit; items already running are left to finish.
pub async fn fan_out<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    cancel: &CancelSignal,
    op: F,
    mut on_joined: impl FnMut(usize, usize),
) -> Vec<ItemOutcome<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let op = Arc::new(op);

    let handles: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let op = op.clone();
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ItemOutcome::Cancelled;
                };
                if cancel.is_cancelled() {
                    debug!(index, "batch item skipped after cancellation");
                    return ItemOutcome::Cancelled;
                }
                ItemOutcome::Finished(op(index, item).await)
            })
        })
        .collect();

    let mut slots: Vec<Option<ItemOutcome<R>>> = (0..total).map(|_| None).collect();
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(index, error = %e, "batch task crashed");
                ItemOutcome::Crashed(e.to_string())
            }
        };
        slots[index] = Some(outcome);
        on_joined(index + 1, total);
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| ItemOutcome::Crashed("slot never filled".into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn results_follow_input_order() {
        // Earlier items sleep longer, so they finish last.
        let outcomes = fan_out(
            vec![40u64, 30, 20, 10, 0],
            5,
            &CancelSignal::new(),
            |index, delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                index * 10
            },
            |_, _| {},
        )
        .await;
        let values: Vec<usize> = outcomes.into_iter().filter_map(ItemOutcome::finished).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (running.clone(), peak.clone());

        fan_out(
            (0..12).collect::<Vec<u32>>(),
            3,
            &CancelSignal::new(),
            move |_, _| {
                let (running, peak) = (r.clone(), p.clone());
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            },
            |_, _| {},
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn cancelled_items_do_not_start() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();

        let outcomes = fan_out(
            vec![(); 4],
            2,
            &cancel,
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
            |_, _| {},
        )
        .await;

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert!(outcomes.iter().all(|o| *o == ItemOutcome::Cancelled));
    }

    #[tokio::test]
    async fn panics_become_crashed_slots() {
        let outcomes = fan_out(
            vec![1u8, 2, 3],
            2,
            &CancelSignal::new(),
            |index, value| async move {
                if index == 1 {
                    panic!("boom");
                }
                value
            },
            |_, _| {},
        )
        .await;
        assert_eq!(outcomes[0], ItemOutcome::Finished(1));
        assert!(matches!(outcomes[1], ItemOutcome::Crashed(_)));
        assert_eq!(outcomes[2], ItemOutcome::Finished(3));
    }

    #[tokio::test]
    async fn reports_each_join() {
        let mut seen = Vec::new();
        fan_out(vec![(); 3], 1, &CancelSignal::new(), |_, _| async {}, |done, total| {
            seen.push((done, total));
        })
        .await;
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
