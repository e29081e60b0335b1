//! Pending decode operations shared by every caller asking for the same key.
//!
//! The task running a decode owns the `watch::Sender`; each caller holds a
//! `Receiver`. When the task publishes an outcome every receiver sees the
//! same value. When the task is aborted the sender is dropped and waiters
//! resolve to [`ProcessError::Cancelled`].
//!
//! Aborting the task does not stop a decode already running on the blocking
//! pool. Each operation therefore also carries a cancellation flag the
//! decoder polls, and a [`Finished`] signal that closes once the blocking
//! decode has returned and released its concurrency slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use blurhash_decoder::PixelBuffer;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ProcessError, ProcessResult};

pub(crate) type Outcome = ProcessResult<Arc<PixelBuffer>>;
pub(crate) type OutcomeSender = watch::Sender<Option<Outcome>>;
pub(crate) type OutcomeReceiver = watch::Receiver<Option<Outcome>>;

/// Dropped when the blocking decode returns.
pub(crate) type FinishGuard = watch::Sender<()>;
/// Closes when the matching [`FinishGuard`] is dropped.
pub(crate) type Finished = watch::Receiver<()>;

pub(crate) fn channel() -> (OutcomeSender, OutcomeReceiver) {
    watch::channel(None)
}

pub(crate) fn finish_signal() -> (FinishGuard, Finished) {
    watch::channel(())
}

pub(crate) fn is_finished(finished: &Finished) -> bool {
    finished.has_changed().is_err()
}

/// Wait until the decode behind `finished` has returned.
pub(crate) async fn until_finished(mut finished: Finished) {
    while finished.changed().await.is_ok() {}
}

/// Record of one in-flight decode.
pub(crate) struct InFlight {
    pub(crate) id: u64,
    receiver: OutcomeReceiver,
    task: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
    finished: Finished,
}

impl InFlight {
    pub(crate) fn new(
        id: u64,
        receiver: OutcomeReceiver,
        task: JoinHandle<()>,
        cancelled: Arc<AtomicBool>,
        finished: Finished,
    ) -> Self {
        Self {
            id,
            receiver,
            task,
            cancelled,
            finished,
        }
    }

    pub(crate) fn subscribe(&self) -> OutcomeReceiver {
        self.receiver.clone()
    }

    /// The task was dropped without publishing or clearing its entry, which
    /// only happens when its runtime shuts down underneath it.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.receiver.has_changed().is_err() && self.receiver.borrow().is_none()
    }

    /// Ask the running decode to stop. Returns the signal that closes once
    /// it actually has.
    pub(crate) fn cancel(&self) -> Finished {
        self.cancelled.store(true, Ordering::SeqCst);
        self.finished.clone()
    }

    pub(crate) fn abort(self) {
        self.task.abort();
    }
}

/// Wait for the operation behind `receiver` to publish its outcome.
pub(crate) async fn wait(mut receiver: OutcomeReceiver) -> Outcome {
    match receiver.wait_for(Option::is_some).await {
        Ok(slot) => slot.clone().unwrap_or(Err(ProcessError::Cancelled)),
        Err(_) => Err(ProcessError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(task: JoinHandle<()>) -> (OutcomeSender, FinishGuard, InFlight) {
        let (tx, rx) = channel();
        let (guard, finished) = finish_signal();
        let entry = InFlight::new(1, rx, task, Arc::new(AtomicBool::new(false)), finished);
        (tx, guard, entry)
    }

    #[tokio::test]
    async fn test_all_receivers_see_published_outcome() {
        let (tx, rx) = channel();
        let waiters: Vec<_> = (0..3).map(|_| tokio::spawn(wait(rx.clone()))).collect();
        tx.send_replace(Some(Err(ProcessError::DecodingFailed("bad dc".into()))));
        for waiter in waiters {
            assert_eq!(
                waiter.await.unwrap(),
                Err(ProcessError::DecodingFailed("bad dc".into()))
            );
        }
        // Late subscribers still observe the stored value.
        assert!(wait(rx).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_sender_resolves_to_cancelled() {
        let (tx, rx) = channel();
        let waiter = tokio::spawn(wait(rx));
        drop(tx);
        assert_eq!(waiter.await.unwrap(), Err(ProcessError::Cancelled));
    }

    #[tokio::test]
    async fn test_abandoned_detection() {
        let (tx, _guard, entry) = entry(tokio::spawn(async {}));
        assert!(!entry.is_abandoned());
        drop(tx);
        assert!(entry.is_abandoned());
        entry.abort();
    }

    #[tokio::test]
    async fn test_cancel_raises_flag_and_tracks_finish() {
        let (_tx, guard, entry) = entry(tokio::spawn(async {}));
        let flag = Arc::clone(&entry.cancelled);

        let finished = entry.cancel();
        assert!(flag.load(Ordering::SeqCst));
        assert!(!is_finished(&finished));

        let waiter = tokio::spawn(until_finished(finished.clone()));
        drop(guard);
        waiter.await.unwrap();
        assert!(is_finished(&finished));
        entry.abort();
    }
}
