//! Bounded single-consumer task queue (the sequencer, C4): every order
//! submission, cancel, and auction trigger is admitted here as one
//! [`MatchTask`], carried to the matching worker thread in admission order,
//! and answered on a private one-shot completion channel. A full queue
//! rejects admission immediately rather than blocking the caller.

mod error;
mod types;

pub use error::QueueFullError;
pub use types::{MatchTask, TaskOutcome};
use types::TaskEnvelope;

use tokio::sync::oneshot;

/// The producer handle. Cheap to clone; every caller submitting work holds
/// one of these.
#[derive(Clone)]
pub struct TaskQueue {
    sender: crossbeam::channel::Sender<TaskEnvelope>,
}

/// The single-consumer handle. Only the matching worker thread holds this.
pub struct TaskReceiver {
    receiver: crossbeam::channel::Receiver<TaskEnvelope>,
}

/// Build a bounded queue of the given capacity.
pub fn bounded(capacity: usize) -> (TaskQueue, TaskReceiver) {
    let (sender, receiver) = crossbeam::channel::bounded(capacity);
    (TaskQueue { sender }, TaskReceiver { receiver })
}

impl TaskQueue {
    /// Admit a task. Never blocks: a full queue is a rejection, not back-pressure.
    pub fn try_submit(&self, task: MatchTask) -> Result<oneshot::Receiver<TaskOutcome>, QueueFullError> {
        let (respond_to, completion) = oneshot::channel();
        self.sender.try_send(TaskEnvelope { task, respond_to }).map_err(|_| QueueFullError)?;
        Ok(completion)
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl TaskReceiver {
    /// Block until the next task arrives, or return `None` once every
    /// [`TaskQueue`] handle has been dropped.
    pub(crate) fn recv(&self) -> Option<TaskEnvelope> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderId;

    #[test]
    fn full_queue_rejects_instead_of_blocking() {
        let (queue, _receiver) = bounded(1);
        let _first = queue.try_submit(MatchTask::Cancel(OrderId::new())).unwrap();
        let second = queue.try_submit(MatchTask::Cancel(OrderId::new()));
        assert!(second.is_err());
    }

    #[test]
    fn tasks_are_received_in_submission_order() {
        let (queue, receiver) = bounded(4);
        let a = OrderId::new();
        let b = OrderId::new();
        queue.try_submit(MatchTask::Cancel(a)).unwrap();
        queue.try_submit(MatchTask::Cancel(b)).unwrap();

        let first = receiver.recv().unwrap();
        let second = receiver.recv().unwrap();
        assert!(matches!(first.task, MatchTask::Cancel(id) if id == a));
        assert!(matches!(second.task, MatchTask::Cancel(id) if id == b));
    }
}
