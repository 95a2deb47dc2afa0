//! Task and outcome types carried through the sequencer's queue.

use crate::order::Order;
use crate::snapshot::OrderBookSnapshot;
use crate::trade::{AuctionResult, CancelResult, MatchResult};
use crate::types::{MarketStatus, OrderId, Price};

/// A unit of work submitted for total-ordered execution by the matching
/// worker. Every operation that touches the book — including admin
/// commands and snapshotting — goes through this queue, since the book has
/// exactly one writer.
#[derive(Debug, Clone)]
pub enum MatchTask {
    Submit(Order),
    Cancel(OrderId),
    RunAuction,
    Halt,
    Resume,
    SetStatus(MarketStatus),
    SetBasePrice(Price),
    Snapshot { depth: usize },
}

/// The outcome of executing a [`MatchTask`], delivered back over the
/// task's one-shot completion channel.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Submitted(MatchResult),
    Cancelled(CancelResult),
    Auctioned(AuctionResult),
    Snapshot(OrderBookSnapshot),
    Ack,
}

/// A task plus the one-shot sender the worker replies on.
pub(crate) struct TaskEnvelope {
    pub task: MatchTask,
    pub respond_to: tokio::sync::oneshot::Sender<TaskOutcome>,
}
