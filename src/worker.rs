//! The matching worker: a single named OS thread that owns [`Core`]
//! exclusively and drains the sequencer's task queue in admission order.
//! No other thread ever touches the book, the breaker, or market status.

use crate::committer::{ClearingDispatcher, TransactionalSink};
use crate::matching::Core;
use crate::sequencer::{MatchTask, TaskOutcome, TaskReceiver};
use crate::snapshot::take_snapshot;
use crate::types::MarketStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared with the outside world purely for observability — `Acquire`d
/// before work, `Release`d whenever the worker halts itself. The book
/// itself is never touched outside the worker thread.
pub struct WorkerHandle {
    pub(crate) halted: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the matching worker thread. `core` should already reflect any
/// startup recovery; the thread runs until every [`crate::sequencer::TaskQueue`]
/// handle has been dropped and the receiver drains empty.
pub fn spawn(
    mut core: Core,
    receiver: TaskReceiver,
    sink: Arc<dyn TransactionalSink>,
    dispatcher: Arc<dyn ClearingDispatcher>,
) -> WorkerHandle {
    let halted = Arc::new(AtomicBool::new(false));
    let thread_halted = halted.clone();
    let symbol = core.book.symbol.clone();

    let join = std::thread::Builder::new()
        .name(format!("clob-matching-{symbol}"))
        .spawn(move || run(&mut core, &receiver, sink.as_ref(), dispatcher.as_ref(), &thread_halted))
        .expect("failed to spawn matching worker thread");

    WorkerHandle {
        halted,
        join: Some(join),
    }
}

fn run(core: &mut Core, receiver: &TaskReceiver, sink: &dyn TransactionalSink, dispatcher: &dyn ClearingDispatcher, halted: &AtomicBool) {
    while let Some(envelope) = receiver.recv() {
        let outcome = handle(core, envelope.task, sink, dispatcher, halted);
        let _ = envelope.respond_to.send(outcome);
    }
    tracing::info!(symbol = %core.book.symbol, "matching worker stopped: all queue handles dropped");
}

fn handle(
    core: &mut Core,
    task: MatchTask,
    sink: &dyn TransactionalSink,
    dispatcher: &dyn ClearingDispatcher,
    halted: &AtomicBool,
) -> TaskOutcome {
    match task {
        MatchTask::Submit(order) => {
            let (result, tripped) = core.submit(order);
            commit_and_dispatch(core, &result.trades, sink, dispatcher, halted);
            #[cfg(feature = "metrics")]
            crate::metrics::record_order_submitted(result.status.as_str());
            if tripped {
                halt(core, halted);
            }
            TaskOutcome::Submitted(result)
        }
        MatchTask::Cancel(order_id) => TaskOutcome::Cancelled(core.cancel(order_id)),
        MatchTask::RunAuction => {
            let result = core.run_auction();
            commit_and_dispatch(core, &result.trades, sink, dispatcher, halted);
            TaskOutcome::Auctioned(result)
        }
        MatchTask::Halt => {
            halt(core, halted);
            TaskOutcome::Ack
        }
        MatchTask::Resume => {
            core.breaker.reset();
            core.status = MarketStatus::Trading;
            halted.store(false, Ordering::Release);
            TaskOutcome::Ack
        }
        MatchTask::SetStatus(status) => {
            core.status = status;
            TaskOutcome::Ack
        }
        MatchTask::SetBasePrice(price) => {
            core.breaker.set_reference_price(price);
            core.book.last_trade_price = Some(price);
            TaskOutcome::Ack
        }
        MatchTask::Snapshot { depth } => TaskOutcome::Snapshot(take_snapshot(&core.book, depth)),
    }
}

fn commit_and_dispatch(
    core: &mut Core,
    trades: &[crate::trade::Trade],
    sink: &dyn TransactionalSink,
    dispatcher: &dyn ClearingDispatcher,
    halted: &AtomicBool,
) {
    if trades.is_empty() {
        return;
    }
    match sink.commit(trades) {
        Ok(()) => {
            #[cfg(feature = "metrics")]
            crate::metrics::record_trades_committed(trades.len());
            for trade in trades {
                dispatcher.dispatch(trade);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "post-match commit failed, halting engine");
            #[cfg(feature = "metrics")]
            crate::metrics::record_commit_failure();
            halt(core, halted);
        }
    }
}

fn halt(core: &mut Core, halted: &AtomicBool) {
    core.status = MarketStatus::Halted;
    halted.store(true, Ordering::Release);
    #[cfg(feature = "metrics")]
    crate::metrics::record_halt();
}

