//! Post-match commit (C5): every trade produced by a match must be durably
//! recorded before the worker reports success, and a commit failure halts
//! the engine rather than silently dropping the trade. Clearing dispatch
//! happens only after a successful commit, and is best-effort from the
//! engine's point of view — its failure does not roll anything back.

use crate::trade::Trade;
use crate::types::{OrderId, Price, Quantity, TradeId, UserId};
use serde::{Deserialize, Serialize};
#[cfg(feature = "nats")]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("trade store rejected the batch: {0}")]
    Store(String),
    #[error("outbox publish failed: {0}")]
    Outbox(String),
}

/// The wire record written to the trade store / outbox for each executed
/// trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecuted {
    pub trade_id: TradeId,
    pub symbol: String,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
    pub price: Price,
    pub quantity: Quantity,
    pub executed_at: u64,
}

impl From<&Trade> for TradeExecuted {
    fn from(t: &Trade) -> Self {
        Self {
            trade_id: t.trade_id,
            symbol: t.symbol.clone(),
            buy_order_id: t.buy_order_id,
            sell_order_id: t.sell_order_id,
            buy_user_id: t.buy_user_id,
            sell_user_id: t.sell_user_id,
            price: t.price,
            quantity: t.quantity,
            executed_at: t.executed_at,
        }
    }
}

/// Serializes a batch of trades for the trade store / outbox wire format.
/// Swappable so a deployment can pick JSON (default, human-debuggable) or
/// bincode (compact) without touching the commit path.
pub trait EventSerializer: Send + Sync {
    fn serialize(&self, trades: &[TradeExecuted]) -> Result<Vec<u8>, CommitError>;
}

#[derive(Debug, Default)]
pub struct JsonEventSerializer;

impl EventSerializer for JsonEventSerializer {
    fn serialize(&self, trades: &[TradeExecuted]) -> Result<Vec<u8>, CommitError> {
        serde_json::to_vec(trades).map_err(|e| CommitError::Store(e.to_string()))
    }
}

#[cfg(feature = "bincode")]
#[derive(Debug, Default)]
pub struct BincodeEventSerializer;

#[cfg(feature = "bincode")]
impl EventSerializer for BincodeEventSerializer {
    fn serialize(&self, trades: &[TradeExecuted]) -> Result<Vec<u8>, CommitError> {
        bincode::serde::encode_to_vec(trades, bincode::config::standard())
            .map_err(|e| CommitError::Store(e.to_string()))
    }
}

/// The transactional sink trades are committed to. A successful `commit`
/// is the durability boundary: everything before it may be treated as if
/// it never happened, everything after it is final.
pub trait TransactionalSink: Send + Sync {
    fn commit(&self, trades: &[Trade]) -> Result<(), CommitError>;
}

/// Dispatches already-committed trades onward for clearing/settlement.
/// Best-effort: failures here are logged, not propagated, since the trade
/// is already durable by the time this runs.
pub trait ClearingDispatcher: Send + Sync {
    fn dispatch(&self, trade: &Trade);
}

/// An in-process sink that just accumulates every committed trade. Used in
/// tests and for embedding the engine where the host process owns its own
/// durability (e.g. it journals the whole command stream upstream).
#[derive(Default)]
pub struct InMemorySink {
    committed: Mutex<Vec<Trade>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> Vec<Trade> {
        self.committed.lock().expect("poisoned").clone()
    }
}

impl TransactionalSink for InMemorySink {
    fn commit(&self, trades: &[Trade]) -> Result<(), CommitError> {
        self.committed.lock().expect("poisoned").extend_from_slice(trades);
        Ok(())
    }
}

/// A dispatcher that does nothing. The default when no clearing integration
/// is configured.
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl ClearingDispatcher for NullDispatcher {
    fn dispatch(&self, _trade: &Trade) {}
}

/// Default maximum number of retry attempts for transient NATS publish
/// failures.
#[cfg(feature = "nats")]
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay in milliseconds for exponential backoff between retries.
#[cfg(feature = "nats")]
const BASE_RETRY_DELAY_MS: u64 = 10;

/// Publishes committed trades to a NATS JetStream subject as the durability
/// boundary itself: `commit` blocks the matching worker (via a Tokio runtime
/// handle) until every trade in the batch is acknowledged by the server, or
/// every retry is exhausted, since an outbox that can silently lose a commit
/// is no outbox at all.
#[cfg(feature = "nats")]
pub struct NatsOutboxSink {
    jetstream: async_nats::jetstream::Context,
    subject: String,
    runtime: tokio::runtime::Handle,
    serializer: Box<dyn EventSerializer>,
    publish_count: AtomicU64,
    error_count: AtomicU64,
    max_retries: u32,
}

#[cfg(feature = "nats")]
impl NatsOutboxSink {
    pub fn new(
        jetstream: async_nats::jetstream::Context,
        subject: impl Into<String>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            jetstream,
            subject: subject.into(),
            runtime,
            serializer: Box::new(JsonEventSerializer),
            publish_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Defaults to [`DEFAULT_MAX_RETRIES`] (3). Set to 0 to disable retries.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn published(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Publish one payload with exponential backoff, awaiting the server's
    /// ack on every attempt. Returns `true` once acked, `false` once every
    /// retry is exhausted.
    async fn publish_with_retry(&self, payload: bytes::Bytes) -> bool {
        let max_attempts = self.max_retries.saturating_add(1);
        for attempt in 0..max_attempts {
            let publish_result = self.jetstream.publish(self.subject.clone(), payload.clone()).await;
            match publish_result {
                Ok(ack_future) => match ack_future.await {
                    Ok(_) => return true,
                    Err(e) => {
                        tracing::warn!(attempt = attempt + 1, max = max_attempts, subject = %self.subject, error = %e, "NATS ack failed, retrying")
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, max = max_attempts, subject = %self.subject, error = %e, "NATS publish failed, retrying")
                }
            }
            if attempt + 1 < max_attempts {
                let delay_ms = BASE_RETRY_DELAY_MS.saturating_mul(1u64 << attempt);
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
        }
        false
    }
}

#[cfg(feature = "nats")]
impl TransactionalSink for NatsOutboxSink {
    fn commit(&self, trades: &[Trade]) -> Result<(), CommitError> {
        let records: Vec<TradeExecuted> = trades.iter().map(TradeExecuted::from).collect();
        let payload = bytes::Bytes::from(self.serializer.serialize(&records)?);

        let acked = self.runtime.block_on(self.publish_with_retry(payload));
        if acked {
            self.publish_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
            tracing::error!(subject = %self.subject, "NATS publish failed after all retries");
            Err(CommitError::Outbox(format!("publish to {} failed after {} attempts", self.subject, self.max_retries + 1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn trade() -> Trade {
        Trade {
            trade_id: TradeId(1),
            symbol: "BTC/USD".into(),
            buy_order_id: OrderId::new(),
            sell_order_id: OrderId::new(),
            buy_user_id: UserId(Uuid::new_v4()),
            sell_user_id: UserId(Uuid::new_v4()),
            price: Price::new(Decimal::from(100)),
            quantity: Quantity::new(Decimal::from(1)),
            executed_at: 0,
        }
    }

    #[test]
    fn in_memory_sink_accumulates_commits() {
        let sink = InMemorySink::new();
        sink.commit(&[trade()]).unwrap();
        sink.commit(&[trade()]).unwrap();
        assert_eq!(sink.committed().len(), 2);
    }

    #[test]
    fn json_serializer_round_trips_shape() {
        let record = TradeExecuted::from(&trade());
        let bytes = JsonEventSerializer.serialize(&[record.clone()]).unwrap();
        let decoded: Vec<TradeExecuted> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, vec![record]);
    }
}
