//! Engine configuration. The engine is embedded in a larger service binary,
//! so this struct is deserialized by whatever embeds it — `config.rs` itself
//! only defines the shape and defaults, with no file/env loading of its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub symbol: String,
    /// Bounded task queue capacity. Should be a power of two.
    pub queue_capacity: usize,
    pub price_cage_pct: Decimal,
    pub breaker_threshold_pct: Decimal,
    #[serde(with = "duration_secs")]
    pub breaker_cooldown: Duration,
    pub snapshot_default_depth: usize,
    pub iceberg_refresh_fraction: Decimal,
}

impl EngineConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default_unsymboled()
        }
    }

    fn default_unsymboled() -> Self {
        Self {
            symbol: String::new(),
            queue_capacity: 1_048_576,
            price_cage_pct: Decimal::new(2, 2),
            breaker_threshold_pct: Decimal::new(10, 2),
            breaker_cooldown: Duration::from_secs(60),
            snapshot_default_depth: 20,
            iceberg_refresh_fraction: Decimal::new(10, 2),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::new("BTC/USD");
        assert_eq!(cfg.queue_capacity, 1_048_576);
        assert_eq!(cfg.price_cage_pct, Decimal::new(2, 2));
        assert_eq!(cfg.breaker_threshold_pct, Decimal::new(10, 2));
        assert_eq!(cfg.breaker_cooldown, Duration::from_secs(60));
        assert_eq!(cfg.snapshot_default_depth, 20);
        assert_eq!(cfg.iceberg_refresh_fraction, Decimal::new(10, 2));
    }
}
