use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, Version};

/// Serialized aggregate state at a given stream version.
///
/// Inventory streams collect one reservation and possibly one release per
/// order, so they grow without bound; loading starts from the latest snapshot
/// and replays only the tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Version of the last event folded into `state`.
    pub version: Version,

    pub timestamp: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Captures `state` as of `version`.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the captured state.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ledger {
        available: u32,
        unit_price_cents: i64,
    }

    #[test]
    fn state_survives_capture_and_restore() {
        let id = AggregateId::new();
        let original = Ledger {
            available: 7,
            unit_price_cents: 1299,
        };

        let snapshot = Snapshot::from_state(id, "InventoryItem", Version::new(50), &original).unwrap();
        assert_eq!(snapshot.aggregate_id, id);
        assert_eq!(snapshot.version, Version::new(50));

        let restored: Ledger = snapshot.into_state().unwrap();
        assert_eq!(restored, original);
    }
}
