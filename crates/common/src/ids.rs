use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespaces for streams whose identity is derived from another key.
///
/// A cart is addressed by its owner and an inventory item by its SKU, so their
/// stream IDs are name-based UUIDs rather than random ones. Two processes
/// deriving the ID for the same key always land on the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamNamespace {
    /// One cart stream per owner.
    Cart,
    /// One ledger stream per inventory item.
    InventoryItem,
}

impl StreamNamespace {
    fn uuid(self) -> Uuid {
        match self {
            StreamNamespace::Cart => Uuid::from_u128(0x6c1f_2d3a_9b4e_4f0a_8e2d_51c7_0a3b_c001),
            StreamNamespace::InventoryItem => {
                Uuid::from_u128(0x6c1f_2d3a_9b4e_4f0a_8e2d_51c7_0a3b_c002)
            }
        }
    }
}

/// Unique identifier for an event stream (aggregate instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derives a stable aggregate ID for `name` within `namespace`.
    pub fn derived(namespace: StreamNamespace, name: &[u8]) -> Self {
        Self(Uuid::new_v5(&namespace.uuid(), name))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Identity of a shopper, as resolved by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// The stream holding this customer's cart.
    pub fn cart_stream(&self) -> AggregateId {
        AggregateId::derived(StreamNamespace::Cart, self.0.as_bytes())
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CustomerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for CustomerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
