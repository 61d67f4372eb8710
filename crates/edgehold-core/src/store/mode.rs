use serde::Serialize;

/// Write semantics of the local store.
///
/// `Connected`: the central API is authoritative. Client writes are persisted but only the
/// syncer touches the in-memory indexes. `Disconnected`: the store is the system of record
/// and client writes land in both layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    Connected,
    Disconnected,
}

impl StoreMode {
    pub fn indexes_client_writes(self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}
