use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::replication::ShardId;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum RoutingError {
    #[snafu(display("index_not_found_exception: no such index [{index}]"))]
    IndexNotFound { index: String },
}

/// Maps a document to the shard that owns it.
///
/// Routing must be deterministic: the same `(index, id)` always maps to the
/// same shard while the index exists.
pub trait ShardRouter: Send + Sync {
    fn route(&self, index: &str, id: Option<&str>) -> Result<ShardId, RoutingError>;
}

/// Shard layout of one index.
///
/// Shard ids are cluster-wide: the index owns shards
/// `first_shard..first_shard + number_of_shards`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRouting {
    pub first_shard: u32,
    pub number_of_shards: u32,
}

impl IndexRouting {
    pub fn new(first_shard: u32, number_of_shards: u32) -> Self {
        Self {
            first_shard,
            number_of_shards,
        }
    }

    /// Documents without an id go to the first shard of the index.
    pub fn shard_for(&self, id: Option<&str>) -> ShardId {
        let offset = match id {
            Some(id) if self.number_of_shards > 1 => fnv1a(id.as_bytes()) % self.number_of_shards,
            _ => 0,
        };
        ShardId(self.first_shard + offset)
    }

    pub fn contains(&self, shard_id: ShardId) -> bool {
        shard_id.0 >= self.first_shard && shard_id.0 < self.first_shard + self.number_of_shards
    }
}

/// Concurrent index name to routing map.
#[derive(Debug, Default)]
pub struct RoutingTable {
    indices: DashMap<String, IndexRouting>,
}

impl RoutingTable {
    pub fn insert(&self, index: impl Into<String>, routing: IndexRouting) {
        self.indices.insert(index.into(), routing);
    }

    pub fn remove(&self, index: &str) -> Option<IndexRouting> {
        self.indices.remove(index).map(|(_, routing)| routing)
    }

    pub fn get(&self, index: &str) -> Option<IndexRouting> {
        self.indices.get(index).map(|entry| *entry.value())
    }

    /// Replaces the whole table.
    pub fn replace(&self, snapshot: HashMap<String, IndexRouting>) {
        self.indices.retain(|index, _| snapshot.contains_key(index));
        for (index, routing) in snapshot {
            self.indices.insert(index, routing);
        }
    }

    pub fn snapshot(&self) -> HashMap<String, IndexRouting> {
        self.indices
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl ShardRouter for RoutingTable {
    fn route(&self, index: &str, id: Option<&str>) -> Result<ShardId, RoutingError> {
        self.get(index)
            .map(|routing| routing.shard_for(id))
            .ok_or_else(|| RoutingError::IndexNotFound {
                index: index.to_string(),
            })
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_route_is_deterministic_and_in_range() {
        let routing = IndexRouting::new(10, 4);
        for i in 0..100 {
            let id = format!("doc-{i}");
            let shard = routing.shard_for(Some(&id));
            assert!(routing.contains(shard));
            assert_eq!(shard, routing.shard_for(Some(&id)));
        }
        assert_eq!(routing.shard_for(None), ShardId(10));
    }

    #[test]
    fn test_replace_drops_missing_indices() {
        let table = RoutingTable::default();
        table.insert("old", IndexRouting::new(0, 1));

        let mut snapshot = HashMap::new();
        snapshot.insert("new".to_string(), IndexRouting::new(1, 2));
        table.replace(snapshot);

        assert!(table.route("old", None).is_err());
        assert_eq!(table.route("new", None).expect("route"), ShardId(1));
    }
}
