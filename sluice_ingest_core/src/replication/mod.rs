//! Shard-level replication requests.
//!
//! A sealed batch is split into one request per target shard. Every request
//! has one slot per batch item so that positions line up with the batch:
//!
//! ```text
//!  batch:     [ op0  op1  op2  op3 ]
//!  shard 0:   [ op0  -    op2  -   ]
//!  shard 1:   [ -    op1  -    op3 ]
//! ```
//!
//! Responses report results by position, which lets the client map every
//! item result back to the submitted operation.
use std::{collections::BTreeMap, fmt};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    batch::{ItemFailure, SealedBatch},
    operation::WriteOperation,
    routing::ShardRouter,
};

mod codec;

pub use codec::{CodecError, decode_request, encode_request};

/// Cluster-wide shard identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ShardId(pub u32);

/// The writes of one batch that target the same shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReplicationRequest {
    pub shard_id: ShardId,
    pub items: Vec<Option<WriteOperation>>,
}

/// A request ready to be handed to the transport.
#[derive(Debug, Clone)]
pub struct EncodedShardRequest {
    pub shard_id: ShardId,
    /// Number of present slots.
    pub num_items: usize,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReplicationResponse {
    pub shard_id: ShardId,
    pub items: Vec<ItemResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub position: usize,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Ok { id: String, version: u64 },
    Failed { reason: String },
}

/// The shard requests of a batch, plus the items that could not be routed.
#[derive(Debug, Default)]
pub struct PartitionedBatch {
    pub requests: Vec<ShardReplicationRequest>,
    pub unroutable: Vec<ItemFailure>,
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ShardReplicationRequest {
    /// Positions of the present slots.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| item.as_ref().map(|_| position))
    }

    pub fn num_items(&self) -> usize {
        self.items.iter().filter(|item| item.is_some()).count()
    }

    pub fn encode(&self) -> Result<EncodedShardRequest, CodecError> {
        let payload = encode_request(self)?;
        Ok(EncodedShardRequest {
            shard_id: self.shard_id,
            num_items: self.num_items(),
            payload,
        })
    }

    pub fn try_decode(payload: Bytes) -> Result<Self, CodecError> {
        decode_request(payload)
    }
}

impl ItemResult {
    pub fn ok(position: usize, id: impl Into<String>, version: u64) -> Self {
        Self {
            position,
            status: ItemStatus::Ok {
                id: id.into(),
                version,
            },
        }
    }

    pub fn failed(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            status: ItemStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ItemStatus::Ok { .. })
    }
}

/// Splits a batch into per-shard requests, in shard order.
///
/// Items whose index cannot be routed are reported in
/// [`PartitionedBatch::unroutable`] and appear in no request.
pub fn partition<R>(batch: &SealedBatch, router: &R) -> PartitionedBatch
where
    R: ShardRouter + ?Sized,
{
    let mut by_shard = BTreeMap::<ShardId, Vec<Option<WriteOperation>>>::new();
    let mut unroutable = Vec::new();

    for (position, op) in batch.operations.iter().enumerate() {
        match router.route(&op.index, op.id.as_deref()) {
            Ok(shard_id) => {
                let slots = by_shard
                    .entry(shard_id)
                    .or_insert_with(|| vec![None; batch.len()]);
                slots[position] = Some(op.clone());
            }
            Err(err) => unroutable.push(batch.item_failure(position, err.to_string())),
        }
    }

    let requests = by_shard
        .into_iter()
        .map(|(shard_id, items)| ShardReplicationRequest { shard_id, items })
        .collect();

    PartitionedBatch {
        requests,
        unroutable,
    }
}
