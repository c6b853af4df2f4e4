//! Binary encoding of shard replication requests.
//!
//! ```text
//! request   := shard_id:varint count:varint slot*
//! slot      := 0x00                               absent
//!            | 0x01 operation                     present
//! operation := kind:u8 index:str doc_type:str id:opt_str payload:opt_bytes upsert:bool
//! str       := len:varint utf8*
//! opt_str   := 0x00 | 0x01 str
//! opt_bytes := 0x00 | 0x01 len:varint byte*
//! ```
//!
//! Kind tags are 0 for index, 1 for update and 2 for delete.
use std::string::FromUtf8Error;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::{
    DecodeError,
    encoding::{decode_varint, encode_varint},
};
use snafu::{ResultExt, Snafu};

use crate::operation::{OpKind, WriteOperation};

use super::{ShardId, ShardReplicationRequest};

const KIND_INDEX: u8 = 0;
const KIND_UPDATE: u8 = 1;
const KIND_DELETE: u8 = 2;

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    #[snafu(display("unexpected end of input reading {field}"))]
    UnexpectedEof { field: &'static str },
    #[snafu(display("invalid varint reading {field}"))]
    Varint {
        field: &'static str,
        source: DecodeError,
    },
    #[snafu(display("shard id {value} out of range"))]
    ShardIdOverflow { value: u64 },
    #[snafu(display("unknown operation kind tag {tag}"))]
    UnknownOperationKind { tag: u8 },
    #[snafu(display("invalid boolean {value} reading {field}"))]
    InvalidBoolean { field: &'static str, value: u8 },
    #[snafu(display("invalid utf-8 in {field}"))]
    InvalidUtf8 {
        field: &'static str,
        source: FromUtf8Error,
    },
    #[snafu(display("{kind} operation at position {position} has no payload"))]
    MissingPayload { kind: &'static str, position: usize },
    #[snafu(display("operation at position {position} has an empty index name"))]
    EmptyIndex { position: usize },
    #[snafu(display("{remaining} trailing bytes after request"))]
    TrailingBytes { remaining: usize },
}

pub fn encode_request(request: &ShardReplicationRequest) -> Result<Bytes, CodecError> {
    let capacity = request
        .items
        .iter()
        .map(|item| item.as_ref().map(WriteOperation::estimated_size).unwrap_or(1))
        .sum::<u64>();

    let mut buf = BytesMut::with_capacity(capacity as usize + 16);
    encode_varint(request.shard_id.0 as u64, &mut buf);
    encode_varint(request.items.len() as u64, &mut buf);

    for (position, item) in request.items.iter().enumerate() {
        match item {
            None => buf.put_u8(0),
            Some(op) => {
                buf.put_u8(1);
                encode_operation(position, op, &mut buf)?;
            }
        }
    }

    Ok(buf.freeze())
}

pub fn decode_request(mut buf: Bytes) -> Result<ShardReplicationRequest, CodecError> {
    let shard_id = get_varint(&mut buf, "shard id")?;
    let shard_id =
        u32::try_from(shard_id).map_err(|_| CodecError::ShardIdOverflow { value: shard_id })?;

    let count = get_varint(&mut buf, "item count")?;
    // Every slot takes at least one byte.
    if count > buf.remaining() as u64 {
        return UnexpectedEofSnafu { field: "slots" }.fail();
    }

    let mut items = Vec::with_capacity(count as usize);
    for position in 0..count as usize {
        if get_bool(&mut buf, "slot presence")? {
            items.push(Some(decode_operation(position, &mut buf)?));
        } else {
            items.push(None);
        }
    }

    if buf.has_remaining() {
        return TrailingBytesSnafu {
            remaining: buf.remaining(),
        }
        .fail();
    }

    Ok(ShardReplicationRequest {
        shard_id: ShardId(shard_id),
        items,
    })
}

fn encode_operation(
    position: usize,
    op: &WriteOperation,
    buf: &mut BytesMut,
) -> Result<(), CodecError> {
    if op.index.is_empty() {
        return EmptyIndexSnafu { position }.fail();
    }

    if op.kind.requires_payload() && op.payload.is_none() {
        return MissingPayloadSnafu {
            kind: op.kind.as_str(),
            position,
        }
        .fail();
    }

    let tag = match op.kind {
        OpKind::Index => KIND_INDEX,
        OpKind::Update => KIND_UPDATE,
        OpKind::Delete => KIND_DELETE,
    };

    buf.put_u8(tag);
    put_bytes(buf, op.index.as_bytes());
    put_bytes(buf, op.doc_type.as_bytes());

    match &op.id {
        None => buf.put_u8(0),
        Some(id) => {
            buf.put_u8(1);
            put_bytes(buf, id.as_bytes());
        }
    }

    match &op.payload {
        None => buf.put_u8(0),
        Some(payload) => {
            buf.put_u8(1);
            put_bytes(buf, payload);
        }
    }

    buf.put_u8(op.upsert as u8);

    Ok(())
}

fn decode_operation(position: usize, buf: &mut Bytes) -> Result<WriteOperation, CodecError> {
    let kind = match get_u8(buf, "operation kind")? {
        KIND_INDEX => OpKind::Index,
        KIND_UPDATE => OpKind::Update,
        KIND_DELETE => OpKind::Delete,
        tag => return UnknownOperationKindSnafu { tag }.fail(),
    };

    let index = get_string(buf, "index")?;
    if index.is_empty() {
        return EmptyIndexSnafu { position }.fail();
    }

    let doc_type = get_string(buf, "doc type")?;

    let id = if get_bool(buf, "id presence")? {
        Some(get_string(buf, "id")?)
    } else {
        None
    };

    let payload = if get_bool(buf, "payload presence")? {
        Some(get_bytes(buf, "payload")?)
    } else {
        None
    };

    if kind.requires_payload() && payload.is_none() {
        return MissingPayloadSnafu {
            kind: kind.as_str(),
            position,
        }
        .fail();
    }

    let upsert = get_bool(buf, "upsert")?;

    Ok(WriteOperation {
        kind,
        index,
        doc_type,
        id,
        payload,
        upsert,
    })
}

fn put_bytes(buf: &mut BytesMut, value: &[u8]) {
    encode_varint(value.len() as u64, buf);
    buf.put_slice(value);
}

fn get_varint(buf: &mut Bytes, field: &'static str) -> Result<u64, CodecError> {
    decode_varint(buf).context(VarintSnafu { field })
}

fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, CodecError> {
    if !buf.has_remaining() {
        return UnexpectedEofSnafu { field }.fail();
    }
    Ok(buf.get_u8())
}

fn get_bool(buf: &mut Bytes, field: &'static str) -> Result<bool, CodecError> {
    match get_u8(buf, field)? {
        0 => Ok(false),
        1 => Ok(true),
        value => InvalidBooleanSnafu { field, value }.fail(),
    }
}

fn get_bytes(buf: &mut Bytes, field: &'static str) -> Result<Bytes, CodecError> {
    let len = get_varint(buf, field)?;
    if len > buf.remaining() as u64 {
        return UnexpectedEofSnafu { field }.fail();
    }
    Ok(buf.copy_to_bytes(len as usize))
}

fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String, CodecError> {
    let bytes = get_bytes(buf, field)?;
    String::from_utf8(bytes.to_vec()).context(InvalidUtf8Snafu { field })
}
