use bytes::Bytes;

/// Fixed per-operation cost added to the payload size when sizing batches.
pub const REQUEST_OVERHEAD: u64 = 50;

/// The kind of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Insert or replace a document.
    Index,
    /// Partially update a document, optionally inserting it when missing.
    Update,
    /// Remove a document.
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Index => "index",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }

    /// Whether operations of this kind carry a document payload.
    pub fn requires_payload(&self) -> bool {
        matches!(self, OpKind::Index | OpKind::Update)
    }
}

/// A single write against an index.
///
/// A missing `id` asks the cluster to assign one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOperation {
    pub kind: OpKind,
    pub index: String,
    pub doc_type: String,
    pub id: Option<String>,
    pub payload: Option<Bytes>,
    pub upsert: bool,
}

impl WriteOperation {
    pub fn index(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: Option<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind: OpKind::Index,
            index: index.into(),
            doc_type: doc_type.into(),
            id,
            payload: Some(payload.into()),
            upsert: false,
        }
    }

    /// An update that inserts the payload as a new document if `id` does not exist.
    pub fn upsert(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind: OpKind::Update,
            index: index.into(),
            doc_type: doc_type.into(),
            id: Some(id.into()),
            payload: Some(payload.into()),
            upsert: true,
        }
    }

    pub fn update(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            upsert: false,
            ..Self::upsert(index, doc_type, id, payload)
        }
    }

    pub fn delete(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            kind: OpKind::Delete,
            index: index.into(),
            doc_type: doc_type.into(),
            id: Some(id.into()),
            payload: None,
            upsert: false,
        }
    }

    /// Size used to decide when a batch is full.
    pub fn estimated_size(&self) -> u64 {
        let payload = self.payload.as_ref().map(|p| p.len() as u64).unwrap_or(0);
        payload + REQUEST_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_size() {
        let op = WriteOperation::index("test", "doc", None, r#"{"a":1}"#);
        assert_eq!(op.estimated_size(), 7 + REQUEST_OVERHEAD);

        let op = WriteOperation::delete("test", "doc", "1");
        assert_eq!(op.estimated_size(), REQUEST_OVERHEAD);
    }

    #[test]
    fn test_update_is_not_upsert() {
        let op = WriteOperation::update("test", "doc", "1", "{}");
        assert_eq!(op.kind, OpKind::Update);
        assert!(!op.upsert);
        assert!(WriteOperation::upsert("test", "doc", "1", "{}").upsert);
    }
}
