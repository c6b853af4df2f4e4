use std::collections::HashMap;

use serde_json::{Map, Value};
use ulid::Ulid;

use crate::{
    admin::IndexSettings,
    operation::{OpKind, WriteOperation},
    routing::IndexRouting,
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub doc_type: String,
    pub source: Value,
    pub version: u64,
}

/// Result of applying one write: the document id and its new version.
pub(super) type ApplyResult = Result<(String, u64), String>;

#[derive(Debug)]
pub(super) struct IndexState {
    pub settings: IndexSettings,
    pub routing: IndexRouting,
    pub documents: HashMap<String, StoredDocument>,
    pub refresh_count: u64,
    pub flush_count: u64,
}

impl IndexState {
    pub fn new(settings: IndexSettings, routing: IndexRouting) -> Self {
        Self {
            settings,
            routing,
            documents: HashMap::new(),
            refresh_count: 0,
            flush_count: 0,
        }
    }

    /// Applies `op`, returning the change in document count with the result.
    pub fn apply(&mut self, op: WriteOperation) -> (i64, ApplyResult) {
        match op.kind {
            OpKind::Index => self.index(op),
            OpKind::Update => self.update(op),
            OpKind::Delete => self.delete(op),
        }
    }

    fn index(&mut self, op: WriteOperation) -> (i64, ApplyResult) {
        let source = match parse_source(&op) {
            Ok(source) => Value::Object(source),
            Err(reason) => return (0, Err(reason)),
        };

        let id = op.id.unwrap_or_else(|| Ulid::new().to_string());
        let (added, version) = match self.documents.get(&id) {
            Some(existing) => (0, existing.version + 1),
            None => (1, 1),
        };

        self.documents.insert(
            id.clone(),
            StoredDocument {
                doc_type: op.doc_type,
                source,
                version,
            },
        );

        (added, Ok((id, version)))
    }

    fn update(&mut self, op: WriteOperation) -> (i64, ApplyResult) {
        let patch = match parse_source(&op) {
            Ok(patch) => patch,
            Err(reason) => return (0, Err(reason)),
        };

        let Some(id) = op.id else {
            return (
                0,
                Err("action_request_validation_exception: id is missing".to_string()),
            );
        };

        match self.documents.get_mut(&id) {
            Some(existing) => {
                if let Value::Object(fields) = &mut existing.source {
                    fields.extend(patch);
                }
                existing.version += 1;
                let version = existing.version;
                (0, Ok((id, version)))
            }
            None if op.upsert => {
                self.documents.insert(
                    id.clone(),
                    StoredDocument {
                        doc_type: op.doc_type,
                        source: Value::Object(patch),
                        version: 1,
                    },
                );
                (1, Ok((id, 1)))
            }
            None => {
                let reason = format!(
                    "document_missing_exception: [{}][{}]: document missing",
                    op.doc_type, id
                );
                (0, Err(reason))
            }
        }
    }

    fn delete(&mut self, op: WriteOperation) -> (i64, ApplyResult) {
        let Some(id) = op.id else {
            return (
                0,
                Err("action_request_validation_exception: id is missing".to_string()),
            );
        };

        // Deleting a missing document is not an error.
        match self.documents.remove(&id) {
            Some(removed) => (-1, Ok((id, removed.version + 1))),
            None => (0, Ok((id, 1))),
        }
    }
}

fn parse_source(op: &WriteOperation) -> Result<Map<String, Value>, String> {
    let Some(payload) = &op.payload else {
        return Err("action_request_validation_exception: source is missing".to_string());
    };

    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err("mapper_parsing_exception: document source must be an object".to_string()),
        Err(err) => Err(format!("mapper_parsing_exception: failed to parse: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_state() -> IndexState {
        IndexState::new(IndexSettings::default(), IndexRouting::new(0, 1))
    }

    #[test]
    fn test_update_merges_fields() {
        let mut state = index_state();
        let (added, result) = state.apply(WriteOperation::index(
            "i",
            "doc",
            Some("1".into()),
            r#"{"a":1,"b":1}"#,
        ));
        assert_eq!(added, 1);
        assert_eq!(result, Ok(("1".to_string(), 1)));

        let (added, result) = state.apply(WriteOperation::update("i", "doc", "1", r#"{"b":2}"#));
        assert_eq!(added, 0);
        assert_eq!(result, Ok(("1".to_string(), 2)));
        assert_eq!(
            state.documents["1"].source,
            serde_json::json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_update_missing_without_upsert_fails() {
        let mut state = index_state();
        let (_, result) = state.apply(WriteOperation::update("i", "doc", "1", "{}"));
        assert!(result.unwrap_err().starts_with("document_missing_exception"));

        let (added, result) = state.apply(WriteOperation::upsert("i", "doc", "1", "{}"));
        assert_eq!(added, 1);
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_object_source_is_rejected() {
        let mut state = index_state();
        let (_, result) = state.apply(WriteOperation::index("i", "doc", None, "[1,2]"));
        assert!(result.unwrap_err().starts_with("mapper_parsing_exception"));
        assert!(state.documents.is_empty());
    }

    #[test]
    fn test_missing_id_is_generated() {
        let mut state = index_state();
        let (added, result) = state.apply(WriteOperation::index("i", "doc", None, "{}"));
        assert_eq!(added, 1);
        let (id, _) = result.expect("indexed");
        assert!(Ulid::from_string(&id).is_ok());
    }

    #[test]
    fn test_delete() {
        let mut state = index_state();
        state.apply(WriteOperation::index("i", "doc", Some("1".into()), "{}"));
        let (removed, result) = state.apply(WriteOperation::delete("i", "doc", "1"));
        assert_eq!(removed, -1);
        assert_eq!(result, Ok(("1".to_string(), 2)));

        let (removed, result) = state.apply(WriteOperation::delete("i", "doc", "1"));
        assert_eq!(removed, 0);
        assert!(result.is_ok());
    }
}
