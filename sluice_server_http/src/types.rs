//! Request and response bodies of the cluster HTTP API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sluice_ingest_core::{IndexRouting, RefreshInterval};

/// Response payload for errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub message: String,
}

/// Response payload for admin operations without a result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcknowledgedResponse {
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountResponse {
    pub count: u64,
}

/// Shard layout of every index, used by clients to route documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoutingResponse {
    pub indices: HashMap<String, IndexRouting>,
}

/// Partial update of the dynamic index settings.
///
/// Fields left out are not changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateSettingsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<RefreshInterval>,
}

impl AcknowledgedResponse {
    pub fn acknowledged() -> Self {
        Self { acknowledged: true }
    }
}

impl UpdateSettingsRequest {
    pub fn replicas(number_of_replicas: u32) -> Self {
        Self {
            number_of_replicas: Some(number_of_replicas),
            ..Default::default()
        }
    }

    pub fn refresh_interval(refresh_interval: RefreshInterval) -> Self {
        Self {
            refresh_interval: Some(refresh_interval),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_replicas.is_none() && self.refresh_interval.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_settings_skips_unset_fields() {
        let body = serde_json::to_string(&UpdateSettingsRequest::replicas(2)).expect("serialize");
        assert_eq!(body, r#"{"number_of_replicas":2}"#);

        let parsed: UpdateSettingsRequest = serde_json::from_str("{}").expect("parse");
        assert!(parsed.is_empty());
    }
}
