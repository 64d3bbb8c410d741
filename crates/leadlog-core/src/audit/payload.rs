//! Typed views over the raw JSON stored in `audit_entries`.
//!
//! Payload text is kept verbatim in the database and only parsed on read, so
//! a malformed row written by some other tool never blocks the rest of a
//! lead's history. Unknown fields are preserved via `#[serde(flatten)]`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::{CommentId, LeadState, LossReasonId};

/// Label used when neither an embedded name nor the catalog can name a state.
pub const UNKNOWN_STATE: &str = "Unknown";

// ---------------------------------------------------------------------------
// AuditPayload
// ---------------------------------------------------------------------------

/// Parsed "before" or "after" payload of an audit entry.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditPayload {
    /// Any object carrying a `state_id` key.
    StateChange(StateChangePayload),
    /// Field-level change to something other than the lead state.
    Other(Map<String, Value>),
}

impl AuditPayload {
    /// Parse stored payload text.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the text is not JSON or is not an object.
    /// Mistyped optional state-change fields read as absent.
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(raw).map_err(PayloadError::Malformed)?;
        let Value::Object(map) = value else {
            return Err(PayloadError::NotAnObject);
        };

        if map.contains_key("state_id") {
            serde_json::from_value::<StateChangePayload>(Value::Object(map))
                .map(Self::StateChange)
                .map_err(PayloadError::Shape)
        } else {
            Ok(Self::Other(map))
        }
    }

    /// Serialize back to payload text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::StateChange(change) => serde_json::to_string(change),
            Self::Other(map) => serde_json::to_string(map),
        }
    }

    #[must_use]
    pub const fn as_state_change(&self) -> Option<&StateChangePayload> {
        match self {
            Self::StateChange(change) => Some(change),
            Self::Other(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// StateChangePayload
// ---------------------------------------------------------------------------

/// Payload describing a lead state, either the one left ("before") or the
/// one entered ("after").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChangePayload {
    /// Numeric state id. Older writers sometimes stored it as a string;
    /// anything that is not an integer reads as `None`.
    #[serde(default, deserialize_with = "lenient_state_id")]
    pub state_id: Option<i64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub automatic: Option<bool>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub loss_reason_id: Option<LossReasonId>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub loss_reason: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<CommentId>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StateChangePayload {
    /// Minimal payload naming `state`.
    #[must_use]
    pub fn for_state(state: LeadState) -> Self {
        Self {
            state_id: Some(state.id()),
            state_name: Some(state.name().to_string()),
            ..Self::default()
        }
    }

    /// Catalog state for the embedded id, if it is one we know.
    #[must_use]
    pub fn state(&self) -> Option<LeadState> {
        self.state_id.and_then(LeadState::from_id)
    }

    /// Stable key for "is this the same state": the id when present,
    /// otherwise the embedded name normalized through the catalog.
    #[must_use]
    pub fn state_key(&self) -> Option<StateKey> {
        if let Some(id) = self.state_id {
            return Some(StateKey::Id(id));
        }
        let name = self.state_name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        Some(
            name.parse::<LeadState>()
                .map_or_else(|_| StateKey::Name(name.to_string()), |s| StateKey::Id(s.id())),
        )
    }

    /// Display name: embedded name, then catalog, then [`UNKNOWN_STATE`].
    #[must_use]
    pub fn state_label(&self) -> String {
        if let Some(name) = self.state_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        self.state()
            .map_or_else(|| UNKNOWN_STATE.to_string(), |s| s.name().to_string())
    }
}

/// Identity of a state as recorded in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    Id(i64),
    Name(String),
}

impl From<LeadState> for StateKey {
    fn from(state: LeadState) -> Self {
        Self::Id(state.id())
    }
}

fn lenient_state_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// Optional field that reads as `None` when it holds the wrong JSON type, so
/// one bad field never hides the state id next to it.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// ---------------------------------------------------------------------------
// PayloadError
// ---------------------------------------------------------------------------

/// Why stored payload text could not be read.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("state-change payload has unexpected field types: {0}")]
    Shape(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_state_change_and_keeps_unknown_fields() {
        let raw = r#"{"state_id":9,"state_name":"Lost","reason":"lead rejection","automatic":true,"loss_reason_id":1,"channel":"phone"}"#;
        let payload = AuditPayload::parse(raw).expect("parse");
        let change = payload.as_state_change().expect("state change");
        assert_eq!(change.state(), Some(LeadState::Lost));
        assert_eq!(change.loss_reason_id, Some(LossReasonId(1)));
        assert_eq!(change.automatic, Some(true));
        assert_eq!(change.extra.get("channel"), Some(&Value::from("phone")));

        let reparsed = AuditPayload::parse(&payload.to_json().expect("encode")).expect("reparse");
        assert_eq!(reparsed, payload);
    }

    #[test]
    fn string_and_garbage_state_ids_are_lenient() {
        let numeric_string = AuditPayload::parse(r#"{"state_id":" 3 "}"#).expect("parse");
        assert_eq!(
            numeric_string.as_state_change().and_then(StateChangePayload::state),
            Some(LeadState::Contacted)
        );

        let garbage = AuditPayload::parse(r#"{"state_id":"soon","state_name":"Dormant"}"#)
            .expect("parse");
        let change = garbage.as_state_change().expect("still a state change");
        assert_eq!(change.state_id, None);
        assert_eq!(change.state_key(), Some(StateKey::Name("Dormant".to_string())));
        assert_eq!(change.state_label(), "Dormant");
    }

    #[test]
    fn name_only_payloads_normalize_to_catalog_id() {
        let change = StateChangePayload {
            state_name: Some("proposal sent".to_string()),
            ..StateChangePayload::default()
        };
        assert_eq!(change.state_key(), Some(StateKey::from(LeadState::ProposalSent)));
    }

    #[test]
    fn label_falls_back_to_catalog_then_unknown() {
        let by_id = StateChangePayload {
            state_id: Some(10),
            ..StateChangePayload::default()
        };
        assert_eq!(by_id.state_label(), "Won");

        let unknown = StateChangePayload {
            state_id: Some(404),
            ..StateChangePayload::default()
        };
        assert_eq!(unknown.state_label(), UNKNOWN_STATE);
    }

    #[test]
    fn other_payloads_and_errors() {
        let other = AuditPayload::parse(r#"{"name":"Acme Ltd"}"#).expect("parse");
        assert!(matches!(other, AuditPayload::Other(_)));

        assert!(matches!(AuditPayload::parse("{not json"), Err(PayloadError::Malformed(_))));
        assert!(matches!(AuditPayload::parse("[1,2]"), Err(PayloadError::NotAnObject)));
    }

    #[test]
    fn mistyped_optional_fields_keep_the_state_id() {
        let payload =
            AuditPayload::parse(r#"{"state_id":3,"state_name":42,"automatic":"yes","actor":["ana"],"reason":"call"}"#)
                .expect("parse");
        let change = payload.as_state_change().expect("state change");
        assert_eq!(change.state(), Some(LeadState::Contacted));
        assert_eq!(change.state_name, None);
        assert_eq!(change.automatic, None);
        assert_eq!(change.actor, None);
        assert_eq!(change.reason.as_deref(), Some("call"));
        assert_eq!(change.state_label(), "Contacted");
    }
}
