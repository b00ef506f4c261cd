//! User record and adapter result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One logical user-data record per signed-in identity
///
/// In cloud mode the locally stored copy is both the cache entry and the
/// pending-write buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Identity id, absent until the record is bound to an identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Email address
    pub email: String,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Tracked children
    #[serde(default)]
    pub children: Vec<ChildProfile>,
    /// Free-form application preferences
    #[serde(default)]
    pub preferences: Map<String, Value>,
    /// Stamped on every local save (RFC 3339, UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_timestamp: Option<String>,
}

impl UserRecord {
    /// Create a record for an identity
    pub fn new(
        id: Option<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// The same record with its sync timestamp removed
    ///
    /// Useful to compare two records irrespective of when they were saved.
    pub fn without_timestamp(&self) -> Self {
        Self {
            last_sync_timestamp: None,
            ..self.clone()
        }
    }
}

/// A tracked child
///
/// Fields this crate does not interpret are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProfile {
    /// Child id
    pub id: String,
    /// First name
    pub first_name: String,
    /// Birth date (ISO 8601 date)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    /// Everything else
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a returned record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// On-device storage in local mode
    Local,
    /// The server of record
    Server,
    /// The on-device cache in cloud mode
    Cache,
}

/// Result of a save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// The record as persisted (with its fresh timestamp)
    pub record: UserRecord,
    /// Where the authoritative copy now lives
    pub source: DataSource,
    /// The local copy is ahead of the server
    pub needs_sync: bool,
}

/// Result of a load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    /// The record, if any exists
    pub record: Option<UserRecord>,
    /// Where the record was read from
    pub source: DataSource,
    /// The local copy may be ahead of the server
    pub needs_sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_wire_format() {
        let mut record = UserRecord::new(Some("u1".into()), "a@b.co", "Alice", "Smith");
        record.last_sync_timestamp = Some("2024-05-01T10:00:00.000Z".into());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["lastSyncTimestamp"], "2024-05-01T10:00:00.000Z");
        assert!(json.get("first_name").is_none());
    }

    #[test]
    fn test_child_extra_fields_preserved() {
        let raw = r#"{"id":"c1","firstName":"Leo","birthDate":"2021-03-04","milestones":[1,2]}"#;
        let child: ChildProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(child.birth_date.as_deref(), Some("2021-03-04"));
        assert_eq!(child.extra["milestones"], serde_json::json!([1, 2]));

        let back = serde_json::to_value(&child).unwrap();
        assert_eq!(back["milestones"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_minimal_record_parses() {
        let record: UserRecord = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert!(record.children.is_empty());
        assert!(record.id.is_none());
    }
}
