//! Metadata records for time series and UIDs
//!
//! Both record types are partially server-managed: `created`,
//! `lastReceived` and `totalDatapoints` are set by the store, while
//! descriptions, notes, units and custom tags are user-editable. Edits go
//! through a patch struct so that only the fields a caller sets are sent,
//! and the store merges them into the existing record the same way
//! [`TsMeta::merge`] and [`UidMeta::merge`] do locally.

use super::{de, invalid, Entity, Validate};
use crate::client::Client;
use crate::error::{Result, ValidationError};
use crate::transport::Transport;
use crate::validation::{is_hex_id, is_valid_identifier_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn is_zero(v: &i64) -> bool {
    *v == 0
}

// =============================================================================
// UidKind
// =============================================================================

/// What a UID names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UidKind {
    /// A metric name
    #[serde(alias = "metric")]
    Metric,
    /// A tag key
    #[serde(alias = "tagk")]
    Tagk,
    /// A tag value
    #[serde(alias = "tagv")]
    Tagv,
}

impl UidKind {
    /// Lower-case form used in query strings
    pub fn as_param(&self) -> &'static str {
        match self {
            UidKind::Metric => "metric",
            UidKind::Tagk => "tagk",
            UidKind::Tagv => "tagv",
        }
    }
}

impl fmt::Display for UidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

// =============================================================================
// UidMeta
// =============================================================================

/// Metadata for a single metric, tag key or tag value UID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UidMeta {
    /// Hex UID; empty until assigned
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// The name the UID stands for
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Metric, tag key or tag value
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<UidKind>,

    /// Short description
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Name for display in GUIs
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    /// Free-form notes
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub notes: String,

    /// User-defined key/value pairs
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,

    /// Creation time, set by the store
    #[serde(default, skip_serializing_if = "is_zero")]
    pub created: i64,
}

/// User-editable subset of [`UidMeta`]; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UidMetaPatch {
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// New custom map (replaces the old one)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, String>>,
}

impl UidMeta {
    /// Metadata stub for a name whose UID is not known yet
    pub fn named(kind: UidKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Metadata stub for a known UID
    pub fn with_uid(kind: UidKind, uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// UID, or `None` while unassigned
    pub fn uid(&self) -> Option<&str> {
        if self.uid.is_empty() {
            None
        } else {
            Some(&self.uid)
        }
    }

    /// Overwrite the fields present in `patch`
    pub fn merge(&mut self, patch: &UidMetaPatch) {
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(display_name) = &patch.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(custom) = &patch.custom {
            self.custom = custom.clone();
        }
    }

    /// Every user-editable field as a patch
    pub fn patch(&self) -> UidMetaPatch {
        UidMetaPatch {
            description: Some(self.description.clone()),
            display_name: Some(self.display_name.clone()),
            notes: Some(self.notes.clone()),
            custom: Some(self.custom.clone()),
        }
    }

    fn identity(&self) -> std::result::Result<(&str, UidKind), ValidationError> {
        match (self.uid(), self.kind) {
            (Some(uid), Some(kind)) => Ok((uid, kind)),
            _ => Err(invalid(
                Self::KIND,
                "uid and type are required to address UID metadata",
            )),
        }
    }

    /// Replace local state with the store's record
    pub fn load_from<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let (uid, kind) = self.identity()?;
        *self = client.get_uidmeta(uid, kind)?;
        Ok(())
    }

    /// Send the editable fields, then take the merged record back
    pub fn save_to<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let (uid, kind) = self.identity()?;
        *self = client.set_uidmeta(uid, kind, &self.patch())?;
        Ok(())
    }

    /// Remove the record from the store
    pub fn delete<T: Transport>(&self, client: &Client<T>) -> Result<()> {
        let (uid, kind) = self.identity()?;
        client.delete_uidmeta(uid, kind)
    }
}

impl Validate for UidMeta {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if !self.uid.is_empty() && !is_hex_id(&self.uid) {
            return Err(invalid(Self::KIND, format!("uid '{}' is not hexadecimal", self.uid)));
        }
        if !is_valid_identifier_string(&self.name) {
            return Err(invalid(Self::KIND, format!("name '{}' has invalid characters", self.name)));
        }
        Ok(())
    }
}

impl Entity for UidMeta {
    const KIND: &'static str = "UIDMeta";
}

// =============================================================================
// TsMeta
// =============================================================================

/// Metadata for one time series, addressed by TSUID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsMeta {
    /// Hex TSUID; empty until known
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub tsuid: String,

    /// Metric UID metadata, included in store responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<UidMeta>,

    /// Tag key and tag value UID metadata, alternating key then value
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<UidMeta>,

    /// Short description
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Name for display in GUIs
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    /// Free-form notes
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub notes: String,

    /// User-defined key/value pairs
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,

    /// Units of the values, e.g. "Mbps"
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub units: String,

    /// Kind of data, e.g. "counter" or "gauge"
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "String::is_empty")]
    pub data_type: String,

    /// Days of data to retain; 0 keeps everything
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retention: i64,

    /// Expected lower bound of values
    #[serde(default, deserialize_with = "de::nan_as_none", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Expected upper bound of values
    #[serde(default, deserialize_with = "de::nan_as_none", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Creation time, set by the store
    #[serde(default, skip_serializing_if = "is_zero")]
    pub created: i64,

    /// Time of the last data point, set by the store
    #[serde(default, skip_serializing_if = "is_zero")]
    pub last_received: i64,

    /// Number of data points written, set by the store
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total_datapoints: i64,
}

/// User-editable subset of [`TsMeta`]; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TsMetaPatch {
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// New custom map (replaces the old one)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, String>>,
    /// New units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// New data type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// New retention in days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<i64>,
    /// New lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// New upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl TsMetaPatch {
    /// Reject values the store would refuse
    pub fn check(&self) -> std::result::Result<(), ValidationError> {
        if matches!(self.retention, Some(r) if r < 0) {
            return Err(invalid("TSMeta", "retention cannot be negative"));
        }
        for (name, bound) in [("min", self.min), ("max", self.max)] {
            if matches!(bound, Some(v) if !v.is_finite()) {
                return Err(invalid("TSMeta", format!("{} must be finite", name)));
            }
        }
        Ok(())
    }
}

impl TsMeta {
    /// Empty record for a TSUID
    pub fn for_tsuid(tsuid: impl Into<String>) -> Self {
        Self {
            tsuid: tsuid.into(),
            ..Self::default()
        }
    }

    /// Overwrite the fields present in `patch`
    pub fn merge(&mut self, patch: &TsMetaPatch) {
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(display_name) = &patch.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(custom) = &patch.custom {
            self.custom = custom.clone();
        }
        if let Some(units) = &patch.units {
            self.units = units.clone();
        }
        if let Some(data_type) = &patch.data_type {
            self.data_type = data_type.clone();
        }
        if let Some(retention) = patch.retention {
            self.retention = retention;
        }
        if patch.min.is_some() {
            self.min = patch.min;
        }
        if patch.max.is_some() {
            self.max = patch.max;
        }
    }

    /// Every user-editable field as a patch
    pub fn patch(&self) -> TsMetaPatch {
        TsMetaPatch {
            description: Some(self.description.clone()),
            display_name: Some(self.display_name.clone()),
            notes: Some(self.notes.clone()),
            custom: Some(self.custom.clone()),
            units: Some(self.units.clone()),
            data_type: Some(self.data_type.clone()),
            retention: Some(self.retention),
            min: self.min,
            max: self.max,
        }
    }

    fn require_tsuid(&self) -> std::result::Result<&str, ValidationError> {
        if self.tsuid.is_empty() {
            Err(invalid(Self::KIND, "a tsuid is required to address TS metadata"))
        } else {
            Ok(&self.tsuid)
        }
    }

    /// Replace local state with the store's record
    pub fn load_from<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let tsuid = self.require_tsuid()?;
        *self = client.get_tsmeta(tsuid)?;
        Ok(())
    }

    /// Send the editable fields, then take the merged record back
    pub fn save_to<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let tsuid = self.require_tsuid()?;
        *self = client.set_tsmeta(tsuid, &self.patch())?;
        Ok(())
    }

    /// Remove the record from the store
    pub fn delete<T: Transport>(&self, client: &Client<T>) -> Result<()> {
        client.delete_tsmeta(self.require_tsuid()?)
    }
}

impl Validate for TsMeta {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if !self.tsuid.is_empty() && !is_hex_id(&self.tsuid) {
            return Err(invalid(Self::KIND, format!("tsuid '{}' is not hexadecimal", self.tsuid)));
        }
        if self.retention < 0 {
            return Err(invalid(Self::KIND, "retention cannot be negative"));
        }
        if let Some(metric) = &self.metric {
            metric.check()?;
        }
        for tag in &self.tags {
            tag.check()?;
        }
        Ok(())
    }
}

impl Entity for TsMeta {
    const KIND: &'static str = "TSMeta";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uidmeta_decode_store_record() {
        let meta = UidMeta::from_value(json!({
            "uid": "000001",
            "type": "METRIC",
            "name": "sys.cpu.0",
            "description": "System CPU",
            "notes": "",
            "created": 1350425579,
            "custom": null,
            "displayName": ""
        }))
        .unwrap();

        assert_eq!(meta.uid(), Some("000001"));
        assert_eq!(meta.kind, Some(UidKind::Metric));
        assert!(meta.custom.is_empty());
        assert_eq!(meta.created, 1350425579);
    }

    #[test]
    fn test_uidmeta_merge_leaves_absent_fields() {
        let mut meta = UidMeta::named(UidKind::Tagk, "host");
        meta.description = "the host".to_string();
        meta.notes = "keep me".to_string();

        meta.merge(&UidMetaPatch {
            description: Some("machine name".to_string()),
            ..UidMetaPatch::default()
        });

        assert_eq!(meta.description, "machine name");
        assert_eq!(meta.notes, "keep me");
    }

    #[test]
    fn test_tsmeta_nan_bounds() {
        let meta = TsMeta::from_value(json!({
            "tsuid": "000001000001000001",
            "min": "NaN",
            "max": 42.0,
            "retention": 0,
            "custom": null
        }))
        .unwrap();

        assert!(meta.min.is_none());
        assert_eq!(meta.max, Some(42.0));
    }

    #[test]
    fn test_tsmeta_patch_projection() {
        let patch = TsMetaPatch {
            display_name: Some("CPU".to_string()),
            retention: Some(30),
            ..TsMetaPatch::default()
        };
        let wire = serde_json::to_value(&patch).unwrap();
        assert_eq!(wire, json!({"displayName": "CPU", "retention": 30}));
    }

    #[test]
    fn test_tsmeta_rejects_bad_tsuid() {
        let meta = TsMeta::for_tsuid("xyz");
        assert!(!meta.validate());
    }

    #[test]
    fn test_identity_required_for_persistence() {
        let meta = UidMeta::named(UidKind::Metric, "sys.cpu.0");
        assert!(meta.identity().is_err());
        assert!(TsMeta::default().require_tsuid().is_err());
    }

    #[test]
    fn test_kind_accepts_lowercase() {
        let kind: UidKind = serde_json::from_value(json!("tagv")).unwrap();
        assert_eq!(kind, UidKind::Tagv);
        assert_eq!(serde_json::to_value(kind).unwrap(), json!("TAGV"));
    }
}
