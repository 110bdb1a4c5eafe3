//! UID assignment and reconciliation
//!
//! The store assigns UIDs to metric names, tag keys and tag values in bulk.
//! Its response has up to six tables:
//!
//! ```json
//! {
//!   "metric": {"sys.cpu.0": "000042"},
//!   "metric_errors": {},
//!   "tagk": {"host": "000012"},
//!   "tagk_errors": {},
//!   "tagv": {"web01": "00001A"},
//!   "tagv_errors": {"lga": "Name already exists with UID: 00001B"}
//! }
//! ```
//!
//! A name that already had a UID shows up in the error table with the
//! existing UID as the last word of the message. [`reconcile`] merges both
//! tables into a series' UID slots. A requested name missing from both
//! tables is a [`ReconciliationError`].

use crate::error::{ReconciliationError, Result, UidCategory};
use crate::model::TimeSeries;
use crate::validation::is_hex_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Names to request UIDs for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UidRequest {
    /// Metric names
    pub metric: Vec<String>,
    /// Tag keys
    pub tagk: Vec<String>,
    /// Tag values
    pub tagv: Vec<String>,
}

impl UidRequest {
    /// Whether there is nothing to request
    pub fn is_empty(&self) -> bool {
        self.metric.is_empty() && self.tagk.is_empty() && self.tagv.is_empty()
    }
}

/// Decoded bulk-assignment response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignResponse {
    /// Newly assigned metric UIDs
    #[serde(default, deserialize_with = "crate::model::de::null_as_default")]
    pub metric: BTreeMap<String, String>,
    /// Metric names that failed, with the store's message
    #[serde(default, deserialize_with = "crate::model::de::null_as_default")]
    pub metric_errors: BTreeMap<String, String>,
    /// Newly assigned tag key UIDs
    #[serde(default, deserialize_with = "crate::model::de::null_as_default")]
    pub tagk: BTreeMap<String, String>,
    /// Tag keys that failed
    #[serde(default, deserialize_with = "crate::model::de::null_as_default")]
    pub tagk_errors: BTreeMap<String, String>,
    /// Newly assigned tag value UIDs
    #[serde(default, deserialize_with = "crate::model::de::null_as_default")]
    pub tagv: BTreeMap<String, String>,
    /// Tag values that failed
    #[serde(default, deserialize_with = "crate::model::de::null_as_default")]
    pub tagv_errors: BTreeMap<String, String>,

    #[serde(skip)]
    raw: Value,
}

impl AssignResponse {
    /// Decode a response, keeping the raw payload for diagnostics
    pub fn from_value(value: Value) -> Result<Self> {
        let mut response: Self = serde_json::from_value(value.clone()).map_err(|e| {
            crate::error::Error::protocol(format!("cannot decode UID assignment: {}", e), value.clone())
        })?;
        response.raw = value;
        Ok(response)
    }

    /// The payload this response was decoded from
    pub fn raw(&self) -> Value {
        if self.raw.is_null() {
            serde_json::to_value(self).unwrap_or_default()
        } else {
            self.raw.clone()
        }
    }

    /// Success table for a category
    pub fn assigned(&self, category: UidCategory) -> &BTreeMap<String, String> {
        match category {
            UidCategory::Metric => &self.metric,
            UidCategory::TagKey => &self.tagk,
            UidCategory::TagValue => &self.tagv,
        }
    }

    /// Error table for a category
    pub fn errors(&self, category: UidCategory) -> &BTreeMap<String, String> {
        match category {
            UidCategory::Metric => &self.metric_errors,
            UidCategory::TagKey => &self.tagk_errors,
            UidCategory::TagValue => &self.tagv_errors,
        }
    }

    /// Whether any name failed
    pub fn has_errors(&self) -> bool {
        !(self.metric_errors.is_empty() && self.tagk_errors.is_empty() && self.tagv_errors.is_empty())
    }

    /// UID for `name`, if the response accounts for it
    ///
    /// `Ok(None)` means the name appears in neither table.
    pub fn lookup(
        &self,
        category: UidCategory,
        name: &str,
    ) -> std::result::Result<Option<String>, ReconciliationError> {
        if let Some(uid) = self.assigned(category).get(name) {
            return Ok(Some(uid.clone()));
        }
        match self.errors(category).get(name) {
            Some(message) => match parse_existing_uid(message) {
                Some(uid) => {
                    debug!(%category, name, uid, "Reusing existing UID from error message");
                    Ok(Some(uid.to_string()))
                }
                None => {
                    warn!(%category, name, message = %message, "UID error message without a UID");
                    Err(ReconciliationError {
                        category,
                        name: name.to_string(),
                        reason: format!("error message carries no hex UID: {}", message),
                        raw: self.raw(),
                    })
                }
            },
            None => Ok(None),
        }
    }
}

/// Pull the pre-existing UID out of an assignment error message
///
/// The store reports names that already have a UID as
/// `"... <hex-uid>"`. Returns the last whitespace-separated token when it is
/// hexadecimal, `None` otherwise.
pub fn parse_existing_uid(message: &str) -> Option<&str> {
    message
        .split_whitespace()
        .last()
        .filter(|token| is_hex_id(token))
}

/// Merge an assignment response into a series' UID slots
///
/// Every component is looked up in its category's success table, then its
/// error table. A component the response does not mention keeps a UID it
/// already has; without one, reconciliation fails and the series is left
/// untouched. Reconciling the same response again yields the same slots.
pub fn reconcile(series: &mut TimeSeries, response: &AssignResponse) -> Result<()> {
    let missing = |category: UidCategory, name: &str| ReconciliationError {
        category,
        name: name.to_string(),
        reason: "name missing from both success and error tables".to_string(),
        raw: response.raw(),
    };

    let mut metric_uid = None;
    if let Some(metric) = &series.metric {
        match response.lookup(UidCategory::Metric, metric)? {
            Some(uid) => metric_uid = Some((metric.clone(), uid)),
            None if series.metric_uid().is_some() => {}
            None => return Err(missing(UidCategory::Metric, metric).into()),
        }
    }

    let mut tagk_uids = Vec::new();
    let mut tagv_uids = Vec::new();
    for (key, value) in &series.tags {
        match response.lookup(UidCategory::TagKey, key)? {
            Some(uid) => tagk_uids.push((key.clone(), uid)),
            None if series.tagk_uid(key).is_some() => {}
            None => return Err(missing(UidCategory::TagKey, key).into()),
        }
        match response.lookup(UidCategory::TagValue, value)? {
            Some(uid) => tagv_uids.push((value.clone(), uid)),
            None if series.tagv_uid(value).is_some() => {}
            None => return Err(missing(UidCategory::TagValue, value).into()),
        }
    }

    if let Some((name, uid)) = metric_uid {
        series.set_metric_uid(&name, uid);
    }
    for (key, uid) in tagk_uids {
        series.set_tagk_uid(&key, uid);
    }
    for (value, uid) in tagv_uids {
        series.set_tagv_uid(&value, uid);
    }
    Ok(())
}
