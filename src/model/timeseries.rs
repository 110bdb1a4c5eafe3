//! Time series identity
//!
//! A series is named either by a metric plus at least one tag pair, or by an
//! opaque hex TSUID the store assigned. Alongside the identity, a series
//! carries slots for the UIDs and metadata of each of its components. The
//! slots start empty and are filled by [`TimeSeries::assign_uid`] or
//! [`TimeSeries::load_from`]; they are not part of the wire projection.

use super::{invalid, Entity, TsMeta, TsMetaPatch, UidKind, UidMeta, Validate};
use crate::client::Client;
use crate::error::{Error, Result, ValidationError};
use crate::transport::Transport;
use crate::uid::{self, UidRequest};
use crate::validation::{is_hex_id, is_valid_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A metric plus tags, a TSUID, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Metric name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    /// Tag key to tag value
    #[serde(default, deserialize_with = "super::de::null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Store-assigned series id
    #[serde(default, deserialize_with = "super::de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub tsuid: Option<String>,

    #[serde(skip)]
    metadata: TsMeta,

    #[serde(skip)]
    metric_meta: UidMeta,

    #[serde(skip)]
    tagk_meta: BTreeMap<String, UidMeta>,

    #[serde(skip)]
    tagv_meta: BTreeMap<String, UidMeta>,
}

impl TimeSeries {
    /// Series named by metric and tags
    pub fn new<I, K, V>(metric: impl Into<String>, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_parts(Some(metric.into()), collect_tags(tags), None)
    }

    /// Series named by TSUID only
    pub fn from_tsuid(tsuid: impl Into<String>) -> Result<Self> {
        Self::from_parts(None, BTreeMap::new(), Some(tsuid.into()))
    }

    /// Series from any combination of identity fields
    ///
    /// An empty `tsuid` counts as absent.
    pub fn from_parts(
        metric: Option<String>,
        tags: BTreeMap<String, String>,
        tsuid: Option<String>,
    ) -> Result<Self> {
        Self {
            metric,
            tags,
            tsuid: tsuid.filter(|t| !t.is_empty()),
            ..Self::default()
        }
        .ensure_valid()
    }

    /// Metric query form, `metric{k1=v1,k2=v2}`
    ///
    /// `None` when the series has no metric.
    pub fn ts_string(&self) -> Option<String> {
        let metric = self.metric.as_ref()?;
        let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        Some(format!("{}{{{}}}", metric, tags.join(",")))
    }

    // =========================================================================
    // UID slots
    // =========================================================================

    /// UID of the metric name, once known
    pub fn metric_uid(&self) -> Option<&str> {
        self.metric_meta.uid()
    }

    /// UID of a tag key, once known
    pub fn tagk_uid(&self, key: &str) -> Option<&str> {
        self.tagk_meta.get(key).and_then(UidMeta::uid)
    }

    /// UID of a tag value, once known
    pub fn tagv_uid(&self, value: &str) -> Option<&str> {
        self.tagv_meta.get(value).and_then(UidMeta::uid)
    }

    /// Every known tag key UID
    pub fn tagk_uids(&self) -> BTreeMap<&str, &str> {
        known_uids(&self.tagk_meta)
    }

    /// Every known tag value UID
    pub fn tagv_uids(&self) -> BTreeMap<&str, &str> {
        known_uids(&self.tagv_meta)
    }

    pub(crate) fn set_metric_uid(&mut self, name: &str, uid: String) {
        if self.metric_meta.name.is_empty() {
            self.metric_meta.name = name.to_string();
        }
        self.metric_meta.kind = Some(UidKind::Metric);
        self.metric_meta.uid = uid;
    }

    pub(crate) fn set_tagk_uid(&mut self, key: &str, uid: String) {
        self.tagk_meta
            .entry(key.to_string())
            .or_insert_with(|| UidMeta::named(UidKind::Tagk, key))
            .uid = uid;
    }

    pub(crate) fn set_tagv_uid(&mut self, value: &str, uid: String) {
        self.tagv_meta
            .entry(value.to_string())
            .or_insert_with(|| UidMeta::named(UidKind::Tagv, value))
            .uid = uid;
    }

    /// Names whose UIDs are not known yet
    pub fn unassigned(&self) -> UidRequest {
        let mut request = UidRequest::default();
        if let Some(metric) = &self.metric {
            if self.metric_uid().is_none() {
                request.metric.push(metric.clone());
            }
        }
        for (key, value) in &self.tags {
            if self.tagk_uid(key).is_none() && !request.tagk.contains(key) {
                request.tagk.push(key.clone());
            }
            if self.tagv_uid(value).is_none() && !request.tagv.contains(value) {
                request.tagv.push(value.clone());
            }
        }
        request
    }

    // =========================================================================
    // Metadata slots
    // =========================================================================

    /// Series metadata, as last loaded
    pub fn metadata(&self) -> &TsMeta {
        &self.metadata
    }

    /// Series metadata for editing before [`TimeSeries::save_to`]
    pub fn metadata_mut(&mut self) -> &mut TsMeta {
        &mut self.metadata
    }

    /// Metric UID metadata
    pub fn metric_meta(&self) -> &UidMeta {
        &self.metric_meta
    }

    /// Metric UID metadata for editing
    pub fn metric_meta_mut(&mut self) -> &mut UidMeta {
        &mut self.metric_meta
    }

    /// Tag key UID metadata
    pub fn tagk_meta(&self, key: &str) -> Option<&UidMeta> {
        self.tagk_meta.get(key)
    }

    /// Tag key UID metadata for editing
    pub fn tagk_meta_mut(&mut self, key: &str) -> Option<&mut UidMeta> {
        self.tagk_meta.get_mut(key)
    }

    /// Tag value UID metadata
    pub fn tagv_meta(&self, value: &str) -> Option<&UidMeta> {
        self.tagv_meta.get(value)
    }

    /// Tag value UID metadata for editing
    pub fn tagv_meta_mut(&mut self, value: &str) -> Option<&mut UidMeta> {
        self.tagv_meta.get_mut(value)
    }

    // =========================================================================
    // Store operations
    // =========================================================================

    /// Request UIDs for every unassigned component and record them
    ///
    /// Fails without contacting the store if the series already has a TSUID
    /// or lacks a metric and tags.
    pub fn assign_uid<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        if self.tsuid.is_some() {
            return Err(Error::validation(Self::KIND, "UID already assigned"));
        }
        if self.metric.is_none() || self.tags.is_empty() {
            return Err(Error::validation(
                Self::KIND,
                "cannot assign UIDs without a metric and tags",
            ));
        }

        let request = self.unassigned();
        if request.is_empty() {
            debug!(series = ?self.ts_string(), "All UIDs already known");
            return Ok(());
        }

        let response = client.assign_uid(&request.metric, &request.tagk, &request.tagv)?;
        uid::reconcile(self, &response)
    }

    /// Load the series metadata and the metadata of every component
    ///
    /// With a TSUID the record is fetched directly; a missing record is
    /// created from the metric query when one is known. Without a TSUID the
    /// record is looked up by metric query: no match creates it, more than
    /// one match is a protocol mismatch.
    pub fn load_from<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let meta = match (&self.tsuid, self.ts_string()) {
            (Some(tsuid), query) => match client.get_tsmeta(tsuid) {
                Ok(meta) => meta,
                Err(Error::Transport(e)) if e.code == 404 && query.is_some() => {
                    debug!(tsuid = %tsuid, "No TS metadata yet, creating it");
                    let query = query.unwrap_or_default();
                    client.create_tsmeta(&query, &TsMetaPatch::default())?
                }
                Err(e) => return Err(e),
            },
            (None, Some(query)) => {
                let mut found = client.find_tsmeta(&query)?;
                match found.len() {
                    0 => client.create_tsmeta(&query, &TsMetaPatch::default())?,
                    1 => found.remove(0),
                    n => {
                        let payload = serde_json::to_value(&found)?;
                        return Err(Error::protocol(
                            format!("{} TS metadata records match '{}', expected one", n, query),
                            payload,
                        ));
                    }
                }
            }
            (None, None) => {
                return Err(Error::validation(Self::KIND, "no metric or tsuid to load"));
            }
        };

        self.apply_metadata(meta)
    }

    fn apply_metadata(&mut self, mut meta: TsMeta) -> Result<()> {
        if !meta.tsuid.is_empty() {
            self.tsuid = Some(meta.tsuid.clone());
        }

        if let Some(metric_meta) = meta.metric.take() {
            if self.metric.is_none() && !metric_meta.name.is_empty() {
                self.metric = Some(metric_meta.name.clone());
            }
            self.metric_meta = metric_meta;
        }

        // Component records come in key/value order.
        let tag_records = std::mem::take(&mut meta.tags);
        let mut pending_key: Option<String> = None;
        let mut tags = BTreeMap::new();
        for record in tag_records {
            match record.kind {
                Some(UidKind::Tagk) => {
                    pending_key = Some(record.name.clone());
                    self.tagk_meta.insert(record.name.clone(), record);
                }
                Some(UidKind::Tagv) => {
                    if let Some(key) = pending_key.take() {
                        tags.insert(key, record.name.clone());
                    }
                    self.tagv_meta.insert(record.name.clone(), record);
                }
                _ => {
                    let payload = serde_json::to_value(&record)?;
                    return Err(Error::protocol("tag metadata without a TAGK/TAGV type", payload));
                }
            }
        }
        if self.tags.is_empty() {
            self.tags = tags;
        }

        self.metadata = meta;
        self.check()?;
        Ok(())
    }

    /// Save the series metadata and every component's UID metadata
    pub fn save_to<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        if self.metadata.tsuid.is_empty() {
            if let Some(tsuid) = &self.tsuid {
                self.metadata.tsuid = tsuid.clone();
            }
        }
        self.metadata.save_to(client)?;
        self.metric_meta.save_to(client)?;
        for meta in self.tagk_meta.values_mut() {
            meta.save_to(client)?;
        }
        for meta in self.tagv_meta.values_mut() {
            meta.save_to(client)?;
        }
        Ok(())
    }

    /// Delete the series metadata, and with `recursive` the UID metadata too
    ///
    /// Deleted UID metadata is reset to an unassigned stub.
    pub fn delete_meta<T: Transport>(&mut self, client: &Client<T>, recursive: bool) -> Result<()> {
        let tsuid = match (&self.tsuid, self.metadata.tsuid.as_str()) {
            (Some(tsuid), _) => tsuid.clone(),
            (None, "") => {
                return Err(Error::validation(Self::KIND, "no tsuid to delete metadata for"));
            }
            (None, tsuid) => tsuid.to_string(),
        };
        client.delete_tsmeta(&tsuid)?;

        if recursive {
            self.metric_meta.delete(client)?;
            if let Some(metric) = &self.metric {
                self.metric_meta = UidMeta::named(UidKind::Metric, metric.clone());
            }
            for (key, meta) in self.tagk_meta.iter_mut() {
                meta.delete(client)?;
                *meta = UidMeta::named(UidKind::Tagk, key.clone());
            }
            for (value, meta) in self.tagv_meta.iter_mut() {
                meta.delete(client)?;
                *meta = UidMeta::named(UidKind::Tagv, value.clone());
            }
        }
        Ok(())
    }
}

fn collect_tags<I, K, V>(tags: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

fn known_uids(slots: &BTreeMap<String, UidMeta>) -> BTreeMap<&str, &str> {
    slots
        .iter()
        .filter_map(|(name, meta)| meta.uid().map(|uid| (name.as_str(), uid)))
        .collect()
}

impl Validate for TimeSeries {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.metric.is_none() && self.tsuid.is_none() {
            return Err(invalid(Self::KIND, "either metric and tags or a tsuid is required"));
        }

        match &self.metric {
            Some(metric) => {
                if !is_valid_name(metric) {
                    return Err(invalid(Self::KIND, format!("invalid metric name '{}'", metric)));
                }
                if self.tags.is_empty() {
                    return Err(invalid(Self::KIND, "at least one tag is required"));
                }
                for (key, value) in &self.tags {
                    if !is_valid_name(key) || !is_valid_name(value) {
                        return Err(invalid(
                            Self::KIND,
                            format!("invalid tag '{}={}'", key, value),
                        ));
                    }
                }
            }
            None if !self.tags.is_empty() => {
                return Err(invalid(Self::KIND, "tags given without a metric"));
            }
            None => {}
        }

        if let Some(tsuid) = &self.tsuid {
            if !is_hex_id(tsuid) {
                return Err(invalid(Self::KIND, format!("tsuid '{}' is not hexadecimal", tsuid)));
            }
        }
        Ok(())
    }
}

impl Entity for TimeSeries {
    const KIND: &'static str = "TimeSeries";
}

impl fmt::Display for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ts_string(), &self.tsuid) {
            (Some(name), Some(tsuid)) => write!(f, "{} ({})", name, tsuid),
            (Some(name), None) => f.write_str(&name),
            (None, Some(tsuid)) => f.write_str(tsuid),
            (None, None) => f.write_str("<unnamed>"),
        }
    }
}
