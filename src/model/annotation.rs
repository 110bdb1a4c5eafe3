//! Annotations
//!
//! An annotation records a note about an event at some point in time. It is
//! addressed by its start time and, for local notes, the TSUID it belongs
//! to. Without a TSUID the note is global and applies to every series.

use super::{de, invalid, Entity, Validate};
use crate::client::Client;
use crate::error::{Result, ValidationError};
use crate::transport::Transport;
use crate::validation::is_hex_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A note attached to a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// When the event started
    pub start_time: i64,

    /// When the event ended; the store reports `0` for none
    #[serde(default, deserialize_with = "de::zero_as_none", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,

    /// Series the note belongs to; `None` for a global note
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub tsuid: Option<String>,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Detailed notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// User-defined key/value pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, String>>,
}

/// Fields of an [`Annotation`] to overwrite; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    /// New end time
    pub end_time: Option<i64>,
    /// New description
    pub description: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New custom map
    pub custom: Option<BTreeMap<String, String>>,
}

impl Annotation {
    /// A global annotation starting at `start_time`
    pub fn new(start_time: i64) -> Result<Self> {
        Self {
            start_time,
            end_time: None,
            tsuid: None,
            description: None,
            notes: None,
            custom: None,
        }
        .ensure_valid()
    }

    /// Attach to a series; an empty TSUID keeps the note global
    ///
    /// Builder methods do not validate; call [`Entity::ensure_valid`] when done.
    pub fn with_tsuid(mut self, tsuid: impl Into<String>) -> Self {
        let tsuid = tsuid.into();
        self.tsuid = if tsuid.is_empty() { None } else { Some(tsuid) };
        self
    }

    /// Set the end time; `0` means none
    pub fn with_end_time(mut self, end_time: i64) -> Self {
        self.end_time = if end_time == 0 { None } else { Some(end_time) };
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Add one custom key/value pair
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether the note applies to every series
    pub fn is_global(&self) -> bool {
        self.tsuid.is_none()
    }

    /// Overwrite the fields present in `patch`
    pub fn merge(&mut self, patch: &AnnotationPatch) {
        if let Some(end_time) = patch.end_time {
            self.end_time = if end_time == 0 { None } else { Some(end_time) };
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(custom) = &patch.custom {
            self.custom = Some(custom.clone());
        }
    }

    /// Replace local state with the stored annotation
    pub fn load_from<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        self.check()?;
        *self = client.get_annotation(self.start_time, self.end_time, self.tsuid.as_deref())?;
        Ok(())
    }

    /// Store the annotation, then take the stored version back
    pub fn save_to<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        *self = client.set_annotation(self)?;
        Ok(())
    }

    /// Remove the annotation from the store
    pub fn delete<T: Transport>(&self, client: &Client<T>) -> Result<()> {
        client.delete_annotation(self)
    }
}

impl Validate for Annotation {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.start_time < 0 {
            return Err(invalid(Self::KIND, "start time cannot be negative"));
        }
        if let Some(end_time) = self.end_time {
            if end_time < self.start_time {
                return Err(invalid(
                    Self::KIND,
                    format!("end time {} is before start time {}", end_time, self.start_time),
                ));
            }
        }
        if let Some(tsuid) = &self.tsuid {
            if !is_hex_id(tsuid) {
                return Err(invalid(Self::KIND, format!("tsuid '{}' is not hexadecimal", tsuid)));
            }
        }
        Ok(())
    }
}

impl Entity for Annotation {
    const KIND: &'static str = "Annotation";
}
