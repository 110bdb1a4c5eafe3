//! Entity model
//!
//! Value objects for everything the store persists:
//!
//! - [`TimeSeries`] and [`Measurement`]: data point identity and values
//! - [`Annotation`]: notes attached to a point in time
//! - [`TsMeta`] and [`UidMeta`]: metadata records
//! - [`TreeDefinition`] and [`Rule`]: classification trees
//! - [`Branch`]: a loaded level of a tree
//!
//! Every entity validates itself ([`Validate`]) and projects to and from the
//! store's JSON objects ([`Entity`]). Entities never hold a transport;
//! persistence methods take a [`Client`](crate::client::Client) argument.

pub(crate) mod de;

mod annotation;
mod branch;
mod measurement;
mod meta;
mod timeseries;
mod tree;

pub use annotation::{Annotation, AnnotationPatch};
pub use branch::{Branch, BranchRef, Leaf};
pub use measurement::{Measurement, MeasurementValue};
pub use meta::{TsMeta, TsMetaPatch, UidKind, UidMeta, UidMetaPatch};
pub use timeseries::TimeSeries;
pub use tree::{Rule, RulePatch, RuleType, TreeDefinition, TreePatch};

use crate::error::{Error, Result, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A JSON object as sent to or received from the store
pub type WireMap = serde_json::Map<String, Value>;

/// Self-validation shared by entities and queries
pub trait Validate {
    /// Check every invariant, reporting the first one that fails
    fn check(&self) -> std::result::Result<(), ValidationError>;

    /// Pure predicate form of [`Validate::check`]
    fn validate(&self) -> bool {
        self.check().is_ok()
    }
}

/// An object with a JSON representation on the wire
pub trait Entity: Validate + Serialize + DeserializeOwned + Sized {
    /// Name used in error messages
    const KIND: &'static str;

    /// Project the fields that are set into a JSON object
    fn to_wire_map(&self) -> Result<WireMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::protocol(
                format!("{} did not project to an object", Self::KIND),
                other,
            )),
        }
    }

    /// Build from a JSON object, then validate
    fn from_wire_map(map: WireMap) -> Result<Self> {
        Self::from_value(Value::Object(map))
    }

    /// Build from any JSON value, then validate
    ///
    /// A payload that does not fit the entity's shape is a protocol
    /// mismatch; a payload that fits but breaks an invariant is a
    /// validation error.
    fn from_value(value: Value) -> Result<Self> {
        let entity: Self = serde_json::from_value(value.clone()).map_err(|e| {
            Error::protocol(format!("cannot decode {}: {}", Self::KIND, e), value)
        })?;
        entity.ensure_valid()
    }

    /// Pass the entity through if it validates
    fn ensure_valid(self) -> Result<Self> {
        self.check()?;
        Ok(self)
    }
}

/// Convenience for building validation errors inside `check` impls
pub(crate) fn invalid(entity: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError::new(entity, message)
}
