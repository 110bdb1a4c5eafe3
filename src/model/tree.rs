//! Tree definitions and rules
//!
//! A tree organizes series into a browsable hierarchy using a rule set. The
//! definition moves between two states:
//!
//! | State         | `tree_id` | `created` | Required     |
//! |---------------|-----------|-----------|--------------|
//! | uninitialized | none      | none      | `name`       |
//! | materialized  | set       | set       | -            |
//!
//! [`TreeDefinition::create`] moves to materialized, [`TreeDefinition::delete`]
//! moves back. Rules are addressed by `(tree_id, level, order)`.

use super::{de, invalid, Entity, Validate};
use crate::client::Client;
use crate::error::{Error, Result, ValidationError};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

// =============================================================================
// Rule
// =============================================================================

/// What part of a series a rule matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    /// The metric name
    Metric,
    /// A custom field of the metric's UID metadata
    MetricCustom,
    /// The value of a tag key
    Tagk,
    /// A custom field of a tag key's UID metadata
    TagkCustom,
    /// A custom field of a tag value's UID metadata
    TagvCustom,
}

impl RuleType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Metric => "METRIC",
            RuleType::MetricCustom => "METRIC_CUSTOM",
            RuleType::Tagk => "TAGK",
            RuleType::TagkCustom => "TAGK_CUSTOM",
            RuleType::TagvCustom => "TAGV_CUSTOM",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule of a tree's rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Tree the rule belongs to
    pub tree_id: u32,

    /// Level in the hierarchy
    #[serde(default)]
    pub level: u32,

    /// Position within the level
    #[serde(default)]
    pub order: u32,

    /// What the rule matches on
    #[serde(rename = "type")]
    pub rule_type: RuleType,

    /// Short description
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Detailed notes
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Tag key or metadata field to match
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Custom metadata key, for the `*_CUSTOM` types
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub custom_field: Option<String>,

    /// Regular expression applied to the field
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Separator splitting the field into several branches
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    /// Capture group of `regex` to use
    #[serde(default)]
    pub regex_group_idx: u32,

    /// Display format for the resulting branch
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub display_format: Option<String>,
}

/// Fields of a [`Rule`] to overwrite; `None` leaves a field alone and `""` clears it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePatch {
    /// New type
    pub rule_type: Option<RuleType>,
    /// New description
    pub description: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New field
    pub field: Option<String>,
    /// New custom field
    pub custom_field: Option<String>,
    /// New regex
    pub regex: Option<String>,
    /// New separator
    pub separator: Option<String>,
    /// New capture group index
    pub regex_group_idx: Option<u32>,
    /// New display format
    pub display_format: Option<String>,
}

impl Rule {
    /// A rule of `rule_type` at `(tree_id, level, order)`
    pub fn new(tree_id: u32, level: u32, order: u32, rule_type: RuleType) -> Self {
        Self {
            tree_id,
            level,
            order,
            rule_type,
            description: None,
            notes: None,
            field: None,
            custom_field: None,
            regex: None,
            separator: None,
            regex_group_idx: 0,
            display_format: None,
        }
    }

    /// Set the matched field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = de::non_empty(field.into());
        self
    }

    /// Set the custom metadata key
    pub fn with_custom_field(mut self, custom_field: impl Into<String>) -> Self {
        self.custom_field = de::non_empty(custom_field.into());
        self
    }

    /// Set the regex and the capture group to keep
    pub fn with_regex(mut self, regex: impl Into<String>, group_idx: u32) -> Self {
        self.regex = de::non_empty(regex.into());
        self.regex_group_idx = group_idx;
        self
    }

    /// Set the separator
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = de::non_empty(separator.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = de::non_empty(description.into());
        self
    }

    /// Set the display format
    pub fn with_display_format(mut self, format: impl Into<String>) -> Self {
        self.display_format = de::non_empty(format.into());
        self
    }

    /// `(tree_id, level, order)`
    pub fn key(&self) -> (u32, u32, u32) {
        (self.tree_id, self.level, self.order)
    }

    /// Overwrite the fields present in `patch`
    pub fn merge(&mut self, patch: &RulePatch) {
        if let Some(rule_type) = patch.rule_type {
            self.rule_type = rule_type;
        }
        let text_fields = [
            (&mut self.description, &patch.description),
            (&mut self.notes, &patch.notes),
            (&mut self.field, &patch.field),
            (&mut self.custom_field, &patch.custom_field),
            (&mut self.regex, &patch.regex),
            (&mut self.separator, &patch.separator),
            (&mut self.display_format, &patch.display_format),
        ];
        for (slot, update) in text_fields {
            if let Some(value) = update {
                *slot = de::non_empty(value.clone());
            }
        }
        if let Some(idx) = patch.regex_group_idx {
            self.regex_group_idx = idx;
        }
    }

    /// Replace local state with the stored rule
    pub fn load_from<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        *self = client.get_tree_rule(self.tree_id, self.level, self.order)?;
        Ok(())
    }

    /// Store the rule; an unchanged rule keeps its local state
    pub fn save_to<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        self.check()?;
        if let Some(stored) = client.set_tree_rule(self)? {
            *self = stored;
        }
        Ok(())
    }

    /// Remove the rule from its tree
    pub fn delete<T: Transport>(&self, client: &Client<T>) -> Result<()> {
        client.delete_tree_rule(self.tree_id, self.level, self.order)
    }
}

impl Validate for Rule {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.tree_id == 0 {
            return Err(invalid(Self::KIND, "tree id must be positive"));
        }
        let needs_custom = matches!(
            self.rule_type,
            RuleType::MetricCustom | RuleType::TagkCustom | RuleType::TagvCustom
        );
        if needs_custom && self.custom_field.is_none() {
            return Err(invalid(
                Self::KIND,
                format!("{} rules need a custom field", self.rule_type),
            ));
        }
        Ok(())
    }
}

impl Entity for Rule {
    const KIND: &'static str = "Rule";
}

// =============================================================================
// TreeDefinition
// =============================================================================

/// Configuration of a classification tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDefinition {
    /// Tree name; required before creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Short description
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Detailed notes
    #[serde(default, deserialize_with = "de::empty_string_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Rules keyed by level, then order
    #[serde(default, deserialize_with = "de::null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<u32, BTreeMap<u32, Rule>>,

    /// Creation time, set by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    /// Tree id, set by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<u32>,

    /// Record series that fail to match every level
    #[serde(default)]
    pub strict_match: bool,

    /// Keep collisions and not-matched entries
    #[serde(default)]
    pub store_failures: bool,

    /// Process new series into the tree
    #[serde(default)]
    pub enabled: bool,
}

/// Fields of a [`TreeDefinition`] to overwrite; `None` leaves a field alone
///
/// An empty description or notes clears the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreePatch {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New strict-match flag
    pub strict_match: Option<bool>,
    /// New store-failures flag
    pub store_failures: Option<bool>,
    /// New enabled flag
    pub enabled: Option<bool>,
}

impl TreeDefinition {
    /// An uninitialized tree named `name`
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
        .ensure_valid()
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = de::non_empty(description.into());
        self
    }

    /// Set the notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = de::non_empty(notes.into());
        self
    }

    /// Set the strict-match flag
    pub fn with_strict_match(mut self, strict_match: bool) -> Self {
        self.strict_match = strict_match;
        self
    }

    /// Set the store-failures flag
    pub fn with_store_failures(mut self, store_failures: bool) -> Self {
        self.store_failures = store_failures;
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the store has issued an id for this tree
    pub fn is_materialized(&self) -> bool {
        self.tree_id.is_some() && self.created.is_some()
    }

    /// Rule at `(level, order)`
    pub fn rule(&self, level: u32, order: u32) -> Option<&Rule> {
        self.rules.get(&level).and_then(|orders| orders.get(&order))
    }

    /// Number of rules across all levels
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(BTreeMap::len).sum()
    }

    /// Overwrite the fields present in `patch`
    pub fn merge(&mut self, patch: &TreePatch) {
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(description) = &patch.description {
            self.description = de::non_empty(description.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = de::non_empty(notes.clone());
        }
        if let Some(strict_match) = patch.strict_match {
            self.strict_match = strict_match;
        }
        if let Some(store_failures) = patch.store_failures {
            self.store_failures = store_failures;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
    }

    fn require_tree_id(&self) -> std::result::Result<u32, ValidationError> {
        self.tree_id
            .ok_or_else(|| invalid(Self::KIND, "tree has not been created"))
    }

    /// Create the tree in the store and adopt the issued id
    ///
    /// Fails without contacting the store if the tree is already
    /// materialized or has no name.
    pub fn create<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        if self.tree_id.is_some() || self.created.is_some() {
            return Err(Error::validation(Self::KIND, "tree seems to be created already"));
        }
        if self.name.as_deref().map_or(true, str::is_empty) {
            return Err(Error::validation(Self::KIND, "a name is required to create a tree"));
        }
        *self = client.create_tree(self)?;
        info!(tree_id = ?self.tree_id, name = ?self.name, "Tree created");
        Ok(())
    }

    /// Replace local state with the stored definition
    pub fn load_from<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let tree_id = self.require_tree_id()?;
        *self = client.get_tree(tree_id)?;
        Ok(())
    }

    /// Send the editable fields, then take the stored definition back
    pub fn save_to<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        self.require_tree_id()?;
        *self = client.edit_tree(self)?;
        Ok(())
    }

    /// Delete the tree, its rules and its branches
    ///
    /// Leaves the definition uninitialized: no id, no creation time, no
    /// rules, disabled.
    pub fn delete<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let tree_id = self.require_tree_id()?;
        client.delete_tree(tree_id, true)?;
        info!(tree_id, "Tree deleted");
        self.tree_id = None;
        self.created = None;
        self.rules.clear();
        self.enabled = false;
        Ok(())
    }
}

impl Validate for TreeDefinition {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.created.is_some() != self.tree_id.is_some() {
            return Err(invalid(Self::KIND, "created and treeId must be set together"));
        }
        if self.tree_id.is_none() && self.name.is_none() {
            return Err(invalid(Self::KIND, "a name is required before creation"));
        }
        for (level, orders) in &self.rules {
            for (order, rule) in orders {
                if rule.level != *level || rule.order != *order {
                    return Err(invalid(
                        Self::KIND,
                        format!(
                            "rule stored at {}/{} claims {}/{}",
                            level, order, rule.level, rule.order
                        ),
                    ));
                }
                rule.check()?;
            }
        }
        Ok(())
    }
}

impl Entity for TreeDefinition {
    const KIND: &'static str = "TreeDefinition";
}
