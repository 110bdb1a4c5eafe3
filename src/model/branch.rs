//! Tree branches
//!
//! A branch is one level of a tree: its display name, the leaves (series)
//! directly under it and stubs for its child branches. Branch ids are hex
//! strings that start with the tree id and append one segment per level, so
//! a child's id always extends its parent's. Recursive loading relies on
//! that to reject responses that would loop or jump levels.

use super::{Entity, TimeSeries, Validate};
use crate::client::Client;
use crate::error::{Error, Result, ValidationError};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// How to address a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchRef {
    /// The root branch of a tree
    Tree(u32),
    /// A branch by its hex id
    Branch(String),
}

/// A series classified under a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaf {
    /// The series
    #[serde(flatten)]
    pub series: TimeSeries,

    /// Name shown for the leaf
    #[serde(default)]
    pub display_name: String,
}

/// One level of a tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Tree the branch belongs to
    pub tree_id: u32,

    /// Display names from the root down to this branch, keyed by depth
    #[serde(default, deserialize_with = "super::de::null_as_default")]
    pub path: BTreeMap<u32, String>,

    /// Name shown for the branch
    #[serde(default)]
    pub display_name: String,

    /// Hex id encoding the tree and every ancestor
    pub branch_id: String,

    /// Depth below the root; the root is 0
    #[serde(default)]
    pub depth: u32,

    /// Series directly under this branch
    #[serde(default, deserialize_with = "super::de::null_as_default")]
    pub leaves: Vec<Leaf>,

    /// Child branches; stubs unless loaded recursively
    #[serde(default, deserialize_with = "super::de::null_as_default")]
    pub branches: Vec<Branch>,
}

impl Branch {
    /// Load one branch, and with `recursive` every branch beneath it
    pub fn load<T: Transport>(client: &Client<T>, at: BranchRef, recursive: bool) -> Result<Self> {
        let mut branch = client.get_tree_branch(&at)?;
        branch.ensure_addressed(&at)?;
        if recursive {
            branch.load_children(client)?;
        }
        Ok(branch)
    }

    /// Load a whole tree from its root
    pub fn load_tree<T: Transport>(client: &Client<T>, tree_id: u32) -> Result<Self> {
        Self::load(client, BranchRef::Tree(tree_id), true)
    }

    fn load_children<T: Transport>(&mut self, client: &Client<T>) -> Result<()> {
        let stubs = std::mem::take(&mut self.branches);
        let mut children = Vec::with_capacity(stubs.len());
        for stub in stubs {
            self.ensure_child(&stub)?;
            debug!(branch_id = %stub.branch_id, depth = stub.depth, "Loading child branch");
            let mut child = client.get_tree_branch(&BranchRef::Branch(stub.branch_id.clone()))?;
            child.ensure_addressed(&BranchRef::Branch(stub.branch_id.clone()))?;
            self.ensure_child(&child)?;
            child.load_children(client)?;
            children.push(child);
        }
        self.branches = children;
        Ok(())
    }

    fn ensure_addressed(&self, at: &BranchRef) -> Result<()> {
        let matches = match at {
            BranchRef::Tree(tree_id) => self.tree_id == *tree_id,
            BranchRef::Branch(id) => self.branch_id.eq_ignore_ascii_case(id),
        };
        if matches {
            Ok(())
        } else {
            Err(self.mismatch(format!("requested {:?} but received branch '{}'", at, self.branch_id)))
        }
    }

    fn ensure_child(&self, child: &Branch) -> Result<()> {
        let parent_id = self.branch_id.to_ascii_lowercase();
        let child_id = child.branch_id.to_ascii_lowercase();
        if child_id.len() <= parent_id.len() || !child_id.starts_with(&parent_id) {
            return Err(child.mismatch(format!(
                "child branch '{}' does not extend parent '{}'",
                child.branch_id, self.branch_id
            )));
        }
        if child.depth != self.depth + 1 {
            return Err(child.mismatch(format!(
                "child branch '{}' at depth {} under parent at depth {}",
                child.branch_id, child.depth, self.depth
            )));
        }
        if child.tree_id != self.tree_id {
            return Err(child.mismatch(format!(
                "child branch '{}' belongs to tree {} instead of {}",
                child.branch_id, child.tree_id, self.tree_id
            )));
        }
        Ok(())
    }

    fn mismatch(&self, message: String) -> Error {
        let payload = serde_json::to_value(self).unwrap_or_default();
        Error::protocol(message, payload)
    }

    /// Find a branch by id in this subtree
    pub fn find(&self, branch_id: &str) -> Option<&Branch> {
        if self.branch_id.eq_ignore_ascii_case(branch_id) {
            return Some(self);
        }
        self.branches.iter().find_map(|b| b.find(branch_id))
    }

    /// Number of branches in this subtree, including this one
    pub fn branch_count(&self) -> usize {
        1 + self.branches.iter().map(Branch::branch_count).sum::<usize>()
    }

    /// Number of leaves in this subtree
    pub fn leaf_count(&self) -> usize {
        self.leaves.len() + self.branches.iter().map(Branch::leaf_count).sum::<usize>()
    }
}

impl Validate for Branch {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        if !crate::validation::is_hex_id(&self.branch_id) {
            return Err(super::invalid(
                Self::KIND,
                format!("branch id '{}' is not hexadecimal", self.branch_id),
            ));
        }
        for leaf in &self.leaves {
            leaf.series.check()?;
        }
        for branch in &self.branches {
            branch.check()?;
        }
        Ok(())
    }
}

impl Entity for Branch {
    const KIND: &'static str = "Branch";
}
