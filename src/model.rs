//! Read-only view of the entities the engines filter.
//!
//! These types are owned by the surrounding persistence layer; the engines
//! only borrow them. They deserialize from JSON so that datasets can be fed
//! to the shell and to tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    Wip,
    Released,
    Obsolete,
}

impl RevisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionStatus::Wip => "WIP",
            RevisionStatus::Released => "RELEASED",
            RevisionStatus::Obsolete => "OBSOLETE",
        }
    }
}

impl FromStr for RevisionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIP" => Ok(RevisionStatus::Wip),
            "RELEASED" => Ok(RevisionStatus::Released),
            "OBSOLETE" => Ok(RevisionStatus::Obsolete),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartMaster {
    pub workspace_id: String,
    pub number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub part_type: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// Reference to a part master held by a `PART_NUMBER` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartMasterRef {
    pub workspace_id: String,
    pub number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub language: String,
}

/// Typed value of a dynamic attribute. The variant is the attribute kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeValue {
    Text(String),
    LongText(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Url(String),
    Lov { index: u32, items: Vec<String> },
    PartNumber(Option<PartMasterRef>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceAttribute {
    pub name: String,
    #[serde(flatten)]
    pub value: AttributeValue,
}

impl InstanceAttribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One snapshot of a revision. Drafts have no check-in date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub iteration: u32,
    pub check_in_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: Vec<InstanceAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionKey {
    pub workspace_id: String,
    pub number: String,
    pub version: String,
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.workspace_id, self.number, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub master: PartMaster,
    pub version: String,
    pub author: Account,
    #[serde(default)]
    pub description: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub status: RevisionStatus,
    #[serde(default)]
    pub lifecycle_state: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub checkout_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub iterations: Vec<Iteration>,
}

impl Revision {
    pub fn key(&self) -> RevisionKey {
        RevisionKey {
            workspace_id: self.master.workspace_id.clone(),
            number: self.master.number.clone(),
            version: self.version.clone(),
        }
    }

    /// Whether `iteration` is the newest one, compared by position count.
    pub fn is_last_iteration(&self, iteration: &Iteration) -> bool {
        iteration.iteration as usize == self.iterations.len()
    }

    pub fn last_checked_in_iteration(&self) -> Option<&Iteration> {
        self.iterations
            .iter()
            .rev()
            .find(|it| it.check_in_date.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDataIteration {
    pub iteration: u32,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub attributes: Vec<InstanceAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDataMaster {
    pub id: i64,
    pub path: String,
    #[serde(default)]
    pub iterations: Vec<PathDataIteration>,
}

/// Scope of the path-data engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInstanceIteration {
    pub serial_number: String,
    pub configuration_item: String,
    pub iteration: u32,
    #[serde(default)]
    pub path_data_ids: Vec<i64>,
}
