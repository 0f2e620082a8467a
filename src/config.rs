//! Engine configuration, loaded from a JSON file.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file does not exist: {0}")]
    Missing(PathBuf),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings shared by both engines and the SQL renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Offset used for date operands that carry none.
    #[serde(default = "default_timezone", with = "offset_format")]
    pub timezone: FixedOffset,

    /// Logical table name to physical table name.
    #[serde(default = "default_table_mapping")]
    pub table_mapping: HashMap<String, String>,

    /// Minimum OR-ed equalities on one column before rendering them as `IN`.
    #[serde(default = "default_max_or_conditions_for_in")]
    pub max_or_conditions_for_in: usize,
}

fn default_timezone() -> FixedOffset {
    Utc.fix()
}

fn default_max_or_conditions_for_in() -> usize {
    5
}

fn default_table_mapping() -> HashMap<String, String> {
    [
        ("PartRevision", "part_revision"),
        ("PartIteration", "part_iteration"),
        ("PartMaster", "part_master"),
        ("Account", "account"),
        ("Tag", "revision_tag"),
        ("TextAttribute", "text_attribute"),
        ("LongTextAttribute", "long_text_attribute"),
        ("DateAttribute", "date_attribute"),
        ("BooleanAttribute", "boolean_attribute"),
        ("UrlAttribute", "url_attribute"),
        ("NumberAttribute", "number_attribute"),
        ("LovAttribute", "lov_attribute"),
        ("PartNumberAttribute", "part_number_attribute"),
        ("PathDataMaster", "path_data_master"),
        ("PathDataIteration", "path_data_iteration"),
    ]
    .into_iter()
    .map(|(entity, table)| (entity.to_string(), table.to_string()))
    .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            table_mapping: default_table_mapping(),
            max_or_conditions_for_in: default_max_or_conditions_for_in(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: EngineConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        // Entries missing from the file keep their default table.
        for (entity, table) in default_table_mapping() {
            config.table_mapping.entry(entity).or_insert(table);
        }

        Ok(config)
    }

    /// Physical table for an entity, falling back to the lower-cased name.
    pub fn get_table_name(&self, entity: &str) -> String {
        self.table_mapping
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }
}

mod offset_format {
    use chrono::FixedOffset;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        offset: &FixedOffset,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&offset.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<FixedOffset, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<FixedOffset>()
            .map_err(|e| serde::de::Error::custom(format!("invalid UTC offset `{}`: {}", raw, e)))
    }
}
