use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// One child of a listed directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub ext: String,
    pub is_directory: bool,
    pub hidden: bool,
    pub last_modified: i64,
    pub birthtime: i64,
    pub size: Option<u64>,
    pub error: Option<String>,
}

impl Entry {
    pub fn from_metadata(name: String, metadata: &Metadata) -> Self {
        let is_directory = metadata.is_dir();
        let last_modified = metadata.modified().map(epoch_millis).unwrap_or(0);
        let birthtime = metadata
            .created()
            .map(epoch_millis)
            .unwrap_or(last_modified);

        Self {
            ext: if is_directory { String::new() } else { extension(&name) },
            hidden: name.starts_with('.'),
            is_directory,
            last_modified,
            birthtime,
            size: if is_directory { None } else { Some(metadata.len()) },
            error: None,
            name,
        }
    }

    /// Placeholder for a child whose metadata could not be read.
    pub fn from_error(name: String, error: &std::io::Error) -> Self {
        Self {
            ext: extension(&name),
            hidden: name.starts_with('.'),
            is_directory: false,
            last_modified: 0,
            birthtime: 0,
            size: None,
            error: Some(error.to_string()),
            name,
        }
    }
}

/// `.txt` style extension, empty when there is none.
fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

pub fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A browsable root shown in the side panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drive {
    pub label: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDirOutcome {
    Created,
    AlreadyExisted,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDirRequest {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub from_path: String,
    pub to_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyPasteRequest {
    pub from_paths: Vec<String>,
    pub to_path: String,
    #[serde(default)]
    pub is_move: bool,
}

/// `path` may be a single string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(path) => vec![path.clone()],
            OneOrMany::Many(paths) => paths.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    pub path: OneOrMany,
}
