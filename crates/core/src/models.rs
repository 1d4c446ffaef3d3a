use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub const UNCATEGORIZED: &str = "uncategorized";
pub const ALL_CATEGORY: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTree {
    Desktop,
    Mobile,
}

impl SourceTree {
    pub const ALL: [SourceTree; 2] = [SourceTree::Desktop, SourceTree::Mobile];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceTree::Desktop => "desktop",
            SourceTree::Mobile => "mobile",
        }
    }
}

impl fmt::Display for SourceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub max_width: u32,
    pub max_height: u32,
}

impl BoundingBox {
    pub const fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

/// One source image discovered by the scanner.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    /// Path relative to the tree's source root, e.g. `blue/b.png`.
    pub rel_path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub modified_at: SystemTime,
    pub category: String,
}

impl ImageAsset {
    pub fn extension(&self) -> Option<String> {
        self.rel_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub filename: String,
    pub url: String,
    pub thumb_url: Option<String>,
    pub size: u64,
    pub modified: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub generated_at: String,
    pub count: usize,
    pub wallpapers: Vec<IndexRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub label: String,
    pub count: usize,
}

impl CategoryEntry {
    pub fn all(count: usize) -> Self {
        Self {
            name: ALL_CATEGORY.to_string(),
            label: "All".to_string(),
            count,
        }
    }

    pub fn named(name: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub desktop: Vec<CategoryEntry>,
    pub mobile: Vec<CategoryEntry>,
}

impl CategorySummary {
    pub fn entries_mut(&mut self, tree: SourceTree) -> &mut Vec<CategoryEntry> {
        match tree {
            SourceTree::Desktop => &mut self.desktop,
            SourceTree::Mobile => &mut self.mobile,
        }
    }
}

/// Badge payload written after both indexes exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub generated_at: String,
    pub desktop: u64,
    pub mobile: u64,
    pub total_wallpapers: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThumbStats {
    pub created: u64,
    pub up_to_date: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl ThumbStats {
    pub fn merge(&mut self, other: ThumbStats) {
        self.created += other.created;
        self.up_to_date += other.up_to_date;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn processed(&self) -> u64 {
        self.created + self.up_to_date + self.failed
    }
}

impl fmt::Display for ThumbStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "THUMBS created={} up_to_date={} skipped={} failed={}",
            self.created, self.up_to_date, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub desktop: usize,
    pub mobile: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.desktop + self.mobile
    }

    pub fn set(&mut self, tree: SourceTree, count: usize) {
        match tree {
            SourceTree::Desktop => self.desktop = count,
            SourceTree::Mobile => self.mobile = count,
        }
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "INDEX desktop={} mobile={} total={}",
            self.desktop,
            self.mobile,
            self.total()
        )
    }
}
