use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{BoundingBox, SourceTree};

pub const CATEGORIES_FILE: &str = "categories.json";
pub const BADGE_JSON_FILE: &str = "badge.json";
pub const BADGE_SVG_FILE: &str = "badge.svg";
pub const FAVORITES_FILE: &str = "favorites.json";

/// Largest width or height libwebp will encode.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// How the thumbnail stage treats a source file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Raster,
    /// Animated formats never get a thumbnail.
    Animated,
    /// Anything listed for indexing but not decodable as a raster (svg).
    Vector,
}

impl AssetKind {
    pub fn is_thumbnailable(self) -> bool {
        self == AssetKind::Raster
    }
}

/// Layout of one source tree, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub source_dir: PathBuf,
    pub thumb_dir: PathBuf,
    pub max_size: BoundingBox,
    pub index_file: String,
    pub archive_file: String,
}

impl TreeConfig {
    pub fn desktop() -> Self {
        Self {
            source_dir: PathBuf::from("wallpapers"),
            thumb_dir: PathBuf::from("wallpapers-thumb"),
            max_size: BoundingBox::new(640, 360),
            index_file: "wallpapers.json".to_string(),
            archive_file: "wallpaper-all.zip".to_string(),
        }
    }

    pub fn mobile() -> Self {
        Self {
            source_dir: PathBuf::from("wallpapers-mobile"),
            thumb_dir: PathBuf::from("mobile-wallpapers-thumb"),
            max_size: BoundingBox::new(540, 960),
            index_file: "wallpapers-mobile.json".to_string(),
            archive_file: "wallpaper-mobile-all.zip".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Project root; every other path is resolved against it.
    pub root: PathBuf,
    #[serde(default = "TreeConfig::desktop")]
    pub desktop: TreeConfig,
    #[serde(default = "TreeConfig::mobile")]
    pub mobile: TreeConfig,
    pub thumbnail_dir: PathBuf,
    pub json_dir: PathBuf,
    pub output_format: OutputFormat,
    pub quality: u8,
    pub image_extensions: Vec<String>,
    pub raster_extensions: Vec<String>,
    pub excluded_extensions: Vec<String>,
    pub badge_label: String,
    pub badge_color: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            desktop: TreeConfig::desktop(),
            mobile: TreeConfig::mobile(),
            thumbnail_dir: PathBuf::from("thumbnails"),
            json_dir: PathBuf::from("json"),
            output_format: OutputFormat::Webp,
            quality: 85,
            image_extensions: extensions(&["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff", "svg"]),
            raster_extensions: extensions(&["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff"]),
            excluded_extensions: extensions(&["gif"]),
            badge_label: "wallpapers".to_string(),
            badge_color: "#8A2BE2".to_string(),
        }
    }
}

fn extensions(list: &[&str]) -> Vec<String> {
    list.iter().map(|ext| ext.to_string()).collect()
}

fn contains_ext(list: &[String], ext: &str) -> bool {
    list.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

impl BuildConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Loads a JSON config file; keys that are left out keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(Error::Config(format!(
                "quality must be within 1..=100, got {}",
                self.quality
            )));
        }
        for tree in SourceTree::ALL {
            let max = self.tree(tree).max_size;
            if max.max_width == 0 || max.max_height == 0 {
                return Err(Error::Config(format!(
                    "{tree} bounding box must be non-zero, got {}x{}",
                    max.max_width, max.max_height
                )));
            }
            if self.output_format == OutputFormat::Webp
                && (max.max_width > WEBP_MAX_DIMENSION || max.max_height > WEBP_MAX_DIMENSION)
            {
                return Err(Error::Config(format!(
                    "{tree} bounding box {}x{} exceeds the webp limit of {WEBP_MAX_DIMENSION}px",
                    max.max_width, max.max_height
                )));
            }
        }
        if self.image_extensions.is_empty() {
            return Err(Error::Config("image_extensions is empty".to_string()));
        }
        Ok(())
    }

    pub fn tree(&self, tree: SourceTree) -> &TreeConfig {
        match tree {
            SourceTree::Desktop => &self.desktop,
            SourceTree::Mobile => &self.mobile,
        }
    }

    pub fn source_root(&self, tree: SourceTree) -> PathBuf {
        self.root.join(&self.tree(tree).source_dir)
    }

    pub fn thumbnail_root(&self) -> PathBuf {
        self.root.join(&self.thumbnail_dir)
    }

    pub fn thumb_root(&self, tree: SourceTree) -> PathBuf {
        self.thumbnail_root().join(&self.tree(tree).thumb_dir)
    }

    pub fn json_root(&self) -> PathBuf {
        self.root.join(&self.json_dir)
    }

    pub fn index_path(&self, tree: SourceTree) -> PathBuf {
        self.json_root().join(&self.tree(tree).index_file)
    }

    pub fn categories_path(&self) -> PathBuf {
        self.json_root().join(CATEGORIES_FILE)
    }

    pub fn badge_json_path(&self) -> PathBuf {
        self.json_root().join(BADGE_JSON_FILE)
    }

    pub fn badge_svg_path(&self) -> PathBuf {
        self.json_root().join(BADGE_SVG_FILE)
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.json_root().join(FAVORITES_FILE)
    }

    pub fn archive_path(&self, tree: SourceTree) -> PathBuf {
        self.root.join(&self.tree(tree).archive_file)
    }

    /// The four JSON documents removed by a clean build.
    pub fn generated_json_paths(&self) -> [PathBuf; 4] {
        [
            self.index_path(SourceTree::Desktop),
            self.index_path(SourceTree::Mobile),
            self.categories_path(),
            self.badge_json_path(),
        ]
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        contains_ext(&self.image_extensions, ext)
    }

    pub fn classify(&self, ext: Option<&str>) -> AssetKind {
        let Some(ext) = ext else {
            return AssetKind::Vector;
        };
        if contains_ext(&self.excluded_extensions, ext) {
            AssetKind::Animated
        } else if contains_ext(&self.raster_extensions, ext) {
            AssetKind::Raster
        } else {
            AssetKind::Vector
        }
    }
}
