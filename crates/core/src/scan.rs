use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::BuildConfig;
use crate::error::Result;
use crate::models::{ImageAsset, SourceTree, UNCATEGORIZED};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
}

impl ScanConfig {
    pub fn for_tree(config: &BuildConfig, tree: SourceTree) -> Self {
        Self {
            root: config.source_root(tree),
            extensions: config.image_extensions.clone(),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Lists the images of one source tree: root files first, then the files of
/// each direct subdirectory. Anything nested deeper is ignored.
pub fn scan_tree(config: &ScanConfig) -> Result<Vec<ImageAsset>> {
    if !config.root.is_dir() {
        info!(root = %config.root.display(), "source tree not found, skipping");
        return Ok(Vec::new());
    }

    let mut assets = Vec::new();
    let (files, dirs) = list_dir(&config.root);
    collect_files(config, &files, None, &mut assets);

    for dir in dirs {
        let Some(category) = utf8_name(&dir) else {
            continue;
        };
        let (files, nested) = list_dir(dir.path());
        if !nested.is_empty() {
            debug!(
                dir = %dir.path().display(),
                count = nested.len(),
                "ignoring directories nested below a category"
            );
        }
        collect_files(config, &files, Some(category), &mut assets);
    }

    Ok(assets)
}

fn collect_files(
    config: &ScanConfig,
    files: &[DirEntry],
    category: Option<&str>,
    out: &mut Vec<ImageAsset>,
) {
    for entry in files {
        let path = entry.path();
        let Some(file_name) = utf8_name(entry) else {
            continue;
        };
        if !config.accepts(path) {
            debug!(path = %path.display(), "skipping non-image file");
            continue;
        }

        let md = match entry.metadata() {
            Ok(v) => v,
            Err(err) => {
                warn!(path = %path.display(), %err, "couldn't stat file, skipping");
                continue;
            }
        };

        let rel_path = match category {
            Some(cat) => Path::new(cat).join(file_name),
            None => PathBuf::from(file_name),
        };

        out.push(ImageAsset {
            rel_path,
            file_name: file_name.to_string(),
            size_bytes: md.len(),
            modified_at: md.modified().unwrap_or(UNIX_EPOCH),
            category: category.unwrap_or(UNCATEGORIZED).to_string(),
        });
    }
}

/// Index urls must name the file exactly, so lossy names are left out.
fn utf8_name(entry: &DirEntry) -> Option<&str> {
    let name = entry.file_name().to_str();
    if name.is_none() {
        warn!(path = %entry.path().display(), "skipping entry with a non-UTF-8 name");
    }
    name
}

/// Direct children of `dir`, split into files (case-insensitive name order)
/// and directories (name order).
fn list_dir(dir: &Path) -> (Vec<DirEntry>, Vec<DirEntry>) {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    // Depth is capped at one, so following links cannot loop.
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(v) => v,
            Err(err) => {
                warn!(dir = %dir.display(), %err, "couldn't read directory entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            dirs.push(entry);
        } else if entry.file_type().is_file() {
            files.push(entry);
        }
    }

    files.sort_by(|a, b| {
        let a = a.file_name().to_string_lossy();
        let b = b.file_name().to_string_lossy();
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(&b))
    });
    dirs.sort_by(|a, b| a.file_name().cmp(b.file_name()));

    (files, dirs)
}
