use tracing::info;

use crate::badge::{compute_summary, write_badge};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::fsio::remove_path_if_exists;
use crate::index::build_indexes;
use crate::models::{BuildSummary, IndexStats, ThumbStats};
use crate::thumbs::generate_thumbnails;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Remove the artifact tree and generated JSON before building.
    pub clean: bool,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub thumbs: ThumbStats,
    pub index: IndexStats,
    pub summary: BuildSummary,
}

/// Deletes the thumbnail tree and the four generated JSON documents.
/// Returns how many of them existed.
pub fn clean_outputs(config: &BuildConfig) -> Result<usize> {
    let mut removed = 0;
    let thumbs = config.thumbnail_root();
    if remove_path_if_exists(&thumbs)? {
        info!(path = %thumbs.display(), "removed thumbnails");
        removed += 1;
    }
    for path in config.generated_json_paths() {
        if remove_path_if_exists(&path)? {
            info!(path = %path.display(), "removed");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Thumbnails, then indexes, then the badge. Any stage error stops the run;
/// per-file thumbnail failures only show up in the counters.
pub fn run_build(config: &BuildConfig, options: BuildOptions) -> Result<BuildReport> {
    config.validate()?;
    info!(root = %config.root.display(), "starting full pipeline");

    if options.clean {
        clean_outputs(config).map_err(|err| Error::stage("clean", err))?;
    }

    let thumbs = generate_thumbnails(config).map_err(|err| Error::stage("thumbnails", err))?;
    let index = build_indexes(config).map_err(|err| Error::stage("index", err))?;

    let summary = compute_summary(config);
    write_badge(config, &summary).map_err(|err| Error::stage("badge", err))?;

    info!(total = summary.total_wallpapers, "pipeline done");
    Ok(BuildReport {
        thumbs,
        index,
        summary,
    })
}
