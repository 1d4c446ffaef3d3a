use std::collections::BTreeMap;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::config::BuildConfig;
use crate::error::Result;
use crate::fsio::{posix_path, write_json_atomic};
use crate::models::{
    CategoryEntry, CategorySummary, ImageAsset, IndexDocument, IndexRecord, IndexStats,
    SourceTree,
};
use crate::scan::{scan_tree, ScanConfig};
use crate::thumbs::{thumbnail_path, thumbnail_url};

pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// The artifact url for `asset`, checked against the filesystem every call.
/// Formats that never get thumbnails resolve to `None` even when a stray
/// file sits at the conventional path.
pub fn thumbnail_reference(
    config: &BuildConfig,
    tree: SourceTree,
    asset: &ImageAsset,
) -> Option<String> {
    if !config
        .classify(asset.extension().as_deref())
        .is_thumbnailable()
    {
        return None;
    }
    thumbnail_path(config, tree, &asset.rel_path)
        .is_file()
        .then(|| thumbnail_url(config, tree, &asset.rel_path))
}

pub fn build_record(config: &BuildConfig, tree: SourceTree, asset: &ImageAsset) -> IndexRecord {
    let url = posix_path(&config.tree(tree).source_dir.join(&asset.rel_path));
    IndexRecord {
        filename: asset.file_name.clone(),
        url,
        thumb_url: thumbnail_reference(config, tree, asset),
        size: asset.size_bytes,
        modified: format_timestamp(asset.modified_at),
        category: asset.category.clone(),
    }
}

pub fn build_records(
    config: &BuildConfig,
    tree: SourceTree,
    assets: &[ImageAsset],
) -> Vec<IndexRecord> {
    assets
        .iter()
        .map(|asset| build_record(config, tree, asset))
        .collect()
}

/// `all` first, then one entry per category in label order. No records, no
/// entries.
pub fn summarize_categories(records: &[IndexRecord]) -> Vec<CategoryEntry> {
    if records.is_empty() {
        return Vec::new();
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for rec in records {
        *counts.entry(rec.category.as_str()).or_default() += 1;
    }

    let mut entries = Vec::with_capacity(counts.len() + 1);
    entries.push(CategoryEntry::all(records.len()));
    entries.extend(
        counts
            .into_iter()
            .map(|(name, count)| CategoryEntry::named(name, count)),
    );
    entries
}

/// Rescans one tree and replaces its index document.
pub fn write_index(config: &BuildConfig, tree: SourceTree) -> Result<IndexDocument> {
    let assets = scan_tree(&ScanConfig::for_tree(config, tree))?;
    let records = build_records(config, tree, &assets);
    let doc = IndexDocument {
        generated_at: format_timestamp(SystemTime::now()),
        count: records.len(),
        wallpapers: records,
    };

    let path = config.index_path(tree);
    write_json_atomic(&path, &doc)?;
    info!(tree = %tree, path = %path.display(), count = doc.count, "wrote index");
    Ok(doc)
}

/// Writes both tree indexes and the combined category document.
pub fn build_indexes(config: &BuildConfig) -> Result<IndexStats> {
    let mut stats = IndexStats::default();
    let mut categories = CategorySummary::default();

    for tree in SourceTree::ALL {
        let doc = write_index(config, tree)?;
        stats.set(tree, doc.count);
        *categories.entries_mut(tree) = summarize_categories(&doc.wallpapers);
    }

    let path = config.categories_path();
    write_json_atomic(&path, &categories)?;
    info!(path = %path.display(), "wrote categories");

    if stats.total() == 0 {
        info!("no images found in either source tree");
    }
    Ok(stats)
}
