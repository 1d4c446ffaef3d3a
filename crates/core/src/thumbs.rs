use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use tracing::{debug, info, warn};

use crate::config::{AssetKind, BuildConfig, OutputFormat};
use crate::error::{Error, Result};
use crate::fsio::{posix_path, write_atomic};
use crate::models::{BoundingBox, ImageAsset, SourceTree, ThumbStats};
use crate::scan::{scan_tree, ScanConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbOutcome {
    Created,
    UpToDate,
    Skipped,
    Failed,
    /// Not a raster format (svg); left to the index, never counted.
    NotRaster,
}

/// Where the artifact for `rel_path` lives: the tree's thumbnail directory,
/// mirroring the category folder, with the output format's extension.
pub fn thumbnail_path(config: &BuildConfig, tree: SourceTree, rel_path: &Path) -> PathBuf {
    config
        .thumb_root(tree)
        .join(rel_path)
        .with_extension(config.output_format.extension())
}

/// Same location as [`thumbnail_path`], relative to the project root.
pub fn thumbnail_url(config: &BuildConfig, tree: SourceTree, rel_path: &Path) -> String {
    let rel = config
        .thumbnail_dir
        .join(&config.tree(tree).thumb_dir)
        .join(rel_path)
        .with_extension(config.output_format.extension());
    posix_path(&rel)
}

/// True when the artifact is missing, unreadable, or strictly older than the
/// source.
pub fn needs_refresh(src_modified: SystemTime, dest: &Path) -> bool {
    match fs::metadata(dest).and_then(|md| md.modified()) {
        Ok(dest_modified) => src_modified > dest_modified,
        Err(_) => true,
    }
}

/// Largest size with the same aspect ratio that fits inside `max`.
/// Images already inside the box keep their size.
pub fn fit_within(width: u32, height: u32, max: BoundingBox) -> (u32, u32) {
    if width <= max.max_width && height <= max.max_height {
        return (width, height);
    }

    let scale = f64::min(
        max.max_width as f64 / width as f64,
        max.max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, max.max_width);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max.max_height);
    (w, h)
}

/// Decodes `src`, shrinks it into `max` and encodes it in `format`.
pub fn render_thumbnail(
    src: &Path,
    max: BoundingBox,
    format: OutputFormat,
    quality: u8,
) -> Result<(Vec<u8>, (u32, u32))> {
    let img = image::io::Reader::open(src)?
        .with_guessed_format()?
        .decode()?;

    let (w, h) = img.dimensions();
    let (tw, th) = fit_within(w, h, max);
    let img = if (tw, th) != (w, h) {
        img.resize_exact(tw, th, FilterType::Lanczos3)
    } else {
        img
    };
    let img = DynamicImage::ImageRgb8(img.to_rgb8());

    let bytes = match format {
        OutputFormat::Webp => {
            let encoder = webp::Encoder::from_image(&img).map_err(|reason| Error::Encode {
                path: src.to_path_buf(),
                reason: reason.to_string(),
            })?;
            encoder
                .encode_simple(false, f32::from(quality))
                .map_err(|reason| Error::Encode {
                    path: src.to_path_buf(),
                    reason: format!("{reason:?}"),
                })?
                .to_vec()
        }
        OutputFormat::Jpeg => {
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, ImageOutputFormat::Jpeg(quality))?;
            buf.into_inner()
        }
    };

    Ok((bytes, (tw, th)))
}

pub fn process_asset(
    config: &BuildConfig,
    tree: SourceTree,
    src_root: &Path,
    asset: &ImageAsset,
) -> ThumbOutcome {
    match config.classify(asset.extension().as_deref()) {
        AssetKind::Raster => {}
        AssetKind::Animated => {
            debug!(file = %asset.rel_path.display(), "skipping animated format");
            return ThumbOutcome::Skipped;
        }
        AssetKind::Vector => {
            debug!(file = %asset.rel_path.display(), "skipping non-raster");
            return ThumbOutcome::NotRaster;
        }
    }

    let dest = thumbnail_path(config, tree, &asset.rel_path);
    if !needs_refresh(asset.modified_at, &dest) {
        debug!(thumb = %dest.display(), "up to date");
        return ThumbOutcome::UpToDate;
    }

    let src = src_root.join(&asset.rel_path);
    let max = config.tree(tree).max_size;
    let rendered = render_thumbnail(&src, max, config.output_format, config.quality)
        .and_then(|(bytes, dims)| write_atomic(&dest, &bytes).map(|_| dims));

    match rendered {
        Ok((w, h)) => {
            info!(thumb = %dest.display(), "thumbnail {w}x{h}");
            ThumbOutcome::Created
        }
        Err(err) => {
            warn!(file = %src.display(), %err, "failed to create thumbnail");
            ThumbOutcome::Failed
        }
    }
}

/// Brings every artifact of one tree up to date. Per-file problems are
/// counted, only directory-level failures are returned as errors.
pub fn generate_tree_thumbnails(config: &BuildConfig, tree: SourceTree) -> Result<ThumbStats> {
    let mut stats = ThumbStats::default();
    let src_root = config.source_root(tree);
    if !src_root.is_dir() {
        info!(tree = %tree, root = %src_root.display(), "source not found, skipping thumbnails");
        return Ok(stats);
    }

    fs::create_dir_all(config.thumb_root(tree))?;

    let assets = scan_tree(&ScanConfig::for_tree(config, tree))?;
    for asset in &assets {
        match process_asset(config, tree, &src_root, asset) {
            ThumbOutcome::Created => stats.created += 1,
            ThumbOutcome::UpToDate => stats.up_to_date += 1,
            ThumbOutcome::Skipped => stats.skipped += 1,
            ThumbOutcome::Failed => stats.failed += 1,
            ThumbOutcome::NotRaster => {}
        }
    }

    info!(
        tree = %tree,
        created = stats.created,
        up_to_date = stats.up_to_date,
        skipped = stats.skipped,
        failed = stats.failed,
        "thumbnails done"
    );
    Ok(stats)
}

pub fn generate_thumbnails(config: &BuildConfig) -> Result<ThumbStats> {
    let mut stats = ThumbStats::default();
    for tree in SourceTree::ALL {
        stats.merge(generate_tree_thumbnails(config, tree)?);
    }
    info!(processed = stats.processed(), "thumbnail stage finished");
    Ok(stats)
}
