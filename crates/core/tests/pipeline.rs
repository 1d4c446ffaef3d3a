use std::fs;
use std::path::{Path, PathBuf};

use filetime::{set_file_mtime, FileTime};
use image::{GenericImageView, Rgb, RgbImage};
use serde_json::Value;

use wallbuild_core::config::OutputFormat;
use wallbuild_core::index::build_indexes;
use wallbuild_core::pipeline::{clean_outputs, run_build, BuildOptions};
use wallbuild_core::thumbs::{generate_thumbnails, thumbnail_path};
use wallbuild_core::{
    BoundingBox, BuildConfig, CategoryEntry, CategorySummary, IndexDocument, SourceTree,
    ThumbStats,
};

const PAST: i64 = 1_600_000_000;

fn write_image(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb([200, 40, 90]))
        .save(path)
        .unwrap();
    set_mtime(path, PAST);
}

fn set_mtime(path: &Path, secs: i64) {
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

fn read_index(config: &BuildConfig, tree: SourceTree) -> IndexDocument {
    let raw = fs::read_to_string(config.index_path(tree)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn read_categories(config: &BuildConfig) -> CategorySummary {
    let raw = fs::read_to_string(config.categories_path()).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn without_generated_at(path: &Path) -> Value {
    let mut doc: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    doc.as_object_mut().unwrap().remove("generated_at");
    doc
}

/// `wallpapers/a.jpg` and `wallpapers/blue/b.png`, no mobile tree.
fn scenario() -> (tempfile::TempDir, BuildConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = BuildConfig::for_root(dir.path());
    let src = config.source_root(SourceTree::Desktop);
    write_image(&src.join("a.jpg"), 1200, 800);
    write_image(&src.join("blue").join("b.png"), 300, 200);
    (dir, config)
}

#[test]
fn two_tree_scenario() {
    let (_dir, config) = scenario();

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs.created, 2);
    assert_eq!(report.thumbs.failed, 0);
    assert_eq!(report.index.desktop, 2);
    assert_eq!(report.index.mobile, 0);
    assert_eq!(report.summary.total_wallpapers, 2);

    let desktop = read_index(&config, SourceTree::Desktop);
    assert_eq!(desktop.count, 2);
    let urls: Vec<&str> = desktop.wallpapers.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["wallpapers/a.jpg", "wallpapers/blue/b.png"]);
    assert_eq!(desktop.wallpapers[0].category, "uncategorized");
    assert_eq!(desktop.wallpapers[1].category, "blue");
    assert_eq!(
        desktop.wallpapers[1].thumb_url.as_deref(),
        Some("thumbnails/wallpapers-thumb/blue/b.webp")
    );
    assert!(desktop.wallpapers[0].modified.ends_with("+00:00"));

    let categories = read_categories(&config);
    assert_eq!(
        categories.desktop,
        vec![
            CategoryEntry::all(2),
            CategoryEntry::named("blue", 1),
            CategoryEntry::named("uncategorized", 1),
        ]
    );
    assert!(categories.mobile.is_empty());

    let mobile = read_index(&config, SourceTree::Mobile);
    assert_eq!(mobile.count, 0);
    assert!(mobile.wallpapers.is_empty());

    let badge: Value =
        serde_json::from_str(&fs::read_to_string(config.badge_json_path()).unwrap()).unwrap();
    assert_eq!(badge["total_wallpapers"], 2);
    assert_eq!(badge["desktop"], 2);
    assert_eq!(badge["mobile"], 0);
    assert!(badge["generated_at"].as_str().unwrap().ends_with('Z'));
    let svg = fs::read_to_string(config.badge_svg_path()).unwrap();
    assert!(svg.contains("wallpapers: 2"));
}

#[test]
fn thumbnails_fit_the_bounding_box() {
    let (_dir, config) = scenario();
    generate_thumbnails(&config).unwrap();

    let big = thumbnail_path(&config, SourceTree::Desktop, Path::new("a.jpg"));
    assert_eq!(image::open(&big).unwrap().dimensions(), (540, 360));

    // Already smaller than the box: no upscaling.
    let small = thumbnail_path(&config, SourceTree::Desktop, &Path::new("blue").join("b.png"));
    assert_eq!(image::open(&small).unwrap().dimensions(), (300, 200));
}

#[test]
fn up_to_date_artifacts_are_left_alone() {
    let (_dir, config) = scenario();
    generate_thumbnails(&config).unwrap();

    let thumb = thumbnail_path(&config, SourceTree::Desktop, Path::new("a.jpg"));
    let before = fs::read(&thumb).unwrap();
    // Same mtime as the source still counts as fresh.
    set_mtime(&thumb, PAST);

    let stats = generate_thumbnails(&config).unwrap();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.up_to_date, 2);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.failed, 0);
    assert_eq!(fs::read(&thumb).unwrap(), before);
}

#[test]
fn newer_source_regenerates() {
    let (_dir, config) = scenario();
    generate_thumbnails(&config).unwrap();

    let src = config.source_root(SourceTree::Desktop).join("a.jpg");
    let thumb = thumbnail_path(&config, SourceTree::Desktop, Path::new("a.jpg"));
    set_mtime(&thumb, PAST);
    set_mtime(&src, PAST + 60);

    let stats = generate_thumbnails(&config).unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.up_to_date, 1);
}

#[test]
fn animated_sources_never_get_thumbnails() {
    let dir = tempfile::tempdir().unwrap();
    let config = BuildConfig::for_root(dir.path());
    let src = config.source_root(SourceTree::Mobile);
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("anim.gif"), b"GIF89a not really").unwrap();

    // Left over from an earlier configuration.
    let stray = thumbnail_path(&config, SourceTree::Mobile, Path::new("anim.gif"));
    fs::create_dir_all(stray.parent().unwrap()).unwrap();
    fs::write(&stray, b"stale").unwrap();

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs.skipped, 1);
    assert_eq!(report.thumbs.created, 0);
    assert_eq!(report.thumbs.failed, 0);
    assert_eq!(fs::read(&stray).unwrap(), b"stale");

    let mobile = read_index(&config, SourceTree::Mobile);
    assert_eq!(mobile.count, 1);
    assert_eq!(mobile.wallpapers[0].thumb_url, None);
}

#[test]
fn vector_sources_are_indexed_without_thumbnails() {
    let dir = tempfile::tempdir().unwrap();
    let config = BuildConfig::for_root(dir.path());
    let src = config.source_root(SourceTree::Desktop);
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("logo.svg"), b"<svg/>").unwrap();

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs, ThumbStats::default());
    let desktop = read_index(&config, SourceTree::Desktop);
    assert_eq!(desktop.wallpapers[0].filename, "logo.svg");
    assert_eq!(desktop.wallpapers[0].thumb_url, None);
}

#[test]
fn only_animated_sources_count_as_skipped() {
    let (_dir, config) = scenario();
    let src = config.source_root(SourceTree::Desktop);
    fs::write(src.join("anim.gif"), b"GIF89a not really").unwrap();
    fs::write(src.join("blue").join("logo.svg"), b"<svg/>").unwrap();

    let stats = generate_thumbnails(&config).unwrap();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
    assert!(!thumbnail_path(&config, SourceTree::Desktop, &Path::new("blue").join("logo.svg")).exists());
}

#[test]
fn encoder_rejection_is_a_per_file_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = BuildConfig::for_root(dir.path());
    config.desktop.max_size = BoundingBox::new(20_000, 20_000);
    let src = config.source_root(SourceTree::Desktop);
    write_image(&src.join("a-wide.png"), 17_000, 1);
    write_image(&src.join("b-ok.png"), 10, 10);

    let stats = generate_thumbnails(&config).unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.created, 1);
    assert!(!thumbnail_path(&config, SourceTree::Desktop, Path::new("a-wide.png")).exists());
    assert!(thumbnail_path(&config, SourceTree::Desktop, Path::new("b-ok.png")).is_file());
}

#[test]
fn broken_file_is_counted_and_batch_continues() {
    let (_dir, config) = scenario();
    let src = config.source_root(SourceTree::Desktop);
    fs::write(src.join("0-broken.jpg"), b"this is not a jpeg").unwrap();

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs.failed, 1);
    assert_eq!(report.thumbs.created, 2);

    let desktop = read_index(&config, SourceTree::Desktop);
    assert_eq!(desktop.count, 3);
    assert_eq!(desktop.wallpapers[0].filename, "0-broken.jpg");
    assert_eq!(desktop.wallpapers[0].thumb_url, None);
    assert!(desktop.wallpapers[1].thumb_url.is_some());
}

#[test]
fn missing_trees_produce_empty_documents() {
    let dir = tempfile::tempdir().unwrap();
    let config = BuildConfig::for_root(dir.path());

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs, ThumbStats::default());
    assert_eq!(report.summary.total_wallpapers, 0);

    for tree in SourceTree::ALL {
        let doc = read_index(&config, tree);
        assert_eq!(doc.count, 0);
        assert!(doc.wallpapers.is_empty());
    }
    assert_eq!(read_categories(&config), CategorySummary::default());
    assert!(!config.thumb_root(SourceTree::Desktop).exists());
}

#[test]
fn rebuilding_without_changes_is_idempotent() {
    let (_dir, config) = scenario();
    run_build(&config, BuildOptions::default()).unwrap();
    let first: Vec<Value> = SourceTree::ALL
        .iter()
        .map(|&tree| without_generated_at(&config.index_path(tree)))
        .collect();
    let first_categories = fs::read(config.categories_path()).unwrap();

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs.created, 0);
    assert_eq!(report.thumbs.up_to_date, 2);

    let second: Vec<Value> = SourceTree::ALL
        .iter()
        .map(|&tree| without_generated_at(&config.index_path(tree)))
        .collect();
    assert_eq!(first, second);
    assert_eq!(first_categories, fs::read(config.categories_path()).unwrap());
}

#[test]
fn record_urls_point_at_the_source_files() {
    let (_dir, config) = scenario();
    build_indexes(&config).unwrap();

    let desktop = read_index(&config, SourceTree::Desktop);
    for record in &desktop.wallpapers {
        let path: PathBuf = config.root.join(&record.url);
        let md = fs::metadata(&path).unwrap();
        assert_eq!(md.len(), record.size, "{}", record.url);
        // No thumbnails generated yet.
        assert_eq!(record.thumb_url, None);
    }
}

#[test]
fn clean_build_recreates_everything() {
    let (_dir, config) = scenario();
    run_build(&config, BuildOptions::default()).unwrap();

    let report = run_build(&config, BuildOptions { clean: true }).unwrap();
    assert_eq!(report.thumbs.created, 2);
    assert_eq!(report.thumbs.up_to_date, 0);
    assert!(config.badge_json_path().exists());
}

#[test]
fn clean_removes_thumbnails_and_json() {
    let (_dir, config) = scenario();
    run_build(&config, BuildOptions::default()).unwrap();
    fs::write(config.favorites_path(), r#"{"favorites": []}"#).unwrap();

    assert_eq!(clean_outputs(&config).unwrap(), 5);
    assert!(!config.thumbnail_root().exists());
    for path in config.generated_json_paths() {
        assert!(!path.exists(), "{}", path.display());
    }
    assert!(config.favorites_path().exists());
    assert!(config.badge_svg_path().exists());
    assert_eq!(clean_outputs(&config).unwrap(), 0);
}

#[test]
fn jpeg_output_format() {
    let (_dir, mut config) = scenario();
    config.output_format = OutputFormat::Jpeg;
    config.quality = 70;

    let report = run_build(&config, BuildOptions::default()).unwrap();
    assert_eq!(report.thumbs.created, 2);
    let thumb = thumbnail_path(&config, SourceTree::Desktop, Path::new("a.jpg"));
    assert!(thumb.ends_with("thumbnails/wallpapers-thumb/a.jpg"));
    let format = image::io::Reader::open(&thumb)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format();
    assert_eq!(format, Some(image::ImageFormat::Jpeg));
    assert_eq!(image::open(&thumb).unwrap().dimensions(), (540, 360));
}

#[test]
fn invalid_config_is_rejected_before_any_work() {
    let (_dir, mut config) = scenario();
    config.quality = 0;
    assert!(run_build(&config, BuildOptions::default()).is_err());
    assert!(!config.thumbnail_root().exists());
}
