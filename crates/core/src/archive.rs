use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::fsio::{make_world_readable, posix_path};
use crate::models::SourceTree;

const DEFLATE_LEVEL: i32 = 9;
const ZIP32_LIMIT: u64 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub files: u64,
    pub bytes: u64,
    pub verified: bool,
}

/// Packs every file below `project_root/source_dir` into a deflated zip.
/// Entry names keep the `source_dir` prefix. Returns `None` when the source
/// directory does not exist.
pub fn create_archive(
    project_root: &Path,
    source_dir: &Path,
    out_path: &Path,
) -> Result<Option<ArchiveReport>> {
    let src = project_root.join(source_dir);
    if !src.is_dir() {
        info!(source = %src.display(), "source not found, skipping archive");
        return Ok(None);
    }

    let parent = match out_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    info!(archive = %out_path.display(), source = %src.display(), "creating archive");
    let tmp = NamedTempFile::new_in(parent)?;
    make_world_readable(tmp.as_file())?;
    let mut writer = ZipWriter::new(tmp);
    let mut files = 0u64;

    for entry in WalkDir::new(&src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(&src).map_err(|_| {
            Error::InvalidArgument(format!("{} escapes its root", entry.path().display()))
        })?;
        let name = posix_path(&source_dir.join(rel));
        let size = entry.metadata().map_err(io::Error::from)?.len();
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(DEFLATE_LEVEL))
            .large_file(size >= ZIP32_LIMIT);

        debug!(entry = %name, size, "adding");
        writer.start_file(name.as_str(), options)?;
        io::copy(&mut File::open(entry.path())?, &mut writer)?;
        files += 1;
    }

    let tmp = writer.finish()?;
    tmp.persist(out_path).map_err(|err| Error::Io(err.error))?;

    let bytes = fs::metadata(out_path)?.len();
    let verified = match verify_archive(out_path, files) {
        Ok(v) => v,
        Err(err) => {
            warn!(archive = %out_path.display(), %err, "archive failed to read back");
            false
        }
    };
    if verified {
        info!(archive = %out_path.display(), files, bytes, "archive written and verified");
    } else {
        warn!(archive = %out_path.display(), files, bytes, "archive integrity check failed");
    }

    Ok(Some(ArchiveReport {
        path: out_path.to_path_buf(),
        files,
        bytes,
        verified,
    }))
}

/// Reads every entry to the end so each CRC gets checked; the entry count
/// catches missing files.
pub fn verify_archive(path: &Path, expected_files: u64) -> Result<bool> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        io::copy(&mut entry, &mut io::sink())?;
    }
    Ok(archive.len() as u64 == expected_files)
}

/// Archives both source trees. A tree that fails is logged and left out.
pub fn create_archives(config: &BuildConfig) -> Vec<ArchiveReport> {
    let mut reports = Vec::new();
    for tree in SourceTree::ALL {
        let source_dir = &config.tree(tree).source_dir;
        let out = config.archive_path(tree);
        match create_archive(&config.root, source_dir, &out) {
            Ok(Some(report)) => reports.push(report),
            Ok(None) => {}
            Err(err) => {
                warn!(tree = %tree, archive = %out.display(), %err, "error creating archive")
            }
        }
    }
    if reports.is_empty() {
        warn!("no archives created (source directories missing?)");
    }
    reports
}
