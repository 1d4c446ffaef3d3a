use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wallbuild_core::archive::create_archives;
use wallbuild_core::badge::{compute_summary, write_badge};
use wallbuild_core::favorites::{add_favorites, parse_names};
use wallbuild_core::index::build_indexes;
use wallbuild_core::pipeline::{clean_outputs, run_build, BuildOptions};
use wallbuild_core::thumbs::generate_thumbnails;
use wallbuild_core::{BuildConfig, Error};

const EXIT_STAGE_FAILED: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "wallbuild", version, about = "Build thumbnails, indexes and badges for the wallpaper gallery")]
struct Cli {
    /// Project root containing the source trees.
    #[arg(long, env = "WALLBUILD_ROOT")]
    root: Option<PathBuf>,

    /// JSON file overriding the default layout.
    #[arg(long, env = "WALLBUILD_CONFIG")]
    config: Option<PathBuf>,

    /// Remove thumbnails and generated JSON before building.
    #[arg(long)]
    clean: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Full pipeline: thumbnails, indexes, badge (default).
    Build {
        #[arg(long)]
        clean: bool,
    },
    /// Only bring thumbnails up to date.
    Thumbs,
    /// Only rewrite the index and category documents.
    Index,
    /// Recompute badge.json and badge.svg from the existing indexes.
    Badge,
    /// Remove thumbnails and generated JSON.
    Clean,
    /// Package each source tree into a compressed archive.
    Archive,
    /// Edit json/favorites.json.
    Favorites {
        #[command(subcommand)]
        action: FavoritesCommand,
    },
}

#[derive(Debug, Subcommand)]
enum FavoritesCommand {
    /// Append file names (comma or space separated); prompts when none given.
    Add { names: Vec<String> },
}

fn main() {
    init_tracing();

    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{err}");
            let code = match err {
                Error::Stage { .. } => EXIT_STAGE_FAILED,
                _ => EXIT_USAGE,
            };
            std::process::exit(code);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> wallbuild_core::Result<BuildConfig> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::from_json_file(path)?,
        None => BuildConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    config.validate()?;
    Ok(config)
}

/// `--clean` only makes sense in front of a full build.
fn check_flags(cli: &Cli) -> wallbuild_core::Result<()> {
    match cli.command {
        None | Some(Command::Build { .. }) | Some(Command::Clean) => Ok(()),
        Some(_) if cli.clean => Err(Error::InvalidArgument(
            "--clean only applies to `build`; run `wallbuild clean` first".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn real_main() -> wallbuild_core::Result<i32> {
    let cli = Cli::parse();
    check_flags(&cli)?;
    let config = load_config(&cli)?;

    match cli.command {
        None => build(&config, cli.clean),
        Some(Command::Build { clean }) => build(&config, clean || cli.clean),
        Some(Command::Thumbs) => {
            let stats = generate_thumbnails(&config).map_err(|e| Error::stage("thumbnails", e))?;
            println!("{stats}");
            Ok(0)
        }
        Some(Command::Index) => {
            let stats = build_indexes(&config).map_err(|e| Error::stage("index", e))?;
            println!("{stats}");
            Ok(0)
        }
        Some(Command::Badge) => {
            let summary = compute_summary(&config);
            write_badge(&config, &summary).map_err(|e| Error::stage("badge", e))?;
            println!("BADGE total={}", summary.total_wallpapers);
            Ok(0)
        }
        Some(Command::Clean) => {
            let removed = clean_outputs(&config).map_err(|e| Error::stage("clean", e))?;
            println!("CLEAN removed={removed}");
            Ok(0)
        }
        Some(Command::Archive) => {
            let reports = create_archives(&config);
            for report in &reports {
                println!(
                    "ARCHIVE path={} files={} bytes={} verified={}",
                    report.path.display(),
                    report.files,
                    report.bytes,
                    report.verified
                );
            }
            Ok(if reports.is_empty() { EXIT_STAGE_FAILED } else { 0 })
        }
        Some(Command::Favorites {
            action: FavoritesCommand::Add { names },
        }) => {
            let names = if names.is_empty() {
                prompt_names()?
            } else {
                parse_names(&names)
            };
            if names.is_empty() {
                info!("no filenames provided");
                return Ok(0);
            }
            let added = add_favorites(&config.favorites_path(), &names)?;
            println!("FAVORITES added={added}");
            Ok(0)
        }
    }
}

fn build(config: &BuildConfig, clean: bool) -> wallbuild_core::Result<i32> {
    if clean {
        info!("clean requested");
    }
    let report = run_build(config, BuildOptions { clean })?;
    println!("{}", report.thumbs);
    println!("{}", report.index);
    println!("BADGE total={}", report.summary.total_wallpapers);
    Ok(0)
}

fn prompt_names() -> wallbuild_core::Result<Vec<String>> {
    eprintln!("Enter filenames to add to favorites. Separate by commas or new lines. Empty line to finish.");
    let stdin = io::stdin();
    let mut lines = Vec::new();
    loop {
        eprint!("> ");
        io::stderr().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        lines.push(line.to_string());
    }
    Ok(parse_names(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn clean_is_accepted_for_builds() {
        check_flags(&parse(&["wallbuild", "--clean"])).unwrap();
        check_flags(&parse(&["wallbuild", "--clean", "build"])).unwrap();
        check_flags(&parse(&["wallbuild", "build", "--clean"])).unwrap();
        check_flags(&parse(&["wallbuild", "--clean", "clean"])).unwrap();
    }

    #[test]
    fn clean_is_rejected_for_single_stages() {
        for cmd in ["thumbs", "index", "badge", "archive"] {
            let err = check_flags(&parse(&["wallbuild", "--clean", cmd])).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{cmd}");
        }
        check_flags(&parse(&["wallbuild", "thumbs"])).unwrap();
    }
}
