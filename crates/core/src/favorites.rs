use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::fsio::write_json_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    pub favorites: Vec<String>,
}

/// Splits every input on commas, dropping blanks.
pub fn parse_names<I, S>(inputs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .flat_map(|input| {
            input
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn load_favorites(path: &Path) -> Vec<String> {
    let raw = match fs::read_to_string(path) {
        Ok(v) => v,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "couldn't read favorites");
            return Vec::new();
        }
    };

    let doc: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(err) => {
            warn!(path = %path.display(), %err, "couldn't parse favorites");
            return Vec::new();
        }
    };

    match doc.get("favorites").and_then(Value::as_array) {
        Some(list) => list
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    }
}

/// Appends the names not already present (case-sensitive) and returns how
/// many were added. The file is only rewritten when that number is non-zero.
pub fn add_favorites(path: &Path, names: &[String]) -> Result<usize> {
    let mut favorites = load_favorites(path);
    let mut seen: HashSet<String> = favorites.iter().cloned().collect();

    let mut added = 0;
    for name in names {
        if seen.insert(name.clone()) {
            favorites.push(name.clone());
            added += 1;
        }
    }

    if added > 0 {
        let count = favorites.len();
        write_json_atomic(path, &Favorites { favorites })?;
        info!(path = %path.display(), count, added, "wrote favorites");
    } else {
        info!("no new favorites to add");
    }
    Ok(added)
}
