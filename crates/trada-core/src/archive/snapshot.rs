//! On-disk price snapshots: one JSON array of prices per file.

use chrono::SecondsFormat;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::Archive;
use crate::error::{Error, Result};
use crate::types::Price;

const SNAPSHOT_EXTENSION: &str = "json";
const MAX_SAME_SECOND_SNAPSHOTS: u32 = 999;

/// File name for a batch: the RFC3339 timestamp of its first price.
pub fn snapshot_file_name(prices: &[Price]) -> Option<String> {
    prices.first().map(|first| numbered_file_name(&stamp(first), 0))
}

fn stamp(price: &Price) -> String {
    price.at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `~NNN` sorts after the unsuffixed name, so same-second batches replay in
/// write order.
fn numbered_file_name(stamp: &str, n: u32) -> String {
    match n {
        0 => format!("{}.{}", stamp, SNAPSHOT_EXTENSION),
        n => format!("{}~{:03}.{}", stamp, n, SNAPSHOT_EXTENSION),
    }
}

/// Write a batch into `dir`. Empty batches are not written and existing
/// files are never overwritten.
pub fn write_snapshot(dir: &Path, prices: &[Price]) -> Result<Option<PathBuf>> {
    let Some(first) = prices.first() else {
        return Ok(None);
    };
    fs::create_dir_all(dir)?;
    let contents = serde_json::to_vec(prices)?;
    let stamp = stamp(first);

    for n in 0..=MAX_SAME_SECOND_SNAPSHOTS {
        let path = dir.join(numbered_file_name(&stamp, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(&contents)?;
                if n > 0 {
                    warn!(path = %path.display(), "Snapshot name taken, wrote numbered file");
                }
                return Ok(Some(path));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("too many snapshots stamped {}", stamp),
    )
    .into())
}

pub fn read_snapshot(path: &Path) -> Result<Vec<Price>> {
    let contents = fs::read(path)?;
    Ok(serde_json::from_slice(&contents)?)
}

fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl Archive {
    /// Replay every `*.json` snapshot in `dir`, in file-name order, through
    /// the same validation path as live ticks.
    ///
    /// The first bad file aborts the load. Returns the number of prices
    /// loaded.
    pub fn load_prices(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let started = Instant::now();
        let files = snapshot_files(dir).map_err(|e| Error::Snapshot {
            path: dir.display().to_string(),
            source: Box::new(e),
        })?;

        info!(files = files.len(), dir = %dir.display(), "Loading prices");

        let mut loaded = 0;
        for path in &files {
            loaded += self.load_prices_from(path).map_err(|e| Error::Snapshot {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        }

        info!(
            prices = loaded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prices loaded"
        );
        Ok(loaded)
    }

    fn load_prices_from(&self, path: &Path) -> Result<usize> {
        let prices = read_snapshot(path)?;
        let count = prices.len();
        for price in prices {
            self.add_price(price)?;
        }
        Ok(count)
    }

    /// Write `prices` as a snapshot file in `dir`.
    pub fn save_prices(&self, dir: impl AsRef<Path>, prices: &[Price]) -> Result<Option<PathBuf>> {
        write_snapshot(dir.as_ref(), prices)
    }
}
