//! Home directory management for the reference engine.
//!
//! ```text
//! <home>/
//! ├─ WTREF.lock        # Advisory lock, one connection per home
//! ├─ WTREF.meta        # Checkpoint: table metadata and committed rows (CBOR)
//! └─ WTREF.meta.bad    # A corrupt checkpoint set aside by salvage
//! ```

use super::store::{TableConfig, TableRows};
use crate::error::{HomeError, HomeResult};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "WTREF.lock";
const META_FILE: &str = "WTREF.meta";
const META_TEMP: &str = "WTREF.meta.tmp";
const META_QUARANTINE: &str = "WTREF.meta.bad";

/// Current checkpoint format.
const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Checkpoint {
    pub version: u32,
    pub tables: Vec<TableImage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TableImage {
    pub name: String,
    pub config: TableConfig,
    pub rows: TableRows,
}

impl Checkpoint {
    pub fn from_tables(tables: Vec<(String, TableConfig, TableRows)>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            tables: tables
                .into_iter()
                .map(|(name, config, rows)| TableImage { name, config, rows })
                .collect(),
        }
    }

    pub fn into_tables(self) -> impl Iterator<Item = (String, TableConfig, TableRows)> {
        self.tables.into_iter().map(|t| (t.name, t.config, t.rows))
    }
}

/// A locked home directory.
///
/// The lock is held for as long as this value lives.
#[derive(Debug)]
pub(crate) struct Home {
    path: PathBuf,
    _lock_file: File,
}

impl Home {
    /// Locks `path`. When the home holds no checkpoint yet, `create` must be
    /// set; an empty checkpoint is written right away so the home can be
    /// reopened without `create`.
    pub fn open(path: &Path, create: bool) -> HomeResult<Self> {
        if !path.is_dir() {
            return Err(HomeError::Missing(path.display().to_string()));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(HomeError::Locked);
        }

        let home = Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        };
        if !home.meta_path().exists() {
            if !create {
                return Err(HomeError::NotCreated(path.display().to_string()));
            }
            home.save(&Checkpoint::from_tables(Vec::new()))?;
        }
        Ok(home)
    }

    fn meta_path(&self) -> PathBuf {
        self.path.join(META_FILE)
    }

    /// Reads the checkpoint.
    pub fn load(&self) -> HomeResult<Checkpoint> {
        let file = File::open(self.meta_path())?;
        let checkpoint: Checkpoint = ciborium::from_reader(BufReader::new(file))
            .map_err(|e| HomeError::Corrupted(e.to_string()))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(HomeError::Corrupted(format!(
                "unsupported checkpoint version {}",
                checkpoint.version
            )));
        }
        Ok(checkpoint)
    }

    /// Writes the checkpoint with write-then-rename.
    pub fn save(&self, checkpoint: &Checkpoint) -> HomeResult<()> {
        let temp_path = self.path.join(META_TEMP);
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        ciborium::into_writer(checkpoint, &mut writer)
            .map_err(|e| HomeError::Checkpoint(e.to_string()))?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| HomeError::Io(e.into_error()))?
            .sync_all()?;

        fs::rename(&temp_path, self.meta_path())?;
        Ok(())
    }

    /// Moves a corrupt checkpoint aside and starts over with an empty one.
    pub fn quarantine(&self) -> HomeResult<()> {
        fs::rename(self.meta_path(), self.path.join(META_QUARANTINE))?;
        self.save(&Checkpoint::from_tables(Vec::new()))
    }
}
