//! Backups of the game database.
//!
//! A backup is a gzipped tar of the sled directory plus a SHA-256 checksum.
//! Metadata for every archive lives in `backups.json` next to the archives.
//! Automatic backups are pruned to a retention count; manual ones are kept
//! until removed by hand.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tar::{Archive, Builder};

/// Top-level directory name inside every archive.
const ARCHIVE_ROOT: &str = "game";
const METADATA_FILE: &str = "backups.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupMetadata {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub kind: BackupKind,
    pub checksum: String,
    pub verified: bool,
    /// Archive file name relative to the backup directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Manual,
    Automatic,
}

pub struct BackupManager {
    db_path: PathBuf,
    backup_path: PathBuf,
    /// Automatic backups kept by `prune`.
    keep_automatic: usize,
    backups: BTreeMap<String, BackupMetadata>,
}

impl BackupManager {
    pub fn new(db_path: PathBuf, backup_path: PathBuf, keep_automatic: usize) -> Result<Self> {
        fs::create_dir_all(&backup_path)
            .with_context(|| format!("Failed to create backup directory {}", backup_path.display()))?;
        let mut manager = Self {
            db_path,
            backup_path,
            keep_automatic,
            backups: BTreeMap::new(),
        };
        manager.load_metadata()?;
        Ok(manager)
    }

    fn load_metadata(&mut self) -> Result<()> {
        let path = self.backup_path.join(METADATA_FILE);
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            self.backups = serde_json::from_str(&contents)
                .with_context(|| format!("Corrupt backup metadata {}", path.display()))?;
        }
        Ok(())
    }

    fn save_metadata(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.backups)?;
        fs::write(self.backup_path.join(METADATA_FILE), contents)?;
        Ok(())
    }

    /// Archive the database directory. Flush the store before calling this.
    pub fn create_backup(&mut self, name: Option<String>, kind: BackupKind) -> Result<BackupMetadata> {
        if !self.db_path.is_dir() {
            return Err(anyhow!("Database directory {} does not exist", self.db_path.display()));
        }
        let created_at = Utc::now();
        let id = format!("backup_{}", created_at.format("%Y%m%d_%H%M%S_%3f"));
        let filename = format!("{}.tar.gz", id);
        let archive_path = self.backup_path.join(&filename);

        let encoder = GzEncoder::new(File::create(&archive_path)?, Compression::default());
        let mut tar = Builder::new(encoder);
        tar.append_dir_all(ARCHIVE_ROOT, &self.db_path)?;
        // The gzip trailer must be written before the checksum is taken.
        tar.into_inner()?.finish()?;

        let metadata = BackupMetadata {
            id: id.clone(),
            name,
            created_at,
            size_bytes: fs::metadata(&archive_path)?.len(),
            kind,
            checksum: checksum(&archive_path)?,
            verified: false,
            path: PathBuf::from(&filename),
        };
        self.backups.insert(id.clone(), metadata.clone());
        self.save_metadata()?;
        info!("backup: created {} ({:?}, {} bytes)", id, kind, metadata.size_bytes);
        Ok(metadata)
    }

    fn archive_of(&self, backup_id: &str) -> Result<(&BackupMetadata, PathBuf)> {
        let metadata = self
            .backups
            .get(backup_id)
            .ok_or_else(|| anyhow!("Backup {} not found", backup_id))?;
        let file = self.backup_path.join(&metadata.path);
        if !file.exists() {
            return Err(anyhow!("Backup file {} is missing", file.display()));
        }
        Ok((metadata, file))
    }

    /// Recompute the checksum; marks the backup verified when it matches.
    pub fn verify_backup(&mut self, backup_id: &str) -> Result<bool> {
        let (metadata, file) = self.archive_of(backup_id)?;
        let valid = checksum(&file)? == metadata.checksum;
        if valid {
            if let Some(meta) = self.backups.get_mut(backup_id) {
                meta.verified = true;
            }
            self.save_metadata()?;
            info!("backup: {} verified", backup_id);
        } else {
            error!("backup: {} FAILED verification (checksum mismatch)", backup_id);
        }
        Ok(valid)
    }

    /// Replace the database directory with the contents of a backup.
    ///
    /// The server must not be running. The current directory is moved aside
    /// to `<db>.pre-restore-<timestamp>` rather than deleted.
    pub fn restore_backup(&self, backup_id: &str) -> Result<PathBuf> {
        let (metadata, file) = self.archive_of(backup_id)?;
        if checksum(&file)? != metadata.checksum {
            return Err(anyhow!("Backup {} checksum mismatch; refusing to restore", backup_id));
        }
        let parent = self
            .db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let staging = parent.join(format!(".restore-{}", backup_id));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        Archive::new(GzDecoder::new(File::open(&file)?)).unpack(&staging)?;
        let unpacked = staging.join(ARCHIVE_ROOT);
        if !unpacked.is_dir() {
            fs::remove_dir_all(&staging)?;
            return Err(anyhow!("Backup {} does not contain a game database", backup_id));
        }

        let mut moved_aside = self.db_path.clone();
        if self.db_path.exists() {
            let stamp = Utc::now().format("%Y%m%d_%H%M%S");
            moved_aside = parent.join(format!(
                "{}.pre-restore-{}",
                self.db_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "game".to_string()),
                stamp
            ));
            fs::rename(&self.db_path, &moved_aside)?;
            warn!("backup: previous database moved to {}", moved_aside.display());
        }
        fs::rename(&unpacked, &self.db_path)?;
        fs::remove_dir_all(&staging)?;
        info!("backup: restored {} into {}", backup_id, self.db_path.display());
        Ok(moved_aside)
    }

    /// Delete automatic backups beyond the retention count, oldest first.
    pub fn prune(&mut self) -> Result<Vec<String>> {
        let mut automatic: Vec<&BackupMetadata> = self
            .backups
            .values()
            .filter(|b| b.kind == BackupKind::Automatic)
            .collect();
        automatic.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let doomed: Vec<String> = automatic
            .iter()
            .skip(self.keep_automatic)
            .map(|b| b.id.clone())
            .collect();
        for id in &doomed {
            if let Some(meta) = self.backups.remove(id) {
                let file = self.backup_path.join(&meta.path);
                if file.exists() {
                    fs::remove_file(&file)?;
                }
                info!("backup: pruned {}", id);
            }
        }
        if !doomed.is_empty() {
            self.save_metadata()?;
        }
        Ok(doomed)
    }

    /// Newest first.
    pub fn list_backups(&self) -> Vec<BackupMetadata> {
        let mut backups: Vec<_> = self.backups.values().cloned().collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        backups
    }

    pub fn get_backup(&self, backup_id: &str) -> Option<&BackupMetadata> {
        self.backups.get(backup_id)
    }
}

fn checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
