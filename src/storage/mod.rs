//! # Storage maintenance
//!
//! Game state itself lives in [`crate::game::storage`]. This module covers
//! what operators do to the database from outside the engine: manual and
//! scheduled backups, verification and restore.
//!
//! ```text
//! data/
//! └── game/            ← sled database
//! backups/
//! ├── backups.json     ← metadata for every archive
//! └── backup_*.tar.gz
//! ```

pub mod backup;
pub mod backup_scheduler;

pub use backup::{BackupKind, BackupManager, BackupMetadata};
pub use backup_scheduler::{BackupScheduler, BackupSchedulerConfig};
