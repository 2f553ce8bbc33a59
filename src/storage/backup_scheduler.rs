//! Automatic backups driven from the server's maintenance loop.
//!
//! The scheduler does not run its own timer. The maintenance task calls
//! [`BackupScheduler::check_and_backup`] after each pass (which has already
//! flushed the store) and a backup is taken once per configured interval,
//! aligned to UTC hour boundaries so restarts do not shift the schedule.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};

use super::backup::{BackupKind, BackupManager};
use crate::config::StorageConfig;

#[derive(Debug, Clone)]
pub struct BackupSchedulerConfig {
    /// Hours between automatic backups; 0 disables them.
    pub interval_hours: u64,
    pub retention: usize,
    pub db_path: PathBuf,
    pub backup_path: PathBuf,
}

impl From<&StorageConfig> for BackupSchedulerConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            interval_hours: storage.backup_interval_hours,
            retention: storage.backup_retention,
            db_path: storage.game_db_path(),
            backup_path: storage.backup_path(),
        }
    }
}

pub struct BackupScheduler {
    config: BackupSchedulerConfig,
    /// Index of the last interval slot a backup was taken in.
    last_slot: Option<i64>,
}

impl BackupScheduler {
    pub fn new(config: BackupSchedulerConfig) -> Self {
        Self { config, last_slot: None }
    }

    pub fn enabled(&self) -> bool {
        self.config.interval_hours > 0
    }

    fn slot_of(&self, now: &DateTime<Utc>) -> Option<i64> {
        let secs = i64::try_from(self.config.interval_hours.checked_mul(3600)?).ok()?;
        (secs > 0).then(|| now.timestamp().div_euclid(secs))
    }

    /// Take an automatic backup if the current interval has none yet.
    ///
    /// The first call after startup only records the slot, so a restart does
    /// not immediately produce a backup.
    pub fn check_and_backup(&mut self, now: DateTime<Utc>) -> Result<Option<String>> {
        let Some(slot) = self.slot_of(&now) else {
            return Ok(None);
        };
        match self.last_slot {
            None => {
                self.last_slot = Some(slot);
                debug!("backup: scheduler armed, every {}h", self.config.interval_hours);
                return Ok(None);
            }
            Some(last) if last >= slot => return Ok(None),
            Some(_) => {}
        }

        let mut manager = BackupManager::new(
            self.config.db_path.clone(),
            self.config.backup_path.clone(),
            self.config.retention,
        )?;
        let name = format!("auto_{}", now.format("%Y%m%d_%H%M"));
        let metadata = manager.create_backup(Some(name), BackupKind::Automatic)?;
        let pruned = manager.prune()?;
        if !pruned.is_empty() {
            info!("backup: retention removed {} old backup(s)", pruned.len());
        }
        self.last_slot = Some(slot);
        Ok(Some(metadata.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn scheduler(temp: &TempDir, hours: u64) -> BackupScheduler {
        let db = temp.path().join("data/game");
        std::fs::create_dir_all(&db).unwrap();
        std::fs::write(db.join("db"), b"state").unwrap();
        BackupScheduler::new(BackupSchedulerConfig {
            interval_hours: hours,
            retention: 2,
            db_path: db,
            backup_path: temp.path().join("backups"),
        })
    }

    #[test]
    fn disabled_never_backs_up() {
        let temp = TempDir::new().unwrap();
        let mut s = scheduler(&temp, 0);
        assert!(!s.enabled());
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(s.check_and_backup(t).unwrap().is_none());
        assert!(s.check_and_backup(t + chrono::Duration::days(3)).unwrap().is_none());
    }

    #[test]
    fn one_backup_per_interval() {
        let temp = TempDir::new().unwrap();
        let mut s = scheduler(&temp, 6);
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();

        assert!(s.check_and_backup(start).unwrap().is_none());
        assert!(s.check_and_backup(start + chrono::Duration::hours(4)).unwrap().is_none());
        // 07:00 falls in the next six-hour slot.
        assert!(s.check_and_backup(start + chrono::Duration::hours(6)).unwrap().is_some());
        assert!(s.check_and_backup(start + chrono::Duration::hours(7)).unwrap().is_none());
    }

    #[test]
    fn retention_applies_to_scheduled_backups() {
        let temp = TempDir::new().unwrap();
        let mut s = scheduler(&temp, 1);
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 30, 0).unwrap();
        s.check_and_backup(start).unwrap();
        for h in 1..=4 {
            s.check_and_backup(start + chrono::Duration::hours(h)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let manager = BackupManager::new(temp.path().join("data/game"), temp.path().join("backups"), 2).unwrap();
        assert_eq!(manager.list_backups().len(), 2);
    }
}
