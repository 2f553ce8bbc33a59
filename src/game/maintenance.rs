//! Periodic housekeeping run by the server's maintenance task.

use log::{debug, info};
use serde::Serialize;

use crate::game::engine::Engine;
use crate::game::errors::GameResult;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub wars_finalized: usize,
    pub heists_expired: usize,
}

impl Engine {
    /// Finalize wars past their end time and expire stale heists.
    pub fn run_maintenance(&self) -> GameResult<MaintenanceReport> {
        let report = MaintenanceReport {
            wars_finalized: self.finalize_due_wars()?,
            heists_expired: self.expire_heists()?,
        };
        if report == MaintenanceReport::default() {
            debug!("maintenance: nothing to do");
        } else {
            info!(
                "maintenance: finalized {} wars, expired {} heists",
                report.wars_finalized, report.heists_expired
            );
        }
        self.store.flush()?;
        Ok(report)
    }
}
