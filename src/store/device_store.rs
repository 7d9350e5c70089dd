//! Resident dataset with copy-on-write patching.
//!
//! Readers take an `Arc` snapshot and aggregate without holding the lock. A
//! lock/unlock patch clones the dataset only while a snapshot is still alive,
//! so an in-flight pass never observes a half-applied patch.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::extraction::institute::InstituteDirectory;
use crate::logging::structured::LogContext;
use crate::pipeline::merge::MergedRecord;
use crate::sources::LockAction;

/// Everything loaded once per dashboard session.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<MergedRecord>,
    pub institutes: InstituteDirectory,
    pub active_by_pincode: BTreeMap<String, u64>,
    pub codes_generated_today: u64,
}

impl Dataset {
    /// Records whose serial number matches `serial` after trimming.
    pub fn records_with_serial<'a>(
        &'a self,
        serial: &'a str,
    ) -> impl Iterator<Item = &'a MergedRecord> + 'a {
        let serial = serial.trim();
        self.records
            .iter()
            .filter(move |r| r.device.serial_number.as_deref().map(str::trim) == Some(serial))
    }
}

/// Outcome of a lock/unlock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockActionResult {
    pub serial: String,
    pub requested_locked: bool,
    pub success: bool,
    pub message: String,
    /// Number of resident records updated.
    pub patched: usize,
}

impl LockActionResult {
    pub fn succeeded(serial: &str, locked: bool, patched: usize) -> Self {
        let verb = if locked { "locked" } else { "unlocked" };
        Self {
            serial: serial.to_string(),
            requested_locked: locked,
            success: true,
            message: format!("device {} {}", serial, verb),
            patched,
        }
    }

    pub fn failed(serial: &str, locked: bool, message: String) -> Self {
        Self {
            serial: serial.to_string(),
            requested_locked: locked,
            success: false,
            message,
            patched: 0,
        }
    }
}

/// Holder of the current [`Dataset`].
#[derive(Debug, Default)]
pub struct DeviceStore {
    current: RwLock<Arc<Dataset>>,
}

impl DeviceStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
        }
    }

    /// Swap in a freshly loaded dataset.
    pub fn replace(&self, dataset: Dataset) {
        *self.current.write() = Arc::new(dataset);
    }

    /// Current dataset; stays valid even if the store is patched afterwards.
    pub fn snapshot(&self) -> Arc<Dataset> {
        Arc::clone(&self.current.read())
    }

    /// Ask `action` to lock or unlock `serial`, then patch resident records
    /// on success. A failed request leaves the dataset untouched.
    ///
    /// `now_secs` becomes `locked_at` when locking; unlocking clears it.
    pub fn apply_lock_action(
        &self,
        action: &dyn LockAction,
        serial: &str,
        locked: bool,
        now_secs: f64,
        ctx: &LogContext,
    ) -> LockActionResult {
        let serial = serial.trim();
        let ctx = ctx.with_device(serial);

        if let Err(e) = action.set_lock(serial, locked) {
            crate::log_warn!(ctx, "LOCK_ACTION_FAILED", locked = locked, error = e.to_string());
            return LockActionResult::failed(serial, locked, e.to_string());
        }

        let patched = {
            let mut guard = self.current.write();
            let dataset = Arc::make_mut(&mut guard);
            let mut patched = 0;
            for record in dataset.records.iter_mut() {
                let device = &mut record.device;
                if device.serial_number.as_deref().map(str::trim) != Some(serial) {
                    continue;
                }
                device.is_locked = locked;
                device.locked_at = locked.then_some(now_secs);
                patched += 1;
            }
            patched
        };

        crate::log_info!(ctx, "LOCK_ACTION_APPLIED", locked = locked, patched = patched);
        LockActionResult::succeeded(serial, locked, patched)
    }
}
