//! Single-instance guard - At most one agent per machine

use single_instance::SingleInstance;
use tracing::{debug, warn};

/// Name of the system-wide lock
pub const DEFAULT_INSTANCE_NAME: &str = "Global\\AcePrefixProcessSetter_Singleton_Mutex";

/// Ownership of the named system-wide lock.
///
/// The lock itself is an OS object; it is released when this value is dropped
/// or the process exits.
pub struct InstanceGuard {
    _lock: SingleInstance,
}

impl InstanceGuard {
    /// Take the named lock. `None` if another instance holds it or if the lock
    /// state cannot be determined.
    pub fn acquire(name: &str) -> Option<Self> {
        match SingleInstance::new(name) {
            Ok(lock) if lock.is_single() => {
                debug!(lock = name, "Instance lock acquired");
                Some(Self { _lock: lock })
            }
            Ok(_) => {
                debug!(lock = name, "Instance lock already held");
                None
            }
            Err(e) => {
                warn!(lock = name, error = %e, "Could not create instance lock");
                None
            }
        }
    }
}
