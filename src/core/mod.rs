//! Core module - Instance guard, process discovery, attribute application and the monitor loop

mod applier;
pub mod control;
mod guard;
pub mod profile;
mod scanner;
mod scheduler;
pub mod settings;

#[cfg(test)]
mod testing;

pub use applier::AttributeApplier;
pub use guard::InstanceGuard;
pub use scanner::{MatchCriterion, ProcessScanner, SysinfoSource};
pub use scheduler::MonitorScheduler;
pub use settings::Settings;
