//! Self-update: version check, image download, partition write.

pub mod flash;
pub mod sequencer;

pub use flash::{OtaError, OtaManager, SystemRestart, check_rollback};
pub use sequencer::{UpdateOutcome, UpdateSequencer};
