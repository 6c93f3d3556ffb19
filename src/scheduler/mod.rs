mod service;

pub use service::{RescheduleService, RunOptions, RunOutcome};
