pub mod classifier;
pub mod orchestrator;
pub mod outcome;
pub mod scanner;
pub mod scheduler;

pub use classifier::{classify, Classification, ClassificationReport, LockdownClassifier, LockedCandidate};
pub use orchestrator::ReleaseOrchestrator;
pub use outcome::{
    BatchSummary, Failure, JobOutcome, OutcomeAggregator, RunSummary, SubmissionJob, SubmissionReport,
};
pub use scanner::{ReservationScanner, ScanReport};
pub use scheduler::{plan_batches, BatchScheduler, SchedulerConfig, SchedulerState, TerminalStatus};
