//! Strata Quality Library
//!
//! The coverage-gated review → audit → generate workflow and its
//! collaborators: version control, the build runner and the file system.

pub mod components;
pub mod orchestrator;
pub mod process;
pub mod review;
pub mod runner;
pub mod summary;
pub mod target;
pub mod vcs;
pub mod workflow;

pub use orchestrator::{Collaborators, QualityOrchestrator};
pub use runner::{BuildRunner, CommandRunner};
pub use summary::{RunNote, RunOutcome, RunSummary};
pub use target::{Target, TargetSet};
pub use vcs::{GitCli, VersionControl};
pub use workflow::{Phase, WorkflowState};
