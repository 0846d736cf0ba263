//! Strata Core Library
//!
//! Naming, feature specifications, layer ordering, coverage auditing and
//! failure recovery shared by the scaffolder and the quality loop.

pub mod cancel;
pub mod config;
pub mod coverage;
pub mod error;
pub mod layer;
pub mod naming;
pub mod recovery;
pub mod spec;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::StrataConfig;
pub use error::{StrataError, StrataResult};
pub use layer::{DependencyNode, DependencyOrderer, Layer};
pub use naming::{NamingEngine, NamingVariantSet};
pub use recovery::{
    Failure, FailurePoint, FixedPolicy, RecordedDecision, RecoveryController, RecoveryDecision,
    RecoveryDecisionKind, RecoveryPolicy,
};
pub use spec::{FeatureSpec, Operation, OptionValue, RawFeatureRequest, SpecResolver};
