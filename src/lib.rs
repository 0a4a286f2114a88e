//! Concurrent HTTP path discovery.
//!
//! Joins wordlist candidates onto a target base URL, probes them through a
//! bounded worker pool with rate limiting and retries, classifies each
//! response, and streams qualifying results to a sink while counters track
//! overall progress.

pub mod classifier;
pub mod config;
pub mod error;
pub mod governor;
pub mod identity;
pub mod logging;
pub mod output;
pub mod probe;
pub mod progress;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod source;
pub mod tracker;
pub mod wordlist;

pub use classifier::{ResultClassifier, Verdict};
pub use config::{CliConfig, RotationPolicy, ScanConfig};
pub use error::{DirProbeError, Result};
pub use governor::RateGovernor;
pub use identity::IdentityPool;
pub use output::{OutputFormat, ScanReport};
pub use probe::{ProbeError, ProbeOutcome, Prober};
pub use progress::ProgressReporter;
pub use resolver::TargetResolver;
pub use session::{CancelHandle, ScanResult, ScanSession, ScanState};
pub use sink::ResultSink;
pub use source::{CandidateSource, WordlistSource};
pub use tracker::{Completion, ScanTracker, Snapshot};
