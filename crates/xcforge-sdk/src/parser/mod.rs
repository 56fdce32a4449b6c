//! Line-oriented parsers for xcodebuild output.
//!
//! Both parsers are push-driven: the process executor calls `ingest` once
//! per output line, and `flush` once after the process ended. Neither ever
//! returns an error for a bad line.

pub mod build_log;
pub mod test_output;

pub use build_log::{BuildLogParser, BuildReport, BuildStatus, BuildStep, Diagnostic, Severity};
pub use test_output::{LineKind, TestOutputParser};
