//! Build automation with xcodebuild.
//!
//! This module drives xcodebuild and turns its output into structured
//! results.
//!
//! ## Overview
//!
//! 1. **Command rendering** - [`XcodeBuilder::command`] turns a
//!    [`BuildConfig`](crate::BuildConfig) into an xcodebuild invocation
//! 2. **Streaming parse** - every output line is fed to the build log parser,
//!    and to the test output parser for `test`
//! 3. **Pipelines** - [`Pipeline`] runs clean, build, test and package with
//!    hooks around each stage
//!
//! ## Common Utilities
//!
//! The `common` module provides [`CommandLine`] and the [`CommandExecutor`]
//! seam. Tests swap in an executor that replays recorded output.
//!
//! ## Builder Options
//!
//! - **`verbose(bool)`** - Print each command and stage as it runs
//! - **`with_executor(..)`** - Run commands through a custom executor
//!
//! ## Example
//!
//! ```no_run
//! use xcforge_sdk::builders::XcodeBuilder;
//! use xcforge_sdk::report::ConsoleFormatter;
//! use xcforge_sdk::BuildConfig;
//!
//! let builder = XcodeBuilder::new().verbose(true);
//! let config = BuildConfig::for_workspace("App.xcworkspace")
//!     .scheme("App")
//!     .destination("platform=iOS Simulator,name=iPhone 15");
//!
//! let result = builder.test(&config, vec![Box::new(ConsoleFormatter::stdout())])?;
//! if !result.succeeded() {
//!     std::process::exit(1);
//! }
//! # Ok::<(), xcforge_sdk::XcError>(())
//! ```

pub mod common;
pub mod pipeline;
pub mod xcodebuild;

pub use common::{CommandExecutor, CommandLine, SystemExecutor, require_path, shell_quote};
pub use pipeline::{Hook, HookOutput, Pipeline, PipelineReport, Stage};
pub use xcodebuild::XcodeBuilder;
