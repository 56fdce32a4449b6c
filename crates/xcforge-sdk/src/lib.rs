//! Xcode automation SDK for Rust
//!
//! `xcforge-sdk` reads and writes Xcode projects and drives `xcodebuild`,
//! turning its output into structured build and test reports.
//!
//! # Quick Start
//!
//! 1. Add xcforge-sdk to your project:
//! ```toml
//! [dependencies]
//! xcforge-sdk = "0.1"
//! ```
//!
//! 2. Edit a project:
//! ```no_run
//! use xcforge_sdk::Project;
//! use xcforge_sdk::project::capabilities::ProductType;
//!
//! let project = Project::open("App.xcodeproj")?;
//! let mut tests = project.create_target("AppTests", ProductType::UnitTests)?;
//! let app = project.target("App")?;
//! tests.add_dependency(&app)?;
//! project.save()?;
//! # Ok::<(), xcforge_sdk::XcError>(())
//! ```
//!
//! 3. Run the tests and write JUnit XML:
//! ```no_run
//! use xcforge_sdk::builders::XcodeBuilder;
//! use xcforge_sdk::report::JunitFormatter;
//! use xcforge_sdk::BuildConfig;
//!
//! let config = BuildConfig::for_project("App.xcodeproj").scheme("App");
//! let result = XcodeBuilder::new().test(&config, vec![Box::new(JunitFormatter::new("junit.xml"))])?;
//! println!("passed: {}", result.succeeded());
//! # Ok::<(), xcforge_sdk::XcError>(())
//! ```
//!
//! # Architecture
//!
//! The SDK consists of several components:
//!
//! - **Project**: The pbxproj object graph, with typed views over its objects
//! - **Builders**: Renders and runs xcodebuild invocations and pipelines
//! - **Parser**: Line-oriented parsers for build logs and test output
//! - **Report**: The test report model, its observers, and JUnit output
//! - **Context**: Cached facts about the installed toolchain

// Public modules
pub mod builders;
pub mod context;
pub mod parser;
pub mod project;
pub mod report;
pub mod types;

// Re-export key types for convenience
pub use context::ToolContext;
pub use parser::{BuildLogParser, BuildReport, TestOutputParser};
pub use project::identifier::{Identifier, IdentifierGenerator};
pub use project::registry::Registry;
pub use project::resource::Resource;
pub use project::workspace::Workspace;
pub use project::Project;
pub use report::{Formatter, Report};
pub use types::{BuildAction, BuildConfig, BuildResult, Result, XcError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
