//! Core types for xcforge-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`XcError`] - Error types for project model, parsing, and build operations
//! - [`BuildAction`] - The xcodebuild action to run (clean, build, test, archive)
//! - [`BuildConfig`] - Options rendered into an xcodebuild invocation
//! - [`BuildResult`] - Output from build operations

use std::path::PathBuf;

/// Convenience alias used across the SDK.
pub type Result<T> = std::result::Result<T, XcError>;

/// Error types for xcforge-sdk operations.
///
/// Structural errors (bad identifiers, missing names) are returned as soon as
/// they are detected. Streaming parse problems never surface here: the output
/// parsers log them and keep going.
///
/// # Example
///
/// ```ignore
/// use xcforge_sdk::{Project, XcError};
///
/// let project = Project::open("App.xcodeproj")?;
/// match project.target("Missing") {
///     Ok(target) => println!("found {}", target.name()?),
///     Err(XcError::NotFound { available, .. }) => {
///         eprintln!("valid targets: {:?}", available);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// # Ok::<(), XcError>(())
/// ```
#[derive(Debug, thiserror::Error)]
pub enum XcError {
    /// Identifier generation collided with existing keys too many times.
    ///
    /// Collisions between random 96-bit identifiers are practically
    /// impossible, so reaching the ceiling points at a broken random source.
    #[error("failed to generate a unique object identifier after {attempts} attempts")]
    GenerationExhausted {
        /// Number of candidates that were drawn.
        attempts: usize,
    },

    /// A named entity (target, configuration, scheme, project, formatter) was not found.
    ///
    /// The message always lists the names that would have been accepted.
    #[error("{kind} '{name}' not found, available are: {}", available.join(", "))]
    NotFound {
        /// What kind of entity was looked up (e.g. "target").
        kind: &'static str,
        /// The name that was requested.
        name: String,
        /// All valid names at the time of the lookup.
        available: Vec<String>,
    },

    /// A field pointed at an identifier that has no record in the registry.
    #[error("object {0} is referenced but does not exist in the project")]
    UnresolvedReference(String),

    /// The project owning a resource has been dropped.
    #[error("the project owning this object has been closed")]
    ProjectClosed,

    /// A capability operation was called on a resource of the wrong kind.
    #[error("operation requires a {expected} object, but {id} is {found}")]
    Capability {
        /// Capability required by the operation.
        expected: &'static str,
        /// Discriminator actually found on the record.
        found: String,
        /// Identifier of the offending record.
        id: String,
    },

    /// The project file could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number in the source text.
        line: usize,
        /// What the parser expected or found.
        message: String,
    },

    /// An external tool exited with a non-zero status.
    ///
    /// The captured output is attached so callers can tell a crashed tool
    /// apart from a test run that merely reported failures.
    #[error("{command} failed with exit code {}\n\nOutput:\n{}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "<signal>".to_string()), output.join("\n"))]
    Execution {
        /// Rendered command line.
        command: String,
        /// Exit code, or `None` if the process was killed by a signal.
        exit_code: Option<i32>,
        /// Every line the process printed.
        output: Vec<String>,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}. Check xcforge.toml or CLI flags")]
    Config(String),

    /// A build step failed before producing any output worth parsing.
    ///
    /// This covers failures such as:
    /// - Missing build tools (xcodebuild, xcrun, plutil)
    /// - Missing project or workspace paths
    /// - Failing pipeline hooks
    #[error("build error: {0}")]
    Build(String),
}

impl XcError {
    /// Builds a [`XcError::NotFound`] from any iterator of candidate names.
    pub fn not_found<I, S>(kind: &'static str, name: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        XcError::NotFound {
            kind,
            name: name.into(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }
}

/// The xcodebuild action to run.
///
/// # Example
///
/// ```
/// use xcforge_sdk::BuildAction;
///
/// assert_eq!(BuildAction::Test.as_str(), "test");
/// assert!(BuildAction::Test.produces_test_report());
/// assert!(!BuildAction::Build.produces_test_report());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildAction {
    /// Remove build products and intermediates.
    Clean,
    /// Build the scheme or target.
    Build,
    /// Build and run the scheme's tests.
    Test,
    /// Build and archive for distribution.
    Archive,
}

impl BuildAction {
    /// Returns the xcodebuild action argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildAction::Clean => "clean",
            BuildAction::Build => "build",
            BuildAction::Test => "test",
            BuildAction::Archive => "archive",
        }
    }

    /// Whether the action's output is fed to the test report parser.
    pub fn produces_test_report(&self) -> bool {
        matches!(self, BuildAction::Test)
    }
}

/// Options rendered into an xcodebuild invocation.
///
/// Exactly one of `project` or `workspace` is normally set. When a workspace
/// is given a `scheme` is required.
///
/// # Example
///
/// ```
/// use xcforge_sdk::BuildConfig;
///
/// let config = BuildConfig::for_project("App.xcodeproj")
///     .scheme("App")
///     .configuration("Release")
///     .sdk("iphonesimulator");
/// assert_eq!(config.configuration.as_deref(), Some("Release"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildConfig {
    /// Path to an `.xcodeproj` bundle.
    pub project: Option<PathBuf>,
    /// Path to an `.xcworkspace` bundle.
    pub workspace: Option<PathBuf>,
    /// Scheme to build.
    pub scheme: Option<String>,
    /// Target to build (project builds only).
    pub target: Option<String>,
    /// Build configuration name, e.g. `Debug`.
    pub configuration: Option<String>,
    /// SDK name, e.g. `iphonesimulator`.
    pub sdk: Option<String>,
    /// Destination specifier, e.g. `platform=iOS Simulator,name=iPhone 15`.
    pub destination: Option<String>,
    /// Custom derived data location.
    pub derived_data: Option<PathBuf>,
    /// Where `archive` writes the `.xcarchive`.
    pub archive_path: Option<PathBuf>,
    /// Extra `KEY=VALUE` build setting overrides, in order.
    pub settings: Vec<(String, String)>,
}

impl BuildConfig {
    /// Starts a configuration that builds an `.xcodeproj`.
    pub fn for_project(path: impl Into<PathBuf>) -> Self {
        Self {
            project: Some(path.into()),
            ..Self::default()
        }
    }

    /// Starts a configuration that builds an `.xcworkspace`.
    pub fn for_workspace(path: impl Into<PathBuf>) -> Self {
        Self {
            workspace: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn sdk(mut self, sdk: impl Into<String>) -> Self {
        self.sdk = Some(sdk.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn derived_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.derived_data = Some(path.into());
        self
    }

    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Appends a build setting override.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }
}

/// Result of a finished xcodebuild invocation.
#[derive(Debug)]
pub struct BuildResult {
    /// Action that was run.
    pub action: BuildAction,
    /// Parsed build log.
    pub build: crate::parser::build_log::BuildReport,
    /// Parsed test report, for [`BuildAction::Test`].
    pub tests: Option<crate::report::Report>,
    /// Exit code of xcodebuild, if it exited normally.
    pub exit_code: Option<i32>,
}

impl BuildResult {
    /// True when xcodebuild succeeded and no test failed.
    pub fn succeeded(&self) -> bool {
        let tests_ok = self.tests.as_ref().map(|r| !r.failed()).unwrap_or(true);
        self.exit_code == Some(0) && self.build.succeeded() && tests_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_alternatives() {
        let err = XcError::not_found("target", "Missing", ["App", "AppTests"]);
        assert_eq!(
            err.to_string(),
            "target 'Missing' not found, available are: App, AppTests"
        );
    }

    #[test]
    fn execution_error_includes_output() {
        let err = XcError::Execution {
            command: "xcodebuild test".into(),
            exit_code: Some(65),
            output: vec!["** TEST FAILED **".into()],
        };
        let message = err.to_string();
        assert!(message.contains("exit code 65"));
        assert!(message.contains("** TEST FAILED **"));
    }

    #[test]
    fn build_config_builder() {
        let config = BuildConfig::for_workspace("App.xcworkspace")
            .scheme("App")
            .setting("ONLY_ACTIVE_ARCH", "YES");
        assert_eq!(config.scheme.as_deref(), Some("App"));
        assert_eq!(
            config.settings,
            vec![("ONLY_ACTIVE_ARCH".to_string(), "YES".to_string())]
        );
        assert!(config.project.is_none());
    }
}
