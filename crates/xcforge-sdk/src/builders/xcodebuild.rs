//! xcodebuild driver
//!
//! Renders a [`BuildConfig`] into an xcodebuild command line, runs it through
//! a [`CommandExecutor`] and feeds every output line to the build log parser
//! (and, for `test`, to the test output parser) while the process runs.

use super::common::{CommandExecutor, CommandLine, SystemExecutor};
use crate::parser::{BuildLogParser, TestOutputParser};
use crate::report::Formatter;
use crate::types::{BuildAction, BuildConfig, BuildResult, Result, XcError};

/// Runs xcodebuild actions and parses their output.
pub struct XcodeBuilder {
    executor: Box<dyn CommandExecutor>,
    verbose: bool,
}

impl Default for XcodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl XcodeBuilder {
    /// Creates a builder that runs the real `xcodebuild`.
    pub fn new() -> Self {
        Self::with_executor(Box::new(SystemExecutor::new()))
    }

    /// Creates a builder that runs commands through `executor`.
    pub fn with_executor(executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            verbose: false,
        }
    }

    /// Enables verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The executor used for xcodebuild and for pipeline hooks.
    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    /// Renders the xcodebuild invocation for `action`.
    ///
    /// # Errors
    ///
    /// [`XcError::Config`] when neither a project nor a workspace is set, or
    /// when the action needs a scheme and none is given.
    ///
    /// # Example
    ///
    /// ```
    /// use xcforge_sdk::builders::XcodeBuilder;
    /// use xcforge_sdk::{BuildAction, BuildConfig};
    ///
    /// let config = BuildConfig::for_project("App.xcodeproj")
    ///     .scheme("App")
    ///     .configuration("Debug")
    ///     .setting("CODE_SIGNING_ALLOWED", "NO");
    /// let cmd = XcodeBuilder::new().command(BuildAction::Build, &config)?;
    /// assert_eq!(
    ///     cmd.to_string(),
    ///     "xcodebuild -project App.xcodeproj -scheme App -configuration Debug CODE_SIGNING_ALLOWED=NO build"
    /// );
    /// # Ok::<(), xcforge_sdk::XcError>(())
    /// ```
    pub fn command(&self, action: BuildAction, config: &BuildConfig) -> Result<CommandLine> {
        let mut cmd = CommandLine::new("xcodebuild").env("NSUnbufferedIO", "YES");

        let needs_scheme = matches!(action, BuildAction::Test | BuildAction::Archive);
        if let Some(workspace) = &config.workspace {
            if config.scheme.is_none() {
                return Err(XcError::Config(format!(
                    "A scheme is required to build workspace {}.\n\n\
                     Set [build].scheme in xcforge.toml or pass --scheme.",
                    workspace.display()
                )));
            }
            cmd = cmd.arg("-workspace").path_arg(workspace);
        } else if let Some(project) = &config.project {
            if needs_scheme && config.scheme.is_none() {
                return Err(XcError::Config(format!(
                    "The {} action requires a scheme.\n\n\
                     Set [build].scheme in xcforge.toml or pass --scheme.",
                    action.as_str()
                )));
            }
            cmd = cmd.arg("-project").path_arg(project);
        } else {
            return Err(XcError::Config(
                "No project or workspace configured.\n\n\
                 Set [project].path in xcforge.toml or pass --project / --workspace."
                    .to_string(),
            ));
        }

        match (&config.scheme, &config.target) {
            (Some(scheme), _) => cmd = cmd.args(["-scheme", scheme.as_str()]),
            (None, Some(target)) => cmd = cmd.args(["-target", target.as_str()]),
            (None, None) => {}
        }
        if let Some(configuration) = &config.configuration {
            cmd = cmd.args(["-configuration", configuration.as_str()]);
        }
        if let Some(sdk) = &config.sdk {
            cmd = cmd.args(["-sdk", sdk.as_str()]);
        }
        if let Some(destination) = &config.destination {
            cmd = cmd.args(["-destination", destination.as_str()]);
        }
        if let Some(derived_data) = &config.derived_data {
            cmd = cmd.arg("-derivedDataPath").path_arg(derived_data);
        }
        if action == BuildAction::Archive {
            if let Some(archive_path) = &config.archive_path {
                cmd = cmd.arg("-archivePath").path_arg(archive_path);
            }
        }
        for (key, value) in &config.settings {
            cmd = cmd.arg(format!("{key}={value}"));
        }
        Ok(cmd.arg(action.as_str()))
    }

    /// Runs `action` and returns the parsed result.
    ///
    /// `formatters` observe the test report while the run is in progress;
    /// they are ignored for actions other than `test`.
    ///
    /// A `test` run that exits non-zero but produced test results is a
    /// normal outcome (tests failed) and is returned as `Ok`; check
    /// [`BuildResult::succeeded`]. Any other non-zero exit is returned as
    /// [`XcError::Execution`] with the captured output.
    pub fn run(
        &self,
        action: BuildAction,
        config: &BuildConfig,
        formatters: Vec<Box<dyn Formatter>>,
    ) -> Result<BuildResult> {
        let cmd = self.command(action, config)?;
        if self.verbose {
            println!("Running xcodebuild {}...", action.as_str());
        }
        tracing::info!(action = action.as_str(), command = %cmd, "running xcodebuild");

        let mut build_log = BuildLogParser::new();
        let mut tests = action
            .produces_test_report()
            .then(|| TestOutputParser::with_formatters(formatters));

        let outcome = self.executor.execute(&cmd, &mut |line| {
            build_log.ingest(line);
            if let Some(parser) = tests.as_mut() {
                parser.ingest(line);
            }
        });

        let build = build_log.into_report();
        let tests = tests.map(TestOutputParser::into_report);

        match outcome {
            Ok(_) => {
                if self.verbose {
                    println!("✓ xcodebuild {} finished", action.as_str());
                }
                Ok(BuildResult {
                    action,
                    build,
                    tests,
                    exit_code: Some(0),
                })
            }
            Err(XcError::Execution {
                command,
                exit_code,
                output,
            }) => match tests {
                Some(report) if !report.is_empty() => {
                    tracing::warn!(
                        ?exit_code,
                        failures = report.failure_count(),
                        "xcodebuild test exited with failures"
                    );
                    Ok(BuildResult {
                        action,
                        build,
                        tests: Some(report),
                        exit_code,
                    })
                }
                _ => {
                    tracing::error!(
                        ?exit_code,
                        errors = build.errors.len(),
                        "xcodebuild {} failed",
                        action.as_str()
                    );
                    Err(XcError::Execution {
                        command,
                        exit_code,
                        output,
                    })
                }
            },
            Err(e) => Err(e),
        }
    }

    pub fn clean(&self, config: &BuildConfig) -> Result<BuildResult> {
        self.run(BuildAction::Clean, config, Vec::new())
    }

    pub fn build(&self, config: &BuildConfig) -> Result<BuildResult> {
        self.run(BuildAction::Build, config, Vec::new())
    }

    pub fn test(&self, config: &BuildConfig, formatters: Vec<Box<dyn Formatter>>) -> Result<BuildResult> {
        self.run(BuildAction::Test, config, formatters)
    }

    pub fn archive(&self, config: &BuildConfig) -> Result<BuildResult> {
        self.run(BuildAction::Archive, config, Vec::new())
    }
}
