//! Multi-stage build pipeline.
//!
//! A pipeline runs a subset of the stages clean, build, test and package in
//! that order, each one an xcodebuild action. Every stage can carry hooks
//! that run before and after it; a hook is either a Rust closure or a shell
//! command. The first failing hook or stage stops the pipeline.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use super::common::CommandLine;
use super::xcodebuild::XcodeBuilder;
use crate::report::Formatter;
use crate::types::{BuildAction, BuildConfig, BuildResult, Result, XcError};

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Clean,
    Build,
    Test,
    Package,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 4] = [Stage::Clean, Stage::Build, Stage::Test, Stage::Package];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Build => "build",
            Stage::Test => "test",
            Stage::Package => "package",
        }
    }

    /// The xcodebuild action the stage runs.
    pub fn action(&self) -> BuildAction {
        match self {
            Stage::Clean => BuildAction::Clean,
            Stage::Build => BuildAction::Build,
            Stage::Test => BuildAction::Test,
            Stage::Package => BuildAction::Archive,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = XcError;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| XcError::not_found("stage", s, Stage::ALL.iter().map(Stage::name)))
    }
}

/// Work attached to the start or end of a stage.
pub enum Hook {
    /// Called with the stage it is attached to.
    Function(Box<dyn FnMut(Stage) -> Result<()>>),
    /// Run with `sh -c`; `XCFORGE_STAGE` holds the stage name.
    Shell(String),
}

impl Hook {
    pub fn function(f: impl FnMut(Stage) -> Result<()> + 'static) -> Self {
        Hook::Function(Box::new(f))
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Hook::Shell(command.into())
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Function(_) => f.write_str("Hook::Function(..)"),
            Hook::Shell(command) => write!(f, "Hook::Shell({command:?})"),
        }
    }
}

#[derive(Debug, Default)]
struct StageHooks {
    before: Vec<Hook>,
    after: Vec<Hook>,
}

/// Results of a pipeline run, one per stage that ran.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub results: Vec<(Stage, BuildResult)>,
}

impl PipelineReport {
    /// First stage whose xcodebuild run did not succeed.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.results
            .iter()
            .find(|(_, result)| !result.succeeded())
            .map(|(stage, _)| *stage)
    }

    pub fn succeeded(&self) -> bool {
        self.failed_stage().is_none()
    }

    pub fn result(&self, stage: Stage) -> Option<&BuildResult> {
        self.results.iter().find(|(s, _)| *s == stage).map(|(_, r)| r)
    }
}

/// Receives each line printed by a shell hook.
pub type HookOutput = Box<dyn FnMut(Stage, &str)>;

/// Ordered clean/build/test/package runner.
///
/// # Example
///
/// ```no_run
/// use xcforge_sdk::builders::{Hook, Pipeline, Stage, XcodeBuilder};
/// use xcforge_sdk::BuildConfig;
///
/// let builder = XcodeBuilder::new().verbose(true);
/// let config = BuildConfig::for_project("App.xcodeproj").scheme("App");
/// let report = Pipeline::new(&builder, config)
///     .stages([Stage::Build, Stage::Test])
///     .before(Stage::Build, Hook::shell("swiftlint"))
///     .run()?;
/// assert!(report.succeeded());
/// # Ok::<(), xcforge_sdk::XcError>(())
/// ```
pub struct Pipeline<'a> {
    builder: &'a XcodeBuilder,
    config: BuildConfig,
    stages: Vec<Stage>,
    hooks: IndexMap<Stage, StageHooks>,
    formatters: Vec<Box<dyn Formatter>>,
    hook_output: Option<HookOutput>,
}

impl<'a> Pipeline<'a> {
    /// A pipeline running every stage with `config`.
    pub fn new(builder: &'a XcodeBuilder, config: BuildConfig) -> Self {
        Self {
            builder,
            config,
            stages: Stage::ALL.to_vec(),
            hooks: IndexMap::new(),
            formatters: Vec::new(),
            hook_output: None,
        }
    }

    /// Restricts the pipeline to `stages`. They always run in canonical
    /// order, whatever order they are given in.
    pub fn stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        let mut stages: Vec<Stage> = stages.into_iter().collect();
        stages.sort();
        stages.dedup();
        self.stages = stages;
        self
    }

    pub fn before(mut self, stage: Stage, hook: Hook) -> Self {
        self.hooks.entry(stage).or_default().before.push(hook);
        self
    }

    pub fn after(mut self, stage: Stage, hook: Hook) -> Self {
        self.hooks.entry(stage).or_default().after.push(hook);
        self
    }

    /// Formatters observing the test stage.
    pub fn formatters(mut self, formatters: Vec<Box<dyn Formatter>>) -> Self {
        self.formatters = formatters;
        self
    }

    /// Sends shell hook output to `sink` instead of the `tracing` log.
    pub fn on_hook_output(mut self, sink: impl FnMut(Stage, &str) + 'static) -> Self {
        self.hook_output = Some(Box::new(sink));
        self
    }

    /// Runs the stages in order.
    ///
    /// A stage whose xcodebuild run reports failure ends the pipeline; its
    /// result is still included and its after hooks are skipped.
    ///
    /// # Errors
    ///
    /// [`XcError::Build`] naming the stage when a hook fails, or whatever
    /// error the xcodebuild run of a stage returned.
    pub fn run(mut self) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let stages = std::mem::take(&mut self.stages);
        for stage in stages {
            tracing::info!(%stage, "stage started");
            self.run_hooks(stage, "before")?;

            let formatters = if stage == Stage::Test {
                std::mem::take(&mut self.formatters)
            } else {
                Vec::new()
            };
            let result = self.builder.run(stage.action(), &self.config, formatters)?;
            let succeeded = result.succeeded();
            report.results.push((stage, result));
            if !succeeded {
                tracing::warn!(%stage, "stage failed, stopping pipeline");
                break;
            }

            self.run_hooks(stage, "after")?;
            tracing::info!(%stage, "stage finished");
        }
        Ok(report)
    }

    fn run_hooks(&mut self, stage: Stage, when: &str) -> Result<()> {
        let Some(hooks) = self.hooks.get_mut(&stage) else {
            return Ok(());
        };
        let hooks = if when == "before" {
            &mut hooks.before
        } else {
            &mut hooks.after
        };
        let sink = &mut self.hook_output;
        for hook in hooks.iter_mut() {
            tracing::debug!(%stage, when, ?hook, "running hook");
            let outcome = match hook {
                Hook::Function(f) => f(stage),
                Hook::Shell(command) => {
                    let cmd = CommandLine::new("sh")
                        .args(["-c", command.as_str()])
                        .env("XCFORGE_STAGE", stage.name());
                    let mut forward = |line: &str| match sink.as_mut() {
                        Some(sink) => sink(stage, line),
                        None => tracing::info!(%stage, hook = %command, "{line}"),
                    };
                    self.builder.executor().execute(&cmd, &mut forward).map(|_| ())
                }
            };
            outcome.map_err(|e| {
                XcError::Build(format!("{when}-{stage} hook failed for stage '{stage}': {e}"))
            })?;
        }
        Ok(())
    }
}
