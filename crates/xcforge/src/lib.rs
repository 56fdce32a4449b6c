//! # xcforge
//!
//! Command-line tool for inspecting and editing Xcode projects and for running
//! xcodebuild with structured output.
//!
//! ## Overview
//!
//! `xcforge` is the CLI front end of `xcforge-sdk`. It handles:
//!
//! - **Project editing** - Lists targets and configurations, reads and writes
//!   build settings, adds files to groups and build phases
//! - **Building** - Runs xcodebuild and summarizes steps, warnings and errors
//! - **Testing** - Parses test output into a report and writes JUnit XML
//!
//! ## Installation
//!
//! ```bash
//! cargo install xcforge
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter config
//! xcforge init --project App.xcodeproj --scheme App
//!
//! # Inspect the project
//! xcforge info
//! xcforge targets
//!
//! # Change a build setting
//! xcforge set-setting --target App --config Release PRODUCT_NAME "My App"
//!
//! # Run the tests with JUnit output
//! xcforge test --formatter console --formatter junit
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Write a starter `xcforge.toml` |
//! | `info` | Summarize a project |
//! | `targets` | List targets and product types |
//! | `configs` | List build configurations |
//! | `get-setting` | Print a build setting |
//! | `set-setting` | Set or append to a build setting |
//! | `add-file` | Add a file reference to a group and target |
//! | `schemes` | List schemes |
//! | `sdks` | List installed SDKs |
//! | `build` | Run xcodebuild build |
//! | `test` | Run xcodebuild test and report results |
//! | `pipeline` | Run clean, build, test and package with hooks |
//! | `parse-log` | Replay a saved log into a report |
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`. The filter is read from
//! `XCFORGE_LOG` (e.g. `XCFORGE_LOG=xcforge_sdk=trace`); without it the
//! level is `info`, or `debug` with `--verbose`.
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `xcforge.toml`

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use xcforge_sdk::builders::{Pipeline, XcodeBuilder};
use xcforge_sdk::parser::{BuildLogParser, BuildReport, TestOutputParser};
use xcforge_sdk::project::capabilities::BuildPhaseKind;
use xcforge_sdk::project::codec::{ListCodec, StringCodec};
use xcforge_sdk::project::value::Value;
use xcforge_sdk::report::{Formatter, FormatterOptions, FormatterRegistry, Report};
use xcforge_sdk::{BuildResult, Project, Resource, ToolContext};

use config::{BuildOverrides, CONFIG_FILE_NAME, ConfigResolver, XcforgeConfig};

pub mod config;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "XCFORGE_LOG";

/// Xcode project editing and xcodebuild automation.
#[derive(Parser, Debug)]
#[command(name = "xcforge", author, version, about = "Xcode project and build automation", long_about = None)]
struct Cli {
    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Config file to use instead of discovering xcforge.toml
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter xcforge.toml.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, default_value = "App.xcodeproj")]
        project: String,
        #[arg(long, default_value = "App")]
        scheme: String,
    },
    /// Summarize a project: targets, configurations, schemes.
    Info {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// List targets with their product types.
    Targets {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// List build configurations of the project or of one target.
    Configs {
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        target: Option<String>,
    },
    /// Print one build setting.
    GetSetting {
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long, default_value = "Debug")]
        config: String,
        key: String,
    },
    /// Set (or append to) a build setting and save the project.
    SetSetting {
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        target: Option<String>,
        /// Configuration to change; repeat for several. Defaults to all.
        #[arg(long = "config")]
        configs: Vec<String>,
        /// Append instead of replacing
        #[arg(long)]
        append: bool,
        /// Store the values as a list even if there is only one
        #[arg(long)]
        list: bool,
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Add a file reference to a group, and optionally to a target.
    AddFile {
        #[arg(long)]
        project: Option<PathBuf>,
        /// Group under the main group; created when missing
        #[arg(long)]
        group: Option<String>,
        /// Target whose build phase receives the file
        #[arg(long)]
        target: Option<String>,
        path: String,
    },
    /// List the schemes of a project.
    Schemes {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// List the installed SDKs.
    Sdks,
    /// Run xcodebuild build.
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Run xcodebuild test and report the results.
    Test {
        #[command(flatten)]
        build: BuildArgs,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Run the clean, build, test and package stages with their hooks.
    Pipeline {
        #[command(flatten)]
        build: BuildArgs,
        #[command(flatten)]
        report: ReportArgs,
        /// Stage to run; repeat for several. Defaults to [pipeline].stages.
        #[arg(long = "stage")]
        stages: Vec<String>,
    },
    /// Parse a saved xcodebuild log offline.
    ParseLog {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = LogKind::Test)]
        kind: LogKind,
        #[command(flatten)]
        report: ReportArgs,
    },
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    #[arg(long)]
    project: Option<PathBuf>,
    #[arg(long)]
    workspace: Option<PathBuf>,
    #[arg(long)]
    scheme: Option<String>,
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    configuration: Option<String>,
    #[arg(long)]
    sdk: Option<String>,
    #[arg(long)]
    destination: Option<String>,
    #[arg(long)]
    derived_data: Option<PathBuf>,
    /// Extra build setting, KEY=VALUE; repeatable
    #[arg(long = "setting")]
    settings: Vec<String>,
}

impl From<BuildArgs> for BuildOverrides {
    fn from(args: BuildArgs) -> Self {
        Self {
            project: args.project,
            workspace: args.workspace,
            scheme: args.scheme,
            target: args.target,
            configuration: args.configuration,
            sdk: args.sdk,
            destination: args.destination,
            derived_data: args.derived_data,
            settings: args.settings,
        }
    }
}

#[derive(Args, Debug, Default)]
struct ReportArgs {
    /// Report formatter (console, junit); repeatable
    #[arg(long = "formatter")]
    formatters: Vec<String>,
    /// Directory for file reports
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Also write the parsed report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogKind {
    Build,
    Test,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let resolver = match &cli.config_file {
        Some(path) => ConfigResolver::from_file(path)?,
        None => ConfigResolver::new()?,
    };
    let cwd = env::current_dir().context("Failed to get current directory")?;

    match cli.command {
        Command::Init {
            output,
            project,
            scheme,
        } => {
            ensure_can_write(&output)?;
            write_file(&output, XcforgeConfig::generate_starter_toml(&project, &scheme).as_bytes())?;
            println!("Wrote starter config to {:?}", output);
        }
        Command::Info { project } => {
            let project = open_project(&resolver, project, &cwd)?;
            cmd_info(&project)?;
        }
        Command::Targets { project } => {
            let project = open_project(&resolver, project, &cwd)?;
            for target in project.targets()? {
                let product = target
                    .product_type()?
                    .map(|p| p.identifier().to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}", target.name()?, product);
            }
        }
        Command::Configs { project, target } => {
            let project = open_project(&resolver, project, &cwd)?;
            let owner = configs_owner(&project, target.as_deref())?;
            let default = owner.configuration_list()?.default_configuration_name()?;
            for config in owner.configs()? {
                let name = config.name()?;
                let marker = if default.as_deref() == Some(name.as_str()) { " (default)" } else { "" };
                println!("{name}{marker}");
            }
        }
        Command::GetSetting {
            project,
            target,
            config,
            key,
        } => {
            let project = open_project(&resolver, project, &cwd)?;
            let owner = configs_owner(&project, target.as_deref())?;
            let config = owner.config(&config)?;
            match config.build_settings()?.get(&key) {
                Some(value) => println!("{}", render_value(value)),
                None => bail!("{key} is not set in configuration {:?}", config.name()?),
            }
        }
        Command::SetSetting {
            project,
            target,
            configs,
            append,
            list,
            key,
            values,
        } => {
            let project = open_project(&resolver, project, &cwd)?;
            let owner = configs_owner(&project, target.as_deref())?;
            let selected = if configs.is_empty() {
                owner.configs()?
            } else {
                configs
                    .iter()
                    .map(|name| owner.config(name))
                    .collect::<xcforge_sdk::Result<Vec<_>>>()?
            };
            for mut config in selected {
                set_setting(&mut config, &key, &values, append, list)?;
                println!("  {} {} in {}", if append { "Appended to" } else { "Set" }, key, config.name()?);
            }
            project.save()?;
            println!("✓ Saved {}", project.name());
        }
        Command::AddFile {
            project,
            group,
            target,
            path,
        } => {
            let project = open_project(&resolver, project, &cwd)?;
            cmd_add_file(&project, group.as_deref(), target.as_deref(), &path)?;
            project.save()?;
            println!("✓ Added {path} to {}", project.name());
        }
        Command::Schemes { project } => {
            let project = open_project(&resolver, project, &cwd)?;
            for scheme in project.schemes() {
                let scope = if scheme.shared { "shared" } else { "user" };
                println!("{}\t{}", scheme.name, scope);
            }
        }
        Command::Sdks => {
            let mut context = ToolContext::new();
            for sdk in context.sdks()? {
                println!("{:<28}{}", sdk.name, sdk.display_name);
            }
        }
        Command::Build { build } => {
            let config = resolver.build_config(build.into(), &cwd)?;
            let result = XcodeBuilder::new().verbose(cli.verbose).build(&config)?;
            print_build_summary(&result.build);
            if !result.succeeded() {
                bail!("xcodebuild build failed");
            }
        }
        Command::Test { build, report } => {
            let config = resolver.build_config(build.into(), &cwd)?;
            let formatters = create_formatters(&resolver, &report, cli.verbose)?;
            let result = XcodeBuilder::new().verbose(cli.verbose).test(&config, formatters)?;
            finish_test_run(&result, report.json.as_deref())?;
        }
        Command::Pipeline {
            build,
            report,
            stages,
        } => {
            let config = resolver.build_config(build.into(), &cwd)?;
            let formatters = create_formatters(&resolver, &report, cli.verbose)?;
            let builder = XcodeBuilder::new().verbose(cli.verbose);
            let mut pipeline = Pipeline::new(&builder, config)
                .stages(resolver.stages(stages)?)
                .formatters(formatters)
                .on_hook_output(|_, line| println!("  {line}"));
            for (stage, before, after) in resolver.hooks()? {
                for hook in before {
                    pipeline = pipeline.before(stage, hook);
                }
                for hook in after {
                    pipeline = pipeline.after(stage, hook);
                }
            }
            let outcome = pipeline.run()?;
            for (stage, result) in &outcome.results {
                let status = if result.succeeded() { "✓" } else { "✗" };
                println!("{status} {stage}");
            }
            if let Some(stage) = outcome.failed_stage() {
                bail!("pipeline stopped at the {stage} stage");
            }
        }
        Command::ParseLog { path, kind, report } => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading log {:?}", path))?;
            match kind {
                LogKind::Build => {
                    let parsed = parse_build_log(&text);
                    print_build_summary(&parsed);
                    if let Some(json) = &report.json {
                        write_file(json, serde_json::to_string_pretty(&parsed)?.as_bytes())?;
                    }
                }
                LogKind::Test => {
                    let formatters = create_formatters(&resolver, &report, cli.verbose)?;
                    let parsed = parse_test_log(&text, formatters);
                    if let Some(json) = &report.json {
                        write_file(json, parsed.to_json()?.as_bytes())?;
                    }
                    if parsed.failed() {
                        bail!("{} of {} tests failed", parsed.failure_count(), parsed.test_count());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Installs the stderr subscriber; `XCFORGE_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn open_project(resolver: &ConfigResolver, cli_value: Option<PathBuf>, cwd: &Path) -> Result<Project> {
    let path = resolver.project_path(cli_value, cwd)?;
    Project::open(&path).with_context(|| format!("opening Xcode project {:?}", path))
}

/// The object whose configurations a command works on: a target, or the
/// project itself.
fn configs_owner(project: &Project, target: Option<&str>) -> Result<Resource> {
    Ok(match target {
        Some(name) => project.target(name)?,
        None => project.root(),
    })
}

fn cmd_info(project: &Project) -> Result<()> {
    println!("Project: {}", project.name());
    if let Some(path) = project.path() {
        println!("  Path: {}", path.display());
    }
    println!("  Objects: {}", project.registry().borrow().len());

    let targets = project.targets()?;
    println!("  Targets ({}):", targets.len());
    for target in &targets {
        println!("    {}", target.name()?);
    }

    let configs = project.root().configs()?;
    let names = configs
        .iter()
        .map(|c| c.name())
        .collect::<xcforge_sdk::Result<Vec<_>>>()?;
    println!("  Configurations: {}", names.join(", "));

    let schemes: Vec<&str> = project.schemes().iter().map(|s| s.name.as_str()).collect();
    println!("  Schemes: {}", if schemes.is_empty() { "-".to_string() } else { schemes.join(", ") });
    Ok(())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Dict(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

fn set_setting(config: &mut Resource, key: &str, values: &[String], append: bool, list: bool) -> Result<()> {
    if list || values.len() > 1 {
        let values = values.to_vec();
        if append {
            config.append_setting::<ListCodec>(key, values)?;
        } else {
            config.set_setting::<ListCodec>(key, values)?;
        }
    } else {
        let value = values.join(" ");
        if append {
            config.append_setting::<StringCodec>(key, value)?;
        } else {
            config.set_setting::<StringCodec>(key, value)?;
        }
    }
    Ok(())
}

fn cmd_add_file(project: &Project, group: Option<&str>, target: Option<&str>, path: &str) -> Result<()> {
    let mut main_group = project.main_group()?;
    let mut parent = match group {
        Some(name) => match main_group.group(name) {
            Ok(existing) => existing,
            Err(xcforge_sdk::XcError::NotFound { .. }) => {
                println!("  Creating group {name}");
                main_group.add_group(name)?
            }
            Err(e) => return Err(e.into()),
        },
        None => main_group,
    };
    if parent.find_by_path(path)?.is_some() {
        bail!("{path} is already in the group");
    }
    let file_ref = parent.add_file(path)?;

    if let Some(name) = target {
        let target = project.target(name)?;
        let kind = phase_for(file_ref.file_type()?.as_deref());
        let mut phase = target.build_phase(kind)?;
        phase.add_build_file(&file_ref)?;
        println!("  Added to {} of {}", kind.isa(), name);
    }
    Ok(())
}

/// Build phase a file of the given type belongs to.
fn phase_for(file_type: Option<&str>) -> BuildPhaseKind {
    match file_type {
        Some(t) if t.starts_with("sourcecode.") && t != "sourcecode.c.h" => BuildPhaseKind::Sources,
        Some(t) if t.starts_with("wrapper.framework") || t.starts_with("archive.ar") => BuildPhaseKind::Frameworks,
        _ => BuildPhaseKind::Resources,
    }
}

fn create_formatters(resolver: &ConfigResolver, args: &ReportArgs, verbose: bool) -> Result<Vec<Box<dyn Formatter>>> {
    let names = resolver.formatters(args.formatters.clone());
    let options = FormatterOptions {
        output_dir: Some(resolver.output_dir(args.output_dir.clone())),
        verbose,
    };
    Ok(FormatterRegistry::with_defaults().create_all(names.as_slice(), &options)?)
}

fn parse_build_log(text: &str) -> BuildReport {
    let mut parser = BuildLogParser::new();
    for line in text.lines() {
        parser.ingest(line);
    }
    parser.into_report()
}

fn parse_test_log(text: &str, formatters: Vec<Box<dyn Formatter>>) -> Report {
    let mut parser = TestOutputParser::with_formatters(formatters);
    for line in text.lines() {
        parser.ingest(line);
    }
    parser.into_report()
}

fn print_build_summary(report: &BuildReport) {
    for warning in &report.warnings {
        println!("warning: {}{}", location_prefix(warning.location()), warning.message);
    }
    for error in &report.errors {
        println!("error: {}{}", location_prefix(error.location()), error.message);
    }
    let status = match &report.status {
        Some((action, status)) => format!("{action} {status:?}"),
        None => "no result marker".to_string(),
    };
    println!(
        "\n{} steps, {} warnings, {} errors ({})",
        report.steps.len(),
        report.warnings.len(),
        report.errors.len(),
        status
    );
}

fn location_prefix(location: Option<String>) -> String {
    location.map(|l| format!("{l}: ")).unwrap_or_default()
}

fn finish_test_run(result: &BuildResult, json: Option<&Path>) -> Result<()> {
    if let (Some(path), Some(report)) = (json, &result.tests) {
        write_file(path, report.to_json()?.as_bytes())?;
        println!("Wrote JSON report to {:?}", path);
    }
    if !result.succeeded() {
        match &result.tests {
            Some(report) if report.unexpected => bail!("test run ended unexpectedly"),
            Some(report) => bail!("{} of {} tests failed", report.failure_count(), report.test_count()),
            None => bail!("xcodebuild test failed"),
        }
    }
    Ok(())
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    fs::write(path, contents).with_context(|| format!("writing file {:?}", path))
}
