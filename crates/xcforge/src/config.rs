//! Configuration file support for xcforge.
//!
//! This module provides support for `xcforge.toml` configuration files that allow
//! users to persist project settings and avoid passing CLI flags repeatedly.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. Current working directory (`./xcforge.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! Relative paths in the file are resolved against the directory containing it.
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! path = "App.xcodeproj"
//!
//! [build]
//! scheme = "App"
//! configuration = "Debug"
//! sdk = "iphonesimulator"
//! destination = "platform=iOS Simulator,name=iPhone 15"
//!
//! [build.settings]
//! CODE_SIGNING_ALLOWED = "NO"
//!
//! [test]
//! formatters = ["console", "junit"]
//! output_dir = "build/reports"
//!
//! [pipeline]
//! stages = ["build", "test"]
//!
//! [pipeline.hooks.build]
//! before = ["swiftlint --strict"]
//! ```
//!
//! Unknown keys are rejected so that typos surface immediately.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use xcforge_sdk::BuildConfig;
use xcforge_sdk::builders::{Hook, Stage};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "xcforge.toml";

/// Root configuration structure for `xcforge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XcforgeConfig {
    /// Which project or workspace to operate on.
    pub project: ProjectConfig,

    /// xcodebuild defaults.
    pub build: BuildSection,

    /// Test reporting.
    pub test: TestConfig,

    /// Stages and hooks for `xcforge pipeline`.
    pub pipeline: PipelineConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Path to the `.xcodeproj` bundle.
    ///
    /// If not specified, xcforge uses the only `.xcodeproj` in the current
    /// directory.
    pub path: Option<PathBuf>,

    /// Path to an `.xcworkspace`; builds use it instead of the project.
    pub workspace: Option<PathBuf>,
}

/// xcodebuild defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    pub scheme: Option<String>,

    /// Build configuration name. Defaults to whatever the scheme uses.
    pub configuration: Option<String>,

    pub sdk: Option<String>,

    pub destination: Option<String>,

    /// Custom derived data location.
    pub derived_data: Option<PathBuf>,

    /// Extra `KEY=VALUE` build setting overrides.
    pub settings: BTreeMap<String, String>,
}

/// Test reporting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    /// Formatter names, see `xcforge test --help`.
    ///
    /// Defaults to `["console"]`.
    pub formatters: Vec<String>,

    /// Directory for file-based reports such as JUnit XML.
    ///
    /// Defaults to `build/reports`.
    pub output_dir: PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            formatters: vec!["console".to_string()],
            output_dir: PathBuf::from("build/reports"),
        }
    }
}

/// Pipeline stages and hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Stages to run. Empty means all of them.
    pub stages: Vec<String>,

    /// Shell hooks keyed by stage name.
    pub hooks: BTreeMap<String, HookConfig>,
}

/// Shell commands run around one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl XcforgeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: XcforgeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Saves the configuration to the specified file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Generates a starter configuration for a project.
    pub fn starter(project: &str, scheme: &str) -> Self {
        Self {
            project: ProjectConfig {
                path: Some(PathBuf::from(project)),
                workspace: None,
            },
            build: BuildSection {
                scheme: Some(scheme.to_string()),
                configuration: Some("Debug".to_string()),
                sdk: Some("iphonesimulator".to_string()),
                ..BuildSection::default()
            },
            test: TestConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// This includes helpful comments explaining each configuration option.
    pub fn generate_starter_toml(project: &str, scheme: &str) -> String {
        format!(
            r#"# xcforge configuration file
# CLI flags override these settings when provided.

[project]
# Path to the Xcode project, relative to this file
path = "{project}"

# Build through a workspace instead (requires a scheme)
# workspace = "App.xcworkspace"

[build]
# Scheme to build and test
scheme = "{scheme}"

# Build configuration (default: the scheme's own)
configuration = "Debug"

# SDK to build against
sdk = "iphonesimulator"

# Destination for test runs
# destination = "platform=iOS Simulator,name=iPhone 15"

# Custom derived data location
# derived_data = "build/DerivedData"

[build.settings]
# Extra KEY = "VALUE" build settings passed to xcodebuild
# CODE_SIGNING_ALLOWED = "NO"

[test]
# Report formatters: console, junit
formatters = ["console", "junit"]

# Directory for JUnit XML and other file reports
output_dir = "build/reports"

[pipeline]
# Stages to run with `xcforge pipeline` (default: clean, build, test, package)
stages = ["build", "test"]

# Shell hooks around a stage; a failing hook stops the pipeline
# [pipeline.hooks.build]
# before = ["swiftlint --strict"]
# after = []
"#,
            project = project,
            scheme = scheme,
        )
    }
}

/// Build flags given on the command line.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    pub project: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub scheme: Option<String>,
    pub target: Option<String>,
    pub configuration: Option<String>,
    pub sdk: Option<String>,
    pub destination: Option<String>,
    pub derived_data: Option<PathBuf>,
    /// `KEY=VALUE` pairs.
    pub settings: Vec<String>,
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<XcforgeConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a new resolver by discovering and loading configuration.
    pub fn new() -> Result<Self> {
        match XcforgeConfig::discover()? {
            Some((config, path)) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                Ok(Self {
                    config: Some(config),
                    config_path: Some(path),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Loads an explicit config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            config: Some(XcforgeConfig::load_from_file(path)?),
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// The resolved value prefers CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&XcforgeConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    fn pick<T, F>(&self, cli_value: Option<T>, config_getter: F) -> Option<T>
    where
        F: FnOnce(&XcforgeConfig) -> Option<T>,
    {
        cli_value.or_else(|| self.config.as_ref().and_then(config_getter))
    }

    /// Makes a path from the config file relative to the file's directory.
    fn config_relative(&self, path: &Path) -> PathBuf {
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// The project bundle to edit: `--project`, then `[project].path`, then
    /// the only `.xcodeproj` in `cwd`.
    pub fn project_path(&self, cli_value: Option<PathBuf>, cwd: &Path) -> Result<PathBuf> {
        if let Some(path) = cli_value {
            return Ok(path);
        }
        if let Some(path) = self.config.as_ref().and_then(|c| c.project.path.as_deref()) {
            return Ok(self.config_relative(path));
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(cwd)
            .with_context(|| format!("Failed to list directory {:?}", cwd))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "xcodeproj"))
            .collect();
        candidates.sort();
        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => bail!(
                "No Xcode project found in {:?}.\n\n\
                 Pass --project or set [project].path in {}.",
                cwd,
                CONFIG_FILE_NAME
            ),
            _ => bail!(
                "Several Xcode projects found in {:?}: {:?}.\n\n\
                 Pass --project or set [project].path in {}.",
                cwd,
                candidates,
                CONFIG_FILE_NAME
            ),
        }
    }

    /// Merges CLI flags and the `[project]`/`[build]` sections into a
    /// [`BuildConfig`].
    pub fn build_config(&self, cli: BuildOverrides, cwd: &Path) -> Result<BuildConfig> {
        let workspace = match cli.workspace {
            Some(path) => Some(path),
            None if cli.project.is_some() => None,
            None => self
                .config
                .as_ref()
                .and_then(|c| c.project.workspace.as_deref())
                .map(|p| self.config_relative(p)),
        };
        let mut config = match workspace {
            Some(workspace) => BuildConfig::for_workspace(workspace),
            None => BuildConfig::for_project(self.project_path(cli.project, cwd)?),
        };

        config.scheme = self.pick(cli.scheme, |c| c.build.scheme.clone());
        config.target = cli.target;
        config.configuration = self.pick(cli.configuration, |c| c.build.configuration.clone());
        config.sdk = self.pick(cli.sdk, |c| c.build.sdk.clone());
        config.destination = self.pick(cli.destination, |c| c.build.destination.clone());
        config.derived_data = cli.derived_data.or_else(|| {
            self.config
                .as_ref()
                .and_then(|c| c.build.derived_data.as_deref())
                .map(|p| self.config_relative(p))
        });

        if let Some(file) = &self.config {
            for (key, value) in &file.build.settings {
                if !cli.settings.iter().any(|s| s.split('=').next() == Some(key.as_str())) {
                    config = config.setting(key, value);
                }
            }
        }
        for setting in &cli.settings {
            let Some((key, value)) = setting.split_once('=') else {
                bail!("Invalid build setting {:?}: expected KEY=VALUE", setting);
            };
            config = config.setting(key, value);
        }
        Ok(config)
    }

    /// Formatter names: CLI list if given, else `[test].formatters`.
    pub fn formatters(&self, cli_value: Vec<String>) -> Vec<String> {
        if !cli_value.is_empty() {
            return cli_value;
        }
        self.config
            .as_ref()
            .map(|c| c.test.formatters.clone())
            .unwrap_or_else(|| TestConfig::default().formatters)
    }

    /// Report directory: CLI, then `[test].output_dir`, then `build/reports`.
    pub fn output_dir(&self, cli_value: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = cli_value {
            return dir;
        }
        match &self.config {
            Some(c) => self.config_relative(&c.test.output_dir),
            None => TestConfig::default().output_dir,
        }
    }

    /// Pipeline stages: CLI, then `[pipeline].stages`, then all of them.
    pub fn stages(&self, cli_value: Vec<String>) -> Result<Vec<Stage>> {
        let names = if cli_value.is_empty() {
            self.config
                .as_ref()
                .map(|c| c.pipeline.stages.clone())
                .unwrap_or_default()
        } else {
            cli_value
        };
        if names.is_empty() {
            return Ok(Stage::ALL.to_vec());
        }
        names
            .iter()
            .map(|name| name.parse::<Stage>().map_err(anyhow::Error::from))
            .collect()
    }

    /// Shell hooks from `[pipeline.hooks]`, as (stage, before, after).
    pub fn hooks(&self) -> Result<Vec<(Stage, Vec<Hook>, Vec<Hook>)>> {
        let Some(config) = &self.config else {
            return Ok(Vec::new());
        };
        config
            .pipeline
            .hooks
            .iter()
            .map(|(name, hooks)| {
                let stage = name
                    .parse::<Stage>()
                    .with_context(|| format!("in [pipeline.hooks.{name}]"))?;
                Ok((
                    stage,
                    hooks.before.iter().map(Hook::shell).collect(),
                    hooks.after.iter().map(Hook::shell).collect(),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const FULL: &str = r#"
[project]
path = "ios/App.xcodeproj"

[build]
scheme = "App"
configuration = "Release"
sdk = "iphoneos"
derived_data = "build/dd"

[build.settings]
CODE_SIGNING_ALLOWED = "NO"
ONLY_ACTIVE_ARCH = "YES"

[test]
formatters = ["console", "junit"]
output_dir = "out"

[pipeline]
stages = ["build", "test"]

[pipeline.hooks.build]
before = ["echo one"]
after = ["echo two", "echo three"]
"#;

    fn resolver_with(contents: &str) -> (TempDir, ConfigResolver) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        let resolver = ConfigResolver::from_file(&path).unwrap();
        (temp_dir, resolver)
    }

    #[test]
    fn test_default_config() {
        let config = XcforgeConfig::default();
        assert_eq!(config.test.formatters, vec!["console"]);
        assert_eq!(config.test.output_dir, PathBuf::from("build/reports"));
        assert!(config.pipeline.stages.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let (_dir, resolver) = resolver_with(FULL);
        let config = resolver.config.unwrap();
        assert_eq!(config.project.path, Some(PathBuf::from("ios/App.xcodeproj")));
        assert_eq!(config.build.scheme.as_deref(), Some("App"));
        assert_eq!(config.build.settings.len(), 2);
        assert_eq!(config.pipeline.hooks["build"].after.len(), 2);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[build]\nshceme = \"App\"\n").unwrap();
        let err = XcforgeConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("shceme"));
    }

    #[test]
    fn test_discover_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[build]\nscheme = \"Found\"\n").unwrap();
        let nested = temp_dir.path().join("ios").join("App");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = XcforgeConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.build.scheme.as_deref(), Some("Found"));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_no_config() {
        let temp_dir = TempDir::new().unwrap();
        // Create a .git directory to stop the search
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        let result = XcforgeConfig::discover_from(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_cli_overrides_config() {
        let (dir, resolver) = resolver_with(FULL);
        let overrides = BuildOverrides {
            scheme: Some("AppTests".into()),
            settings: vec!["ONLY_ACTIVE_ARCH=NO".into()],
            ..BuildOverrides::default()
        };
        let config = resolver.build_config(overrides, dir.path()).unwrap();

        assert_eq!(config.project, Some(dir.path().join("ios/App.xcodeproj")));
        assert_eq!(config.scheme.as_deref(), Some("AppTests"));
        assert_eq!(config.configuration.as_deref(), Some("Release"));
        assert_eq!(config.derived_data, Some(dir.path().join("build/dd")));
        assert_eq!(
            config.settings,
            vec![
                ("CODE_SIGNING_ALLOWED".to_string(), "NO".to_string()),
                ("ONLY_ACTIVE_ARCH".to_string(), "NO".to_string()),
            ]
        );
    }

    #[test]
    fn test_bad_setting_override() {
        let (dir, resolver) = resolver_with(FULL);
        let overrides = BuildOverrides {
            settings: vec!["NOVALUE".into()],
            ..BuildOverrides::default()
        };
        assert!(resolver.build_config(overrides, dir.path()).is_err());
    }

    #[test]
    fn test_project_autodetect() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = ConfigResolver::default();
        assert!(resolver.project_path(None, temp_dir.path()).is_err());

        std::fs::create_dir(temp_dir.path().join("App.xcodeproj")).unwrap();
        assert_eq!(
            resolver.project_path(None, temp_dir.path()).unwrap(),
            temp_dir.path().join("App.xcodeproj")
        );

        std::fs::create_dir(temp_dir.path().join("Other.xcodeproj")).unwrap();
        let err = resolver.project_path(None, temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("Several Xcode projects"));
    }

    #[test]
    fn test_stages_and_hooks() {
        let (dir, resolver) = resolver_with(FULL);
        assert_eq!(resolver.stages(Vec::new()).unwrap(), vec![Stage::Build, Stage::Test]);
        assert_eq!(resolver.stages(vec!["clean".into()]).unwrap(), vec![Stage::Clean]);
        assert!(resolver.stages(vec!["deploy".into()]).is_err());

        let hooks = resolver.hooks().unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].0, Stage::Build);
        assert_eq!(hooks[0].1.len(), 1);
        assert_eq!(hooks[0].2.len(), 2);

        assert_eq!(resolver.output_dir(None), dir.path().join("out"));
        assert_eq!(resolver.formatters(Vec::new()), vec!["console", "junit"]);
        assert_eq!(ConfigResolver::default().stages(Vec::new()).unwrap(), Stage::ALL.to_vec());
    }

    #[test]
    fn test_resolve_precedence() {
        let resolver = ConfigResolver {
            config: Some(XcforgeConfig::starter("App.xcodeproj", "App")),
            config_path: None,
        };
        let scheme = resolver.resolve(Some("Cli".to_string()), |c| c.build.scheme.clone(), "Default".into());
        assert_eq!(scheme, "Cli");
        let scheme = resolver.resolve(None, |c| c.build.scheme.clone(), "Default".into());
        assert_eq!(scheme, "App");
    }

    #[test]
    fn test_generate_starter_toml() {
        let toml = XcforgeConfig::generate_starter_toml("App.xcodeproj", "App");
        let config: XcforgeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.project.path, Some(PathBuf::from("App.xcodeproj")));
        assert_eq!(config.build.scheme.as_deref(), Some("App"));
        assert_eq!(config.test.formatters, vec!["console", "junit"]);
        assert_eq!(config.pipeline.stages, vec!["build", "test"]);
    }
}
