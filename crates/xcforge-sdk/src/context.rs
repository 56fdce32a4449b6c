//! Facts about the installed Xcode toolchain.
//!
//! Querying xcodebuild is slow, so answers are cached on the context until
//! [`ToolContext::invalidate`] is called. The context is passed explicitly
//! to whatever needs it; there is no global instance.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::builders::{CommandExecutor, CommandLine, SystemExecutor};
use crate::types::{Result, XcError};

static SDK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(.*?)\s+-sdk\s+(\S+)\s*$").unwrap());
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Xcode\s+(\S+)(?:\s*\nBuild version\s+(\S+))?").unwrap());

/// One SDK reported by `xcodebuild -showsdks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sdk {
    /// Value for `-sdk`, e.g. `iphonesimulator17.0`.
    pub name: String,
    /// Human readable name, e.g. `Simulator - iOS 17.0`.
    pub display_name: String,
    /// Platform section the SDK was listed under, e.g. `iOS Simulator`.
    pub platform: Option<String>,
}

impl Sdk {
    /// The SDK name without its version, e.g. `iphonesimulator`.
    pub fn family(&self) -> &str {
        self.name.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.')
    }
}

/// Installed Xcode version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XcodeVersion {
    pub version: String,
    pub build: Option<String>,
}

/// Cached toolchain queries.
pub struct ToolContext {
    executor: Box<dyn CommandExecutor>,
    sdks: Option<Vec<Sdk>>,
    version: Option<XcodeVersion>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolContext {
    pub fn new() -> Self {
        Self::with_executor(Box::new(SystemExecutor::new()))
    }

    pub fn with_executor(executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            sdks: None,
            version: None,
        }
    }

    /// Installed SDKs, queried once.
    pub fn sdks(&mut self) -> Result<&[Sdk]> {
        if self.sdks.is_none() {
            let output = self
                .executor
                .capture(&CommandLine::new("xcodebuild").arg("-showsdks"))?;
            let sdks = parse_sdks(&output);
            tracing::debug!(count = sdks.len(), "discovered SDKs");
            self.sdks = Some(sdks);
        }
        Ok(self.sdks.as_deref().unwrap_or_default())
    }

    /// Looks an SDK up by exact name or by family (`iphoneos` matches the
    /// newest `iphoneosNN.N` listed).
    pub fn sdk(&mut self, name: &str) -> Result<Sdk> {
        let sdks = self.sdks()?;
        sdks.iter()
            .find(|s| s.name == name)
            .or_else(|| sdks.iter().rev().find(|s| s.family() == name))
            .cloned()
            .ok_or_else(|| XcError::not_found("sdk", name, sdks.iter().map(|s| s.name.clone())))
    }

    /// The Xcode version, queried once.
    pub fn xcode_version(&mut self) -> Result<&XcodeVersion> {
        if self.version.is_none() {
            let output = self
                .executor
                .capture(&CommandLine::new("xcodebuild").arg("-version"))?;
            let text = output.join("\n");
            let captures = VERSION_RE.captures(&text).ok_or_else(|| XcError::Parse {
                line: 1,
                message: format!("unrecognized xcodebuild -version output: {text}"),
            })?;
            self.version = Some(XcodeVersion {
                version: captures[1].to_string(),
                build: captures.get(2).map(|m| m.as_str().to_string()),
            });
        }
        self.version
            .as_ref()
            .ok_or_else(|| XcError::Build("xcode version unavailable".to_string()))
    }

    /// Drops every cached answer.
    pub fn invalidate(&mut self) {
        self.sdks = None;
        self.version = None;
    }
}

/// Parses `xcodebuild -showsdks` output.
pub fn parse_sdks(lines: &[String]) -> Vec<Sdk> {
    let mut platform = None;
    let mut sdks = Vec::new();
    for line in lines {
        if let Some(c) = SDK_RE.captures(line) {
            sdks.push(Sdk {
                name: c[2].to_string(),
                display_name: c[1].to_string(),
                platform: platform.clone(),
            });
        } else if let Some(section) = line.trim().strip_suffix(" SDKs:") {
            platform = Some(section.to_string());
        }
    }
    sdks
}
