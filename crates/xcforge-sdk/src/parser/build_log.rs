//! xcodebuild build output to [`BuildReport`].
//!
//! Same design as the test output parser: one `ingest` call per line, an
//! ordered rule table where the first match wins, fail-soft on anything
//! unexpected, and an idempotent `flush`.
//!
//! Rule order:
//!
//! 1. terminal marker (`** BUILD SUCCEEDED **`, `** CLEAN FAILED **`, ...)
//! 2. located diagnostic (`file:line[:col]: error|warning|note: message`)
//! 3. tool diagnostic (`xcodebuild: error: ...`, `error: ...`)
//! 4. known build step (`CompileC`, `Ld`, `CodeSign`, ...)
//! 5. any other CamelCase step name
//! 6. anything else: attached to the current step as output
//!
//! The generic step rule would shadow every known step if it came first.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static TERMINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\* (BUILD|CLEAN|ARCHIVE|TEST|ANALYZE|TEST BUILD|EXPORT) (SUCCEEDED|FAILED|INTERRUPTED) \*\*")
        .unwrap()
});
static LOCATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):(?:(\d+):)? (fatal error|error|warning|note): (.*)$").unwrap()
});
static TOOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:xcodebuild|ld|clang|swift-frontend|codesign): )?(error|warning): (.*)$").unwrap()
});
static KNOWN_STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(CompileC|CompileSwift|CompileSwiftSources|SwiftCompile|SwiftDriver|Ld|Libtool|CodeSign|ProcessInfoPlistFile|CopySwiftLibs|PhaseScriptExecution|Touch|CpResource|CpHeader|CompileStoryboard|CompileXIB|CompileAssetCatalog|LinkStoryboards|ProcessProductPackaging|GenerateDSYMFile|CreateBuildDirectory|Validate)\s+(.*)$",
    )
    .unwrap()
});
static GENERIC_STEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][a-z0-9]+(?:[A-Z][A-Za-z0-9]*)+)\s+(\S.*)$").unwrap());
static IN_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(in target '([^']+)'(?: from project '([^']+)')?\)").unwrap());

/// Severity of a compiler or tool diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// One diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    /// `file:line[:column]`, when known.
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(column)) => format!("{file}:{line}:{column}"),
            (Some(line), None) => format!("{file}:{line}"),
            _ => file.clone(),
        })
    }
}

/// One build step announced by xcodebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStep {
    /// Step name as printed, e.g. `CompileC`.
    pub name: String,
    /// The rest of the announcement line.
    pub arguments: String,
    /// Target named in the `(in target 'X' ...)` suffix.
    pub target: Option<String>,
    /// Whether the name is one of the well-known steps.
    pub known: bool,
    /// Indented lines printed under the step (the invoked commands).
    pub output: Vec<String>,
}

/// Final state announced by the terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Succeeded,
    Failed,
    Interrupted,
}

/// Structured result of a build log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub steps: Vec<BuildStep>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub notes: Vec<Diagnostic>,
    /// Action and outcome from the terminal marker, e.g. (`BUILD`, Succeeded).
    pub status: Option<(String, BuildStatus)>,
    pub finished: bool,
}

impl BuildReport {
    /// Success as announced by xcodebuild; without a terminal marker, the
    /// absence of errors.
    pub fn succeeded(&self) -> bool {
        match &self.status {
            Some((_, status)) => *status == BuildStatus::Succeeded,
            None => self.errors.is_empty(),
        }
    }

    /// Steps with a given name, e.g. every `CompileC`.
    pub fn steps_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BuildStep> + 'a {
        self.steps.iter().filter(move |s| s.name == name)
    }

    /// Whether anything was recognized at all.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.errors.is_empty() && self.warnings.is_empty() && self.status.is_none()
    }
}

/// Incremental build log parser.
#[derive(Debug, Default)]
pub struct BuildLogParser {
    report: BuildReport,
    lines: usize,
}

impl BuildLogParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Feeds one output line. Never fails.
    pub fn ingest(&mut self, line: &str) {
        self.lines += 1;
        if self.report.finished {
            return;
        }
        let line = line.trim_end();

        if let Some(c) = TERMINAL_RE.captures(line) {
            let status = match &c[2] {
                "SUCCEEDED" => BuildStatus::Succeeded,
                "FAILED" => BuildStatus::Failed,
                _ => BuildStatus::Interrupted,
            };
            tracing::debug!(action = &c[1], ?status, "build finished");
            self.report.status = Some((c[1].to_string(), status));
        } else if let Some(c) = LOCATED_RE.captures(line) {
            let diagnostic = Diagnostic {
                severity: severity(&c[4]),
                message: c[5].to_string(),
                file: Some(c[1].to_string()),
                line: c[2].parse().ok(),
                column: c.get(3).and_then(|m| m.as_str().parse().ok()),
            };
            self.push_diagnostic(diagnostic);
        } else if let Some(c) = TOOL_RE.captures(line) {
            let diagnostic = Diagnostic {
                severity: severity(&c[1]),
                message: c[2].to_string(),
                file: None,
                line: None,
                column: None,
            };
            self.push_diagnostic(diagnostic);
        } else if let Some(c) = KNOWN_STEP_RE.captures(line) {
            self.push_step(&c[1], &c[2], true);
        } else if let Some(c) = GENERIC_STEP_RE.captures(line) {
            self.push_step(&c[1], &c[2], false);
        } else if let Some(step) = self.report.steps.last_mut() {
            if !line.trim().is_empty() {
                step.output.push(line.trim_start().to_string());
            }
        }
    }

    fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => {
                tracing::debug!(message = %diagnostic.message, location = ?diagnostic.location(), "build error");
                self.report.errors.push(diagnostic);
            }
            Severity::Warning => self.report.warnings.push(diagnostic),
            Severity::Note => self.report.notes.push(diagnostic),
        }
    }

    fn push_step(&mut self, name: &str, arguments: &str, known: bool) {
        let target = IN_TARGET_RE.captures(arguments).map(|c| c[1].to_string());
        tracing::trace!(step = name, known, "build step");
        self.report.steps.push(BuildStep {
            name: name.to_string(),
            arguments: arguments.to_string(),
            target,
            known,
            output: Vec::new(),
        });
    }

    /// Ends the log. Calling it again has no effect.
    pub fn flush(&mut self) -> &BuildReport {
        if !self.report.finished {
            if self.report.status.is_none() {
                tracing::debug!(lines = self.lines, "build log ended without a terminal marker");
            }
            self.report.finished = true;
        }
        &self.report
    }

    pub fn into_report(mut self) -> BuildReport {
        self.flush();
        self.report
    }
}

fn severity(text: &str) -> Severity {
    match text {
        "warning" => Severity::Warning,
        "note" => Severity::Note,
        _ => Severity::Error,
    }
}
