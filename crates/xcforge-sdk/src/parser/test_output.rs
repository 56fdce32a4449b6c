//! Test runner output to [`Report`].
//!
//! [`TestOutputParser::ingest`] is called once per output line. Each line is
//! matched against [`RULES`] in order and the first rule that matches wins:
//!
//! 1. suite started
//! 2. suite finished
//! 3. test case started
//! 4. test case passed
//! 5. inline error (`file:line: error: -[Suite test] : message`)
//! 6. test case failed
//! 7. fatal markers (crashes, `BUILD FAILED`)
//! 8. anything else: buffered as free text for the current test
//!
//! The order matters: several patterns overlap, and the free-text rule
//! matches everything.
//!
//! Suite names that contain a path separator (the `.xctest` bundle path
//! printed by some runners) mark the start and end of the whole run instead
//! of a nested suite.
//!
//! Unparseable lines are logged and skipped; ingesting never fails.
//! [`TestOutputParser::flush`] must be called once the process has ended,
//! however it ended, so the report always reaches a terminal state.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::report::{Formatter, Report, TestError};
use crate::types::{Result, XcError};

/// Line classes, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    SuiteStarted,
    SuiteFinished,
    TestStarted,
    TestPassed,
    InlineError,
    TestFailed,
    Fatal,
    FreeText,
}

static SUITE_STARTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:Test )?Suite '(.+)' started at (.+?)\.?\s*$").unwrap());
static SUITE_FINISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Test )?Suite '(.+)' (?:finished|passed|failed) at (.+?)\.?\s*$").unwrap()
});
static TEST_STARTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Test Case '-\[(\S+) ([^\]]+)\]' started\.?\s*$").unwrap());
static TEST_PASSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Test Case '-\[(\S+) ([^\]]+)\]' passed \((\S+) seconds\)\.?\s*$").unwrap()
});
static INLINE_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?):(\d+): error: -\[(\S+) ([^\]]+)\] : (.*)$").unwrap()
});
static TEST_FAILED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Test Case '-\[(\S+) ([^\]]+)\]' failed \((\S+) seconds\)\.?\s*$").unwrap()
});
static FATAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Segmentation fault|Bus error|Abort trap|Illegal instruction|\*\* BUILD FAILED \*\*|BUILD FAILED|Restarting after unexpected exit",
    )
    .unwrap()
});

/// Ordered classification table. The catch-all is not listed: a line that
/// matches nothing is free text.
pub static RULES: &[(LineKind, &LazyLock<Regex>)] = &[
    (LineKind::SuiteStarted, &SUITE_STARTED_RE),
    (LineKind::SuiteFinished, &SUITE_FINISHED_RE),
    (LineKind::TestStarted, &TEST_STARTED_RE),
    (LineKind::TestPassed, &TEST_PASSED_RE),
    (LineKind::InlineError, &INLINE_ERROR_RE),
    (LineKind::TestFailed, &TEST_FAILED_RE),
    (LineKind::Fatal, &FATAL_RE),
];

/// Classifies one line without touching any state.
pub fn classify(line: &str) -> (LineKind, Option<Captures<'_>>) {
    for (kind, re) in RULES {
        if let Some(captures) = re.captures(line) {
            return (*kind, Some(captures));
        }
    }
    (LineKind::FreeText, None)
}

fn is_path_like(name: &str) -> bool {
    name.contains('/') || name.contains('\\')
}

/// Incremental test output parser.
///
/// # Example
///
/// ```
/// use xcforge_sdk::parser::TestOutputParser;
///
/// let mut parser = TestOutputParser::new();
/// for line in [
///     "Suite 'S' started at 2024-01-01 10:00:00.000",
///     "Test Case '-[S t1]' started.",
///     "Test Case '-[S t1]' passed (0.003 seconds).",
///     "Suite 'S' finished at 2024-01-01 10:00:01.000.",
/// ] {
///     parser.ingest(line);
/// }
/// let report = parser.flush();
/// assert!(!report.failed());
/// assert_eq!(report.suites[0].tests[0].duration, Some(0.003));
/// ```
#[derive(Debug, Default)]
pub struct TestOutputParser {
    report: Report,
    /// Open suites, innermost last.
    suites: Vec<usize>,
    /// (suite, test) of the running test.
    current: Option<(usize, usize)>,
    /// Free text not yet attributed to an error.
    buffer: Vec<String>,
    lines: usize,
}

impl TestOutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a formatter on the report being built.
    pub fn add_formatter(&mut self, formatter: Box<dyn Formatter>) {
        self.report.add_observer(formatter);
    }

    pub fn with_formatters(formatters: Vec<Box<dyn Formatter>>) -> Self {
        let mut parser = Self::new();
        for formatter in formatters {
            parser.add_formatter(formatter);
        }
        parser
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Number of lines ingested so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Feeds one output line. Never fails.
    pub fn ingest(&mut self, line: &str) {
        self.lines += 1;
        if let Err(error) = self.apply(line) {
            tracing::warn!(line_number = self.lines, %line, %error, "skipping unparseable test output");
        }
    }

    fn apply(&mut self, line: &str) -> Result<()> {
        let (kind, captures) = classify(line);
        if self.report.is_finished() {
            tracing::debug!(?kind, %line, "ignoring output after the run finished");
            return Ok(());
        }
        tracing::trace!(?kind, %line, "classified");
        let Some(captures) = captures else {
            self.free_text(line);
            return Ok(());
        };

        match kind {
            LineKind::SuiteStarted => {
                let name = &captures[1];
                if is_path_like(name) {
                    self.report.start();
                } else {
                    let index = self.report.begin_suite(name);
                    self.suites.push(index);
                }
            }
            LineKind::SuiteFinished => {
                let name = &captures[1];
                if is_path_like(name) {
                    self.finish();
                } else {
                    self.finish_suite(name);
                }
            }
            LineKind::TestStarted => {
                self.start_test(&captures[1], &captures[2]);
            }
            LineKind::TestPassed => {
                let duration = parse_duration(&captures[3])?;
                let (suite, test) = self.locate(&captures[1], &captures[2]);
                self.take_output(suite, test);
                self.report.pass_test(suite, test, Some(duration));
                self.current = None;
            }
            LineKind::InlineError => {
                let (suite, test) = self.locate(&captures[3], &captures[4]);
                let mut error = TestError::new(&captures[5]).at(format!("{}:{}", &captures[1], &captures[2]));
                error.output = std::mem::take(&mut self.buffer);
                self.report.add_error(suite, test, error);
            }
            LineKind::TestFailed => {
                let duration = parse_duration(&captures[3])?;
                let (suite, test) = self.locate(&captures[1], &captures[2]);
                self.take_output(suite, test);
                self.report.fail_test(suite, test, Some(duration), false);
                self.current = None;
            }
            LineKind::Fatal => {
                tracing::warn!(%line, "test run terminated unexpectedly");
                self.free_text(line);
                self.report.mark_unexpected();
                self.finish();
            }
            LineKind::FreeText => self.free_text(line),
        }
        Ok(())
    }

    fn free_text(&mut self, line: &str) {
        if self.current.is_some() {
            self.buffer.push(line.to_string());
        }
    }

    fn take_output(&mut self, suite: usize, test: usize) {
        let lines = std::mem::take(&mut self.buffer);
        if !lines.is_empty() {
            self.report.append_output(suite, test, lines);
        }
    }

    fn current_suite(&mut self, class_name: &str) -> usize {
        match self.suites.last() {
            Some(&index) => index,
            None => {
                // Test outside any announced suite: open one named after its class.
                let index = self.report.begin_suite(class_name);
                self.suites.push(index);
                index
            }
        }
    }

    fn start_test(&mut self, class_name: &str, name: &str) -> (usize, usize) {
        if let Some((suite, test)) = self.current.take() {
            tracing::warn!(test = name, "new test started before the previous one finished");
            self.take_output(suite, test);
            self.report.fail_test(suite, test, None, true);
        }
        let suite = self.current_suite(class_name);
        let test = self
            .report
            .begin_test(suite, name, Some(class_name))
            .unwrap_or_default();
        self.current = Some((suite, test));
        (suite, test)
    }

    /// The running test if it has this name, then a finished test of the
    /// current suite with this name, otherwise a test started on the spot
    /// (runners sometimes omit the start line).
    fn locate(&mut self, class_name: &str, name: &str) -> (usize, usize) {
        if let Some((suite, test)) = self.current {
            if self.report.test(suite, test).is_some_and(|t| t.name == name) {
                return (suite, test);
            }
        }
        if let Some(&suite) = self.suites.last() {
            let finished = self.report.suites[suite]
                .tests
                .iter()
                .rposition(|t| t.name == name && t.is_finished());
            if let Some(test) = finished {
                tracing::debug!(test = name, "result for a test that already finished");
                return (suite, test);
            }
        }
        self.start_test(class_name, name)
    }

    fn finish_suite(&mut self, name: &str) {
        let Some(position) = self
            .suites
            .iter()
            .rposition(|&index| self.report.suites[index].name == name)
        else {
            tracing::debug!(suite = name, "finish for a suite that is not open");
            return;
        };
        // Inner suites left open are closed along with their parent.
        for index in self.suites.split_off(position).into_iter().rev() {
            let unexpected = self.report.suites[index].name != name;
            self.report.end_suite(index, unexpected);
        }
    }

    fn finish(&mut self) {
        if let Some((suite, test)) = self.current.take() {
            self.take_output(suite, test);
        }
        self.suites.clear();
        self.report.finish();
    }

    /// Ends the run: fails any running test and open suite, stamps the end
    /// time and notifies observers. Calling it again has no effect.
    pub fn flush(&mut self) -> &Report {
        if !self.report.is_finished() {
            self.finish();
        }
        &self.report
    }

    /// Flushes and hands out the finished report.
    pub fn into_report(mut self) -> Report {
        self.flush();
        self.report
    }
}

fn parse_duration(text: &str) -> Result<f64> {
    text.parse::<f64>().map_err(|e| XcError::Parse {
        line: 0,
        message: format!("invalid duration '{text}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestStatus;

    fn parse(lines: &[&str]) -> Report {
        let mut parser = TestOutputParser::new();
        for line in lines {
            parser.ingest(line);
        }
        parser.into_report()
    }

    #[test]
    fn single_passing_test() {
        let report = parse(&[
            "Suite 'S' started at 2024-01-01 10:00:00.000",
            "Test Case '-[S t1]' started.",
            "Test Case '-[S t1]' passed (0.003 seconds).",
            "Suite 'S' finished at 2024-01-01 10:00:00.010.",
        ]);
        assert_eq!(report.suites.len(), 1);
        let suite = &report.suites[0];
        assert_eq!(suite.name, "S");
        assert_eq!(suite.tests.len(), 1);
        assert_eq!(suite.tests[0].name, "t1");
        assert_eq!(suite.tests[0].status, TestStatus::Passed);
        assert_eq!(suite.tests[0].duration, Some(0.003));
        assert!(!report.failed());
        assert!(!report.unexpected);
    }

    #[test]
    fn inline_error_takes_buffered_output() {
        let report = parse(&[
            "Suite 'S' started at T1",
            "Test Case '-[S t1]' started.",
            "some log line",
            "another log line",
            "X.m:10: error: -[S t1] : boom",
            "after the error",
            "Test Case '-[S t1]' failed (0.010 seconds).",
            "Suite 'S' finished at T2.",
        ]);
        let test = &report.suites[0].tests[0];
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(test.errors.len(), 1);
        assert_eq!(test.errors[0].message, "boom");
        assert_eq!(test.errors[0].location.as_deref(), Some("X.m:10"));
        assert_eq!(test.errors[0].output, vec!["some log line", "another log line"]);
        assert_eq!(test.output, vec!["after the error"]);
        assert!(report.failed());
        assert!(!report.unexpected);
    }

    #[test]
    fn failed_marker_alone_fails_the_test() {
        let report = parse(&[
            "Test Suite 'S' started at T1",
            "Test Case '-[S t1]' started.",
            "Test Case '-[S t1]' failed (0.5 seconds).",
            "Test Suite 'S' failed at T2.",
        ]);
        let test = &report.suites[0].tests[0];
        assert!(test.failed());
        assert!(test.errors.is_empty());
        assert_eq!(test.duration, Some(0.5));
        assert!(report.suites[0].is_finished());
    }

    #[test]
    fn repeated_result_lines_do_not_duplicate_tests() {
        let report = parse(&[
            "Test Suite 'S' started at T1",
            "Test Case '-[S t1]' started.",
            "Test Case '-[S t1]' passed (0.002 seconds).",
            "Test Case '-[S t1]' passed (0.002 seconds).",
            "Test Case '-[S t2]' passed (0.001 seconds).",
            "Test Suite 'S' passed at T2.",
        ]);
        let names: Vec<&str> = report.suites[0].tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t1", "t2"]);
        assert_eq!(report.suites[0].tests[0].duration, Some(0.002));
        assert!(!report.failed());
    }

    #[test]
    fn flush_fails_dangling_suite() {
        let mut parser = TestOutputParser::new();
        parser.ingest("Suite 'S' started at T1");
        let report = parser.flush();
        assert!(report.is_finished());
        assert!(report.failed());
        assert!(report.suites[0].unexpected);

        let finished_at = report.finished_at;
        assert_eq!(parser.flush().finished_at, finished_at);
    }

    #[test]
    fn path_like_suites_bound_the_run() {
        let report = parse(&[
            "Test Suite '/tmp/DerivedData/App.xctest' started at T0",
            "Test Suite 'S' started at T1",
            "Test Case '-[S t1]' started.",
            "Test Case '-[S t1]' passed (0.001 seconds).",
            "Test Suite 'S' passed at T2.",
            "Test Suite '/tmp/DerivedData/App.xctest' passed at T3.",
            "Test Case '-[S late]' started.",
        ]);
        assert_eq!(report.suites.len(), 1);
        assert_eq!(report.test_count(), 1);
        assert!(!report.failed());
    }

    #[test]
    fn fatal_markers_end_the_run() {
        let report = parse(&[
            "Suite 'S' started at T1",
            "Test Case '-[S t1]' started.",
            "Segmentation fault: 11",
            "Test Case '-[S t1]' passed (0.001 seconds).",
        ]);
        assert!(report.unexpected);
        let test = &report.suites[0].tests[0];
        assert!(test.failed() && test.unexpected);
        assert_eq!(test.output, vec!["Segmentation fault: 11"]);
    }

    #[test]
    fn preamble_noise_is_dropped() {
        let report = parse(&[
            "Build settings from command line:",
            "    SDKROOT = iphonesimulator",
            "Suite 'S' started at T1",
            "Suite 'S' finished at T2.",
        ]);
        assert_eq!(report.suites.len(), 1);
        assert!(report.suites[0].tests.is_empty());
        assert!(!report.failed());
    }

    #[test]
    fn malformed_durations_do_not_abort() {
        let report = parse(&[
            "Suite 'S' started at T1",
            "Test Case '-[S t1]' started.",
            "Test Case '-[S t1]' passed (fast seconds).",
            "Test Case '-[S t1]' passed (0.2 seconds).",
            "Suite 'S' finished at T2.",
        ]);
        assert_eq!(report.suites[0].tests[0].duration, Some(0.2));
        assert!(!report.failed());
    }

    #[test]
    fn swift_test_names_and_implicit_suites() {
        let report = parse(&["Test Case '-[AppTests.LoginTests testValid]' passed (0.010 seconds)."]);
        assert_eq!(report.suites[0].name, "AppTests.LoginTests");
        assert_eq!(report.suites[0].tests[0].name, "testValid");
        assert!(report.suites[0].tests[0].passed());
    }

    #[test]
    fn classification_order() {
        assert_eq!(classify("Suite 'S' started at T").0, LineKind::SuiteStarted);
        assert_eq!(classify("Test Suite 'S' passed at T.").0, LineKind::SuiteFinished);
        assert_eq!(classify("Test Case '-[S t]' started.").0, LineKind::TestStarted);
        assert_eq!(classify("a.m:1: error: -[S t] : BUILD FAILED").0, LineKind::InlineError);
        assert_eq!(classify("** BUILD FAILED **").0, LineKind::Fatal);
        assert_eq!(classify("hello").0, LineKind::FreeText);
    }
}
