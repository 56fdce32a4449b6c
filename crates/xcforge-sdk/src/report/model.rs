//! Suites, tests and errors.
//!
//! These are plain data holders. State transitions only move forward:
//! a finished suite or a passed/failed test is never reopened, and calling a
//! transition again is a no-op that returns `false`.

use serde::Serialize;
use time::OffsetDateTime;

/// Lifecycle of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Running,
    Passed,
    Failed,
}

/// A failure reported for a test, with the output captured before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestError {
    pub message: String,
    /// `file:line` of the failing assertion, when the tool printed one.
    pub location: Option<String>,
    /// Free text printed between the previous event and this error.
    pub output: Vec<String>,
}

impl TestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            output: Vec::new(),
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// One test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Test {
    pub name: String,
    /// Class (or Swift type) declaring the test method.
    pub class_name: Option<String>,
    pub status: TestStatus,
    /// Seconds, as printed by the test runner.
    pub duration: Option<f64>,
    pub errors: Vec<TestError>,
    /// Free text printed while the test ran and not attributed to an error.
    pub output: Vec<String>,
    /// Failed because the run ended while the test was still running.
    pub unexpected: bool,
}

impl Test {
    pub fn new(name: impl Into<String>, class_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            class_name,
            status: TestStatus::Running,
            duration: None,
            errors: Vec::new(),
            output: Vec::new(),
            unexpected: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != TestStatus::Running
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == TestStatus::Failed
    }

    pub(crate) fn pass(&mut self, duration: Option<f64>) -> bool {
        if self.is_finished() {
            return false;
        }
        self.status = TestStatus::Passed;
        self.duration = duration;
        true
    }

    pub(crate) fn fail(&mut self, duration: Option<f64>, unexpected: bool) -> bool {
        if self.is_finished() {
            return false;
        }
        self.status = TestStatus::Failed;
        self.duration = duration;
        self.unexpected = unexpected;
        true
    }
}

/// An ordered group of tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suite {
    pub name: String,
    pub tests: Vec<Test>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    /// Closed because the run ended while the suite was still open.
    pub unexpected: bool,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            started_at: OffsetDateTime::now_utc(),
            finished_at: None,
            unexpected: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub(crate) fn finish(&mut self, unexpected: bool) -> bool {
        if self.is_finished() {
            return false;
        }
        self.finished_at = Some(OffsetDateTime::now_utc());
        self.unexpected = unexpected;
        true
    }

    pub fn failures(&self) -> usize {
        self.tests.iter().filter(|t| t.failed() && !t.unexpected).count()
    }

    /// Tests force-failed because the run stopped under them.
    pub fn errors(&self) -> usize {
        self.tests.iter().filter(|t| t.unexpected).count()
    }

    /// Sum of the reported test durations.
    pub fn duration(&self) -> f64 {
        self.tests.iter().filter_map(|t| t.duration).sum()
    }

    pub fn failed(&self) -> bool {
        self.unexpected || self.tests.iter().any(Test::failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tests_never_regress() {
        let mut test = Test::new("testLogin", Some("LoginTests".into()));
        assert!(test.pass(Some(0.5)));
        assert!(!test.fail(Some(1.0), false));
        assert!(test.passed());
        assert_eq!(test.duration, Some(0.5));
    }

    #[test]
    fn suite_counts() {
        let mut suite = Suite::new("LoginTests");
        let mut ok = Test::new("a", None);
        ok.pass(Some(0.25));
        let mut bad = Test::new("b", None);
        bad.fail(Some(0.5), false);
        let mut crashed = Test::new("c", None);
        crashed.fail(None, true);
        suite.tests = vec![ok, bad, crashed];

        assert_eq!(suite.failures(), 1);
        assert_eq!(suite.errors(), 1);
        assert_eq!(suite.duration(), 0.75);
        assert!(suite.failed());
        assert!(suite.finish(false));
        assert!(!suite.finish(true));
        assert!(!suite.unexpected);
    }
}
