//! Structured test results.
//!
//! A [`Report`] is the root of a tree: suites in the order they started,
//! tests in the order they started, errors in the order they were printed.
//! It is built incrementally by [`crate::parser::TestOutputParser`] and
//! notifies every registered [`Formatter`] as entities start and finish.
//!
//! ```text
//! Report:  [not started] --start--> [running] --finish--> [finished]
//! Suite:   [open] --finish--> [closed]
//! Test:    [running] --pass--> [passed]
//!          [running] --fail--> [failed]
//! ```
//!
//! Finishing a report that still has an open suite or a running test is a
//! failure signal: the dangling entities are failed and flagged
//! `unexpected`, and so is the report.

pub mod console;
pub mod junit;
pub mod model;
pub mod observer;

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

pub use console::ConsoleFormatter;
pub use junit::JunitFormatter;
pub use model::{Suite, Test, TestError, TestStatus};
pub use observer::{Formatter, FormatterOptions, FormatterRegistry};

use crate::types::Result;

/// Results of one test run.
#[derive(Default, Serialize)]
pub struct Report {
    pub suites: Vec<Suite>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    /// The run stopped abnormally (crash marker, dangling suite or test).
    pub unexpected: bool,
    #[serde(skip)]
    observers: Vec<Box<dyn Formatter>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for every later transition.
    pub fn add_observer(&mut self, observer: Box<dyn Formatter>) {
        self.observers.push(observer);
    }

    /// Removes and returns the observers, e.g. to inspect them after a run.
    pub fn take_observers(&mut self) -> Vec<Box<dyn Formatter>> {
        std::mem::take(&mut self.observers)
    }

    fn notify(&mut self, event: impl Fn(&mut dyn Formatter, &Report)) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            event(observer.as_mut(), self);
        }
        // Observers registered during notification are kept too.
        observers.append(&mut self.observers);
        self.observers = observers;
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Starts the run. Only the first call has an effect.
    pub fn start(&mut self) -> bool {
        if self.is_started() {
            return false;
        }
        self.started_at = Some(OffsetDateTime::now_utc());
        self.notify(|o, r| o.before_run(r));
        true
    }

    /// Appends a suite and returns its index. Starts the run if needed.
    pub fn begin_suite(&mut self, name: &str) -> usize {
        self.start();
        self.suites.push(Suite::new(name));
        let index = self.suites.len() - 1;
        self.notify(|o, r| o.before_suite(&r.suites[index]));
        index
    }

    /// Closes a suite. Returns `false` if it was already closed.
    pub fn end_suite(&mut self, suite: usize, unexpected: bool) -> bool {
        let finished = self
            .suites
            .get_mut(suite)
            .is_some_and(|s| s.finish(unexpected));
        if finished {
            self.notify(|o, r| o.after_suite(&r.suites[suite]));
        }
        finished
    }

    /// Appends a running test to a suite and returns its index.
    pub fn begin_test(&mut self, suite: usize, name: &str, class_name: Option<&str>) -> Option<usize> {
        let tests = &mut self.suites.get_mut(suite)?.tests;
        tests.push(Test::new(name, class_name.map(str::to_string)));
        let index = tests.len() - 1;
        self.notify(|o, r| o.before_test(&r.suites[suite].tests[index]));
        Some(index)
    }

    pub fn test(&self, suite: usize, test: usize) -> Option<&Test> {
        self.suites.get(suite)?.tests.get(test)
    }

    fn test_mut(&mut self, suite: usize, test: usize) -> Option<&mut Test> {
        self.suites.get_mut(suite)?.tests.get_mut(test)
    }

    pub fn pass_test(&mut self, suite: usize, test: usize, duration: Option<f64>) -> bool {
        let passed = self.test_mut(suite, test).is_some_and(|t| t.pass(duration));
        if passed {
            self.notify(|o, r| o.after_test(&r.suites[suite].tests[test]));
        }
        passed
    }

    pub fn fail_test(&mut self, suite: usize, test: usize, duration: Option<f64>, unexpected: bool) -> bool {
        let failed = self
            .test_mut(suite, test)
            .is_some_and(|t| t.fail(duration, unexpected));
        if failed {
            self.notify(|o, r| o.after_test(&r.suites[suite].tests[test]));
        }
        failed
    }

    pub fn add_error(&mut self, suite: usize, test: usize, error: TestError) -> bool {
        match self.test_mut(suite, test) {
            Some(t) => {
                t.errors.push(error);
                true
            }
            None => false,
        }
    }

    pub fn append_output(&mut self, suite: usize, test: usize, lines: Vec<String>) {
        if let Some(t) = self.test_mut(suite, test) {
            t.output.extend(lines);
        }
    }

    /// Flags the run as abnormally terminated.
    pub fn mark_unexpected(&mut self) {
        self.unexpected = true;
    }

    /// Finishes the run. Only the first call has an effect.
    ///
    /// Running tests are failed and open suites closed, all flagged
    /// `unexpected`, before observers see the end of the run.
    pub fn finish(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.start();
        for suite in (0..self.suites.len()).rev() {
            for test in 0..self.suites[suite].tests.len() {
                if !self.suites[suite].tests[test].is_finished() {
                    tracing::warn!(
                        suite = %self.suites[suite].name,
                        test = %self.suites[suite].tests[test].name,
                        "test did not finish"
                    );
                    self.unexpected = true;
                    self.fail_test(suite, test, None, true);
                }
            }
            if !self.suites[suite].is_finished() {
                tracing::warn!(suite = %self.suites[suite].name, "suite did not finish");
                self.unexpected = true;
                self.end_suite(suite, true);
            }
        }
        self.finished_at = Some(OffsetDateTime::now_utc());
        self.notify(|o, r| o.after_run(r));
        true
    }

    /// Any failed test, or an abnormal end of the run.
    pub fn failed(&self) -> bool {
        self.unexpected || self.suites.iter().any(Suite::failed)
    }

    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.suites.iter().flat_map(|s| s.tests.iter())
    }

    pub fn test_count(&self) -> usize {
        self.tests().count()
    }

    pub fn failure_count(&self) -> usize {
        self.tests().filter(|t| t.failed()).count()
    }

    /// Wall time between start and finish, in seconds.
    pub fn duration(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).as_seconds_f64()),
            _ => None,
        }
    }

    /// Whether any suite or test was recorded.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Pretty-printed JSON export.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Report")
            .field("suites", &self.suites)
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .field("unexpected", &self.unexpected)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Formatter for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn before_run(&mut self, _report: &Report) {
            self.0.borrow_mut().push("before_run".into());
        }
        fn after_run(&mut self, report: &Report) {
            self.0.borrow_mut().push(format!("after_run failed={}", report.failed()));
        }
        fn before_suite(&mut self, suite: &Suite) {
            self.0.borrow_mut().push(format!("before_suite {}", suite.name));
        }
        fn after_suite(&mut self, suite: &Suite) {
            self.0.borrow_mut().push(format!("after_suite {}", suite.name));
        }
        fn before_test(&mut self, test: &Test) {
            self.0.borrow_mut().push(format!("before_test {}", test.name));
        }
        fn after_test(&mut self, test: &Test) {
            self.0.borrow_mut().push(format!("after_test {} {:?}", test.name, test.status));
        }
    }

    #[test]
    fn observers_see_every_transition_once() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut report = Report::new();
        report.add_observer(Box::new(Recorder(events.clone())));

        let suite = report.begin_suite("S");
        let test = report.begin_test(suite, "t1", Some("S")).unwrap();
        assert!(report.pass_test(suite, test, Some(0.003)));
        assert!(!report.fail_test(suite, test, None, false));
        assert!(report.end_suite(suite, false));
        assert!(report.finish());
        assert!(!report.finish());

        assert_eq!(
            *events.borrow(),
            vec![
                "before_run",
                "before_suite S",
                "before_test t1",
                "after_test t1 Passed",
                "after_suite S",
                "after_run failed=false",
            ]
        );
        assert!(!report.failed());
    }

    #[test]
    fn finishing_with_dangling_entities_fails_the_run() {
        let mut report = Report::new();
        let suite = report.begin_suite("S");
        report.begin_test(suite, "t1", None).unwrap();
        report.finish();

        assert!(report.is_finished());
        assert!(report.unexpected);
        assert!(report.failed());
        let test = report.test(suite, 0).unwrap();
        assert!(test.failed() && test.unexpected);
        assert!(report.suites[suite].unexpected);
    }

    #[test]
    fn exports_json() {
        let mut report = Report::new();
        let suite = report.begin_suite("S");
        let test = report.begin_test(suite, "t1", None).unwrap();
        report.add_error(suite, test, TestError::new("boom").at("X.m:10"));
        report.fail_test(suite, test, Some(0.1), false);
        report.finish();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["suites"][0]["tests"][0]["status"], "failed");
        assert_eq!(json["suites"][0]["tests"][0]["errors"][0]["location"], "X.m:10");
        assert!(json["finished_at"].is_string());
    }
}
