//! Plain-text progress output.

use std::io::{self, Write};

use super::model::{Suite, Test};
use super::observer::Formatter;
use super::Report;

/// Prints one line per finished test and a summary at the end of the run.
pub struct ConsoleFormatter {
    out: Box<dyn Write>,
    verbose: bool,
}

impl ConsoleFormatter {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out, verbose: false }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Also prints captured test output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Formatter for ConsoleFormatter {
    fn name(&self) -> &str {
        "console"
    }

    fn before_suite(&mut self, suite: &Suite) {
        let _ = writeln!(self.out, "{}", suite.name);
    }

    fn after_test(&mut self, test: &Test) {
        let duration = test
            .duration
            .map(|d| format!(" ({d:.3}s)"))
            .unwrap_or_default();
        if test.passed() {
            let _ = writeln!(self.out, "  ✓ {}{}", test.name, duration);
            return;
        }
        let suffix = if test.unexpected { " [did not finish]" } else { "" };
        let _ = writeln!(self.out, "  ✗ {}{}{}", test.name, duration, suffix);
        for error in &test.errors {
            match &error.location {
                Some(location) => {
                    let _ = writeln!(self.out, "      {}: {}", location, error.message);
                }
                None => {
                    let _ = writeln!(self.out, "      {}", error.message);
                }
            }
        }
        if self.verbose {
            for line in &test.output {
                let _ = writeln!(self.out, "      | {line}");
            }
        }
    }

    fn after_run(&mut self, report: &Report) {
        let _ = writeln!(
            self.out,
            "\nExecuted {} tests, with {} failures{}",
            report.test_count(),
            report.failure_count(),
            if report.unexpected { " (run ended unexpectedly)" } else { "" }
        );
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prints_results_and_summary() {
        let buffer = Shared::default();
        let mut report = Report::new();
        report.add_observer(Box::new(ConsoleFormatter::new(Box::new(buffer.clone()))));

        let suite = report.begin_suite("MathTests");
        let ok = report.begin_test(suite, "testAdd", None).unwrap();
        report.pass_test(suite, ok, Some(0.001));
        let bad = report.begin_test(suite, "testDivide", None).unwrap();
        report.add_error(suite, bad, TestError::new("division by zero").at("Math.m:7"));
        report.fail_test(suite, bad, Some(0.002), false);
        report.end_suite(suite, false);
        report.finish();

        let text = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        assert_eq!(
            text,
            "MathTests\n  ✓ testAdd (0.001s)\n  ✗ testDivide (0.002s)\n      Math.m:7: division by zero\n\nExecuted 2 tests, with 1 failures\n"
        );
    }
}
