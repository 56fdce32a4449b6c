//! Whole xcodebuild transcripts through the parsers and formatters.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use xcforge_sdk::parser::build_log::{BuildStatus, Severity};
use xcforge_sdk::report::{Formatter, JunitFormatter, Suite, Test, TestStatus};
use xcforge_sdk::{BuildLogParser, Report, TestOutputParser};

const TEST_RUN: &str = "\
Test Suite 'All tests' started at 2024-03-01 09:15:02.114
Test Suite 'AppTests.xctest' started at 2024-03-01 09:15:02.115
Test Suite 'LoginTests' started at 2024-03-01 09:15:02.115
Test Case '-[LoginTests testAcceptsValidPassword]' started.
Test Case '-[LoginTests testAcceptsValidPassword]' passed (0.012 seconds).
Test Case '-[LoginTests testRejectsEmptyPassword]' started.
validating password of length 0
/Users/ci/App/AppTests/LoginTests.m:42: error: -[LoginTests testRejectsEmptyPassword] : XCTAssertFalse failed
Test Case '-[LoginTests testRejectsEmptyPassword]' failed (0.004 seconds).
Test Suite 'LoginTests' failed at 2024-03-01 09:15:02.131.
\t Executed 2 tests, with 1 failure (0 unexpected) in 0.016 (0.016) seconds
Test Suite 'CartTests' started at 2024-03-01 09:15:02.132
Test Case '-[CartTests testTotal]' started.
Test Case '-[CartTests testTotal]' passed (0.001 seconds).
Test Suite 'CartTests' passed at 2024-03-01 09:15:02.133.
Test Suite 'AppTests.xctest' failed at 2024-03-01 09:15:02.133.
Test Suite 'All tests' failed at 2024-03-01 09:15:02.134.
";

fn parse(transcript: &str, formatters: Vec<Box<dyn Formatter>>) -> Report {
    let mut parser = TestOutputParser::with_formatters(formatters);
    for line in transcript.lines() {
        parser.ingest(line);
    }
    parser.into_report()
}

fn suite<'a>(report: &'a Report, name: &str) -> &'a Suite {
    report.suites.iter().find(|s| s.name == name).unwrap()
}

fn test<'a>(report: &'a Report, name: &str) -> &'a Test {
    report.tests().find(|t| t.name == name).unwrap()
}

#[derive(Default)]
struct Recorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl Formatter for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn before_run(&mut self, _: &Report) {
        self.events.borrow_mut().push("run started".into());
    }

    fn after_run(&mut self, report: &Report) {
        self.events.borrow_mut().push(format!("run finished failed={}", report.failed()));
    }

    fn before_suite(&mut self, suite: &Suite) {
        self.events.borrow_mut().push(format!("suite {}", suite.name));
    }

    fn after_test(&mut self, test: &Test) {
        self.events.borrow_mut().push(format!("{} {:?}", test.name, test.status));
    }
}

#[test]
fn nested_suites_keep_start_order_and_results() {
    let report = parse(TEST_RUN, Vec::new());

    let names: Vec<&str> = report.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["All tests", "AppTests.xctest", "LoginTests", "CartTests"]);
    assert!(report.suites.iter().all(|s| s.is_finished() && !s.unexpected));
    assert!(!report.unexpected);
    assert!(report.failed());
    assert_eq!(report.test_count(), 3);
    assert_eq!(report.failure_count(), 1);

    let login = suite(&report, "LoginTests");
    assert_eq!(login.failures(), 1);
    assert_eq!(login.errors(), 0);
    assert!(!suite(&report, "CartTests").failed());

    let failed = test(&report, "testRejectsEmptyPassword");
    assert_eq!(failed.status, TestStatus::Failed);
    assert_eq!(failed.duration, Some(0.004));
    assert_eq!(failed.class_name.as_deref(), Some("LoginTests"));
    assert_eq!(failed.errors.len(), 1);
    assert_eq!(failed.errors[0].message, "XCTAssertFalse failed");
    assert_eq!(
        failed.errors[0].location.as_deref(),
        Some("/Users/ci/App/AppTests/LoginTests.m:42")
    );
    assert_eq!(failed.errors[0].output, vec!["validating password of length 0"]);
}

#[test]
fn observers_see_every_transition_in_order() {
    let recorder = Recorder::default();
    let events = recorder.events.clone();
    parse(TEST_RUN, vec![Box::new(recorder)]);

    assert_eq!(
        *events.borrow(),
        vec![
            "run started",
            "suite All tests",
            "suite AppTests.xctest",
            "suite LoginTests",
            "testAcceptsValidPassword Passed",
            "testRejectsEmptyPassword Failed",
            "suite CartTests",
            "testTotal Passed",
            "run finished failed=true",
        ]
    );
}

#[test]
fn bundle_path_suite_frames_the_run() {
    let transcript = "\
Test Suite '/tmp/DerivedData/Build/Products/Debug-iphonesimulator/AppTests.xctest' started at 2024-03-01 09:15:02.115
Test Suite 'CartTests' started at 2024-03-01 09:15:02.116
Test Case '-[CartTests testTotal]' started.
Test Case '-[CartTests testTotal]' passed (0.001 seconds).
Test Suite 'CartTests' passed at 2024-03-01 09:15:02.117.
Test Suite '/tmp/DerivedData/Build/Products/Debug-iphonesimulator/AppTests.xctest' passed at 2024-03-01 09:15:02.118.
Test Case '-[CartTests testLate]' started.
";
    let report = parse(transcript, Vec::new());

    let names: Vec<&str> = report.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["CartTests"]);
    assert!(report.is_finished());
    assert!(!report.failed());
    // Output after the end of the run is ignored.
    assert_eq!(report.test_count(), 1);
}

#[test]
fn crash_fails_the_running_test_and_open_suites() {
    let transcript = "\
Test Suite 'SyncTests' started at 2024-03-01 09:15:02.115
Test Case '-[SyncTests testUpload]' started.
uploading 3 items
Restarting after unexpected exit, crash, or test timeout in SyncTests.testUpload()
Test Case '-[SyncTests testDownload]' started.
";
    let report = parse(transcript, Vec::new());

    assert!(report.unexpected);
    assert!(report.failed());
    let sync = suite(&report, "SyncTests");
    assert!(sync.unexpected);
    assert_eq!(sync.tests.len(), 1);

    let upload = &sync.tests[0];
    assert_eq!(upload.status, TestStatus::Failed);
    assert!(upload.unexpected);
    assert_eq!(sync.errors(), 1);
    assert_eq!(sync.failures(), 0);
    assert!(upload.output.iter().any(|line| line == "uploading 3 items"));
}

#[test]
fn tests_outside_a_suite_get_one_named_after_their_class() {
    let transcript = "\
Test Case '-[ParserTests testEmpty]' started.
Test Case '-[ParserTests testEmpty]' passed (0.002 seconds).
Test Case '-[ParserTests testNested]' passed (0.003 seconds).
";
    let report = parse(transcript, Vec::new());
    assert_eq!(report.suites.len(), 1);
    assert_eq!(report.suites[0].name, "ParserTests");
    // Passed without a start line still counts.
    assert_eq!(report.test_count(), 2);
    assert!(test(&report, "testNested").passed());
    // The implicit suite was never closed by the transcript.
    assert!(report.suites[0].unexpected);
}

#[test]
fn junit_formatter_writes_on_finish() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(JunitFormatter::FILE_NAME);
    parse(TEST_RUN, vec![Box::new(JunitFormatter::new(&path))]);

    let xml = fs::read_to_string(&path).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<testsuites tests=\"3\" failures=\"1\">"));
    assert!(xml.contains("<testsuite name=\"LoginTests\" errors=\"0\" failures=\"1\" tests=\"2\" time=\"0.016\""));
    assert!(xml.contains("<failure message=\"XCTAssertFalse failed\" type=\"Failure\">"));
    assert!(xml.contains("<testcase classname=\"CartTests\" name=\"testTotal\" time=\"0.001\"/>"));
}

#[test]
fn build_log_collects_steps_and_diagnostics() {
    let log = "\
Build settings from command line:
    SDKROOT = iphonesimulator17.0

CompileC /tmp/Build/AppDelegate.o App/AppDelegate.m normal arm64 objective-c com.apple.compilers.llvm.clang.1_0.compiler (in target 'App' from project 'App')
    cd /Users/ci/App
    clang -x objective-c -c App/AppDelegate.m
/Users/ci/App/App/AppDelegate.m:17:9: warning: unused variable 'window' [-Wunused-variable]
/Users/ci/App/App/AppDelegate.m:23:5: error: use of undeclared identifier 'launch'
WriteAuxiliaryFile /tmp/Build/App.hmap (in target 'App' from project 'App')
Ld /tmp/Build/App.app/App normal (in target 'App' from project 'App')
ld: warning: directory not found for option '-L/missing'
** BUILD FAILED **
";
    let mut parser = BuildLogParser::new();
    for line in log.lines() {
        parser.ingest(line);
    }
    let report = parser.into_report();

    let steps: Vec<(&str, bool)> = report.steps.iter().map(|s| (s.name.as_str(), s.known)).collect();
    assert_eq!(
        steps,
        vec![("CompileC", true), ("WriteAuxiliaryFile", false), ("Ld", true)]
    );
    assert_eq!(report.steps[0].target.as_deref(), Some("App"));
    assert_eq!(
        report.steps[0].output,
        vec!["cd /Users/ci/App", "clang -x objective-c -c App/AppDelegate.m"]
    );

    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.severity, Severity::Error);
    assert_eq!(error.message, "use of undeclared identifier 'launch'");
    assert_eq!(
        error.location().as_deref(),
        Some("/Users/ci/App/App/AppDelegate.m:23:5")
    );
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[1].message, "directory not found for option '-L/missing'");

    assert_eq!(report.status, Some(("BUILD".to_string(), BuildStatus::Failed)));
    assert!(!report.succeeded());
    assert!(report.finished);
}
