//! JUnit XML output.
//!
//! One `<testsuite>` per suite with `errors`, `failures`, `tests`, `time`
//! and `timestamp` attributes, one `<testcase>` per test, and a nested
//! `<failure>` per error. Tests failed because the run stopped under them
//! get an `<error>` element instead and count towards `errors`.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use time::format_description::well_known::Rfc3339;

use super::model::{Suite, Test};
use super::observer::Formatter;
use super::Report;
use crate::types::Result;

type XmlWriter = Writer<Vec<u8>>;

/// Renders a whole report.
pub fn render(report: &Report) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let tests = report.test_count().to_string();
    let failures = report.failure_count().to_string();
    emit(&mut writer, Event::Start(
        BytesStart::new("testsuites")
            .with_attributes([("tests", tests.as_str()), ("failures", failures.as_str())]),
    ))?;
    for suite in &report.suites {
        render_suite(&mut writer, suite)?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("testsuites")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render_suite(writer: &mut XmlWriter, suite: &Suite) -> io::Result<()> {
    let timestamp = suite.started_at.format(&Rfc3339).unwrap_or_default();
    let errors = suite.errors().to_string();
    let failures = suite.failures().to_string();
    let tests = suite.tests.len().to_string();
    let time = format!("{:.3}", suite.duration());
    emit(writer, Event::Start(BytesStart::new("testsuite").with_attributes([
        ("name", &*xml_chars(&suite.name)),
        ("errors", errors.as_str()),
        ("failures", failures.as_str()),
        ("tests", tests.as_str()),
        ("time", time.as_str()),
        ("timestamp", timestamp.as_str()),
    ])))?;
    for test in &suite.tests {
        render_test(writer, suite, test)?;
    }
    emit(writer, Event::End(BytesEnd::new("testsuite")))
}

fn render_test(writer: &mut XmlWriter, suite: &Suite, test: &Test) -> io::Result<()> {
    let class_name = test.class_name.as_deref().unwrap_or(&suite.name);
    let time = format!("{:.3}", test.duration.unwrap_or_default());
    let testcase = BytesStart::new("testcase").with_attributes([
        ("classname", &*xml_chars(class_name)),
        ("name", &*xml_chars(&test.name)),
        ("time", time.as_str()),
    ]);
    if !test.failed() {
        return emit(writer, Event::Empty(testcase));
    }

    emit(writer, Event::Start(testcase))?;
    if test.unexpected {
        emit(writer, Event::Empty(
            BytesStart::new("error")
                .with_attributes([("message", "test did not finish"), ("type", "Unexpected")]),
        ))?;
    }
    for error in &test.errors {
        let mut body = Vec::new();
        if let Some(location) = &error.location {
            body.push(location.clone());
        }
        body.extend(error.output.iter().cloned());
        emit(writer, Event::Start(
            BytesStart::new("failure")
                .with_attributes([("message", &*xml_chars(&error.message)), ("type", "Failure")]),
        ))?;
        emit(writer, Event::Text(BytesText::new(&xml_chars(&body.join("\n")))))?;
        emit(writer, Event::End(BytesEnd::new("failure")))?;
    }
    if test.errors.is_empty() && !test.unexpected {
        emit(writer, Event::Empty(
            BytesStart::new("failure").with_attributes([("message", "Test failed"), ("type", "Failure")]),
        ))?;
    }
    if !test.output.is_empty() {
        emit(writer, Event::Start(BytesStart::new("system-out")))?;
        emit(writer, Event::Text(BytesText::new(&xml_chars(&test.output.join("\n")))))?;
        emit(writer, Event::End(BytesEnd::new("system-out")))?;
    }
    emit(writer, Event::End(BytesEnd::new("testcase")))
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> io::Result<()> {
    writer.write_event(event).map_err(io::Error::other)
}

/// Drops characters XML 1.0 cannot represent (control characters other
/// than tab, newline and carriage return). Escaping is left to the writer.
fn xml_chars(text: &str) -> Cow<'_, str> {
    let invalid = |c: char| c.is_control() && !matches!(c, '\t' | '\n' | '\r');
    if text.chars().any(invalid) {
        Cow::Owned(text.chars().filter(|&c| !invalid(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// Writes a report to `path`, creating parent directories.
pub fn write(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(report)?)?;
    Ok(())
}

/// Writes JUnit XML when the run ends.
pub struct JunitFormatter {
    path: PathBuf,
}

impl JunitFormatter {
    pub const FILE_NAME: &'static str = "junit.xml";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Formatter for JunitFormatter {
    fn name(&self) -> &str {
        "junit"
    }

    fn after_run(&mut self, report: &Report) {
        match write(report, &self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "wrote JUnit report"),
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "failed to write JUnit report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestError;
    use tempfile::TempDir;

    fn sample() -> Report {
        let mut report = Report::new();
        let suite = report.begin_suite("LoginTests");
        let ok = report.begin_test(suite, "testValid", Some("LoginTests")).unwrap();
        report.pass_test(suite, ok, Some(0.003));
        let bad = report.begin_test(suite, "testInvalid", Some("LoginTests")).unwrap();
        let mut error = TestError::new("XCTAssertEqual failed: (\"a\") is not equal to (\"b\")").at("LoginTests.m:42");
        error.output.push("<debug> state=1".into());
        report.add_error(suite, bad, error);
        report.fail_test(suite, bad, Some(0.25), false);
        report.end_suite(suite, false);
        report.finish();
        report
    }

    #[test]
    fn renders_suites_and_failures() {
        let xml = render(&sample()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites"));
        assert!(xml.contains("<testsuites tests=\"2\" failures=\"1\">"));
        assert!(xml.contains(
            "<testsuite name=\"LoginTests\" errors=\"0\" failures=\"1\" tests=\"2\" time=\"0.253\""
        ));
        assert!(xml.contains("<testcase classname=\"LoginTests\" name=\"testValid\" time=\"0.003\"/>"));
        assert!(xml.contains(
            "<failure message=\"XCTAssertEqual failed: (&quot;a&quot;) is not equal to (&quot;b&quot;)\" type=\"Failure\">LoginTests.m:42\n&lt;debug&gt; state=1</failure>"
        ));
        assert!(xml.ends_with("</testsuites>\n"));
    }

    #[test]
    fn markup_and_control_characters_are_neutralised() {
        let mut report = Report::new();
        let suite = report.begin_suite("A&B <Suite>");
        let test = report.begin_test(suite, "test\u{1b}[31mRed", None).unwrap();
        report.add_error(suite, test, TestError::new("expected <nil> & got 'x'"));
        report.fail_test(suite, test, None, false);
        report.end_suite(suite, false);
        report.finish();

        let xml = render(&report).unwrap();
        assert!(xml.contains("<testsuite name=\"A&amp;B &lt;Suite&gt;\""));
        assert!(xml.contains("classname=\"A&amp;B &lt;Suite&gt;\" name=\"test[31mRed\""));
        assert!(xml.contains("message=\"expected &lt;nil&gt; &amp; got &apos;x&apos;\""));
        assert!(!xml.contains('\u{1b}'));
    }

    #[test]
    fn dangling_tests_become_errors() {
        let mut report = Report::new();
        let suite = report.begin_suite("S");
        report.begin_test(suite, "t1", None).unwrap();
        report.finish();
        let xml = render(&report).unwrap();
        assert!(xml.contains("errors=\"1\" failures=\"0\" tests=\"1\""));
        assert!(xml.contains("<testcase classname=\"S\" name=\"t1\" time=\"0.000\">"));
        assert!(xml.contains("<error message=\"test did not finish\" type=\"Unexpected\"/>"));
    }

    #[test]
    fn formatter_writes_on_after_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join(JunitFormatter::FILE_NAME);
        let mut report = Report::new();
        report.add_observer(Box::new(JunitFormatter::new(&path)));
        let suite = report.begin_suite("S");
        let test = report.begin_test(suite, "t1", None).unwrap();
        report.pass_test(suite, test, Some(0.5));
        report.end_suite(suite, false);
        report.finish();

        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains("name=\"t1\" time=\"0.500\"/>"));
    }
}
