// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and aggregates test execution statuses.
//!
//! The main structure in this module is [`TestReporter`].

use super::events::{ExecuteStatus, ExecutionResult, FailureStatus, TestEvent, TestEventKind};
use crate::{
    config::NutestConfig,
    errors::WriteEventError,
    list::{Styles as ListStyles, TestInstance, display_group},
    test_filter::SkipReason,
};
use nix::sys::signal::Signal;
use owo_colors::{OwoColorize, Style};
use serde::Deserialize;
use std::{
    borrow::Cow,
    io::{self, Write},
    time::Duration,
};

/// The width of the `=` rules printed around group banners.
const BANNER_WIDTH: usize = 80;

/// When to display captured test output in the reporter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestOutputDisplay {
    /// Show output for every test that runs.
    #[default]
    Always,

    /// Show output only for tests that don't pass.
    Failure,

    /// Never show output.
    Never,
}

impl TestOutputDisplay {
    /// Returns true if output should be shown for a test with the given result.
    pub fn should_show(self, result: ExecutionResult) -> bool {
        match self {
            TestOutputDisplay::Always => true,
            TestOutputDisplay::Failure => !result.is_success(),
            TestOutputDisplay::Never => false,
        }
    }
}

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    output_display: Option<TestOutputDisplay>,
    verbose: bool,
}

impl TestReporterBuilder {
    /// Sets the conditions under which captured output is shown.
    ///
    /// Overrides the config's `show-output` setting.
    pub fn set_output_display(&mut self, output_display: TestOutputDisplay) -> &mut Self {
        self.output_display = Some(output_display);
        self
    }

    /// Sets verbose output: script paths are printed as each test starts.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new test reporter.
    pub fn build<'a>(&self, config: &NutestConfig, output: ReporterStderr<'a>) -> TestReporter<'a> {
        TestReporter {
            inner: TestReporterImpl {
                output_display: self
                    .output_display
                    .unwrap_or_else(|| config.run().show_output()),
                timeout: config.run().timeout(),
                verbose: self.verbose,
                styles: Box::default(),
            },
            stderr: output,
        }
    }
}

/// Reports the progress of a test run to standard error.
pub struct TestReporter<'a> {
    inner: TestReporterImpl,
    stderr: ReporterStderr<'a>,
}

impl<'a> TestReporter<'a> {
    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.inner.styles.colorize();
    }

    /// Report a test event.
    pub fn report_event(&mut self, event: TestEvent<'_>) -> Result<(), WriteEventError> {
        match &mut self.stderr {
            ReporterStderr::Terminal => {
                // Write each event in one go, so that lines aren't interleaved with log output.
                let mut buf: Vec<u8> = Vec::new();
                self.inner.write_event_impl(&event, &mut buf)?;
                let mut stderr = std::io::stderr().lock();
                stderr.write_all(&buf)?;
                stderr.flush()?;
            }
            ReporterStderr::Buffer(buf) => {
                self.inner.write_event_impl(&event, *buf)?;
            }
        }
        Ok(())
    }
}

struct TestReporterImpl {
    output_display: TestOutputDisplay,
    timeout: Duration,
    verbose: bool,
    styles: Box<Styles>,
}

impl TestReporterImpl {
    fn write_event_impl(&self, event: &TestEvent<'_>, writer: &mut dyn Write) -> io::Result<()> {
        match &event.kind {
            TestEventKind::RunStarted {
                test_count,
                group_count,
                order,
            } => {
                write!(writer, "{:>12} ", "Starting".style(self.styles.pass))?;
                write!(
                    writer,
                    "{} {} in {} {}",
                    test_count.style(self.styles.count),
                    plural(*test_count, "test", "tests"),
                    group_count.style(self.styles.count),
                    plural(*group_count, "group", "groups"),
                )?;
                writeln!(writer, " ({order})")?;
            }
            TestEventKind::GroupStarted {
                group,
                index,
                group_count,
                test_count,
            } => {
                let rule = "=".repeat(BANNER_WIDTH);
                writeln!(writer, "{}", rule.style(self.styles.banner))?;
                writeln!(
                    writer,
                    "Starting {} test(s) in group: {} ({index}/{group_count})",
                    test_count.style(self.styles.count),
                    display_group(group).style(self.styles.list_styles.group),
                )?;
                writeln!(writer, "{}", rule.style(self.styles.banner))?;
            }
            TestEventKind::TestStarted {
                test_instance,
                script_path,
                index,
                group_test_count,
            } => {
                write!(writer, "{:>12} ", "START".style(self.styles.pass))?;
                write!(writer, "({index}/{group_test_count}) ")?;
                if self.verbose {
                    writeln!(writer, "{script_path}")?;
                } else {
                    self.write_instance(*test_instance, writer)?;
                    writeln!(writer)?;
                }
            }
            TestEventKind::TestFinished {
                test_instance,
                status,
                required,
                ..
            } => {
                self.write_status_line(*test_instance, status, writer)?;

                if status.result.timed_out() {
                    writeln!(
                        writer,
                        "{:>12} timeout of {} reached, process group killed",
                        "",
                        humantime::format_duration(self.timeout),
                    )?;
                }

                if self.output_display.should_show(status.result) {
                    self.write_output(*test_instance, status, writer)?;
                }

                if *required && !status.result.is_success() {
                    write!(writer, "{:>12} ", "REQUIRED".style(self.styles.fail))?;
                    write!(writer, "{}: ", "REQUIRED TEST HAS FAILED".style(self.styles.fail))?;
                    self.write_instance(*test_instance, writer)?;
                    writeln!(writer)?;
                }
            }
            TestEventKind::TestSkipped {
                test_instance,
                reason,
            } => {
                write!(writer, "{:>12} ", "SKIP".style(self.styles.skip))?;
                // Same width as write_duration.
                write!(writer, "[         ] ")?;
                self.write_instance(*test_instance, writer)?;
                match reason {
                    SkipReason::Group => writeln!(writer, " (group skipped)")?,
                    SkipReason::Test => writeln!(writer)?,
                }
            }
            TestEventKind::RunFinished {
                elapsed,
                run_stats,
                required_failures,
                ..
            } => {
                writeln!(writer, "------------")?;
                let summary_style = if run_stats.is_success() {
                    if run_stats.any_failed() {
                        self.styles.skip
                    } else {
                        self.styles.pass
                    }
                } else {
                    self.styles.fail
                };
                write!(writer, "{:>12} ", "Summary".style(summary_style))?;
                self.write_duration(*elapsed, writer)?;
                write!(
                    writer,
                    "Finished {} tests in {} groups: ",
                    run_stats.finished_count.style(self.styles.count),
                    run_stats.total_groups.style(self.styles.count),
                )?;
                write!(
                    writer,
                    "{} {}, ",
                    run_stats.passed.style(self.styles.count),
                    "passed".style(self.styles.pass),
                )?;
                write!(
                    writer,
                    "{} {}, ",
                    run_stats.failed.style(self.styles.count),
                    "failed".style(self.styles.fail),
                )?;
                write!(
                    writer,
                    "{} {}",
                    run_stats.skipped.style(self.styles.count),
                    "skipped".style(self.styles.skip),
                )?;

                let mut breakdown = Vec::new();
                if run_stats.timed_out > 0 {
                    breakdown.push(format!("{} timed out", run_stats.timed_out));
                }
                if run_stats.exec_failed > 0 {
                    breakdown.push(format!("{} exec failed", run_stats.exec_failed));
                }
                if breakdown.is_empty() {
                    writeln!(writer)?;
                } else {
                    writeln!(writer, " ({})", breakdown.join(", "))?;
                }

                for qualified_name in required_failures.iter() {
                    write!(writer, "{:>12} ", "REQUIRED".style(self.styles.fail))?;
                    writeln!(writer, "{}", qualified_name.style(self.styles.fail))?;
                }
            }
        }

        Ok(())
    }

    fn write_status_line(
        &self,
        test_instance: TestInstance<'_>,
        status: &ExecuteStatus,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let style = if status.result.is_success() {
            if status.leaked {
                self.styles.skip
            } else {
                self.styles.pass
            }
        } else {
            self.styles.fail
        };
        write!(
            writer,
            "{:>12} ",
            status_str(status.result, status.leaked).style(style)
        )?;
        self.write_duration(status.time_taken, writer)?;
        self.write_instance(test_instance, writer)?;
        writeln!(writer)
    }

    fn write_output(
        &self,
        test_instance: TestInstance<'_>,
        status: &ExecuteStatus,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let (header_style, output_style) = if status.result.is_success() {
            (self.styles.pass, self.styles.pass_output)
        } else {
            (self.styles.fail, self.styles.fail_output)
        };

        write!(writer, "\n{}", "--- OUTPUT: ".style(header_style))?;
        write!(writer, "{}", test_instance.style(header_style))?;
        writeln!(writer, "{}", " ---".style(header_style))?;

        if !status.output.is_empty() {
            write!(writer, "{}", status.output.as_str().style(output_style))?;
            if !status.output.ends_with('\n') {
                writeln!(writer)?;
            }
        }
        writeln!(writer)
    }

    fn write_instance(&self, instance: TestInstance<'_>, writer: &mut dyn Write) -> io::Result<()> {
        if !instance.group.is_empty() {
            write!(writer, "{}/", instance.group)?;
        }
        write!(
            writer,
            "{}",
            instance.name.style(self.styles.list_styles.test_name)
        )
    }

    fn write_duration(&self, duration: Duration, writer: &mut dyn Write) -> io::Result<()> {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(writer, "[{:>8.3?}s] ", duration.as_secs_f64())
    }
}

fn status_str(result: ExecutionResult, leaked: bool) -> Cow<'static, str> {
    match result {
        ExecutionResult::Pass if leaked => "LEAK".into(),
        ExecutionResult::Pass => "PASS".into(),
        ExecutionResult::Fail {
            failure: FailureStatus::Signal(signal),
        } => match Signal::try_from(signal) {
            Ok(signal) => signal.as_str().into(),
            Err(_) => format!("SIG{signal}").into(),
        },
        ExecutionResult::Fail {
            failure: FailureStatus::ExitCode(_),
        } => "FAIL".into(),
        ExecutionResult::Timeout => "TIMEOUT".into(),
        ExecutionResult::ExecFail => "XFAIL".into(),
    }
}

fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 { singular } else { plural }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    banner: Style,
    pass_output: Style,
    fail_output: Style,
    list_styles: ListStyles,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.banner = Style::new().cyan();
        self.pass_output = Style::new().green();
        self.fail_output = Style::new().magenta();
        self.list_styles.colorize();
    }
}
