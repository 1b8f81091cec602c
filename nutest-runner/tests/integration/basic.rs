// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use nutest_runner::{
    config::NutestConfig,
    list::TestList,
    reporter::{
        ExecuteStatus, ExecutionResult, FailureStatus, JunitWriter, ReporterStderr,
        TestEventKind, TestOutcome, TestReporterBuilder,
    },
    runner::{RunOutcome, TestOrder, TestRunnerBuilder},
    test_filter::{SkipReason, TestFilter},
};
use pretty_assertions::assert_eq;
use std::{collections::BTreeMap, time::Duration};

/// Runs every test under the fixture's root, returning the outcome and the status of each test
/// that ran, keyed by qualified name.
fn run_fixture(
    fixture: &DriverFixture,
    config: &NutestConfig,
    order: TestOrder,
) -> Result<(RunOutcome, BTreeMap<String, ExecuteStatus>)> {
    let test_list = fixture.discover(config)?;
    let filter = TestFilter::load(config)?;
    let executor = fixture.executor(config)?;

    let mut builder = TestRunnerBuilder::default();
    builder.set_order(order);
    let mut runner = builder.build(&test_list, &filter, executor);

    let mut statuses = BTreeMap::new();
    let outcome = runner.execute(|event| {
        if let TestEventKind::TestFinished {
            test_instance,
            status,
            ..
        } = event.kind
        {
            statuses.insert(test_instance.qualified_name(), status.clone());
        }
    });
    Ok((outcome, statuses))
}

#[test]
fn mixed_outcomes_with_required_failure() -> Result<()> {
    test_init();

    let fixture = DriverFixture::new(&["core/pass_a", "core/fail_b", "extra/pass_c", "extra/pass_d"])?;
    fixture.write_config("[run]\ntimeout = \"10s\"\n")?;
    fixture.write_root_file("skip.lst", "# flaky on CI\nextra/pass_d\n")?;
    fixture.write_root_file("required.lst", "core/\n")?;
    let config = fixture.config()?;

    let test_list = fixture.discover(&config)?;
    let filter = TestFilter::load(&config)?;
    let executor = fixture.executor(&config)?;

    let mut buf = Vec::new();
    let outcome = {
        let mut reporter = TestReporterBuilder::default()
            .build(&config, ReporterStderr::Buffer(&mut buf));
        let mut builder = TestRunnerBuilder::default();
        builder.set_order(TestOrder::Discovery);
        let mut runner = builder.build(&test_list, &filter, executor);
        runner.try_execute(|event| reporter.report_event(event))?
    };

    assert_eq!(outcome.stats.initial_run_count, 4);
    assert_eq!(outcome.stats.finished_count, 4);
    assert_eq!(outcome.stats.passed, 2);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.skipped, 1);
    assert_eq!(outcome.stats.required_failed, 1);
    assert!(!outcome.is_success(), "a required test failed");
    assert_eq!(outcome.required_failures, vec!["core/fail_b".to_owned()]);

    // The skipped test never reached the driver.
    assert_eq!(fixture.invocations()?, vec!["fail_b", "pass_a", "pass_c"]);

    let groups: Vec<_> = outcome.suites.iter().map(|s| s.group.as_str()).collect();
    assert_eq!(groups, vec!["core", "extra"]);
    let records: Vec<_> = outcome
        .suites
        .iter()
        .flat_map(|suite| suite.records.iter())
        .map(|record| (record.qualified_name.as_str(), record.outcome))
        .collect();
    assert_eq!(
        records,
        vec![
            (
                "core/fail_b",
                TestOutcome::Failed(ExecutionResult::Fail {
                    failure: FailureStatus::ExitCode(3)
                })
            ),
            ("core/pass_a", TestOutcome::Passed),
            ("extra/pass_c", TestOutcome::Passed),
            ("extra/pass_d", TestOutcome::Skipped(SkipReason::Test)),
        ]
    );

    // stdout and stderr are both captured, and the driver saw exactly one client program.
    let pass_a = &outcome.suites[0].records[1];
    let script = test_list.root().join("core/pass_a.nut");
    let expected_line = format!("driver running /opt/client against {script}\n");
    ensure!(
        pass_a.output.starts_with(&expected_line)
            && pass_a.output.contains("stderr line for pass_a"),
        "unexpected output: {:?}",
        pass_a.output
    );

    // Each descriptor is a fresh file, removed once its test finishes.
    let descriptor = fixture.descriptor_path("pass_a")?;
    let file_name = descriptor.file_name().unwrap_or_default();
    assert!(
        file_name.starts_with(config.driver().descriptor_prefix()) && file_name.ends_with(".xml"),
        "descriptor name: {file_name}"
    );
    assert!(!descriptor.exists(), "descriptor {descriptor} was removed");
    assert_ne!(descriptor, fixture.descriptor_path("pass_c")?);

    let console = String::from_utf8(buf)?;
    ensure!(
        console.contains("Finished 4 tests in 2 groups: 2 passed, 1 failed, 1 skipped"),
        "console output:\n{console}"
    );
    ensure!(
        console.contains("REQUIRED TEST HAS FAILED: core/fail_b"),
        "console output:\n{console}"
    );

    let junit_path = fixture.server_data.join("out/junit.xml");
    JunitWriter::new(config.junit(), junit_path.clone()).write(&outcome)?;
    let xml = fs_err::read_to_string(&junit_path)?;
    ensure!(xml.contains(r#"<testsuite name="core""#), "junit:\n{xml}");
    ensure!(xml.contains("<skipped"), "junit:\n{xml}");

    Ok(())
}

#[test]
fn timeout_kills_process_group() -> Result<()> {
    test_init();

    let fixture = DriverFixture::new(&["slow/hang_forever"])?;
    fixture.write_config("[run]\ntimeout = \"500ms\"\n")?;
    fixture.write_root_file("required.lst", "slow/hang_forever\n")?;
    let config = fixture.config()?;

    let (outcome, statuses) = run_fixture(&fixture, &config, TestOrder::Discovery)?;
    let status = &statuses["slow/hang_forever"];
    assert_eq!(status.result, ExecutionResult::Timeout);
    assert!(
        status.time_taken < Duration::from_secs(10),
        "killed promptly, took {:?}",
        status.time_taken
    );
    assert!(
        status.output.contains("driver running"),
        "output before the kill is kept: {:?}",
        status.output
    );
    assert_eq!(outcome.stats.timed_out, 1);
    assert!(!outcome.is_success());

    // The driver's background process was killed along with it.
    let pid = fixture.recorded_pid("hang_forever")?;
    assert!(
        wait_for_exit(pid, Duration::from_secs(5)),
        "background process {pid} outlived the timeout"
    );

    Ok(())
}

#[test]
fn leaked_output_is_cut_off() -> Result<()> {
    test_init();

    let fixture = DriverFixture::new(&["leak_background"])?;
    fixture.write_config("[run]\ntimeout = \"20s\"\nleak-timeout = \"100ms\"\n")?;
    let config = fixture.config()?;

    let (outcome, statuses) = run_fixture(&fixture, &config, TestOrder::Discovery)?;
    let status = &statuses["leak_background"];
    assert_eq!(status.result, ExecutionResult::Pass);
    assert!(status.leaked, "background sleep held the output open");
    assert!(
        status.time_taken < Duration::from_secs(10),
        "didn't wait for the leaked process, took {:?}",
        status.time_taken
    );
    assert!(outcome.is_success());

    let pid = fixture.recorded_pid("leak_background")?;
    assert!(
        wait_for_exit(pid, Duration::from_secs(5)),
        "leaked process {pid} was not killed"
    );

    Ok(())
}

#[test]
fn shuffle_is_reproducible_across_runs() -> Result<()> {
    test_init();

    let names: Vec<String> = (0..8).map(|i| format!("suite/pass_{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let fixture = DriverFixture::new(&names)?;
    let config = fixture.config()?;

    run_fixture(&fixture, &config, TestOrder::Shuffle { seed: 99 })?;
    run_fixture(&fixture, &config, TestOrder::Shuffle { seed: 99 })?;

    let invocations = fixture.invocations()?;
    assert_eq!(invocations.len(), 16);
    let (first, second) = invocations.split_at(8);
    assert_eq!(first, second, "same seed, same order");

    let mut sorted = first.to_vec();
    sorted.sort();
    let expected: Vec<String> = (0..8).map(|i| format!("pass_{i}")).collect();
    assert_eq!(sorted, expected, "every test ran exactly once per run");

    Ok(())
}

#[test]
fn missing_script_is_a_discovery_error() -> Result<()> {
    test_init();

    let fixture = DriverFixture::new(&["a/present"])?;
    let config = fixture.config()?;
    let missing = fixture.root.join("a/absent.nut");
    let err = TestList::discover(
        &fixture.root,
        [fixture.root.join("a/present.nut"), missing.clone()],
        config.run().script_extension(),
    )
    .expect_err("a missing script fails discovery");

    assert_eq!(err.len(), 1);
    ensure!(
        err.to_string().contains(missing.as_str()),
        "error names the missing path: {err}"
    );
    Ok(())
}
