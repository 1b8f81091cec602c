// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, ProgramKind, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, ValueEnum};
use nutest_metadata::NutestExitCode;
use nutest_runner::{
    config::NutestConfig,
    descriptor::ManifestTemplate,
    errors::WriteTestListError,
    list::{OutputFormat, SerializableFormat, TestList},
    reporter::{JunitWriter, TestOutputDisplay, TestReporterBuilder},
    runner::{DriverExecutor, DriverPaths, TestOrder, TestRunnerBuilder},
    test_filter::TestFilter,
};
use std::{io::Write, os::unix::fs::PermissionsExt};

/// Runs directories of test scripts through a component manager driver.
///
/// Tests are grouped by directory. Groups run in discovery order, and tests within a group run in a
/// random order unless --no-shuffle is passed.
#[derive(Debug, Parser)]
#[command(
    name = "nutest",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct NutestApp {
    #[command(flatten)]
    run_opts: RunOpts,

    #[command(flatten)]
    output: OutputOpts,
}

impl NutestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        self.run_opts.exec(output, output_writer)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Run options")]
struct RunOpts {
    /// Path to the component manager driver
    #[arg(
        short = 'm',
        long,
        visible_alias = "manager",
        value_name = "PATH",
        required_unless_present = "list"
    )]
    driver: Option<Utf8PathBuf>,

    /// Path to the client program the driver runs against each script
    #[arg(short, long, value_name = "PATH", required_unless_present = "list")]
    client: Option<Utf8PathBuf>,

    /// Server data directory, containing the driver manifest
    #[arg(short, long, value_name = "DIR", required_unless_present = "list")]
    server_data: Option<Utf8PathBuf>,

    /// Root directory of the test scripts [default: directory containing nutest]
    #[arg(short, long, value_name = "DIR")]
    root_dir: Option<Utf8PathBuf>,

    /// Write a JUnit XML report to this path
    #[arg(short, long, value_name = "PATH")]
    output: Option<Utf8PathBuf>,

    /// Config file [default: <root-dir>/.config/nutest.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Seed for shuffling tests within each group [default: random]
    #[arg(long, value_name = "SEED", conflicts_with = "no_shuffle")]
    seed: Option<u64>,

    /// Run tests within each group in discovery order
    #[arg(long)]
    no_shuffle: bool,

    /// When to show captured test output [default: from config]
    #[arg(long, value_enum, value_name = "WHEN")]
    show_output: Option<TestOutputDisplayOpt>,

    /// List discovered tests and exit, without running them
    #[arg(long)]
    list: bool,

    /// Output format for --list
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT", requires = "list")]
    message_format: MessageFormatOpt,

    /// Test scripts and directories of test scripts to run
    #[arg(required = true, value_name = "TESTS")]
    tests: Vec<Utf8PathBuf>,
}

impl RunOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let root = self.root_dir()?;
        let config = NutestConfig::from_sources(&root, self.config_file.as_deref())?;

        // Setup problems are reported before anything is discovered or run.
        let run_setup = if self.list {
            None
        } else {
            Some(self.run_setup(&config)?)
        };

        let filter = TestFilter::load(&config)?;
        let test_list = TestList::discover(&root, &self.tests, config.run().script_extension())?;

        let Some((paths, template)) = run_setup else {
            let mut writer = output_writer.stdout_writer();
            let colorize = output
                .color
                .should_colorize(supports_color::Stream::Stdout);
            test_list.write(self.message_format.into(), &filter, &mut writer, colorize)?;
            writer.flush().map_err(WriteTestListError::Io)?;
            return Ok(NutestExitCode::OK);
        };

        let executor = DriverExecutor::new(paths, template, &config)?;

        let mut reporter_builder = TestReporterBuilder::default();
        reporter_builder.set_verbose(output.verbose);
        if let Some(show_output) = self.show_output {
            reporter_builder.set_output_display(show_output.into());
        }

        let mut runner_builder = TestRunnerBuilder::default();
        runner_builder.set_order(self.order());
        let mut runner = runner_builder.build(&test_list, &filter, executor);

        let outcome = {
            let mut reporter = reporter_builder.build(&config, output_writer.reporter_output());
            if output.color.should_colorize(supports_color::Stream::Stderr) {
                reporter.colorize();
            }
            runner.try_execute(|event| reporter.report_event(event))?
        };

        if let Some(path) = &self.output {
            JunitWriter::new(config.junit(), path.clone()).write(&outcome)?;
            tracing::info!("wrote JUnit report to `{path}`");
        }

        if outcome.is_success() {
            Ok(NutestExitCode::OK)
        } else {
            Err(ExpectedError::test_run_failed(outcome.required_failures))
        }
    }

    fn root_dir(&self) -> Result<Utf8PathBuf> {
        let root = match &self.root_dir {
            Some(root) => root.clone(),
            None => default_root_dir()?,
        };
        if !root.is_dir() {
            return Err(ExpectedError::RootDirInvalid { path: root });
        }
        Ok(root)
    }

    /// Validates the driver, client and server data, and reads the manifest.
    fn run_setup(&self, config: &NutestConfig) -> Result<(DriverPaths, ManifestTemplate)> {
        let driver = required_arg(self.driver.as_deref(), "--driver")?;
        let client = required_arg(self.client.as_deref(), "--client")?;
        let server_data = required_arg(self.server_data.as_deref(), "--server-data")?;

        let driver = resolve_program(ProgramKind::Driver, driver)?;
        let client = resolve_program(ProgramKind::Client, client)?;
        let server_data = server_data
            .canonicalize_utf8()
            .ok()
            .filter(|path| path.is_dir())
            .ok_or_else(|| ExpectedError::ServerDataInvalid {
                path: server_data.to_owned(),
            })?;

        let template = ManifestTemplate::load(server_data.join(config.driver().manifest()))?;
        tracing::debug!("using driver manifest `{}`", template.path());

        Ok((
            DriverPaths {
                driver,
                client,
                server_data,
            },
            template,
        ))
    }

    fn order(&self) -> TestOrder {
        if self.no_shuffle {
            TestOrder::Discovery
        } else if let Some(seed) = self.seed {
            TestOrder::Shuffle { seed }
        } else {
            let order = TestOrder::random();
            tracing::debug!("test order: {order} (replay with --seed)");
            order
        }
    }
}

/// clap requires these arguments unless `--list` is passed, but the run path checks them anyway.
fn required_arg<'a>(value: Option<&'a Utf8Path>, arg: &'static str) -> Result<&'a Utf8Path> {
    value.ok_or(ExpectedError::MissingArgument { arg })
}

fn default_root_dir() -> Result<Utf8PathBuf> {
    let exe = std::env::current_exe().map_err(|err| ExpectedError::RootDirUnknown { err })?;
    let exe = Utf8PathBuf::try_from(exe)
        .map_err(|err| ExpectedError::RootDirUnknown { err: err.into_io_error() })?;
    match exe.parent() {
        Some(parent) => Ok(parent.to_owned()),
        None => Err(ExpectedError::RootDirInvalid { path: exe }),
    }
}

/// Makes the path absolute, since the driver runs in the server data directory, and checks it can
/// be executed.
fn resolve_program(kind: ProgramKind, path: &Utf8Path) -> Result<Utf8PathBuf> {
    let resolved = path
        .canonicalize_utf8()
        .map_err(|err| ExpectedError::program_not_found(kind, path, err))?;
    let metadata = resolved
        .metadata()
        .map_err(|err| ExpectedError::program_not_found(kind, path, err))?;
    if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
        return Err(ExpectedError::ProgramNotExecutable {
            kind,
            path: path.to_owned(),
        });
    }
    Ok(resolved)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TestOutputDisplayOpt {
    Always,
    Failure,
    Never,
}

impl From<TestOutputDisplayOpt> for TestOutputDisplay {
    fn from(opt: TestOutputDisplayOpt) -> Self {
        match opt {
            TestOutputDisplayOpt::Always => TestOutputDisplay::Always,
            TestOutputDisplayOpt::Failure => TestOutputDisplay::Failure,
            TestOutputDisplayOpt::Never => TestOutputDisplay::Never,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum MessageFormatOpt {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl From<MessageFormatOpt> for OutputFormat {
    fn from(opt: MessageFormatOpt) -> Self {
        match opt {
            MessageFormatOpt::Human => OutputFormat::Human,
            MessageFormatOpt::Json => OutputFormat::Serializable(SerializableFormat::Json),
            MessageFormatOpt::JsonPretty => {
                OutputFormat::Serializable(SerializableFormat::JsonPretty)
            }
        }
    }
}
