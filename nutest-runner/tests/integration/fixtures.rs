// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, WrapErr};
use nix::{errno::Errno, sys::signal::kill, unistd::Pid};
use nutest_runner::{
    config::NutestConfig,
    descriptor::ManifestTemplate,
    list::TestList,
    runner::{DriverExecutor, DriverPaths},
};
use std::{
    os::unix::fs::PermissionsExt,
    time::{Duration, Instant},
};

/// A driver that stands in for the component manager.
///
/// It pulls the client and script paths out of the appended `<program>` element (the only one with
/// an `<arg>`) and behaves according to the script's name:
///
/// * `fail*` exits with code 3.
/// * `hang*` starts a background `sleep`, records its pid and waits forever.
/// * `leak*` starts a background `sleep` that holds the output open, then exits 0.
/// * anything else exits 0.
///
/// Every invocation records the descriptor path in `<name>.descriptor-path` in its working
/// directory, and appends the name to `invocations.log`.
static FAKE_DRIVER: &str = r#"#!/bin/sh
script=$(sed -n 's|.*<arg>\(.*\)</arg>.*|\1|p' "$1")
client=$(sed -n '/<arg>/s|.*<path>\(.*\)</path>.*|\1|p' "$1")
name=$(basename "$script" .nut)
echo "$1" > "$name.descriptor-path"
echo "$name" >> invocations.log
echo "driver running $client against $script"
echo "stderr line for $name" >&2
case "$name" in
    fail*)
        exit 3
        ;;
    hang*)
        sleep 30 &
        echo $! > "$name.pid"
        wait
        ;;
    leak*)
        sleep 30 &
        echo $! > "$name.pid"
        exit 0
        ;;
esac
exit 0
"#;

pub(crate) fn test_init() {
    // Installing twice fails, which is fine.
    _ = color_eyre::install();
}

/// A test root, server data directory and driver, all in a temporary directory.
pub(crate) struct DriverFixture {
    _dir: Utf8TempDir,
    pub(crate) root: Utf8PathBuf,
    pub(crate) server_data: Utf8PathBuf,
    driver: Utf8PathBuf,
}

impl DriverFixture {
    /// Creates a fixture with a script for each of the given qualified names.
    pub(crate) fn new(tests: &[&str]) -> Result<Self> {
        let dir = camino_tempfile::tempdir()?;
        let root = dir.path().join("tests");
        let server_data = dir.path().join("server");
        fs_err::create_dir_all(&root)?;
        fs_err::create_dir_all(&server_data)?;

        for test in tests {
            let path = root.join(format!("{test}.nut"));
            if let Some(parent) = path.parent() {
                fs_err::create_dir_all(parent)?;
            }
            fs_err::write(&path, format!("// {test}\n"))?;
        }

        fs_err::write(
            server_data.join("programs.xml"),
            "<programs>\n  <program><path>/opt/server</path></program>\n</programs>\n",
        )?;

        let driver = dir.path().join("fake-driver.sh");
        fs_err::write(&driver, FAKE_DRIVER)?;
        fs_err::set_permissions(&driver, std::fs::Permissions::from_mode(0o755))?;

        Ok(Self {
            _dir: dir,
            root,
            server_data,
            driver,
        })
    }

    /// Writes `.config/nutest.toml` under the test root.
    pub(crate) fn write_config(&self, contents: &str) -> Result<()> {
        let path = self.root.join(NutestConfig::CONFIG_PATH);
        fs_err::create_dir_all(path.parent().expect("config path has a parent"))?;
        fs_err::write(path, contents)?;
        Ok(())
    }

    /// Writes a file directly under the test root, such as a skip or required list.
    pub(crate) fn write_root_file(&self, name: &str, contents: &str) -> Result<()> {
        fs_err::write(self.root.join(name), contents)?;
        Ok(())
    }

    pub(crate) fn config(&self) -> Result<NutestConfig> {
        NutestConfig::from_sources(&self.root, None).wrap_err("reading fixture config")
    }

    pub(crate) fn discover(&self, config: &NutestConfig) -> Result<TestList> {
        let list = TestList::discover(
            &self.root,
            [self.root.as_path()],
            config.run().script_extension(),
        )?;
        Ok(list)
    }

    pub(crate) fn executor(&self, config: &NutestConfig) -> Result<DriverExecutor> {
        let template =
            ManifestTemplate::load(self.server_data.join(config.driver().manifest()))?;
        let paths = DriverPaths {
            driver: self.driver.clone(),
            client: "/opt/client".into(),
            server_data: self.server_data.clone(),
        };
        Ok(DriverExecutor::new(paths, template, config)?)
    }

    /// Returns the names of the tests the driver was invoked for, in order.
    pub(crate) fn invocations(&self) -> Result<Vec<String>> {
        let path = self.server_data.join("invocations.log");
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(fs_err::read_to_string(path)?
            .lines()
            .map(str::to_owned)
            .collect())
    }

    pub(crate) fn descriptor_path(&self, name: &str) -> Result<Utf8PathBuf> {
        let contents = fs_err::read_to_string(self.server_data.join(format!("{name}.descriptor-path")))?;
        Ok(contents.trim().into())
    }

    pub(crate) fn recorded_pid(&self, name: &str) -> Result<Pid> {
        let contents = fs_err::read_to_string(self.server_data.join(format!("{name}.pid")))?;
        let pid: i32 = contents.trim().parse()?;
        Ok(Pid::from_raw(pid))
    }
}

/// Waits for a process to go away, returning true if it did within the deadline.
///
/// Zombies count as gone: the process has exited even if nothing has reaped it yet.
pub(crate) fn wait_for_exit(pid: Pid, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
        if !is_alive(pid) {
            return true;
        }
        if start.elapsed() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn is_alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Err(Errno::ESRCH) => false,
        _ => !is_zombie(pid),
    }
}

fn is_zombie(pid: Pid) -> bool {
    let stat = Utf8Path::new("/proc").join(pid.to_string()).join("stat");
    match std::fs::read_to_string(stat) {
        // The state follows the parenthesized command name.
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}
