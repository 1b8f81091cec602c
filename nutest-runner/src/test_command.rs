// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ChildStartError;
use bytes::BytesMut;
use camino::Utf8Path;
use std::{io, process::Stdio};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    process::Child as TokioChild,
};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        #[path = "test_command/unix.rs"]
        mod unix;
        use unix as os;
    } else {
        compile_error!("unsupported target platform");
    }
}

/// The size of the buffered reader's buffer, and the initial capacity of the output buffer.
const CHUNK_SIZE: usize = 4 * 1024;

/// A to-be-run invocation of the driver for a single test.
pub(crate) struct DriverCommand {
    command: std::process::Command,
}

impl DriverCommand {
    /// Creates a new command that runs `driver` with the descriptor as its only argument.
    pub(crate) fn new(driver: &Utf8Path, descriptor: &Utf8Path, cwd: &Utf8Path) -> Self {
        let mut command = std::process::Command::new(driver);
        command
            .arg(descriptor)
            .current_dir(cwd)
            // This environment variable is set to indicate that the driver is being run by nutest.
            .env("NUTEST", "1");
        Self { command }
    }

    /// Spawns the driver in a new process group, with stdout and stderr sharing a single pipe.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(self) -> Result<Child, ChildStartError> {
        let mut cmd = self.command;
        cmd.stdin(Stdio::null());
        os::set_process_group(&mut cmd);

        let (rx, tx) = std::io::pipe().map_err(ChildStartError::Pipe)?;
        let tx_dup = tx.try_clone().map_err(ChildStartError::Pipe)?;
        cmd.stdout(tx).stderr(tx_dup);

        let mut cmd = tokio::process::Command::from(cmd);
        let child = cmd.spawn().map_err(ChildStartError::Spawn);
        // The command holds on to the write ends of the pipe. Drop it so that the only remaining
        // writers are the child and its descendants.
        drop(cmd);
        let child = child?;

        let output = ChildAccumulator::new(File::from_std(os::pipe_reader_to_file(rx)));
        Ok(Child { child, output })
    }
}

/// A spawned driver along with its output pipe.
pub(crate) struct Child {
    pub(crate) child: TokioChild,
    pub(crate) output: ChildAccumulator,
}

/// Accumulates combined output from a child process.
pub(crate) struct ChildAccumulator {
    reader: BufReader<File>,
    done: bool,
    buf: BytesMut,
    errors: Vec<io::Error>,
}

impl ChildAccumulator {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::with_capacity(CHUNK_SIZE, file),
            done: false,
            buf: BytesMut::with_capacity(CHUNK_SIZE),
            errors: Vec::new(),
        }
    }

    /// Reads whatever output is available, marking the accumulator done at EOF or on error.
    ///
    /// This is cancel-safe, since the underlying [`AsyncBufReadExt::fill_buf`] operation is
    /// cancel-safe.
    pub(crate) async fn fill_buf(&mut self) {
        if self.done {
            return;
        }

        match self.reader.fill_buf().await {
            Ok(buf) => {
                self.buf.extend_from_slice(buf);
                if buf.is_empty() {
                    self.done = true;
                }
                let len = buf.len();
                self.reader.consume(len);
            }
            Err(error) => {
                self.done = true;
                self.errors.push(error);
            }
        }
    }

    /// Reads until every writer has closed the pipe.
    pub(crate) async fn drain(&mut self) {
        while !self.done {
            self.fill_buf().await;
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    /// Finishes collection, returning the output decoded as UTF-8 (lossily) and any read errors.
    pub(crate) fn finish(self) -> (String, Vec<io::Error>) {
        let output = String::from_utf8_lossy(&self.buf).into_owned();
        (output, self.errors)
    }
}
