// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::Style;
use serde::Serialize;
use std::io;

/// Output formats for test lists.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum OutputFormat {
    /// A human-readable output format.
    Human,

    /// Machine-readable output format.
    Serializable(SerializableFormat),
}

/// A serialized, machine-readable output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SerializableFormat {
    /// JSON with no whitespace.
    Json,
    /// JSON, prettified.
    JsonPretty,
}

impl SerializableFormat {
    /// Write this data in the given format to the writer.
    pub fn to_writer(
        self,
        value: &impl Serialize,
        writer: impl io::Write,
    ) -> serde_json::Result<()> {
        match self {
            SerializableFormat::Json => serde_json::to_writer(writer, value),
            SerializableFormat::JsonPretty => serde_json::to_writer_pretty(writer, value),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Styles {
    pub(crate) group: Style,
    pub(crate) test_name: Style,
    pub(crate) annotation: Style,
}

impl Styles {
    pub(crate) fn colorize(&mut self) {
        self.group = Style::new().magenta().bold();
        self.test_name = Style::new().blue().bold();
        self.annotation = Style::new().yellow();
    }
}
