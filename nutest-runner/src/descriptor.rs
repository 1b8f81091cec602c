// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invocation descriptors passed to the component manager driver.
//!
//! The driver reads an XML manifest listing the programs to run. For each test, nutest takes the
//! manifest from the server data directory, appends a `<program>` element that runs the client
//! against the test script, and writes the result to a temporary file whose path is passed to the
//! driver.

use crate::errors::{DescriptorWriteError, ManifestReadError};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::NamedUtf8TempFile;
use quick_xml::{Reader, escape::escape, events::Event};
use std::io::Write;

/// The driver manifest, read once and used as a template for each test's descriptor.
#[derive(Clone, Debug)]
pub struct ManifestTemplate {
    path: Utf8PathBuf,
    contents: String,
    insertion: Insertion,
}

/// Where the program element goes in the manifest.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Insertion {
    /// Just before the root element's end tag, at this byte offset.
    BeforeEnd(usize),

    /// The root is an empty element spanning these byte offsets. It is rewritten as a start and
    /// end tag pair.
    ExpandEmpty { start: usize, end: usize },
}

impl ManifestTemplate {
    /// Reads the manifest at the given path.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, ManifestReadError> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => return Err(ManifestReadError::Read { path, err }),
        };
        Self::parse(path, contents)
    }

    /// Parses manifest contents. `path` is used for error messages.
    pub fn parse(
        path: impl Into<Utf8PathBuf>,
        contents: impl Into<String>,
    ) -> Result<Self, ManifestReadError> {
        let path = path.into();
        let contents = contents.into();
        match find_insertion(&contents) {
            Ok(Some(insertion)) => Ok(Self {
                path,
                contents,
                insertion,
            }),
            Ok(None) => Err(ManifestReadError::NoRootElement { path }),
            Err(err) => Err(ManifestReadError::Parse { path, err }),
        }
    }

    /// Returns the path the manifest was read from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Renders the descriptor for running `script` with `client`.
    pub fn render(&self, client: &Utf8Path, script: &Utf8Path) -> String {
        let program = program_element(client, script);
        match self.insertion {
            Insertion::BeforeEnd(offset) => {
                let (head, tail) = self.contents.split_at(offset);
                let mut out = String::with_capacity(self.contents.len() + program.len());
                out.push_str(head);
                out.push_str(&program);
                out.push_str(tail);
                out
            }
            Insertion::ExpandEmpty { start, end } => {
                let element = &self.contents[start..end];
                let open = element.trim_end_matches("/>");
                let name = element_name(open);
                let mut out = String::with_capacity(self.contents.len() + program.len());
                out.push_str(&self.contents[..start]);
                out.push_str(open);
                out.push('>');
                out.push_str(&program);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
                out.push_str(&self.contents[end..]);
                out
            }
        }
    }

    /// Writes the descriptor for running `script` with `client` to a new temporary file.
    ///
    /// The file is removed when the returned descriptor is dropped.
    pub fn write_descriptor(
        &self,
        client: &Utf8Path,
        script: &Utf8Path,
        prefix: &str,
    ) -> Result<InvocationDescriptor, DescriptorWriteError> {
        let mut file = camino_tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".xml")
            .tempfile()
            .map_err(DescriptorWriteError::Create)?;

        let rendered = self.render(client, script);
        file.write_all(rendered.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| DescriptorWriteError::Write {
                path: file.path().to_owned(),
                err,
            })?;

        tracing::trace!("wrote invocation descriptor for `{script}` to `{}`", file.path());
        Ok(InvocationDescriptor { file })
    }
}

/// A descriptor written to a temporary file for a single test.
///
/// Each test gets its own file, which is deleted when this is dropped.
#[derive(Debug)]
pub struct InvocationDescriptor {
    file: NamedUtf8TempFile,
}

impl InvocationDescriptor {
    /// Returns the path to the descriptor.
    pub fn path(&self) -> &Utf8Path {
        self.file.path()
    }
}

fn program_element(client: &Utf8Path, script: &Utf8Path) -> String {
    format!(
        "<program timeout=\"0\" restart=\"false\" output=\"true\" notify=\"false\" \
         stop_on_exit=\"true\"><path>{}</path><arg>{}</arg></program>",
        escape(client.as_str()),
        escape(script.as_str()),
    )
}

fn element_name(open_tag: &str) -> &str {
    let inner = open_tag.trim_start_matches('<');
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(inner.len());
    &inner[..end]
}

/// Scans the document, returning where the program element should be inserted.
///
/// Returns `Ok(None)` if the document has no root element.
fn find_insertion(contents: &str) -> Result<Option<Insertion>, quick_xml::Error> {
    let mut reader = Reader::from_str(contents);
    let mut depth = 0usize;
    let mut insertion = None;

    loop {
        let start = position(&reader);
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    insertion = Some(Insertion::BeforeEnd(start));
                }
            }
            Event::Empty(_) if depth == 0 => {
                insertion = Some(Insertion::ExpandEmpty {
                    start,
                    end: position(&reader),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(insertion)
}

fn position(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}
