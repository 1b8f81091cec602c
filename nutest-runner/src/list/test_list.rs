// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{OutputFormat, Styles};
use crate::{
    errors::{DiscoveryError, DiscoveryErrors, WriteTestListError},
    test_filter::TestFilter,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use nutest_metadata::{TestCaseSummary, TestGroupSummary, TestListSummary};
use owo_colors::OwoColorize;
use std::{fmt, io, path::Path};
use walkdir::WalkDir;

/// The name used to display the group of tests that live directly in the test root.
pub const EMPTY_GROUP_DISPLAY: &str = "<empty>";

/// A single test script, identified by its group and name.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TestInstance<'a> {
    /// The directory of the test relative to the root, with `/` separators.
    ///
    /// Empty for tests directly under the root.
    pub group: &'a str,

    /// The file stem of the test script.
    pub name: &'a str,
}

impl<'a> TestInstance<'a> {
    /// Creates a new `TestInstance`.
    pub fn new(group: &'a str, name: &'a str) -> Self {
        Self { group, name }
    }

    /// Returns `group/name`, or just `name` for tests without a group.
    pub fn qualified_name(&self) -> String {
        if self.group.is_empty() {
            self.name.to_owned()
        } else {
            format!("{}/{}", self.group, self.name)
        }
    }

    /// Returns the qualified name with `/` replaced by `.`, as used for JUnit class names.
    pub fn classname(&self) -> String {
        self.qualified_name().replace('/', ".")
    }

    /// Returns the path to the test script.
    pub fn script_path(&self, root: &Utf8Path, extension: &str) -> Utf8PathBuf {
        // Names may contain dots, so the extension is appended rather than set.
        root.join(self.group).join(format!("{}.{extension}", self.name))
    }

    /// Returns the group for display, with `<empty>` standing in for the empty group.
    pub fn display_group(&self) -> &'a str {
        display_group(self.group)
    }
}

impl fmt::Display for TestInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.group, self.name)
        }
    }
}

/// Returns the group for display, with `<empty>` standing in for the empty group.
pub fn display_group(group: &str) -> &str {
    if group.is_empty() {
        EMPTY_GROUP_DISPLAY
    } else {
        group
    }
}

/// The list of test scripts found under a root, grouped by directory.
///
/// Groups are kept in the order they were discovered, and so are tests within each group.
#[derive(Clone, Debug)]
pub struct TestList {
    root: Utf8PathBuf,
    script_extension: String,
    groups: IndexMap<String, Vec<String>>,
    test_count: usize,
}

impl TestList {
    /// Discovers test scripts from the given files and directories.
    ///
    /// Each argument is resolved relative to the current directory, and must be a script or a
    /// directory under `root`. Directories are searched recursively for files with the given
    /// extension.
    ///
    /// All problems are collected and returned together: if any argument is invalid, no list is
    /// produced.
    pub fn discover<I, P>(
        root: &Utf8Path,
        args: I,
        script_extension: &str,
    ) -> Result<Self, DiscoveryErrors>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        let root = match canonicalize_utf8(root) {
            Ok(root) => root,
            Err(CanonicalizeError::Io(err)) => {
                return Err(DiscoveryErrors::new(vec![DiscoveryError::RootInvalid {
                    root: root.to_owned(),
                    err,
                }]));
            }
            Err(CanonicalizeError::NonUtf8(path)) => {
                return Err(DiscoveryErrors::new(vec![DiscoveryError::NonUtf8Path {
                    path,
                }]));
            }
        };

        let mut builder = TestListBuilder {
            list: Self {
                root,
                script_extension: script_extension.to_owned(),
                groups: IndexMap::new(),
                test_count: 0,
            },
            errors: Vec::new(),
        };

        for arg in args {
            builder.add_arg(arg.as_ref());
        }

        if builder.errors.is_empty() {
            let list = builder.list;
            tracing::debug!(
                "discovered {} tests in {} groups under `{}`",
                list.test_count,
                list.group_count(),
                list.root,
            );
            Ok(list)
        } else {
            Err(DiscoveryErrors::new(builder.errors))
        }
    }

    /// Creates a list directly from groups of test names.
    ///
    /// Duplicate names within a group are dropped.
    pub fn from_groups<G, T>(
        root: impl Into<Utf8PathBuf>,
        script_extension: impl Into<String>,
        groups: impl IntoIterator<Item = (G, T)>,
    ) -> Self
    where
        G: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let mut list = Self {
            root: root.into(),
            script_extension: script_extension.into(),
            groups: IndexMap::new(),
            test_count: 0,
        };
        for (group, names) in groups {
            let group = group.into();
            for name in names {
                list.insert(group.clone(), name.into());
            }
        }
        list
    }

    /// Returns the canonicalized root directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the extension of test scripts, without the leading dot.
    pub fn script_extension(&self) -> &str {
        &self.script_extension
    }

    /// Returns the number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Returns the total number of tests across all groups.
    pub fn test_count(&self) -> usize {
        self.test_count
    }

    /// Returns true if no tests were found.
    pub fn is_empty(&self) -> bool {
        self.test_count == 0
    }

    /// Iterates over groups and their tests, in discovery order.
    pub fn iter_groups(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.groups
            .iter()
            .map(|(group, names)| (group.as_str(), names.as_slice()))
    }

    /// Iterates over all tests, in discovery order.
    pub fn iter_tests(&self) -> impl Iterator<Item = TestInstance<'_>> + '_ {
        self.groups.iter().flat_map(|(group, names)| {
            names
                .iter()
                .map(move |name| TestInstance::new(group.as_str(), name.as_str()))
        })
    }

    /// Returns the path to the script for the given test.
    pub fn script_path(&self, test: &TestInstance<'_>) -> Utf8PathBuf {
        test.script_path(&self.root, &self.script_extension)
    }

    /// Returns a serializable summary of this list, annotated with filter information.
    pub fn to_summary(&self, filter: &TestFilter) -> TestListSummary {
        let mut summary = TestListSummary::new(self.root.clone(), self.script_extension.clone());
        summary.test_count = self.test_count;
        summary.groups = self
            .groups
            .iter()
            .map(|(group, names)| {
                let mut group_summary = TestGroupSummary::new(group.clone());
                for name in names {
                    let test = TestInstance::new(group, name);
                    group_summary.tests.insert(
                        name.clone(),
                        TestCaseSummary::new(
                            self.script_path(&test),
                            filter.skip_reason(&test).is_some(),
                            filter.is_required(&test),
                        ),
                    );
                }
                group_summary
            })
            .collect();
        summary
    }

    /// Outputs this list to the given writer.
    pub fn write(
        &self,
        output_format: OutputFormat,
        filter: &TestFilter,
        writer: &mut dyn io::Write,
        colorize: bool,
    ) -> Result<(), WriteTestListError> {
        match output_format {
            OutputFormat::Human => self
                .write_human(filter, writer, colorize)
                .map_err(WriteTestListError::Io),
            OutputFormat::Serializable(format) => format
                .to_writer(&self.to_summary(filter), writer)
                .map_err(WriteTestListError::Json),
        }
    }

    /// Returns a human-readable string for this list.
    pub fn to_human_string(&self, filter: &TestFilter) -> String {
        let mut s = Vec::new();
        self.write_human(filter, &mut s, false)
            .expect("writing to a Vec is infallible");
        String::from_utf8(s).expect("test list is valid UTF-8")
    }

    // ---
    // Helper methods
    // ---

    fn write_human(
        &self,
        filter: &TestFilter,
        mut writer: impl io::Write,
        colorize: bool,
    ) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        for (group, names) in &self.groups {
            writeln!(writer, "{}:", display_group(group).style(styles.group))?;
            for name in names {
                let test = TestInstance::new(group, name);
                write!(writer, "    {}", name.style(styles.test_name))?;
                if filter.skip_reason(&test).is_some() {
                    write!(writer, " {}", "(skipped)".style(styles.annotation))?;
                } else if filter.is_required(&test) {
                    write!(writer, " {}", "(required)".style(styles.annotation))?;
                }
                writeln!(writer)?;
            }
        }

        Ok(())
    }

    fn insert(&mut self, group: String, name: String) {
        let is_duplicate = self
            .groups
            .get(&group)
            .is_some_and(|names| names.contains(&name));
        if is_duplicate {
            tracing::warn!(
                "duplicate test `{}` found, skipping",
                TestInstance::new(&group, &name),
            );
            return;
        }
        self.groups.entry(group).or_default().push(name);
        self.test_count += 1;
    }
}

struct TestListBuilder {
    list: TestList,
    errors: Vec<DiscoveryError>,
}

impl TestListBuilder {
    fn add_arg(&mut self, arg: &Utf8Path) {
        let path = match canonicalize_utf8(arg) {
            Ok(path) => path,
            Err(CanonicalizeError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                self.errors.push(DiscoveryError::DoesNotExist {
                    path: arg.to_owned(),
                });
                return;
            }
            Err(CanonicalizeError::Io(err)) => {
                self.errors.push(DiscoveryError::Resolve {
                    path: arg.to_owned(),
                    err,
                });
                return;
            }
            Err(CanonicalizeError::NonUtf8(path)) => {
                self.errors.push(DiscoveryError::NonUtf8Path { path });
                return;
            }
        };

        if path.is_file() {
            self.add_file(path);
        } else if path.is_dir() {
            self.add_dir(path);
        } else {
            self.errors.push(DiscoveryError::NotFileOrDirectory {
                path: arg.to_owned(),
            });
        }
    }

    fn add_file(&mut self, path: Utf8PathBuf) {
        if path.strip_prefix(&self.list.root).is_err() {
            self.errors.push(DiscoveryError::FileOutsideRoot { path });
            return;
        }
        if path.extension() != Some(self.list.script_extension.as_str()) {
            self.errors.push(DiscoveryError::WrongExtension {
                path,
                extension: self.list.script_extension.clone(),
            });
            return;
        }
        self.accept(&path);
    }

    fn add_dir(&mut self, dir: Utf8PathBuf) {
        if dir.strip_prefix(&self.list.root).is_err() {
            self.errors
                .push(DiscoveryError::DirectoryOutsideRoot { path: dir });
            return;
        }

        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.errors.push(DiscoveryError::Walk {
                        path: dir.clone(),
                        err,
                    });
                    continue;
                }
            };
            // Symlinks are followed for classification but not for walking.
            if !entry.path().is_file() {
                continue;
            }

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                self.errors.push(DiscoveryError::NonUtf8Path {
                    path: entry.into_path(),
                });
                continue;
            };
            if path.extension() == Some(self.list.script_extension.as_str()) {
                self.accept(path);
            }
        }
    }

    fn accept(&mut self, path: &Utf8Path) {
        // Callers have checked that the path is under the root.
        let Ok(rel_path) = path.strip_prefix(&self.list.root) else {
            return;
        };
        let Some(name) = rel_path.file_stem() else {
            return;
        };
        let group = rel_path
            .parent()
            .map(|parent| parent.components().map(|c| c.as_str()).collect::<Vec<_>>().join("/"))
            .unwrap_or_default();

        tracing::trace!("found test script `{path}`");
        self.list.insert(group, name.to_owned());
    }
}

enum CanonicalizeError {
    Io(io::Error),
    NonUtf8(std::path::PathBuf),
}

fn canonicalize_utf8(path: &Utf8Path) -> Result<Utf8PathBuf, CanonicalizeError> {
    let canonical = Path::new(path)
        .canonicalize()
        .map_err(CanonicalizeError::Io)?;
    Utf8PathBuf::from_path_buf(canonical).map_err(CanonicalizeError::NonUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_filter::FilterList;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn make_tree(files: &[&str]) -> Utf8TempDir {
        let dir = camino_tempfile::Builder::new()
            .prefix("nutest-discover-")
            .tempdir()
            .unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs_err::create_dir_all(path.parent().unwrap()).unwrap();
            fs_err::write(&path, "").unwrap();
        }
        dir
    }

    fn groups(list: &TestList) -> Vec<(&str, Vec<&str>)> {
        list.iter_groups()
            .map(|(group, names)| (group, names.iter().map(String::as_str).collect()))
            .collect()
    }

    #[test]
    fn test_instance_names() {
        let test = TestInstance::new("net/tcp", "connect");
        assert_eq!(test.qualified_name(), "net/tcp/connect");
        assert_eq!(test.classname(), "net.tcp.connect");
        assert_eq!(
            test.script_path(Utf8Path::new("/srv/tests"), "nut"),
            "/srv/tests/net/tcp/connect.nut"
        );
        assert_eq!(test.display_group(), "net/tcp");
        assert_eq!(test.to_string(), "net/tcp/connect");

        let top = TestInstance::new("", "smoke");
        assert_eq!(top.qualified_name(), "smoke");
        assert_eq!(top.classname(), "smoke");
        assert_eq!(
            top.script_path(Utf8Path::new("/srv/tests"), "nut"),
            "/srv/tests/smoke.nut"
        );
        assert_eq!(top.display_group(), EMPTY_GROUP_DISPLAY);

        let dotted = TestInstance::new("proto", "v1.2");
        assert_eq!(dotted.qualified_name(), "proto/v1.2");
        assert_eq!(
            dotted.script_path(Utf8Path::new("/srv/tests"), "nut"),
            "/srv/tests/proto/v1.2.nut"
        );
    }

    #[test]
    fn discover_directory() {
        let tree = make_tree(&[
            "a/x.nut",
            "a/y.nut",
            "a/notes.txt",
            "b/z.nut",
            "b/deep/w.nut",
            "top.nut",
        ]);
        let list = TestList::discover(tree.path(), [tree.path()], "nut").expect("discovered");

        assert_eq!(list.test_count(), 5);
        assert_eq!(list.group_count(), 4);
        // Directory entries are visited depth-first, sorted by file name.
        assert_eq!(
            groups(&list),
            vec![
                ("a", vec!["x", "y"]),
                ("b/deep", vec!["w"]),
                ("b", vec!["z"]),
                ("", vec!["top"]),
            ]
        );
    }

    #[test]
    fn discover_dotted_names() {
        let tree = make_tree(&["a/v1.2.nut", "a/v1.nut"]);
        let list = TestList::discover(tree.path(), [tree.path()], "nut").expect("discovered");

        assert_eq!(groups(&list), vec![("a", vec!["v1.2", "v1"])]);
        let root = list.root().to_owned();
        let paths: Vec<_> = list.iter_tests().map(|test| list.script_path(&test)).collect();
        assert_eq!(paths, vec![root.join("a/v1.2.nut"), root.join("a/v1.nut")]);
        assert!(paths.iter().all(|path| path.is_file()));
    }

    #[cfg(unix)]
    #[test]
    fn discover_symlinked_scripts() {
        let tree = make_tree(&["a/real.nut"]);
        std::os::unix::fs::symlink("real.nut", tree.path().join("a/link.nut")).unwrap();
        // A dangling link is not a script.
        std::os::unix::fs::symlink("gone.nut", tree.path().join("a/stale.nut")).unwrap();

        let list = TestList::discover(tree.path(), [tree.path()], "nut").expect("discovered");
        assert_eq!(groups(&list), vec![("a", vec!["link", "real"])]);
    }

    #[test]
    fn discover_files_and_duplicates() {
        let tree = make_tree(&["a/x.nut", "a/y.nut", "b/z.nut"]);
        let root = tree.path();

        let list = TestList::discover(
            root,
            [
                root.join("b/z.nut"),
                root.join("a"),
                // Already found through the directory above.
                root.join("a/x.nut"),
                root.join("b/./z.nut"),
            ],
            "nut",
        )
        .expect("discovered");

        // Files passed directly are counted just like walked files.
        assert_eq!(list.test_count(), 3);
        assert_eq!(
            groups(&list),
            vec![("b", vec!["z"]), ("a", vec!["x", "y"])]
        );
        let qualified: Vec<_> = list.iter_tests().map(|t| t.qualified_name()).collect();
        assert_eq!(qualified, vec!["b/z", "a/x", "a/y"]);
        assert_eq!(
            list.script_path(&TestInstance::new("b", "z")),
            list.root().join("b/z.nut")
        );
    }

    #[test]
    fn discover_errors_are_accumulated() {
        let tree = make_tree(&["a/x.nut", "a/readme.txt"]);
        let outside = make_tree(&["elsewhere.nut"]);
        let root = tree.path();

        let errors = TestList::discover(
            root,
            [
                root.join("a/readme.txt"),
                root.join("missing.nut"),
                outside.path().join("elsewhere.nut"),
                outside.path().to_owned(),
                root.join("a/x.nut"),
            ],
            "nut",
        )
        .expect_err("discovery fails");

        let errors: Vec<_> = errors.iter().collect();
        assert_eq!(errors.len(), 4, "errors: {errors:?}");
        assert!(matches!(errors[0], DiscoveryError::WrongExtension { extension, .. } if extension == "nut"));
        assert!(matches!(errors[1], DiscoveryError::DoesNotExist { path } if path == &root.join("missing.nut")));
        assert!(matches!(errors[2], DiscoveryError::FileOutsideRoot { .. }));
        assert!(matches!(errors[3], DiscoveryError::DirectoryOutsideRoot { .. }));
    }

    #[test]
    fn discover_invalid_root() {
        let tree = make_tree(&[]);
        let errors = TestList::discover(&tree.path().join("nope"), [tree.path()], "nut")
            .expect_err("root must exist");
        assert!(matches!(
            errors.iter().next(),
            Some(DiscoveryError::RootInvalid { .. })
        ));
    }

    #[test]
    fn from_groups_drops_duplicates() {
        let list = TestList::from_groups(
            "/srv/tests",
            "nut",
            [("g", vec!["a", "b", "a"]), ("", vec!["c"])],
        );
        assert_eq!(list.test_count(), 3);
        assert_eq!(groups(&list), vec![("g", vec!["a", "b"]), ("", vec!["c"])]);
    }

    #[test]
    fn write_human_and_summary() {
        let list = TestList::from_groups(
            "/srv/tests",
            "nut",
            [("login", vec!["basic", "flaky"]), ("", vec!["smoke"])],
        );
        let filter = TestFilter::new(
            FilterList::parse("login/flaky
"),
            FilterList::parse("login/basic
"),
        );

        assert_eq!(
            list.to_human_string(&filter),
            indoc! {"
                login:
                    basic (required)
                    flaky (skipped)
                <empty>:
                    smoke
            "}
        );

        let summary = list.to_summary(&filter);
        assert_eq!(summary.test_count, 3);
        assert_eq!(summary.groups.len(), 2);
        let flaky = &summary.groups[0].tests["flaky"];
        assert!(flaky.skipped);
        assert!(!flaky.required);
        assert_eq!(flaky.script_path, "/srv/tests/login/flaky.nut");
        assert_eq!(summary.groups[1].group, "");

        let mut json = Vec::new();
        list.write(
            OutputFormat::Serializable(crate::list::SerializableFormat::Json),
            &filter,
            &mut json,
            false,
        )
        .expect("JSON written");
        let parsed = TestListSummary::parse_json(String::from_utf8(json).unwrap()).unwrap();
        assert_eq!(parsed, summary);
    }
}
