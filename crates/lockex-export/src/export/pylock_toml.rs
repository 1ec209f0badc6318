use std::collections::BTreeSet;

use itertools::Itertools;
use toml_edit::{Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table, Value, value};

use lockex_lock::{HashDigest, PackageFile, Source, VersionConstraint};
use lockex_marker::Condition;
use lockex_normalize::{ExtraName, GroupName};

use crate::export::{ExportOptions, absolute_path, relative_to};
use crate::{ExportError, Resolution, ResolvedDependency};

/// The index packages without a source were locked from.
const PYPI_SIMPLE: &str = "https://pypi.org/simple";

/// An export of a [`Resolution`] that renders as a PEP 751 `pylock.toml`.
#[derive(Debug)]
pub(crate) struct PylockTomlExport<'a, 'lock> {
    resolution: &'a Resolution<'lock>,
    /// The Python versions the project supports.
    python: &'a VersionConstraint,
    groups: &'a [GroupName],
    extras: &'a BTreeSet<ExtraName>,
    options: &'a ExportOptions,
}

impl<'a, 'lock> PylockTomlExport<'a, 'lock> {
    pub(crate) fn new(
        resolution: &'a Resolution<'lock>,
        python: &'a VersionConstraint,
        groups: &'a [GroupName],
        extras: &'a BTreeSet<ExtraName>,
        options: &'a ExportOptions,
    ) -> Self {
        Self {
            resolution,
            python,
            groups,
            extras,
            options,
        }
    }

    pub(crate) fn render(&self) -> Result<String, ExportError> {
        let mut doc = DocumentMut::new();
        doc.insert("lock-version", value("1.0"));
        if !self.python.is_any() {
            let environment = Condition::python(self.python.ranges().clone());
            doc.insert(
                "environments",
                value(Array::from_iter([environment.to_string()])),
            );
            doc.insert("requires-python", value(self.python.to_specifiers()));
        }
        doc.insert("created-by", value("lockex"));

        let mut packages = ArrayOfTables::new();
        for dependency in self.resolution.iter() {
            packages.push(self.package(dependency));
        }
        if packages.is_empty() {
            doc.insert("packages", value(Array::new()));
        } else {
            doc.insert("packages", Item::ArrayOfTables(packages));
        }

        let mut lockex = Table::new();
        lockex.insert(
            "groups",
            value(Array::from_iter(self.groups.iter().map(GroupName::as_str))),
        );
        lockex.insert(
            "extras",
            value(Array::from_iter(self.extras.iter().map(ExtraName::as_str))),
        );
        let mut tool = Table::new();
        tool.set_implicit(true);
        tool.insert("lockex", Item::Table(lockex));
        doc.insert("tool", Item::Table(tool));

        // Constraints with several disjoint ranges have no PEP 440 spelling; the markers already
        // carry that information.
        let mut rendered = doc
            .to_string()
            .lines()
            .map(|line| {
                if line.starts_with("requires-python = ") && line.contains("||") {
                    format!("# {line}")
                } else {
                    line.to_string()
                }
            })
            .join("\n");
        rendered.push('\n');
        Ok(rendered)
    }

    fn package(&self, dependency: &ResolvedDependency) -> Table {
        let package = dependency.package;

        let mut table = Table::new();
        table.insert("name", value(package.name().as_str()));
        if !matches!(package.source(), Source::Directory { .. }) {
            table.insert("version", value(package.version().to_string()));
        }
        if let Some(marker) = dependency.condition.try_to_string() {
            table.insert("marker", value(marker));
        }
        if !package.python_versions().is_any() {
            table.insert(
                "requires-python",
                value(package.python_versions().to_specifiers()),
            );
        }

        match package.source() {
            Source::Git(git) => {
                let mut vcs = Table::new();
                vcs.insert("type", value("git"));
                vcs.insert("url", value(git.url.as_str()));
                if let Some(reference) = &git.reference {
                    vcs.insert("requested-revision", value(reference.as_str()));
                }
                if let Some(commit) = &git.resolved_reference {
                    vcs.insert("commit-id", value(commit.as_str()));
                }
                if let Some(subdirectory) = &git.subdirectory {
                    vcs.insert("subdirectory", value(subdirectory.as_str()));
                }
                table.insert("vcs", Item::Table(vcs));
            }
            Source::Directory { path } => {
                let mut directory = Table::new();
                let path = absolute_path(&self.options.project_root, path);
                directory.insert(
                    "path",
                    value(relative_to(&path, &self.options.output_dir)),
                );
                if package.develop() {
                    directory.insert("editable", value(true));
                }
                table.insert("directory", Item::Table(directory));
            }
            Source::File { path, subdirectory } => {
                let mut archive = InlineTable::new();
                let path = absolute_path(&self.options.project_root, path);
                archive.insert(
                    "path",
                    Value::from(relative_to(&path, &self.options.output_dir)),
                );
                if let Some(file) = package.files().first() {
                    archive.insert("hashes", Value::InlineTable(hashes(&file.hash)));
                }
                if let Some(subdirectory) = subdirectory {
                    archive.insert("subdirectory", Value::from(subdirectory.as_str()));
                }
                table.insert("archive", value(archive));
            }
            Source::Url { url, subdirectory } => {
                let mut archive = InlineTable::new();
                archive.insert("url", Value::from(url.as_str()));
                if let Some(file) = package.files().first() {
                    archive.insert("hashes", Value::InlineTable(hashes(&file.hash)));
                }
                if let Some(subdirectory) = subdirectory {
                    archive.insert("subdirectory", Value::from(subdirectory.as_str()));
                }
                table.insert("archive", value(archive));
            }
            Source::Registry | Source::Legacy { .. } => {
                let index = package
                    .source()
                    .index_url()
                    .map_or(PYPI_SIMPLE, url::Url::as_str);
                table.insert("index", value(index));

                let (wheels, sdists): (Vec<_>, Vec<_>) =
                    package.files().iter().partition(|file| file.is_wheel());
                if let Some(sdist) = sdists.first() {
                    table.insert("sdist", value(distribution(sdist)));
                }
                if !wheels.is_empty() {
                    table.insert(
                        "wheels",
                        value(each_element_on_its_line_array(
                            wheels.into_iter().map(distribution),
                        )),
                    );
                }
            }
        }

        table
    }
}

/// A `{ name = ..., url = ..., hashes = ... }` table for a distribution file.
///
/// The URL is only known if the lock file recorded it.
fn distribution(file: &PackageFile) -> InlineTable {
    let mut table = InlineTable::new();
    table.insert("name", Value::from(file.file.as_str()));
    if let Some(url) = &file.url {
        table.insert("url", Value::from(url.as_str()));
    }
    table.insert("hashes", Value::InlineTable(hashes(&file.hash)));
    table
}

fn hashes(hash: &HashDigest) -> InlineTable {
    let mut table = InlineTable::new();
    table.insert(hash.algorithm.as_str(), Value::from(hash.digest.as_str()));
    table
}

fn each_element_on_its_line_array(elements: impl Iterator<Item = impl Into<Value>>) -> Array {
    let mut array = elements
        .map(|item| {
            let mut value = item.into();
            value.decor_mut().set_prefix("\n    ");
            value
        })
        .collect::<Array>();
    array.set_trailing_comma(true);
    array.set_trailing("\n");
    array
}
