use tracing::debug;

use lockex_configuration::{DependencyGroupsWithDefaults, ExportFormat, ExtrasSpecification};
use lockex_lock::{Lock, ProjectManifest};

use crate::export::{PylockTomlExport, RequirementsTxtExport, TxtFlavor};
use crate::{ExportError, ExportOptions, LockedPackageIndex, Resolution, Selector, walk};

/// Exports the packages of a lock file that the selected groups and extras of a project need.
#[derive(Debug)]
pub struct Exporter<'lock> {
    lock: &'lock Lock,
    manifest: &'lock ProjectManifest,
    groups: DependencyGroupsWithDefaults,
    extras: ExtrasSpecification,
}

impl<'lock> Exporter<'lock> {
    pub fn new(
        lock: &'lock Lock,
        manifest: &'lock ProjectManifest,
        groups: DependencyGroupsWithDefaults,
        extras: ExtrasSpecification,
    ) -> Self {
        Self {
            lock,
            manifest,
            groups,
            extras,
        }
    }

    fn selector(&self) -> Selector<'_> {
        Selector::new(self.manifest, &self.groups, &self.extras)
    }

    /// Walk the lock file from the project's selected dependencies.
    pub fn resolve(&self) -> Result<Resolution<'lock>, ExportError> {
        let selector = self.selector();
        let extras = selector.active_extras()?;
        let roots = selector.roots()?;
        debug!("Exporting from {} root requirement(s)", roots.len());

        let index = LockedPackageIndex::new(self.lock, &self.groups, &extras);
        let resolution = walk(&index, roots)?;
        debug!("Resolved {} package(s) from the lock file", resolution.len());
        Ok(resolution)
    }

    /// Render the export in the given format.
    pub fn export(
        &self,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<String, ExportError> {
        if format == ExportFormat::PylockToml && !self.lock.is_locked_groups_and_markers() {
            return Err(ExportError::PylockRequiresGroupsAndMarkers);
        }

        let resolution = self.resolve()?;
        let resolution = if format.merges_extras() {
            resolution.merge_extras()
        } else {
            resolution
        };

        match format {
            ExportFormat::RequirementsTxt => RequirementsTxtExport::new(
                &resolution,
                self.manifest.sources(),
                options,
                TxtFlavor::Requirements,
            )
            .render(),
            ExportFormat::ConstraintsTxt => RequirementsTxtExport::new(
                &resolution,
                self.manifest.sources(),
                options,
                TxtFlavor::Constraints,
            )
            .render(),
            ExportFormat::PylockToml => {
                let selector = self.selector();
                let groups = selector.active_groups()?;
                let extras = selector.active_extras()?;
                PylockTomlExport::new(
                    &resolution,
                    self.manifest.python_constraint(),
                    &groups,
                    &extras,
                    options,
                )
                .render()
            }
        }
    }
}
