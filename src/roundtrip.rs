//! Round-trip migration of a legacy SSDT project to the NetCore build runtime.
//!
//! The migration is a linear, three-step procedure, with the document
//! persisted after every step:
//!
//! 1. **Backup** - copy the project file to a `_backup` sibling. The
//!    original is never rewritten without a successful backup.
//! 2. **Import rewrite** - legacy conditional imports are replaced in place
//!    with round-trip conditions (targets unchanged), then one NetCore
//!    import is appended. Imports outside the legacy pattern are left
//!    untouched.
//! 3. **Package reference** - a NetCore-conditioned reference-assemblies
//!    package is injected, with its assets kept private.
//!
//! There is no rollback of steps 2-3; the backup from step 1 is the only
//! safety net. The rewrite in step 2 is harmless to re-run (already-migrated
//! imports no longer match the legacy conditions), but a second full run
//! appends a duplicate package reference. Callers must treat the migration
//! as a one-shot upgrade.

use std::fs;
use std::path::PathBuf;

use crate::error::ProjectError;
use crate::project::{
    CONDITION, IMPORT, INCLUDE, PACKAGE_REFERENCE, PROJECT_ATTR, Project,
};

/// Condition on the legacy import used when the SSDT extensions are installed.
pub const SQLDB_PRESENT_CONDITION: &str = "'$(SQLDBExtensionsRefPath)' != ''";
/// Condition on the legacy fallback import.
pub const SQLDB_NOT_PRESENT_CONDITION: &str = "'$(SQLDBExtensionsRefPath)' == ''";
/// Replacement for [`SQLDB_PRESENT_CONDITION`] after migration.
pub const ROUND_TRIP_SQLDB_PRESENT_CONDITION: &str =
    "'$(NetCoreBuild)' != 'true' AND '$(SQLDBExtensionsRefPath)' != ''";
/// Replacement for [`SQLDB_NOT_PRESENT_CONDITION`] after migration.
pub const ROUND_TRIP_SQLDB_NOT_PRESENT_CONDITION: &str =
    "'$(NetCoreBuild)' != 'true' AND '$(SQLDBExtensionsRefPath)' == ''";
/// Condition gating everything NetCore-specific.
pub const NET_CORE_CONDITION: &str = "'$(NetCoreBuild)' == 'true'";

/// Target of the legacy SSDT import.
pub const SQLDB_TARGETS_PATH: &str =
    r"$(SQLDBExtensionsRefPath)\Microsoft.Data.Tools.Schema.SqlTasks.targets";
/// Target of the legacy fallback import.
pub const MSBUILD_TARGETS_PATH: &str = r"$(MSBuildExtensionsPath)\Microsoft\VisualStudio\v$(VisualStudioVersion)\SSDT\Microsoft.Data.Tools.Schema.SqlTasks.targets";
/// Target of the NetCore import appended by the migration.
pub const NET_CORE_TARGETS_PATH: &str =
    r"$(NETCoreTargetsPath)\Microsoft.Data.Tools.Schema.SqlTasks.targets";

/// Compatibility assembly package injected by the migration.
pub const REFERENCE_ASSEMBLIES_PACKAGE: &str = "Microsoft.NETFramework.ReferenceAssemblies";
pub const REFERENCE_ASSEMBLIES_VERSION: &str = "1.0.0";
pub const PRIVATE_ASSETS_ALL: &str = "All";

/// Suffix appended to the project file path for the backup copy.
pub const BACKUP_SUFFIX: &str = "_backup";

const VERSION_ATTR: &str = "Version";
const PRIVATE_ASSETS_ATTR: &str = "PrivateAssets";

impl Project {
    /// Upgrade this project's import graph and package references to support
    /// the NetCore build runtime alongside the legacy one. One-way; see the
    /// module documentation for re-run behavior.
    pub fn update_for_round_trip(&mut self) -> Result<(), ProjectError> {
        self.backup_project_file()?;
        self.update_imports_for_round_trip()?;
        self.add_net_core_package_reference()?;
        tracing::info!(project = %self.project_file_name(), "round-trip migration complete");
        Ok(())
    }

    /// Step 1: copy the project file to its backup sibling.
    fn backup_project_file(&self) -> Result<(), ProjectError> {
        let mut backup = self.project_file_path.clone().into_os_string();
        backup.push(BACKUP_SUFFIX);
        let backup = PathBuf::from(backup);
        fs::copy(&self.project_file_path, &backup)?;
        tracing::info!(backup = %backup.display(), "backed up project file");
        Ok(())
    }

    /// Step 2: rewrite legacy imports in place and append the NetCore import.
    fn update_imports_for_round_trip(&mut self) -> Result<(), ProjectError> {
        {
            let doc = self.doc_mut()?;
            let root = doc.root();
            let mut rewritten = 0usize;
            for import in doc.find_children(root, IMPORT) {
                let condition = doc.attribute(import, CONDITION).map(str::to_string);
                let target = doc.attribute(import, PROJECT_ATTR).map(str::to_string);
                let (Some(condition), Some(target)) = (condition, target) else {
                    continue;
                };
                let new_condition = if condition == SQLDB_PRESENT_CONDITION
                    && target == SQLDB_TARGETS_PATH
                {
                    ROUND_TRIP_SQLDB_PRESENT_CONDITION
                } else if condition == SQLDB_NOT_PRESENT_CONDITION
                    && target == MSBUILD_TARGETS_PATH
                {
                    ROUND_TRIP_SQLDB_NOT_PRESENT_CONDITION
                } else {
                    continue;
                };
                let replacement = doc.create_element(IMPORT);
                doc.set_attribute(replacement, CONDITION, new_condition);
                doc.set_attribute(replacement, PROJECT_ATTR, &target);
                doc.replace_child(root, import, replacement);
                rewritten += 1;
            }

            let net_core = doc.create_element(IMPORT);
            doc.set_attribute(net_core, CONDITION, NET_CORE_CONDITION);
            doc.set_attribute(net_core, PROJECT_ATTR, NET_CORE_TARGETS_PATH);
            doc.append_child(root, net_core);
            tracing::info!(rewritten, "rewrote legacy imports for round-trip");
        }
        self.imported_targets.push(NET_CORE_TARGETS_PATH.to_string());
        self.save()
    }

    /// Step 3: inject the NetCore-conditioned package reference.
    fn add_net_core_package_reference(&mut self) -> Result<(), ProjectError> {
        let group = self.find_or_create_item_group(PACKAGE_REFERENCE)?;
        let doc = self.doc_mut()?;
        let package = doc.create_element(PACKAGE_REFERENCE);
        doc.set_attribute(package, CONDITION, NET_CORE_CONDITION);
        doc.set_attribute(package, INCLUDE, REFERENCE_ASSEMBLIES_PACKAGE);
        doc.set_attribute(package, VERSION_ATTR, REFERENCE_ASSEMBLIES_VERSION);
        doc.set_attribute(package, PRIVATE_ASSETS_ATTR, PRIVATE_ASSETS_ALL);
        doc.append_child(group, package);
        self.save()?;
        tracing::info!(package = REFERENCE_ASSEMBLIES_PACKAGE, "added NetCore package reference");
        Ok(())
    }
}
