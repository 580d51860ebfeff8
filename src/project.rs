//! The project model: an in-memory representation of one `.sqlproj` file.
//!
//! A [`Project`] owns the parsed backing document exclusively and keeps its
//! derived collections (file entries, imported targets, SQLCMD variables)
//! consistent with the tree: every mutating operation updates both as a pair
//! and serializes the document to disk before returning. On-disk writes are
//! whole-file overwrites, so each completed operation leaves the file
//! consistent with the in-memory model at that point.
//!
//! ```ignore
//! use sqlproj::Project;
//!
//! let mut project = Project::open("db/WideWorld.sqlproj")?;
//! project.add_folder_item("Tables")?;
//! project.add_script_item("Tables/Customers.sql", Some("CREATE TABLE ..."))?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::ProjectError;
use crate::platform::{self, DSP_PREFIX, DSP_SUFFIX, TargetPlatform};
use crate::xml::{Document, NodeId};

// Element and attribute vocabulary of the descriptor dialect.
pub(crate) const ITEM_GROUP: &str = "ItemGroup";
pub(crate) const BUILD: &str = "Build";
pub(crate) const FOLDER: &str = "Folder";
pub(crate) const IMPORT: &str = "Import";
pub(crate) const INCLUDE: &str = "Include";
pub(crate) const CONDITION: &str = "Condition";
pub(crate) const PROJECT_ATTR: &str = "Project";
pub(crate) const SQLCMD_VARIABLE: &str = "SqlCmdVariable";
pub(crate) const DEFAULT_VALUE: &str = "DefaultValue";
pub(crate) const DSP: &str = "DSP";
pub(crate) const ARTIFACT_REFERENCE: &str = "ArtifactReference";
pub(crate) const PACKAGE_REFERENCE: &str = "PackageReference";
pub(crate) const SUPPRESS_MISSING_DEPENDENCIES: &str = "SuppressMissingDependenciesErrors";
pub(crate) const DATABASE_LITERAL: &str = "DatabaseVariableLiteralValue";

/// File extension of SQL script items (without the dot).
pub(crate) const SCRIPT_EXTENSION: &str = "sql";
/// Name of the system database referenced by [`Project::add_master_database_reference`].
pub(crate) const MASTER_DATABASE: &str = "master";

/// Where a referenced database lives relative to the referencing project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceLocation {
    SameDatabase,
    DifferentDatabaseSameServer,
}

/// One item tracked by the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectEntry {
    File {
        /// Absolute location on disk.
        path: PathBuf,
        /// Path relative to the project folder, forward-slash separated.
        relative_path: String,
    },
    Folder {
        path: PathBuf,
        relative_path: String,
    },
    DatabaseReference {
        /// Path expression of the referenced artifact (may contain build variables).
        include: String,
        location: ReferenceLocation,
        /// Literal database name; used when the reference crosses databases.
        database_name: Option<String>,
    },
}

impl ProjectEntry {
    /// The project-relative path, or `""` for database references.
    pub fn relative_path(&self) -> &str {
        match self {
            Self::File { relative_path, .. } | Self::Folder { relative_path, .. } => relative_path,
            Self::DatabaseReference { .. } => "",
        }
    }
}

/// The aggregate root over one project descriptor file.
pub struct Project {
    pub(crate) project_file_path: PathBuf,
    pub(crate) project_file_name: String,
    pub(crate) project_folder_path: PathBuf,
    pub(crate) files: Vec<ProjectEntry>,
    pub(crate) imported_targets: Vec<String>,
    pub(crate) sqlcmd_variables: IndexMap<String, String>,
    pub(crate) database_references: Vec<ProjectEntry>,
    /// Exclusively owned; populated by `load`. No other component holds a
    /// live reference to this tree.
    pub(crate) document: Option<Document>,
}

impl Project {
    // ── Construction ─────────────────────────────────────────────────

    /// Create a project handle for `path`. Performs no I/O; call [`load`]
    /// (or use [`open`]) before any query or mutation.
    ///
    /// [`load`]: Project::load
    /// [`open`]: Project::open
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let project_file_path: PathBuf = path.into();
        let project_file_name = project_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let project_folder_path = project_file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            project_file_path,
            project_file_name,
            project_folder_path,
            files: Vec::new(),
            imported_targets: Vec::new(),
            sqlcmd_variables: IndexMap::new(),
            database_references: Vec::new(),
            document: None,
        }
    }

    /// Create and load in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let mut project = Self::new(path);
        project.load()?;
        Ok(project)
    }

    /// Read and parse the project file, populating the derived collections.
    ///
    /// Appends into the collections rather than replacing them, so call this
    /// exactly once per instance.
    pub fn load(&mut self) -> Result<(), ProjectError> {
        let bytes = fs::read(&self.project_file_path)?;
        let doc = Document::parse(&bytes)?;
        let root = doc.root();

        for group in doc.find_all(root, ITEM_GROUP) {
            for item in doc.find_children(group, BUILD) {
                if let Some(include) = doc.attribute(item, INCLUDE) {
                    let relative = normalize_relative(include);
                    self.files.push(ProjectEntry::File {
                        path: self.project_folder_path.join(&relative),
                        relative_path: relative,
                    });
                }
            }
            for item in doc.find_children(group, FOLDER) {
                if let Some(include) = doc.attribute(item, INCLUDE) {
                    let relative = normalize_relative(include);
                    self.files.push(ProjectEntry::Folder {
                        path: self.project_folder_path.join(&relative),
                        relative_path: relative,
                    });
                }
            }
        }

        for import in doc.find_children(root, IMPORT) {
            if let Some(target) = doc.attribute(import, PROJECT_ATTR) {
                self.imported_targets.push(target.to_string());
            }
        }

        for var in doc.find_all(root, SQLCMD_VARIABLE) {
            let Some(name) = doc.attribute(var, INCLUDE) else {
                continue;
            };
            let name = name.to_string();
            let default_value = match doc.find_children(var, DEFAULT_VALUE).first() {
                // A present-but-empty DefaultValue means an empty default.
                Some(&dv) => doc.text_of(dv).unwrap_or_default(),
                None => return Err(ProjectError::MissingDefaultValue { variable: name }),
            };
            self.sqlcmd_variables.insert(name, default_value);
        }

        self.document = Some(doc);
        tracing::debug!(
            project = %self.project_file_name,
            files = self.files.len(),
            imports = self.imported_targets.len(),
            variables = self.sqlcmd_variables.len(),
            "loaded project file"
        );
        Ok(())
    }

    // ── Access ───────────────────────────────────────────────────────

    pub fn project_file_path(&self) -> &Path {
        &self.project_file_path
    }

    /// The file name with its extension stripped.
    pub fn project_file_name(&self) -> &str {
        &self.project_file_name
    }

    /// The directory containing the project file.
    pub fn project_folder_path(&self) -> &Path {
        &self.project_folder_path
    }

    /// File and folder entries, in the order they were added.
    pub fn files(&self) -> &[ProjectEntry] {
        &self.files
    }

    /// Targets of all top-level import elements.
    pub fn imported_targets(&self) -> &[String] {
        &self.imported_targets
    }

    /// SQLCMD variables by name, insertion-ordered.
    pub fn sqlcmd_variables(&self) -> &IndexMap<String, String> {
        &self.sqlcmd_variables
    }

    /// Database reference entries added through this instance.
    pub fn database_references(&self) -> &[ProjectEntry] {
        &self.database_references
    }

    /// Resolve the project's target platform from its `DSP` element.
    pub fn target_platform(&self) -> Result<TargetPlatform, ProjectError> {
        let doc = self.doc()?;
        let dsps = doc.find_all(doc.root(), DSP);
        match dsps.as_slice() {
            [only] => {
                let text = doc
                    .text_of(*only)
                    .ok_or_else(|| ProjectError::schema_provider("DSP element has no value"))?;
                TargetPlatform::from_dsp(&text)
            }
            [] => Err(ProjectError::schema_provider("DSP element not found")),
            _ => Err(ProjectError::schema_provider("multiple DSP elements")),
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Add a folder to the project, creating the directory (and missing
    /// ancestors) on disk if absent.
    pub fn add_folder_item(&mut self, relative_path: &str) -> Result<ProjectEntry, ProjectError> {
        let relative = normalize_relative(relative_path);
        let absolute = self.project_folder_path.join(&relative);
        fs::create_dir_all(&absolute)?;

        let entry = ProjectEntry::Folder {
            path: absolute,
            relative_path: relative.clone(),
        };
        self.files.push(entry.clone());
        self.append_item_element(FOLDER, &relative)?;
        self.save()?;
        tracing::debug!(folder = %relative, "added folder item");
        Ok(entry)
    }

    /// Add a SQL script to the project. With `contents`, the file is written
    /// to disk first (parent directories created, existing file overwritten);
    /// without, the file must already exist.
    pub fn add_script_item(
        &mut self,
        relative_path: &str,
        contents: Option<&str>,
    ) -> Result<ProjectEntry, ProjectError> {
        let relative = normalize_relative(relative_path);
        let absolute = self.project_folder_path.join(&relative);

        if let Some(contents) = contents {
            if let Some(parent) = absolute.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&absolute, contents)?;
        }
        if !absolute.exists() {
            return Err(ProjectError::FileNotFound(absolute));
        }

        let entry = ProjectEntry::File {
            path: absolute,
            relative_path: relative.clone(),
        };
        self.files.push(entry.clone());
        self.append_item_element(BUILD, &relative)?;
        self.save()?;
        tracing::debug!(script = %relative, "added script item");
        Ok(entry)
    }

    /// Bulk-add paths: `.sql` files become script items, directories become
    /// folder items. Paths outside the project folder, the folder itself, and
    /// unsupported path kinds are silently skipped.
    pub fn add_to_project(&mut self, paths: &[PathBuf]) -> Result<(), ProjectError> {
        for path in paths {
            let Some(relative) = self.relative_to_project(path) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }
            if path.is_file() {
                if path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION) {
                    self.add_script_item(&relative, None)?;
                }
            } else if path.is_dir() {
                self.add_folder_item(&relative)?;
            }
        }
        Ok(())
    }

    /// Add a reference to another database artifact. When the reference
    /// crosses databases on the same server, `database_name` is written as a
    /// literal database name on the reference element.
    pub fn add_database_reference(
        &mut self,
        location: ReferenceLocation,
        include: &str,
        database_name: Option<&str>,
    ) -> Result<ProjectEntry, ProjectError> {
        let entry = ProjectEntry::DatabaseReference {
            include: include.to_string(),
            location,
            database_name: database_name.map(str::to_string),
        };
        self.database_references.push(entry.clone());

        let group = self.find_or_create_item_group(ARTIFACT_REFERENCE)?;
        let doc = self.doc_mut()?;
        let reference = doc.create_element(ARTIFACT_REFERENCE);
        doc.set_attribute(reference, INCLUDE, include);

        let suppress = doc.create_element(SUPPRESS_MISSING_DEPENDENCIES);
        let suppress_value = doc.create_text("False");
        doc.append_child(suppress, suppress_value);
        doc.append_child(reference, suppress);

        if location == ReferenceLocation::DifferentDatabaseSameServer {
            if let Some(name) = database_name {
                let literal = doc.create_element(DATABASE_LITERAL);
                let literal_value = doc.create_text(name);
                doc.append_child(literal, literal_value);
                doc.append_child(reference, literal);
            }
        }
        doc.append_child(group, reference);

        self.save()?;
        tracing::debug!(reference = %include, "added database reference");
        Ok(entry)
    }

    /// Add a reference to the `master` system database for the project's
    /// current target platform.
    pub fn add_master_database_reference(&mut self) -> Result<ProjectEntry, ProjectError> {
        let platform = self.target_platform()?;
        let include = platform::system_dacpac_path(platform, MASTER_DATABASE);
        self.add_database_reference(
            ReferenceLocation::DifferentDatabaseSameServer,
            &include,
            Some(MASTER_DATABASE),
        )
    }

    /// Rewrite the `DSP` element to the given level. The level is not
    /// validated against the known platform set; this is a direct write
    /// intended for test and setup use.
    pub fn change_compatibility_level(&mut self, level: &str) -> Result<(), ProjectError> {
        let value = format!("{DSP_PREFIX}{level}{DSP_SUFFIX}");
        {
            let doc = self.doc_mut()?;
            let root = doc.root();
            let dsp = doc
                .find_all(root, DSP)
                .into_iter()
                .next()
                .ok_or_else(|| ProjectError::schema_provider("DSP element not found"))?;
            doc.set_text(dsp, &value);
        }
        self.save()?;
        Ok(())
    }

    /// Serialize the backing document and overwrite the project file.
    pub fn save(&self) -> Result<(), ProjectError> {
        let doc = self.document.as_ref().ok_or(ProjectError::NotLoaded)?;
        let bytes = doc.serialize()?;
        fs::write(&self.project_file_path, bytes)?;
        tracing::debug!(path = %self.project_file_path.display(), "wrote project file");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    pub(crate) fn doc(&self) -> Result<&Document, ProjectError> {
        self.document.as_ref().ok_or(ProjectError::NotLoaded)
    }

    pub(crate) fn doc_mut(&mut self) -> Result<&mut Document, ProjectError> {
        self.document.as_mut().ok_or(ProjectError::NotLoaded)
    }

    /// First item group in document order that already contains a child of
    /// `kind`; otherwise a fresh group appended at the end of the document.
    pub(crate) fn find_or_create_item_group(
        &mut self,
        kind: &str,
    ) -> Result<NodeId, ProjectError> {
        let doc = self.doc_mut()?;
        let root = doc.root();
        for group in doc.find_all(root, ITEM_GROUP) {
            if !doc.find_children(group, kind).is_empty() {
                return Ok(group);
            }
        }
        let group = doc.create_element(ITEM_GROUP);
        doc.append_child(root, group);
        Ok(group)
    }

    fn append_item_element(&mut self, kind: &str, include: &str) -> Result<(), ProjectError> {
        let group = self.find_or_create_item_group(kind)?;
        let doc = self.doc_mut()?;
        let item = doc.create_element(kind);
        doc.set_attribute(item, INCLUDE, include);
        doc.append_child(group, item);
        Ok(())
    }

    /// Path relative to the project folder, forward-slash joined.
    /// `None` for paths outside the project folder.
    fn relative_to_project(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.project_folder_path).ok()?;
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(joined.trim_matches('/').to_string())
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.project_file_name)
            .field("files", &self.files.len())
            .field("imported_targets", &self.imported_targets.len())
            .field("sqlcmd_variables", &self.sqlcmd_variables.len())
            .field("loaded", &self.document.is_some())
            .finish()
    }
}

/// Forward slashes only, no leading or trailing separators.
fn normalize_relative(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}
