//! Tests for loading and incrementally mutating a project descriptor.

use std::fs;
use std::path::PathBuf;

use sqlproj::xml::Document;
use sqlproj::{Project, ProjectEntry, ProjectError, ReferenceLocation, TargetPlatform};
use tempfile::TempDir;

const PROJECT_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build" ToolsVersion="4.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <Name>WideWorld</Name>
    <DSP>Microsoft.Data.Tools.Schema.Sql.Sql130DatabaseSchemaProvider</DSP>
  </PropertyGroup>
  <ItemGroup>
    <Folder Include="Tables" />
  </ItemGroup>
  <ItemGroup>
    <Build Include="Tables\Customers.sql" />
  </ItemGroup>
  <ItemGroup>
    <SqlCmdVariable Include="ProdDatabaseName">
      <DefaultValue>WideWorldProd</DefaultValue>
    </SqlCmdVariable>
  </ItemGroup>
  <Import Condition="'$(SQLDBExtensionsRefPath)' != ''" Project="$(SQLDBExtensionsRefPath)\Microsoft.Data.Tools.Schema.SqlTasks.targets" />
  <Import Condition="'$(SQLDBExtensionsRefPath)' == ''" Project="$(MSBuildExtensionsPath)\Microsoft\VisualStudio\v$(VisualStudioVersion)\SSDT\Microsoft.Data.Tools.Schema.SqlTasks.targets" />
</Project>
"#;

fn write_project(dir: &TempDir, xml: &str) -> PathBuf {
    let path = dir.path().join("WideWorld.sqlproj");
    fs::write(&path, xml).unwrap();
    path
}

fn parse_on_disk(path: &PathBuf) -> Document {
    Document::parse(&fs::read(path).unwrap()).unwrap()
}

fn relative_paths(project: &Project) -> Vec<&str> {
    project.files().iter().map(|e| e.relative_path()).collect()
}

#[test]
fn load_populates_collections() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let project = Project::open(&path).unwrap();

    assert_eq!(project.files().len(), 2);
    assert!(matches!(
        &project.files()[0],
        ProjectEntry::Folder { relative_path, .. } if relative_path == "Tables"
    ));
    assert!(matches!(
        &project.files()[1],
        ProjectEntry::File { relative_path, .. } if relative_path == "Tables/Customers.sql"
    ));

    assert_eq!(project.imported_targets().len(), 2);
    assert!(project.imported_targets()[0].ends_with("Microsoft.Data.Tools.Schema.SqlTasks.targets"));

    assert_eq!(project.sqlcmd_variables().len(), 1);
    assert_eq!(
        project.sqlcmd_variables().get("ProdDatabaseName").map(String::as_str),
        Some("WideWorldProd")
    );

    assert_eq!(project.target_platform().unwrap(), TargetPlatform::Sql130);
    assert_eq!(project.project_file_name(), "WideWorld");
}

#[test]
fn unmutated_save_round_trips_derived_model() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let first = Project::open(&path).unwrap();
    first.save().unwrap();

    let second = Project::open(&path).unwrap();
    assert_eq!(first.files(), second.files());
    assert_eq!(first.imported_targets(), second.imported_targets());
    assert_eq!(first.sqlcmd_variables(), second.sqlcmd_variables());
}

#[test]
fn add_folder_and_script_sequence() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let mut project = Project::open(&path).unwrap();

    let folder = project.add_folder_item("Views").unwrap();
    assert_eq!(folder.relative_path(), "Views");
    assert!(dir.path().join("Views").is_dir());

    let script = project
        .add_script_item("Views/Everything.sql", Some("CREATE VIEW [dbo].[Everything] AS SELECT 1;"))
        .unwrap();
    assert_eq!(script.relative_path(), "Views/Everything.sql");
    assert!(dir.path().join("Views/Everything.sql").is_file());

    assert_eq!(project.files().len(), 4);
    assert_eq!(
        relative_paths(&project),
        vec!["Tables", "Tables/Customers.sql", "Views", "Views/Everything.sql"]
    );

    // Additions cluster into the first group already holding that kind.
    let doc = parse_on_disk(&path);
    let groups = doc.find_all(doc.root(), "ItemGroup");
    assert_eq!(doc.find_children(groups[0], "Folder").len(), 2);
    assert_eq!(doc.find_children(groups[1], "Build").len(), 2);
}

#[test]
fn script_item_without_contents_requires_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let mut project = Project::open(&path).unwrap();

    let result = project.add_script_item("Missing.sql", None);
    assert!(matches!(result, Err(ProjectError::FileNotFound(_))));

    // Neither the collections nor the on-disk document changed.
    assert_eq!(project.files().len(), 2);
    let doc = parse_on_disk(&path);
    assert_eq!(doc.find_all(doc.root(), "Build").len(), 1);
}

#[test]
fn script_item_accepts_preexisting_file() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    fs::write(dir.path().join("Existing.sql"), "SELECT 1;").unwrap();

    let mut project = Project::open(&path).unwrap();
    let entry = project.add_script_item("Existing.sql", None).unwrap();
    assert_eq!(entry.relative_path(), "Existing.sql");
    assert_eq!(project.files().len(), 3);
}

#[test]
fn script_item_with_contents_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    fs::write(dir.path().join("Stale.sql"), "SELECT 0;").unwrap();

    let mut project = Project::open(&path).unwrap();
    project.add_script_item("Stale.sql", Some("SELECT 1;")).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("Stale.sql")).unwrap(), "SELECT 1;");
}

#[test]
fn bulk_add_filters_by_kind_and_root() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);

    fs::create_dir_all(dir.path().join("scripts")).unwrap();
    fs::write(dir.path().join("scripts/One.sql"), "SELECT 1;").unwrap();
    fs::create_dir_all(dir.path().join("StaticData")).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a script").unwrap();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("Two.sql"), "SELECT 2;").unwrap();

    let mut project = Project::open(&path).unwrap();
    project
        .add_to_project(&[
            dir.path().join("scripts/One.sql"),
            dir.path().join("StaticData"),
            dir.path().join("notes.txt"),
            outside.path().join("Two.sql"),
            dir.path().to_path_buf(),
        ])
        .unwrap();

    assert_eq!(project.files().len(), 4);
    let added = relative_paths(&project);
    assert!(added.contains(&"scripts/One.sql"));
    assert!(added.contains(&"StaticData"));
    assert!(!added.contains(&"notes.txt"));
}

#[test]
fn database_reference_literal_name_by_location() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let mut project = Project::open(&path).unwrap();

    project
        .add_database_reference(
            ReferenceLocation::DifferentDatabaseSameServer,
            "other.dacpac",
            Some("OtherDb"),
        )
        .unwrap();
    project
        .add_database_reference(ReferenceLocation::SameDatabase, "shared.dacpac", None)
        .unwrap();

    assert_eq!(project.database_references().len(), 2);

    let doc = parse_on_disk(&path);
    let references = doc.find_all(doc.root(), "ArtifactReference");
    assert_eq!(references.len(), 2);

    let different = references[0];
    assert_eq!(doc.attribute(different, "Include"), Some("other.dacpac"));
    let suppress = doc.find_children(different, "SuppressMissingDependenciesErrors")[0];
    assert_eq!(doc.text_of(suppress).as_deref(), Some("False"));
    let literal = doc.find_children(different, "DatabaseVariableLiteralValue")[0];
    assert_eq!(doc.text_of(literal).as_deref(), Some("OtherDb"));

    let same = references[1];
    assert!(doc.find_children(same, "DatabaseVariableLiteralValue").is_empty());
    assert_eq!(doc.find_children(same, "SuppressMissingDependenciesErrors").len(), 1);
}

#[test]
fn master_reference_uses_platform_dacpac() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let mut project = Project::open(&path).unwrap();

    let entry = project.add_master_database_reference().unwrap();
    let ProjectEntry::DatabaseReference {
        include,
        location,
        database_name,
    } = entry
    else {
        panic!("expected a database reference entry");
    };
    assert_eq!(include, r"$(SystemDacpacsLocation)\SystemDacpacs\130\master.dacpac");
    assert_eq!(location, ReferenceLocation::DifferentDatabaseSameServer);
    assert_eq!(database_name.as_deref(), Some("master"));

    let doc = parse_on_disk(&path);
    let reference = doc.find_all(doc.root(), "ArtifactReference")[0];
    let literal = doc.find_children(reference, "DatabaseVariableLiteralValue")[0];
    assert_eq!(doc.text_of(literal).as_deref(), Some("master"));
}

#[test]
fn master_reference_requires_exactly_one_dsp() {
    let dir = TempDir::new().unwrap();
    let without_dsp = PROJECT_XML.replace(
        "<DSP>Microsoft.Data.Tools.Schema.Sql.Sql130DatabaseSchemaProvider</DSP>",
        "",
    );
    let path = write_project(&dir, &without_dsp);
    let mut project = Project::open(&path).unwrap();
    assert!(matches!(
        project.add_master_database_reference(),
        Err(ProjectError::InvalidSchemaProvider(_))
    ));

    let duplicated = PROJECT_XML.replace(
        "<DSP>Microsoft.Data.Tools.Schema.Sql.Sql130DatabaseSchemaProvider</DSP>",
        "<DSP>Microsoft.Data.Tools.Schema.Sql.Sql130DatabaseSchemaProvider</DSP>\n    <DSP>Microsoft.Data.Tools.Schema.Sql.Sql140DatabaseSchemaProvider</DSP>",
    );
    let path = write_project(&dir, &duplicated);
    let mut project = Project::open(&path).unwrap();
    assert!(matches!(
        project.add_master_database_reference(),
        Err(ProjectError::InvalidSchemaProvider(_))
    ));
}

#[test]
fn change_compatibility_level_is_a_trusting_write() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, PROJECT_XML);
    let mut project = Project::open(&path).unwrap();

    project.change_compatibility_level("150").unwrap();
    assert_eq!(project.target_platform().unwrap(), TargetPlatform::Sql150);

    let reloaded = Project::open(&path).unwrap();
    assert_eq!(reloaded.target_platform().unwrap(), TargetPlatform::Sql150);

    // No validation against the known set: the write succeeds, resolution fails.
    project.change_compatibility_level("999").unwrap();
    assert!(matches!(
        project.target_platform(),
        Err(ProjectError::InvalidSchemaProvider(_))
    ));
}

#[test]
fn load_rejects_variable_without_default_value() {
    let dir = TempDir::new().unwrap();
    let broken = PROJECT_XML.replace(
        "<SqlCmdVariable Include=\"ProdDatabaseName\">\n      <DefaultValue>WideWorldProd</DefaultValue>\n    </SqlCmdVariable>",
        "<SqlCmdVariable Include=\"ProdDatabaseName\" />",
    );
    assert!(broken.contains("<SqlCmdVariable Include=\"ProdDatabaseName\" />"));
    let path = write_project(&dir, &broken);

    let mut project = Project::new(&path);
    assert!(matches!(
        project.load(),
        Err(ProjectError::MissingDefaultValue { variable }) if variable == "ProdDatabaseName"
    ));
}

#[test]
fn load_rejects_malformed_document() {
    let dir = TempDir::new().unwrap();
    let path = write_project(&dir, "<Project><ItemGroup></Project>");
    let mut project = Project::new(&path);
    assert!(matches!(project.load(), Err(ProjectError::Xml(_))));
}
