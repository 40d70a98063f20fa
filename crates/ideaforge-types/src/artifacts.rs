//! Code Generation phase output types.

use serde::{Deserialize, Serialize};

use crate::provenance::Sourced;

/// A single column in a generated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(alias = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Foreign key target as `table.column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

/// A generated table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// Schema Designer agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub relationships: Vec<String>,
}

impl DatabaseSchema {
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// A generated source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Backend or Frontend Generator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub files: Vec<GeneratedFile>,
}

/// Accumulated Code Generation phase output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsOutput {
    pub database: Sourced<DatabaseSchema>,
    pub backend: Sourced<GeneratedCode>,
    pub frontend: Sourced<GeneratedCode>,
}

impl ArtifactsOutput {
    /// Union of backend and frontend files, backend first.
    pub fn all_files(&self) -> Vec<GeneratedFile> {
        self.backend
            .files
            .iter()
            .chain(self.frontend.files.iter())
            .cloned()
            .collect()
    }
}
