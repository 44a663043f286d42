//! YAML description of the resources a server mounts.
//!
//! ```yaml
//! users:
//!   email: string
//! resources:
//!   - name: todos
//!     owned: true
//!     schema:
//!       title: { type: string, required: true }
//!       done: { type: boolean, default: false }
//!   - name: notes
//!     options:
//!       timestamps: false
//!     schema:
//!       body: string
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::database::{Schema, SchemaOptions};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),
    #[error("resource name '{0}' is reserved")]
    ReservedName(String),
}

/// Mount points the server claims for itself.
pub const RESERVED_MOUNTS: &[&str] = &["auth", "health"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Extra fields for the user records of the identity subsystem.
    pub users: Schema,
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    /// Records belong to the authenticated user.
    #[serde(default)]
    pub owned: bool,
    #[serde(default)]
    pub schema: Schema,
    #[serde(default)]
    pub options: Option<SchemaOptions>,
}

impl Manifest {
    pub fn from_yaml(source: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_yaml::from_str(source)?;
        manifest.validate(&[])?;
        Ok(manifest)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    /// Reject duplicate names and names taken by [`RESERVED_MOUNTS`] or `reserved`.
    pub fn validate(&self, reserved: &[&str]) -> Result<(), ManifestError> {
        let mut seen = std::collections::HashSet::new();
        for resource in &self.resources {
            let name = resource.name.as_str();
            if RESERVED_MOUNTS.contains(&name) || reserved.contains(&name) {
                return Err(ManifestError::ReservedName(resource.name.clone()));
            }
            if !seen.insert(name) {
                return Err(ManifestError::DuplicateResource(resource.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::FieldType;

    #[test]
    fn parses_shorthand_and_long_field_forms() {
        let manifest = Manifest::from_yaml(
            r#"
users:
  email: string
resources:
  - name: todos
    owned: true
    schema:
      title: { type: string, required: true }
      done: { type: boolean, default: false }
  - name: notes
    options:
      timestamps: false
    schema:
      body: string
"#,
        )
        .unwrap();

        assert_eq!(manifest.users.get("email").unwrap().field_type, FieldType::String);
        assert_eq!(manifest.resources.len(), 2);

        let todos = &manifest.resources[0];
        assert!(todos.owned);
        assert!(todos.schema.get("title").unwrap().required);
        assert_eq!(todos.schema.get("done").unwrap().default, Some(serde_json::json!(false)));

        let notes = &manifest.resources[1];
        assert!(!notes.owned);
        assert_eq!(notes.options.map(|o| o.timestamps), Some(false));
    }

    #[test]
    fn empty_manifest_is_valid() {
        let manifest = Manifest::from_yaml("{}").unwrap();
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn rejects_duplicate_resources() {
        let err = Manifest::from_yaml("resources:\n  - name: a\n  - name: a\n").unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateResource(name) if name == "a"));
    }

    #[test]
    fn rejects_server_mount_names() {
        for name in RESERVED_MOUNTS {
            let err = Manifest::from_yaml(&format!("resources:\n  - name: {}\n", name)).unwrap_err();
            assert!(matches!(err, ManifestError::ReservedName(n) if n == *name));
        }
    }

    #[test]
    fn rejects_caller_reserved_names() {
        let manifest = Manifest::from_yaml("resources:\n  - name: users\n  - name: todos\n").unwrap();
        let err = manifest.validate(&["users"]).unwrap_err();
        assert!(matches!(err, ManifestError::ReservedName(name) if name == "users"));
        assert!(manifest.validate(&["members"]).is_ok());
    }

    #[test]
    fn rejects_unknown_field_types() {
        assert!(Manifest::from_yaml("resources:\n  - name: a\n    schema:\n      x: decimal\n").is_err());
    }
}
