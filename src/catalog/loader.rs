use super::entity::EntitySchema;
use super::registry::{Catalog, RawCatalog};
use crate::error::{Result, SfTapError};
use std::path::Path;
use tracing::debug;

const DEFAULT_CATALOG: &str = include_str!("../../catalog/default.yaml");

pub struct CatalogLoader;

impl CatalogLoader {
    /// Catalog of standard objects shipped with the binary.
    pub fn bundled() -> Result<Catalog> {
        Self::from_yaml_str(DEFAULT_CATALOG)
    }

    pub fn from_yaml_str(content: &str) -> Result<Catalog> {
        let raw: RawCatalog = serde_yaml::from_str(content)?;
        Catalog::new(raw.entities)
    }

    /// Loads a single YAML file, or every `*.yaml` file under a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Catalog> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_file(path)
        }
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Catalog> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn load_dir(path: impl AsRef<Path>) -> Result<Catalog> {
        let path = path.as_ref();
        let pattern = format!("{}/**/*.yaml", path.display());
        let mut files: Vec<_> = glob::glob(&pattern)
            .map_err(|e| SfTapError::Config(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .collect();
        files.sort();

        let mut entities: Vec<EntitySchema> = Vec::new();
        for file in files {
            let content = std::fs::read_to_string(&file)?;
            let raw: RawCatalog = serde_yaml::from_str(&content)?;
            debug!(
                file = %file.display(),
                entities = raw.entities.len(),
                "Loaded catalog file"
            );
            entities.extend(raw.entities);
        }

        if entities.is_empty() {
            return Err(SfTapError::Config(format!(
                "No entities found under {}",
                path.display()
            )));
        }

        Catalog::new(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;
    use std::io::Write;

    #[test]
    fn test_bundled_catalog_is_valid() {
        let catalog = CatalogLoader::bundled().unwrap();
        assert_eq!(catalog.len(), 30);

        let account = catalog.get("Account").unwrap();
        assert_eq!(account.replication_key.as_deref(), Some("LastModifiedDate"));
        assert_eq!(
            account.field("AnnualRevenue").unwrap().field_type,
            FieldType::Number
        );
    }

    #[test]
    fn test_bundled_entities_have_primary_key() {
        let catalog = CatalogLoader::bundled().unwrap();
        for entity in catalog.entities() {
            assert!(
                !entity.primary_key.is_empty(),
                "{} has no primary key",
                entity.name
            );
        }
    }

    #[test]
    fn test_from_yaml_defaults_field_type_to_string() {
        let yaml = r#"
entities:
  - name: Widget__c
    replication_key: SystemModstamp
    primary_key: [Id]
    fields:
      - name: Id
      - name: Size__c
        type: integer
      - name: SystemModstamp
        type: datetime
"#;
        let catalog = CatalogLoader::from_yaml_str(yaml).unwrap();
        let widget = catalog.get("Widget__c").unwrap();
        assert_eq!(widget.field("Id").unwrap().field_type, FieldType::String);
        assert_eq!(widget.numeric_fields(), vec!["Size__c"]);
    }

    #[test]
    fn test_load_dir_merges_files() {
        let dir = tempfile::tempdir().unwrap();
        for (file, entity) in [("a.yaml", "Alpha"), ("b.yaml", "Beta")] {
            let mut f = std::fs::File::create(dir.path().join(file)).unwrap();
            writeln!(
                f,
                "entities:\n  - name: {}\n    fields:\n      - name: Id",
                entity
            )
            .unwrap();
        }

        let catalog = CatalogLoader::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("Alpha").is_some());
        assert!(catalog.get("Beta").is_some());
    }

    #[test]
    fn test_load_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CatalogLoader::load_dir(dir.path()).is_err());
    }
}
