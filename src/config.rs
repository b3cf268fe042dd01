use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::kv_store::FileKeyValueStore;

pub const DEFAULT_DATA_DIR: &str = "./data";

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            catalog_path: None,
        }
    }
}

impl AppConfig {
    /// Reads `DATABASE_URL`, `PPM_DATA_DIR` and `PPM_CATALOG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            database_url: value("DATABASE_URL"),
            data_dir: value("PPM_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            catalog_path: value("PPM_CATALOG_PATH").map(PathBuf::from),
        }
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn with_catalog_path(mut self, catalog_path: Option<PathBuf>) -> Self {
        if catalog_path.is_some() {
            self.catalog_path = catalog_path;
        }
        self
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("DATABASE_URL must be set".to_string()))
    }

    /// The configured catalog file, or the embedded questionnaire.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match self.catalog_path.as_deref() {
            Some(path) => {
                info!("loading question catalog from {}", path.display());
                Catalog::load(path)
            }
            None => Catalog::builtin(),
        }
    }

    pub fn weights_store(&self) -> FileKeyValueStore {
        FileKeyValueStore::new(&self.data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert!(config.database_url().is_err());
        assert_eq!(config.data_dir(), Path::new("./data"));
    }

    #[test]
    fn reads_variables_and_ignores_blanks() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/ppm"),
            ("PPM_DATA_DIR", "/var/lib/ppm"),
            ("PPM_CATALOG_PATH", "  "),
        ]));
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/ppm");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ppm"));
        assert_eq!(config.catalog_path, None);
    }

    #[test]
    fn flags_override_environment() {
        let config = AppConfig::from_lookup(lookup(&[("PPM_DATA_DIR", "/env")]))
            .with_data_dir(Some(PathBuf::from("/flag")))
            .with_catalog_path(None);
        assert_eq!(config.data_dir, PathBuf::from("/flag"));
        assert_eq!(config.catalog_path, None);
    }

    #[test]
    fn loads_catalog_from_file_or_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"forms":[{"id":"f1","title":"Único","questions":[
                {"id":"f1_nota","type":"escala_1_5","category":"Desempenho","label":"Nota"}
            ]}]}"#,
        )
        .unwrap();

        let custom = AppConfig::default()
            .with_catalog_path(Some(path))
            .load_catalog()
            .unwrap();
        assert_eq!(custom.forms.len(), 1);
        assert!(custom.question("f1_nota").is_some());

        let builtin = AppConfig::default().load_catalog().unwrap();
        assert_eq!(builtin.forms.len(), 3);

        let missing = AppConfig::default()
            .with_catalog_path(Some(dir.path().join("absent.json")))
            .load_catalog();
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
