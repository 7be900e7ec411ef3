//! Configuration management and validation.
//!
//! [`MpfConfig`] is passed explicitly to every load and export entry point.
//! It is read from a JSON file (`mpfi_config.json`) when one exists and
//! falls back to defaults otherwise.

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_FAC_EXTENSION, DEFAULT_FILE_NAME_COLUMN, DEFAULT_MPF_EXTENSION,
    DEFAULT_PROD_NAME_COLUMN,
};
use crate::error::{MpfError, Result};
use crate::schema::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings shared by loading and exporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpfConfig {
    /// Folders searched for model point files, in order
    pub mpf_folders: Vec<PathBuf>,

    /// Folders searched for fac tables, in order
    pub fac_folders: Vec<PathBuf>,

    /// Model point file extension, without the dot
    pub mpf_extension: String,

    /// fac table extension, without the dot
    pub fac_extension: String,

    /// Column added on load holding the product name (file stem)
    pub prod_name_column: String,

    /// Column added on load holding the full file path; `None` disables it
    pub file_name_column: Option<String>,

    /// Column types that take precedence over a file's `VARIABLE_TYPES`
    pub column_specs: BTreeMap<String, ColumnType>,

    /// Default sort keys for exported rows
    pub index_columns: Vec<String>,
}

impl Default for MpfConfig {
    fn default() -> Self {
        let mut column_specs = BTreeMap::new();
        column_specs.insert("!".to_string(), ColumnType::Sentinel);
        column_specs.insert("SPCODE".to_string(), ColumnType::Integer32);
        column_specs.insert(
            "POLICY_NUMBER".to_string(),
            ColumnType::Text { max_width: None },
        );
        column_specs.insert(
            "PLAN_CODE".to_string(),
            ColumnType::Text { max_width: None },
        );
        for name in [
            "AGE_AT_ENTRY",
            "DURATIONIF_M",
            "EFF_YEAR",
            "EFF_MONTH",
            "EFF_DAY",
            "POL_TERM_Y",
            "PREM_FREQ",
            "PREM_PAYBL_M",
        ] {
            column_specs.insert(name.to_string(), ColumnType::Integer32);
        }

        Self {
            mpf_folders: [".", "MPFILES", "mpf", "example"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            fac_folders: [".", "TABLES", "example"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            mpf_extension: DEFAULT_MPF_EXTENSION.to_string(),
            fac_extension: DEFAULT_FAC_EXTENSION.to_string(),
            prod_name_column: DEFAULT_PROD_NAME_COLUMN.to_string(),
            file_name_column: Some(DEFAULT_FILE_NAME_COLUMN.to_string()),
            column_specs,
            index_columns: Vec::new(),
        }
    }
}

impl MpfConfig {
    /// Config file path in the working directory
    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE_NAME)
    }

    /// Load from `path`, or fall back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_file() {
            info!("Config file {} found", path.display());
            return Self::from_file(path);
        }

        info!(
            "Config file {} not found, falling back to default config",
            path.display()
        );
        Ok(Self::default())
    }

    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: MpfConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Write the default configuration for further editing
    pub fn write_default(path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            return Err(MpfError::ConfigExists {
                path: path.to_path_buf(),
            });
        }

        let text = serde_json::to_string_pretty(&Self::default())?;
        fs::write(path, text + "\n")?;
        info!("{} created", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mpf_extension.trim().is_empty() || self.fac_extension.trim().is_empty() {
            return Err(MpfError::Configuration {
                message: "file extensions must not be empty".to_string(),
            });
        }

        if self.prod_name_column.trim().is_empty() {
            return Err(MpfError::Configuration {
                message: "prod_name_column must not be empty".to_string(),
            });
        }

        if self.file_name_column.as_deref() == Some(self.prod_name_column.as_str()) {
            return Err(MpfError::Configuration {
                message: "file_name_column and prod_name_column must differ".to_string(),
            });
        }

        Ok(())
    }

    /// Override the type of a named column
    pub fn with_column_spec(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_specs.insert(column.into(), column_type);
        self
    }

    pub fn with_mpf_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.mpf_folders = folders;
        self
    }

    pub fn with_fac_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.fac_folders = folders;
        self
    }

    pub fn with_index_columns(mut self, columns: Vec<String>) -> Self {
        self.index_columns = columns;
        self
    }

    /// Drop the file name column added on load
    pub fn without_file_name_column(mut self) -> Self {
        self.file_name_column = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MpfConfig::default();

        assert_eq!(config.mpf_extension, "PRO");
        assert_eq!(config.fac_extension, "fac");
        assert_eq!(config.prod_name_column, "_PROD_NAME");
        assert_eq!(config.file_name_column.as_deref(), Some("_FILE_NAME"));
        assert_eq!(config.column_specs.get("!"), Some(&ColumnType::Sentinel));
        assert_eq!(
            config.column_specs.get("SPCODE"),
            Some(&ColumnType::Integer32)
        );
        assert_eq!(config.mpf_folders[1], PathBuf::from("MPFILES"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{ "mpf_extension": "RPT", "column_specs": { "SEX": "T1", "DOB": "D%Y%m%d" } }"#,
        )
        .unwrap();

        let config = MpfConfig::load(&path).unwrap();

        assert_eq!(config.mpf_extension, "RPT");
        assert_eq!(config.fac_extension, "fac");
        assert_eq!(config.column_specs.len(), 2);
        assert_eq!(
            config.column_specs.get("DOB"),
            Some(&ColumnType::Date {
                format: "%Y%m%d".to_string()
            })
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = MpfConfig::load(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(config, MpfConfig::default());
    }

    #[test]
    fn test_bad_type_code_in_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "column_specs": { "AGE": "Q" } }"#).unwrap();

        assert!(matches!(
            MpfConfig::load(&path),
            Err(MpfError::ConfigFormat(_))
        ));
    }

    #[test]
    fn test_write_default_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        MpfConfig::write_default(&path, false).unwrap();
        assert_eq!(MpfConfig::from_file(&path).unwrap(), MpfConfig::default());

        match MpfConfig::write_default(&path, false) {
            Err(MpfError::ConfigExists { path: existing }) => assert_eq!(existing, path),
            other => panic!("Expected ConfigExists, got {:?}", other),
        }
        assert!(MpfConfig::write_default(&path, true).is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = MpfConfig::default();
        config.prod_name_column = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(MpfError::Configuration { .. })
        ));

        let mut config = MpfConfig::default();
        config.file_name_column = Some(config.prod_name_column.clone());
        assert!(config.validate().is_err());
    }
}
