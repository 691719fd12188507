use crate::error::{EvalResult, EvaluationError};
use crate::io::{CsvSink, CsvSource, SourceReader};
use crate::registry::{ReaderFactory, Registry};
use crate::schema::{Field, Schema};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// environment variable that overrides `log_filter`
pub const LOG_ENV: &str = "SQLSTREAM_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("table '{name}': {reason}")]
    Table { name: String, reason: String },

    #[error("csv delimiter '{0}' is not a single byte")]
    Delimiter(char),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// one CSV-backed table declared in the catalog
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableConfig {
    pub name: String,
    /// relative paths resolve against `data_dir`
    pub file: PathBuf,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub sources: Vec<TableConfig>,
    pub sinks: Vec<TableConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub catalog: Catalog,
    pub log_filter: String,
    pub csv_delimiter: char,
    pub has_header: bool,
    pub show_plan: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            catalog: Catalog::default(),
            log_filter: "warn".to_string(),
            csv_delimiter: ',',
            has_header: true,
            show_plan: false,
        }
    }
}

impl Config {
    /// read a JSON config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env();
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn apply_env(&mut self) {
        if let Ok(filter) = std::env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                self.log_filter = filter;
            }
        }
    }

    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    pub fn delimiter(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.csv_delimiter).map_err(|_| ConfigError::Delimiter(self.csv_delimiter))
    }

    /// registry with the built-in functions plus every catalog table
    /// sink files are created (truncated) here
    pub fn build_registry(&self) -> Result<Registry, ConfigError> {
        let delimiter = self.delimiter()?;
        let has_header = self.has_header;
        let mut registry = Registry::with_builtins();

        for table in &self.catalog.sources {
            let schema = table_schema(table)?;
            let path = self.resolve(&table.file);
            let reader_schema = schema.clone();
            let factory: ReaderFactory = Arc::new(move || -> EvalResult<Box<dyn SourceReader>> {
                let source = CsvSource::open(&path, &reader_schema, delimiter, has_header)?;
                Ok(Box::new(source) as Box<dyn SourceReader>)
            });
            registry.register_source_with_reader(&table.name, schema, factory);
        }

        for table in &self.catalog.sinks {
            let schema = table_schema(table)?;
            let sink = CsvSink::create(&self.resolve(&table.file), &schema, delimiter, has_header)?;
            registry.register_sink(&table.name, schema, Arc::new(sink));
        }
        Ok(registry)
    }
}

fn table_schema(table: &TableConfig) -> Result<Schema, ConfigError> {
    Schema::new(table.fields.clone()).map_err(|reason| ConfigError::Table {
        name: table.name.clone(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = Config::parse(r#"{"show_plan": true}"#).unwrap();
        assert!(config.show_plan);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.csv_delimiter, ',');
        assert!(config.catalog.sources.is_empty());
    }

    #[test]
    fn test_catalog_tables() {
        let config = Config::parse(
            r#"{
                "data_dir": "data",
                "catalog": {
                    "sources": [
                        {"name": "EMP", "file": "emp.csv",
                         "fields": [{"name": "EMPID", "type": "INTEGER"}, {"name": "NAME", "type": "VARCHAR"}]}
                    ]
                }
            }"#,
        )
        .unwrap();
        let table = &config.catalog.sources[0];
        assert_eq!(table.fields[0], Field::new("EMPID", DataType::Integer));
        assert_eq!(config.resolve(&table.file), PathBuf::from("data/emp.csv"));

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.source_names(), vec!["EMP".to_string()]);
        assert!(registry.function("ABS").is_some());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let table = TableConfig {
            name: "T".to_string(),
            file: PathBuf::from("t.csv"),
            fields: vec![
                Field::new("A", DataType::Integer),
                Field::new("A", DataType::Integer),
            ],
        };
        assert!(matches!(table_schema(&table), Err(ConfigError::Table { .. })));
    }

    #[test]
    fn test_wide_delimiter_rejected() {
        let config = Config {
            csv_delimiter: '→',
            ..Config::default()
        };
        assert!(matches!(config.delimiter(), Err(ConfigError::Delimiter(_))));
    }
}
