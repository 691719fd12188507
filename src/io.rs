use crate::error::{EvalResult, EvaluationError};
use crate::schema::{DataType, Schema};
use crate::value::{Tuple, Value};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// pull side of a data source: yields tuples until exhausted
pub trait SourceReader: Send {
    fn next_tuple(&mut self) -> EvalResult<Option<Tuple>>;
}

/// push side of a sink, shared by every pipeline instance writing to it
pub trait SinkWriter: Send + Sync {
    fn write(&self, tuple: Tuple) -> EvalResult<()>;

    fn flush(&self) -> EvalResult<()> {
        Ok(())
    }
}

/// in-memory source, mostly for tests and demos
pub struct MemorySource {
    tuples: VecDeque<Tuple>,
}

impl MemorySource {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        Self {
            tuples: tuples.into(),
        }
    }
}

impl SourceReader for MemorySource {
    fn next_tuple(&mut self) -> EvalResult<Option<Tuple>> {
        Ok(self.tuples.pop_front())
    }
}

/// CSV-backed source, typed by the declared schema
/// empty cells and cells that fail to parse become NULL
pub struct CsvSource {
    reader: csv::Reader<File>,
    types: Vec<DataType>,
    record: csv::StringRecord,
}

impl CsvSource {
    pub fn open(path: &Path, schema: &Schema, delimiter: u8, has_header: bool) -> EvalResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_header)
            .flexible(true)
            .from_path(path)?;
        Ok(Self {
            reader,
            types: schema.types(),
            record: csv::StringRecord::new(),
        })
    }

    /// parse a CSV cell into the declared type
    pub fn parse_value(value: &str, data_type: DataType) -> Value {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Value::Null;
        }

        match data_type {
            DataType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or(Value::Null),
            DataType::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Null),
            DataType::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Value::Boolean(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Value::Boolean(false)
                } else {
                    Value::Null
                }
            }
            DataType::Varchar => Value::Varchar(trimmed.to_string()),
        }
    }
}

impl SourceReader for CsvSource {
    fn next_tuple(&mut self) -> EvalResult<Option<Tuple>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        // short rows are padded with NULL, extra cells are ignored
        let values = self
            .types
            .iter()
            .enumerate()
            .map(|(i, data_type)| match self.record.get(i) {
                Some(cell) => Self::parse_value(cell, *data_type),
                None => Value::Null,
            })
            .collect();
        Ok(Some(Tuple::new(values)))
    }
}

/// sink that keeps everything it receives
#[derive(Clone, Default)]
pub struct CollectSink {
    tuples: Arc<Mutex<Vec<Tuple>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Tuple>> {
        // a panicking writer cannot leave a Vec half-updated
        self.tuples.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn tuples(&self) -> Vec<Tuple> {
        self.lock().clone()
    }

    /// collected rows as plain value vectors, handy for assertions
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.lock().iter().map(Tuple::to_vec).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl SinkWriter for CollectSink {
    fn write(&self, tuple: Tuple) -> EvalResult<()> {
        self.lock().push(tuple);
        Ok(())
    }
}

/// CSV file sink; NULL is written as an empty cell
pub struct CsvSink {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    pub fn create(path: &Path, schema: &Schema, delimiter: u8, has_header: bool) -> EvalResult<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        if has_header {
            writer.write_record(schema.names())?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SinkWriter for CsvSink {
    fn write(&self, tuple: Tuple) -> EvalResult<()> {
        let record: Vec<String> = tuple
            .values()
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_record(&record)?;
        Ok(())
    }

    fn flush(&self) -> EvalResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.flush().map_err(EvaluationError::from)
    }
}
