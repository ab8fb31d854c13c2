use crate::{Result, SplayError};
use std::fmt;

/// Column element type. The discriminant is the on-disk type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    Int16 = 1,
    Int64 = 2,
    Float64 = 3,
    Utf8 = 4,
    /// UTC nanoseconds since the epoch.
    Timestamp = 5,
}

impl DataType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(DataType::Int16),
            2 => Some(DataType::Int64),
            3 => Some(DataType::Float64),
            4 => Some(DataType::Utf8),
            5 => Some(DataType::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int16(Vec<i16>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
    Timestamp(Vec<i64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int64(v) | ColumnData::Timestamp(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int16(_) => DataType::Int16,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Gathers rows by index. Panics if an index is out of range.
    pub fn take(&self, indices: &[usize]) -> ColumnData {
        fn gather<T: Clone>(v: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            ColumnData::Int16(v) => ColumnData::Int16(gather(v, indices)),
            ColumnData::Int64(v) => ColumnData::Int64(gather(v, indices)),
            ColumnData::Float64(v) => ColumnData::Float64(gather(v, indices)),
            ColumnData::Utf8(v) => ColumnData::Utf8(gather(v, indices)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(gather(v, indices)),
        }
    }

    /// Appends `other` onto `self`. Returns `false` if the types differ.
    fn extend_from(&mut self, other: &ColumnData) -> bool {
        match (self, other) {
            (ColumnData::Int16(a), ColumnData::Int16(b)) => a.extend_from_slice(b),
            (ColumnData::Int64(a), ColumnData::Int64(b)) => a.extend_from_slice(b),
            (ColumnData::Float64(a), ColumnData::Float64(b)) => a.extend_from_slice(b),
            (ColumnData::Utf8(a), ColumnData::Utf8(b)) => a.extend_from_slice(b),
            (ColumnData::Timestamp(a), ColumnData::Timestamp(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// An ordered set of named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    columns: Vec<Column>,
}

impl Batch {
    /// Builds a batch, checking that names are unique and lengths agree.
    pub fn new<S: Into<String>>(columns: Vec<(S, ColumnData)>) -> Result<Self> {
        let mut batch = Batch::empty();
        for (name, data) in columns {
            batch.push_column(name, data)?;
        }
        Ok(batch)
    }

    /// A batch with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push_column<S: Into<String>>(&mut self, name: S, data: ColumnData) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|c| c.name == name) {
            return Err(SplayError::DuplicateColumn(name));
        }
        if let Some(first) = self.columns.first() {
            let expected = first.data.len();
            if data.len() != expected {
                return Err(SplayError::LengthMismatch {
                    column: name,
                    expected,
                    actual: data.len(),
                });
            }
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Column names and types, in order.
    pub fn schema(&self) -> Vec<(&str, DataType)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.data.data_type()))
            .collect()
    }

    /// Stacks batches vertically.
    ///
    /// Batches without rows are skipped, so an empty batch never forces its
    /// (possibly absent) schema on the result. The remaining batches must
    /// agree on column names, order and types.
    pub fn concat(batches: &[Batch]) -> Result<Batch> {
        let mut parts = batches.iter().filter(|b| b.num_rows() > 0);
        let Some(first) = parts.next() else {
            return Ok(Batch::empty());
        };
        let mut out = first.clone();
        for batch in parts {
            if batch.schema() != out.schema() {
                return Err(SplayError::SchemaMismatch {
                    expected: describe(&out),
                    actual: describe(batch),
                });
            }
            for (dst, src) in out.columns.iter_mut().zip(&batch.columns) {
                if !dst.data.extend_from(&src.data) {
                    return Err(SplayError::SchemaMismatch {
                        expected: format!("{:?}", dst.data.data_type()),
                        actual: format!("{:?}", src.data.data_type()),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Gathers rows by index into a new batch.
    pub fn take(&self, indices: &[usize]) -> Batch {
        Batch {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(indices),
                })
                .collect(),
        }
    }

    /// The named column as timestamps.
    pub fn timestamps(&self, column: &str) -> Result<&[i64]> {
        match self.column(column) {
            Some(ColumnData::Timestamp(v)) => Ok(v),
            Some(other) => Err(SplayError::ColumnType {
                column: column.to_string(),
                expected: DataType::Timestamp,
                actual: other.data_type(),
            }),
            None => Err(SplayError::MissingColumn(column.to_string())),
        }
    }

    /// Rows whose `column` timestamp lies in `[start, end]` (inclusive).
    ///
    /// A batch with no rows passes through unchanged.
    pub fn filter_time_range(&self, column: &str, start: i64, end: i64) -> Result<Batch> {
        if self.num_rows() == 0 {
            return Ok(self.clone());
        }
        let keep: Vec<usize> = self
            .timestamps(column)?
            .iter()
            .enumerate()
            .filter(|(_, t)| (start..=end).contains(*t))
            .map(|(i, _)| i)
            .collect();
        Ok(self.take(&keep))
    }

    /// Rows ordered ascending by `column`; ties keep their input order.
    pub fn sort_by_time(&self, column: &str) -> Result<Batch> {
        if self.num_rows() == 0 {
            return Ok(self.clone());
        }
        let times = self.timestamps(column)?;
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by_key(|&i| times[i]);
        Ok(self.take(&order))
    }
}

fn describe(batch: &Batch) -> String {
    let fields: Vec<String> = batch
        .schema()
        .iter()
        .map(|(name, ty)| format!("{name}:{ty:?}"))
        .collect();
    format!("[{}]", fields.join(", "))
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows x {}", self.num_rows(), describe(self))
    }
}
