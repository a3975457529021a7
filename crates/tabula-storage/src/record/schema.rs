//! Table schemas: ordered, typed, fixed-width columns.

use std::collections::HashSet;
use tabula_common::{ColumnType, Key, Result, TabulaError};

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, unique within a schema.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl Column {
    /// Creates a new column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered list of columns with precomputed byte offsets.
///
/// The encoded record is the concatenation of the columns' fixed-width
/// fields in schema order, so the layout never changes once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    offsets: Vec<usize>,
    record_size: usize,
}

impl Schema {
    /// Builds a schema, rejecting empty schemas and duplicate names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(TabulaError::Schema("schema has no columns".to_string()));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(TabulaError::Schema("column name is empty".to_string()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TabulaError::Schema(format!(
                    "duplicate column name: {}",
                    column.name
                )));
            }
        }

        let mut offsets = Vec::with_capacity(columns.len());
        let mut record_size = 0;
        for column in &columns {
            offsets.push(record_size);
            record_size += column.column_type.fixed_size();
        }

        Ok(Self {
            columns,
            offsets,
            record_size,
        })
    }

    /// Builds a schema from `(name, type name)` pairs such as
    /// `("price", "FLOAT")` or `("name", "VARCHAR[20]")`.
    pub fn parse<N: AsRef<str>, T: AsRef<str>>(definitions: &[(N, T)]) -> Result<Self> {
        let columns = definitions
            .iter()
            .map(|(name, type_name)| {
                Ok(Column::new(
                    name.as_ref().trim(),
                    ColumnType::parse(type_name.as_ref())?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    /// Returns the columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false: a schema has at least one column.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the encoded record size in bytes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Returns the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns the byte offset of the column at `index`.
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Checks that `index` names an INT column usable as a search key.
    pub fn require_key_column(&self, index: usize) -> Result<()> {
        match self.columns.get(index) {
            Some(column) if column.column_type.is_key_type() => Ok(()),
            Some(column) => Err(TabulaError::Schema(format!(
                "key column '{}' must be INT, found {}",
                column.name, column.column_type
            ))),
            None => Err(TabulaError::Schema(format!(
                "key column index {} out of range ({} columns)",
                index,
                self.columns.len()
            ))),
        }
    }

    /// Reads the INT key at column `index` straight from an encoded record.
    pub fn key_at(&self, record: &[u8], index: usize) -> Result<Key> {
        self.require_key_column(index)?;
        let offset = self.offsets[index];
        let field = record.get(offset..offset + 4).ok_or_else(|| {
            TabulaError::InvalidParameter {
                name: "record length".to_string(),
                value: record.len().to_string(),
            }
        })?;
        Ok(i32::from_le_bytes([field[0], field[1], field[2], field[3]]))
    }
}
