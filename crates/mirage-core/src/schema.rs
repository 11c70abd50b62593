//! Schema descriptor and record shaping.
//!
//! The descriptor is the static description of the store's tables. It is
//! used for two things:
//! - shaping rows from either execution path into [`Record`]s with a fixed
//!   field order ([`TableSchema::shape`])
//! - describing the table to the generative backend ([`TableSchema::describe`])

use crate::{Record, ResponseEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised when a schema descriptor violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema must declare at least one table")]
    NoTables,

    #[error("table '{0}' declares no columns")]
    NoColumns(String),

    #[error("table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("default table '{0}' is not declared")]
    UnknownDefaultTable(String),
}

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Bool,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bool => "bool",
        }
    }

    /// Coerce a value to this column type. Values that cannot be represented
    /// become `null`.
    pub fn coerce(&self, value: Value) -> Value {
        match (*self, value) {
            (_, Value::Null) => Value::Null,

            (Self::Int, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Value::Number(n)
                } else {
                    n.as_f64().map(float_to_int).unwrap_or(Value::Null)
                }
            }
            (Self::Int, Value::String(s)) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Value::from(i),
                    Err(_) => s.parse::<f64>().map(float_to_int).unwrap_or(Value::Null),
                }
            }
            (Self::Int, Value::Bool(b)) => Value::from(i64::from(b)),

            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            (Self::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),

            (Self::Text, Value::String(s)) => Value::String(s),
            (Self::Text, Value::Number(n)) => Value::String(n.to_string()),
            (Self::Text, Value::Bool(b)) => Value::String(b.to_string()),
            (Self::Text, other) => Value::String(other.to_string()),

            (Self::Bool, Value::Bool(b)) => Value::Bool(b),
            (Self::Bool, Value::Number(n)) => match n.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => Value::Null,
            },
            (Self::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Value::Bool(true),
                "false" | "f" | "no" | "n" | "0" => Value::Bool(false),
                _ => Value::Null,
            },

            _ => Value::Null,
        }
    }
}

fn float_to_int(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Value::Null
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Anything a record can be shaped from: a store row or a generated object.
pub trait FieldSource {
    /// Look up a field by column name.
    fn field(&self, name: &str) -> Option<&Value>;
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }
}

/// One table: its name and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Column names in declared order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Shape one row into a record.
    ///
    /// This is the single mapping used by both execution paths: fields come
    /// out in declared column order, each looked up by name and coerced to
    /// the column type. Missing fields are `null`; unknown fields are dropped.
    pub fn shape<S: FieldSource + ?Sized>(&self, source: &S) -> Record {
        let fields = self
            .columns
            .iter()
            .map(|column| {
                let value = source
                    .field(&column.name)
                    .cloned()
                    .map(|v| column.column_type.coerce(v))
                    .unwrap_or(Value::Null);
                (column.name.clone(), value)
            })
            .collect();
        Record::from_fields(fields)
    }

    /// Wrap shaped records in an envelope carrying this table's header.
    pub fn envelope(&self, records: Vec<Record>) -> ResponseEnvelope {
        ResponseEnvelope::new(self.column_names(), records)
    }

    /// Human-readable description used in generation instructions.
    ///
    /// Format: `Table: users (id:int, name:text)`
    pub fn describe(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.column_type.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Table: {} ({})", self.name, columns)
    }
}

/// Raw shape of the descriptor as it appears in configuration.
#[derive(Debug, Clone, Deserialize)]
struct SchemaDescriptorDef {
    #[serde(default)]
    default_table: Option<String>,
    tables: Vec<TableSchema>,
}

/// Static description of the store's tables. Validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDescriptorDef")]
pub struct SchemaDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_table: Option<String>,
    tables: Vec<TableSchema>,
}

impl TryFrom<SchemaDescriptorDef> for SchemaDescriptor {
    type Error = SchemaError;

    fn try_from(def: SchemaDescriptorDef) -> Result<Self, Self::Error> {
        Self::new(def.tables, def.default_table)
    }
}

impl SchemaDescriptor {
    /// Build a descriptor, checking that it is usable.
    pub fn new(
        tables: Vec<TableSchema>,
        default_table: Option<String>,
    ) -> Result<Self, SchemaError> {
        if tables.is_empty() {
            return Err(SchemaError::NoTables);
        }

        let mut table_names = HashSet::new();
        for table in &tables {
            if !table_names.insert(table.name.to_lowercase()) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
            if table.columns.is_empty() {
                return Err(SchemaError::NoColumns(table.name.clone()));
            }
            let mut seen = HashSet::new();
            for column in &table.columns {
                if !seen.insert(column.name.to_lowercase()) {
                    return Err(SchemaError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }

        if let Some(default) = &default_table {
            if !tables.iter().any(|t| t.name.eq_ignore_ascii_case(default)) {
                return Err(SchemaError::UnknownDefaultTable(default.clone()));
            }
        }

        Ok(Self {
            default_table,
            tables,
        })
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// The table used when a query names none of the declared tables.
    pub fn default_table(&self) -> &TableSchema {
        self.default_table
            .as_deref()
            .and_then(|name| self.table(name))
            .unwrap_or(&self.tables[0])
    }

    /// Pick the table a query is about.
    ///
    /// Scans for the identifier following `FROM`, `JOIN`, `INTO`, `TABLE` or
    /// `UPDATE` and returns the first one that names a declared table.
    pub fn resolve_table(&self, sql: &str) -> &TableSchema {
        let tokens: Vec<&str> = sql
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')' || c == ';')
            .filter(|t| !t.is_empty())
            .collect();

        tokens
            .windows(2)
            .filter(|pair| {
                matches!(
                    pair[0].to_ascii_uppercase().as_str(),
                    "FROM" | "JOIN" | "INTO" | "TABLE" | "UPDATE"
                )
            })
            .find_map(|pair| self.table(&bare_identifier(pair[1])))
            .unwrap_or_else(|| self.default_table())
    }
}

/// Strip quoting and any schema prefix from an identifier.
fn bare_identifier(token: &str) -> String {
    let unquoted: String = token
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect();
    unquoted
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl Default for SchemaDescriptor {
    /// The user directory table the layer ships with.
    fn default() -> Self {
        Self {
            default_table: Some("users".to_string()),
            tables: vec![TableSchema::new(
                "users",
                vec![
                    ColumnDef::new("id", ColumnType::Int),
                    ColumnDef::new("name", ColumnType::Text),
                    ColumnDef::new("email", ColumnType::Text),
                    ColumnDef::new("department", ColumnType::Text),
                    ColumnDef::new("access_level", ColumnType::Int),
                ],
            )],
        }
    }
}
