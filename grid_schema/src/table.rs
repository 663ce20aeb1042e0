//! Named-column tables backed by a polars [`DataFrame`].
//!
//! [`Table`] is the single shape every parser produces and every normalizer
//! step consumes. Parsers hand over rows of [`Value`]s; each column is stored
//! as a typed polars series (`Float64`, `String`, `Datetime` with the
//! operator's zone, ...), and reshaping goes through polars: stacking chunks,
//! pivoting long reports, stable sorts and row filters.

use std::{fmt, rc::Rc};

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use indexmap::IndexSet;
use polars::prelude::*;
use polars_ops::pivot::{PivotAgg, pivot_stable};
use serde::{Serialize, Serializer, ser::SerializeMap, ser::SerializeSeq};

use crate::{
    error::SchemaError,
    tz::{parse_zone, to_rfc3339},
};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

/// One cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer (ids, counts).
    Int(i64),
    /// Floating point measurement (MW, $/MWh).
    Float(f64),
    /// Free text.
    Text(String),
    /// Calendar date without time of day.
    Date(NaiveDate),
    /// Timezone-aware instant in the operator's zone.
    Timestamp(DateTime<Tz>),
}

impl Value {
    /// Text cell; blank strings become [`Value::Null`].
    pub fn text(s: impl AsRef<str>) -> Self {
        let s = s.as_ref().trim();
        if s.is_empty() {
            Value::Null
        } else {
            Value::Text(s.to_string())
        }
    }

    /// Parse a numeric cell; blanks become `Null`, non-numbers stay text.
    ///
    /// Thousands separators are accepted (`"1,234.5"`).
    pub fn number(s: impl AsRef<str>) -> Self {
        let s = s.as_ref().trim();
        if s.is_empty() {
            return Value::Null;
        }
        match s.replace(',', "").parse::<f64>() {
            Ok(v) => Value::Float(v),
            Err(_) => Value::Text(s.to_string()),
        }
    }

    /// Whether the cell is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. Numeric-looking text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Text(s) => s.trim().replace(',', "").parse().ok(),
            _ => None,
        }
    }

    /// Text view of the cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp view of the cell.
    pub fn as_timestamp(&self) -> Option<DateTime<Tz>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Date view of the cell; timestamps yield their local date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(t) => Some(t.date_naive()),
            _ => None,
        }
    }

    /// A hashable identity for grouping.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::Timestamp(t) => ValueKey::Instant(t.timestamp_millis()),
        }
    }
}

/// Hashable projection of a [`Value`]. Timestamps compare by instant, so the
/// same moment in different offsets is one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float bit pattern.
    Float(u64),
    /// Text.
    Text(String),
    /// Date.
    Date(NaiveDate),
    /// Milliseconds since the Unix epoch.
    Instant(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(t) => f.write_str(&to_rfc3339(t)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Value::Null, Value::Float)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Timestamp(v)
    }
}

/// Storage type chosen for a column of [`Value`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Date,
    Timestamp(Tz),
}

fn kind_of(values: &[Value]) -> Kind {
    let mut kind = Kind::Null;
    for v in values {
        let this = match v {
            Value::Null => continue,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Text(_) => Kind::Text,
            Value::Date(_) => Kind::Date,
            Value::Timestamp(t) => Kind::Timestamp(t.timezone()),
        };
        kind = match (kind, this) {
            (Kind::Null, k) => k,
            (Kind::Int, Kind::Float) | (Kind::Float, Kind::Int) => Kind::Float,
            (Kind::Timestamp(tz), Kind::Timestamp(_)) => Kind::Timestamp(tz),
            (a, b) if a == b => a,
            _ => return Kind::Text,
        };
    }
    kind
}

/// Build a typed series from cells. Columns mixing kinds are stored as text.
fn to_series(name: &str, values: &[Value]) -> Series {
    let name = PlSmallStr::from(name);
    match kind_of(values) {
        Kind::Null => Series::full_null(name, values.len(), &DataType::Null),
        Kind::Bool => {
            let v: Vec<Option<bool>> = values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name, v)
        }
        Kind::Int => {
            let v: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name, v)
        }
        Kind::Float => {
            let v: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
            Series::new(name, v)
        }
        Kind::Date => {
            let days: Vec<Option<i32>> = values
                .iter()
                .map(|v| match v {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_CE_DAYS),
                    _ => None,
                })
                .collect();
            Int32Chunked::new(name, days.as_slice())
                .into_date()
                .into_series()
        }
        Kind::Timestamp(tz) => {
            let millis: Vec<Option<i64>> = values
                .iter()
                .map(|v| v.as_timestamp().map(|t| t.timestamp_millis()))
                .collect();
            Int64Chunked::new(name, millis.as_slice())
                .into_datetime(TimeUnit::Milliseconds, Some(tz.name().into()))
                .into_series()
        }
        Kind::Text => {
            let texts: Vec<Option<String>> = values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect();
            let refs: Vec<Option<&str>> = texts.iter().map(Option::as_deref).collect();
            Series::new(name, refs)
        }
    }
}

fn instant(value: i64, unit: TimeUnit, tz: Tz) -> Option<DateTime<Tz>> {
    let utc = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value)?,
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value)?,
        TimeUnit::Nanoseconds => DateTime::from_timestamp_nanos(value),
    };
    Some(utc.with_timezone(&tz))
}

/// Read a stored column back as cells.
fn to_values(column: &Column) -> Result<Vec<Value>, SchemaError> {
    let s = column.as_materialized_series();
    let values = match s.dtype() {
        DataType::Null => vec![Value::Null; s.len()],
        DataType::Boolean => s
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        DataType::Float64 | DataType::Float32 => s
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(Value::from)
            .collect(),
        dt if dt.is_integer() => s
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Int))
            .collect(),
        DataType::String => s
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |t| Value::Text(t.to_string())))
            .collect(),
        DataType::Date => s
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .map(|d| {
                d.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_CE_DAYS))
                    .map_or(Value::Null, Value::Date)
            })
            .collect(),
        DataType::Datetime(unit, zone) => {
            let tz = match zone.as_deref() {
                Some(z) => parse_zone(z)?,
                None => Tz::UTC,
            };
            let unit = *unit;
            s.cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|v| instant(v, unit, tz))
                        .map_or(Value::Null, Value::Timestamp)
                })
                .collect()
        }
        _ => s
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |t| Value::Text(t.to_string())))
            .collect(),
    };
    Ok(values)
}

/// The dtype two chunks agree on for a shared column.
fn common_dtype(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        _ if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        (DataType::Datetime(..), DataType::Datetime(..)) => a.clone(),
        _ => DataType::String,
    }
}

/// Give `frame` a column `name` of `dtype`, casting it or null-filling it.
fn conform(frame: &mut DataFrame, name: &str, dtype: &DataType) -> Result<(), SchemaError> {
    let current = frame.column(name).ok().map(|c| c.dtype().clone());
    match current {
        Some(ref dt) if dt == dtype => {}
        Some(_) => {
            let cast = frame.column(name)?.cast(dtype)?;
            frame.with_column(cast)?;
        }
        None => {
            let nulls = Series::full_null(name.into(), frame.height(), dtype);
            frame.with_column(nulls)?;
        }
    }
    Ok(())
}

/// One row with access by column name.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Rc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Value of the named column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// All values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Ordered, uniquely named columns over a polars frame.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            frame: DataFrame::empty(),
        }
    }
}

impl From<DataFrame> for Table {
    fn from(frame: DataFrame) -> Self {
        Self { frame }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns() == other.columns() && self.rows() == other.rows()
    }
}

impl Table {
    /// Empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_rows(columns, Vec::new())
    }

    /// Table with the given columns and rows; every row must match the width.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].contains(c) {
                return Err(SchemaError::DuplicateColumn(c.clone()));
            }
        }
        let mut cells: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); columns.len()];
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != columns.len() {
                return Err(SchemaError::RowWidth {
                    row,
                    got: values.len(),
                    expected: columns.len(),
                });
            }
            for (column, v) in cells.iter_mut().zip(values) {
                column.push(v);
            }
        }
        let series: Vec<Column> = columns
            .iter()
            .zip(&cells)
            .map(|(name, values)| to_series(name, values).into_column())
            .collect();
        Ok(Self {
            frame: DataFrame::new(series)?,
        })
    }

    /// The underlying frame.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Give up the wrapper and keep the frame.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Column names in order.
    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect()
    }

    /// Materialize every row.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let columns: Vec<Vec<Value>> = self
            .frame
            .get_columns()
            .iter()
            .map(|c| to_values(c).unwrap_or_else(|_| vec![Value::Null; c.len()]))
            .collect();
        (0..self.len())
            .map(|i| columns.iter().map(|c| c[i].clone()).collect())
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the named column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.frame.get_column_index(name)
    }

    /// Position of the named column, or [`SchemaError::MissingColumn`].
    pub fn require(&self, name: &str) -> Result<usize, SchemaError> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::missing(name))
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), SchemaError> {
        if row.len() != self.frame.width() {
            return Err(SchemaError::RowWidth {
                row: self.len(),
                got: row.len(),
                expected: self.frame.width(),
            });
        }
        let one = Table::from_rows(self.columns(), vec![row])?;
        self.append(one)
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.len() {
            return None;
        }
        self.iter().nth(index)
    }

    /// Iterate rows in order.
    pub fn iter(&self) -> impl Iterator<Item = Row> {
        let columns: Rc<[String]> = self.columns().into();
        self.rows().into_iter().map(move |values| Row {
            columns: Rc::clone(&columns),
            values,
        })
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Result<Vec<Value>, SchemaError> {
        self.require(name)?;
        to_values(self.frame.column(name)?)
    }

    /// Timestamps of one column; any other cell kind is an error.
    pub fn timestamps(&self, name: &str) -> Result<Vec<DateTime<Tz>>, SchemaError> {
        self.column(name)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.as_timestamp().ok_or_else(|| SchemaError::InvalidValue {
                    column: name.to_string(),
                    row,
                    message: format!("expected a timestamp, found {v:?}"),
                })
            })
            .collect()
    }

    /// Rename one column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), SchemaError> {
        self.require(from)?;
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(SchemaError::DuplicateColumn(to.to_string()));
        }
        self.frame.rename(from, to.into())?;
        Ok(())
    }

    /// Rename the first of `candidates` that exists to `to`.
    ///
    /// Operators spell some headers differently across report vintages; this
    /// accepts any one of the known spellings and fails if none is present.
    pub fn rename_any(&mut self, candidates: &[&str], to: &str) -> Result<(), SchemaError> {
        match candidates.iter().find(|c| self.has_column(c)) {
            Some(from) => self.rename_column(from, to),
            None if self.has_column(to) => Ok(()),
            None => Err(SchemaError::missing(candidates.join(" | "))),
        }
    }

    fn check_length(&self, name: &str, values: &[Value]) -> Result<(), SchemaError> {
        if values.len() != self.len() {
            return Err(SchemaError::InvalidValue {
                column: name.to_string(),
                row: values.len(),
                message: format!("column has {} values for {} rows", values.len(), self.len()),
            });
        }
        Ok(())
    }

    /// Insert a column at position `at`.
    pub fn insert_column(
        &mut self,
        at: usize,
        name: &str,
        values: Vec<Value>,
    ) -> Result<(), SchemaError> {
        if self.has_column(name) {
            return Err(SchemaError::DuplicateColumn(name.to_string()));
        }
        self.check_length(name, &values)?;
        let at = at.min(self.frame.width());
        self.frame.insert_column(at, to_series(name, &values))?;
        Ok(())
    }

    /// Append a column at the end.
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), SchemaError> {
        self.insert_column(self.frame.width(), name, values)
    }

    /// Set a column, replacing it in place if it exists or appending it otherwise.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), SchemaError> {
        self.check_length(name, &values)?;
        self.frame.with_column(to_series(name, &values))?;
        Ok(())
    }

    /// Fill one column with a constant.
    pub fn fill_column(&mut self, name: &str, value: Value) -> Result<(), SchemaError> {
        let values = vec![value; self.len()];
        self.set_column(name, values)
    }

    /// Transform every cell of one column.
    pub fn map_column(
        &mut self,
        name: &str,
        f: impl FnMut(&Value) -> Value,
    ) -> Result<(), SchemaError> {
        let mapped = self.column(name)?.iter().map(f).collect();
        self.set_column(name, mapped)
    }

    /// Remove columns that exist; names that do not exist are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<(), SchemaError> {
        let keep: Vec<String> = self
            .columns()
            .into_iter()
            .filter(|c| !names.contains(&c.as_str()))
            .collect();
        self.frame = self.frame.select(keep)?;
        Ok(())
    }

    /// New table with exactly `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<Table, SchemaError> {
        for n in names {
            self.require(n)?;
        }
        for (i, n) in names.iter().enumerate() {
            if names[..i].contains(n) {
                return Err(SchemaError::DuplicateColumn(n.to_string()));
            }
        }
        Ok(Table::from(self.frame.select(names.iter().copied())?))
    }

    /// Keep rows for which `keep` returns true.
    pub fn retain_rows(&mut self, keep: impl FnMut(Row) -> bool) -> Result<(), SchemaError> {
        let mask: Vec<bool> = self.iter().map(keep).collect();
        if mask.iter().all(|k| *k) {
            return Ok(());
        }
        let mask = BooleanChunked::from_slice(PlSmallStr::from_static("keep"), &mask);
        self.frame = self.frame.filter(&mask)?;
        Ok(())
    }

    /// Stable sort by the given columns, ascending. Nulls sort last.
    pub fn sort_by_columns(&mut self, names: &[&str]) -> Result<(), SchemaError> {
        for n in names {
            self.require(n)?;
        }
        if names.is_empty() || self.len() < 2 {
            return Ok(());
        }
        let by: Vec<PlSmallStr> = names.iter().map(|n| PlSmallStr::from(*n)).collect();
        let options = SortMultipleOptions::default()
            .with_maintain_order(true)
            .with_nulls_last(true);
        self.frame = self.frame.sort(by, options)?;
        Ok(())
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> Table {
        Table::from(self.frame.tail(Some(n)))
    }

    /// Stack the rows of `other` below these.
    ///
    /// Columns are unioned in first-seen order; cells a side has no column
    /// for are null. A column both sides carry keeps one storage type: nulls
    /// adopt the other side's type, integers widen to floats, and anything
    /// else irreconcilable falls back to text.
    pub fn append(&mut self, other: Table) -> Result<(), SchemaError> {
        if self.frame.width() == 0 {
            *self = other;
            return Ok(());
        }
        if other.frame.width() == 0 {
            return Ok(());
        }
        let mut names: IndexSet<String> = self.columns().into_iter().collect();
        names.extend(other.columns());

        let mut top = self.frame.clone();
        let mut bottom = other.frame;
        for name in &names {
            let a = top.column(name).ok().map(|c| c.dtype().clone());
            let b = bottom.column(name).ok().map(|c| c.dtype().clone());
            let dtype = match (a, b) {
                (Some(a), Some(b)) => common_dtype(&a, &b),
                (Some(d), None) | (None, Some(d)) => d,
                (None, None) => DataType::Null,
            };
            conform(&mut top, name, &dtype)?;
            conform(&mut bottom, name, &dtype)?;
        }
        let order: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut top = top.select(order.iter().copied())?;
        let bottom = bottom.select(order.iter().copied())?;
        top.vstack_mut(&bottom)?;
        self.frame = top;
        Ok(())
    }

    /// Reshape long rows into wide ones.
    ///
    /// Rows sharing the same `index` values become one output row; each
    /// distinct value of `columns` becomes a new column filled from `values`.
    /// The first value wins when a cell repeats. Output rows and new columns
    /// keep first-seen order; missing cells are `Null`. Rows with no
    /// `columns` value are skipped.
    pub fn pivot(&self, index: &[&str], columns: &str, values: &str) -> Result<Table, SchemaError> {
        for n in index.iter().chain([&columns, &values]) {
            self.require(n)?;
        }
        let mut long = self.select(
            &index
                .iter()
                .copied()
                .chain([columns, values])
                .collect::<Vec<_>>(),
        )?;
        long.retain_rows(|row| row.get(columns).is_some_and(|v| !v.is_null()))?;
        if long.is_empty() {
            return Table::new(index.iter().copied());
        }
        long.map_column(columns, |v| Value::Text(v.to_string()))?;
        let names: IndexSet<String> = long
            .column(columns)?
            .iter()
            .map(ToString::to_string)
            .collect();

        let wide = pivot_stable(
            &long.frame,
            [columns],
            Some(index.iter().copied()),
            Some([values]),
            false,
            Some(PivotAgg::First),
            None,
        )?;
        let order: Vec<&str> = index
            .iter()
            .copied()
            .chain(names.iter().map(String::as_str))
            .collect();
        Ok(Table::from(wide.select(order)?))
    }
}

impl Serialize for Table {
    /// Serializes as a list of `{column: value}` objects in column order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct RowSer<'a>(&'a [String], &'a [Value]);

        impl Serialize for RowSer<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (c, v) in self.0.iter().zip(self.1) {
                    map.serialize_entry(c, v)?;
                }
                map.end()
            }
        }

        let columns = self.columns();
        let rows = self.rows();
        let mut seq = serializer.serialize_seq(Some(rows.len()))?;
        for row in &rows {
            seq.serialize_element(&RowSer(&columns, row))?;
        }
        seq.end()
    }
}
