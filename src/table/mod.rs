//! Attribute tables.
//!
//! An attribute table is a small grid of named rows ("fields") holding one
//! value per column. Records carry one table that tracks the current value
//! of every synchronized attribute next to its previous value and a change
//! marker:
//!
//! ```text
//! Name     | Previous | Diff | Current
//! -------------------------------------
//! Status   | Open     | !    | Closed
//! Priority | Major    |      | Major
//! -------------------------------------
//! ```
//!
//! Values longer than the column width are wrapped into continuation rows
//! with an empty name. [`TableParser`] reads the rendered text back.
//!
//! # Sharing
//!
//! `AttributeTable` is a value. Display settings (columns to render, wrap
//! width, line prefix) belong to each value, while the field data sits
//! behind an [`Arc`] and is only copied when one of the sharing values is
//! mutated. Re-rendering the same table two ways is therefore cheap and
//! never leaks configuration between copies.

mod parser;

pub use parser::{TableError, TableParser};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Column delimiter used in rendered tables.
pub const DELIM: char = '|';

/// Stored in place of [`DELIM`] inside names and values.
pub const DELIM_SUBSTITUTE: char = '\u{a6}';

/// Wrap width given to tables recovered by the parser.
pub const DEFAULT_COLUMN_WIDTH: usize = 40;

/// Title of the field-name column.
const NAME_TITLE: &str = "Name";

/// One named row of an attribute table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub values: BTreeMap<String, String>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Value of `column`, or `""`.
    #[must_use]
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map_or("", String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TableData {
    columns: Vec<String>,
    fields: Vec<Field>,
}

/// Named rows of per-column values, rendered as a fixed-width text grid.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    prefix: String,
    column_width: usize,
    display: Option<Vec<String>>,
    data: Arc<TableData>,
}

impl PartialEq for AttributeTable {
    /// Tables are equal when they hold the same data; display settings are
    /// not part of the content.
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl AttributeTable {
    /// Create an empty table without a wrap limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`set_column_width`](Self::set_column_width).
    #[must_use]
    pub fn with_column_width(mut self, width: usize) -> Self {
        self.column_width = width;
        self
    }

    /// Copy of this table rendering only `columns`, in that order.
    #[must_use]
    pub fn with_display_columns<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = self.clone();
        table.set_display_columns(columns);
        table
    }

    /// Copy of this table with every rendered line prefixed by `prefix`.
    #[must_use]
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        let mut table = self.clone();
        table.prefix = prefix.into();
        table
    }

    /// Maximum characters per cell before a value wraps. `0` disables wrapping.
    #[must_use]
    pub fn column_width(&self) -> usize {
        self.column_width
    }

    pub fn set_column_width(&mut self, width: usize) {
        self.column_width = width;
    }

    /// Restrict rendering to `columns`.
    pub fn set_display_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.display = Some(columns.into_iter().map(Into::into).collect());
    }

    /// Columns that [`render`](Self::render) walks through.
    #[must_use]
    pub fn display_columns(&self) -> &[String] {
        self.display.as_deref().unwrap_or(&self.data.columns)
    }

    /// Every column seen so far, in first-seen order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.data.columns
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.data.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.data.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.fields.is_empty()
    }

    /// Add `field` unless a field with the same name exists.
    ///
    /// Returns `true` when the field was added; its columns are registered
    /// only in that case.
    pub fn append(&mut self, field: Field) -> bool {
        if self.field(&field.name).is_some() {
            return false;
        }
        let data = Arc::make_mut(&mut self.data);
        for column in field.values.keys() {
            if !data.columns.contains(column) {
                data.columns.push(column.clone());
            }
        }
        data.fields.push(field);
        true
    }

    /// Merge `values` into field `name`, creating the field when needed.
    pub fn set_columns<I, K, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let name = cell_text(name);
        let name = name.trim_start();
        let values: Vec<(String, String)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), cell_text(v.as_ref())))
            .collect();

        let data = Arc::make_mut(&mut self.data);
        for (column, _) in &values {
            if !data.columns.contains(column) {
                data.columns.push(column.clone());
            }
        }

        if let Some(field) = data.fields.iter_mut().find(|f| f.name == name) {
            field.values.extend(values);
        } else {
            data.fields.push(Field {
                name: name.to_string(),
                values: values.into_iter().collect(),
            });
        }
    }

    /// Store `value` under (`name`, `column`).
    ///
    /// A cell holds one line of text that reads back unchanged: line breaks
    /// become spaces, [`DELIM`] becomes [`DELIM_SUBSTITUTE`] and trailing
    /// whitespace is dropped. Field names get the same treatment.
    pub fn set(&mut self, name: &str, column: &str, value: impl AsRef<str>) {
        self.set_columns(name, [(column, value)]);
    }

    /// Value under (`name`, `column`); `""` when either is missing.
    #[must_use]
    pub fn get(&self, name: &str, column: &str) -> &str {
        self.field(name).map_or("", |f| f.get(column))
    }

    /// Render the table to a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    /// Render the table into `w`.
    ///
    /// # Errors
    ///
    /// Propagates errors from the writer.
    pub fn write_to<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        let limit = if self.column_width == 0 {
            usize::MAX
        } else {
            self.column_width
        };

        let mut name_width = NAME_TITLE.len();
        let mut widths: HashMap<&str, usize> = HashMap::new();

        for field in &self.data.fields {
            name_width = name_width.max(char_len(&field.name));
            for (column, value) in &field.values {
                let n = char_len(value).min(limit);
                let width = widths.entry(column.as_str()).or_insert(0);
                *width = (*width).max(n);
            }
        }

        let shown: Vec<(&str, usize)> = self
            .display_columns()
            .iter()
            .filter_map(|column| {
                let n = widths.get(column.as_str()).copied().unwrap_or(0);
                (n > 0).then(|| (column.as_str(), n.max(char_len(column))))
            })
            .collect();

        let mut header = format!("{NAME_TITLE:<name_width$}");
        for (column, n) in &shown {
            header.push_str(&format!(" {DELIM} {column:<n$}"));
        }
        let separator = "-".repeat(char_len(&header));

        writeln!(w, "{}{header}", self.prefix)?;
        writeln!(w, "{}{separator}", self.prefix)?;

        for field in &self.data.fields {
            let mut name = field.name.as_str();
            let mut pending: Vec<&str> = shown.iter().map(|(c, _)| field.get(c)).collect();

            loop {
                let mut row = format!("{name:<name_width$}");
                let mut more = false;

                for ((_, n), value) in shown.iter().zip(pending.iter_mut()) {
                    let split = split_point(value, limit);
                    let (cell, rest) = value.split_at(split);
                    row.push_str(&format!(" {DELIM} {cell:<n$}"));
                    *value = rest;
                    more |= !rest.is_empty();
                }

                writeln!(w, "{}{row}", self.prefix)?;

                if !more {
                    break;
                }
                name = "";
            }
        }

        writeln!(w, "{}{separator}", self.prefix)
    }
}

impl fmt::Display for AttributeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn cell_text(s: &str) -> String {
    s.trim_end()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace(DELIM, &DELIM_SUBSTITUTE.to_string())
}

/// Byte index where the first chunk of `value` ends when wrapping at
/// `limit` characters.
///
/// A chunk never ends in whitespace: trailing blanks move to the start of
/// the next chunk, where the parser keeps them. A chunk that would be all
/// blanks runs on through the next visible character instead, even past
/// `limit`, since a blank cell reads back as empty.
fn split_point(value: &str, limit: usize) -> usize {
    let Some((idx, _)) = value.char_indices().nth(limit) else {
        return value.len();
    };
    let trimmed = value[..idx].trim_end().len();
    if trimmed > 0 {
        return trimmed;
    }
    value
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(value.len(), |(i, c)| i + c.len_utf8())
}
