//! Recovery parser for rendered attribute tables.
//!
//! The parser is fed one line at a time by the record reader, after quote
//! markers and the `#` line prefix have been stripped. It recognises the
//! header row, the separator below it, field rows, continuation rows and
//! the closing separator.

use super::{AttributeTable, DEFAULT_COLUMN_WIDTH, DELIM};

/// Malformed table text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The row below the header is not a separator.
    #[error("Unexpected header (line={line})")]
    UnexpectedHeader { line: usize },

    /// A body row has no column delimiter.
    #[error("Unexpected line format (line={line})")]
    UnexpectedLine { line: usize },
}

/// Line-driven table parser.
///
/// ```
/// use jiramail::table::TableParser;
///
/// let mut parser = TableParser::new();
/// for line in ["   | Current", "------------", "Status | Open", "------------"] {
///     if !parser.scan(line) {
///         break;
///     }
/// }
/// assert!(parser.error().is_none());
/// let table = parser.finish().unwrap();
/// assert_eq!(table.get("Status", "Current"), "Open");
/// ```
#[derive(Debug, Default)]
pub struct TableParser {
    lines: usize,
    closed: bool,
    error: Option<TableError>,
    columns: Vec<String>,
    table: Option<AttributeTable>,
    last: Option<String>,
}

impl TableParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line.
    ///
    /// Returns `false` once the parser accepts no further input: either the
    /// closing separator was seen or the text is malformed, in which case
    /// [`error`](Self::error) is set.
    pub fn scan(&mut self, line: &str) -> bool {
        if self.closed {
            return false;
        }

        let line = line.trim();
        if line.is_empty() {
            return true;
        }

        self.lines += 1;

        match self.lines {
            1 => {
                if !line.contains(DELIM) {
                    // Not a table (yet): forget the line.
                    self.lines = 0;
                    return true;
                }
                self.columns = line
                    .split(DELIM)
                    .enumerate()
                    .skip(1)
                    .map(|(i, name)| {
                        let name = name.trim();
                        if name.is_empty() {
                            i.to_string()
                        } else {
                            name.to_string()
                        }
                    })
                    .collect();
                self.table = Some(AttributeTable::new().with_column_width(DEFAULT_COLUMN_WIDTH));
                true
            }
            2 => {
                if is_separator(line) {
                    true
                } else {
                    self.fail(TableError::UnexpectedHeader { line: self.lines })
                }
            }
            _ => {
                if is_separator(line) {
                    self.closed = true;
                    return false;
                }
                if !line.contains(DELIM) {
                    return self.fail(TableError::UnexpectedLine { line: self.lines });
                }
                self.row(line);
                true
            }
        }
    }

    fn row(&mut self, line: &str) {
        let mut segments = line.split(DELIM);
        let name = segments.next().unwrap_or_default().trim();

        let cells: Vec<(&str, &str)> = self
            .columns
            .iter()
            .map(String::as_str)
            .zip(segments.map(cell).chain(std::iter::repeat("")))
            .collect();

        let Some(table) = self.table.as_mut() else {
            return;
        };

        if name.is_empty() {
            let Some(last) = self.last.as_deref() else {
                return;
            };
            for (column, value) in cells {
                if value.is_empty() {
                    continue;
                }
                let joined = format!("{}{value}", table.get(last, column));
                table.set(last, column, joined);
            }
        } else if table.field(name).is_none() {
            table.set_columns(name, cells);
            self.last = Some(name.to_string());
        } else {
            self.last = None;
        }
    }

    fn fail(&mut self, error: TableError) -> bool {
        self.error = Some(error);
        self.closed = true;
        false
    }

    /// The format error that stopped parsing, if any.
    #[must_use]
    pub fn error(&self) -> Option<&TableError> {
        self.error.as_ref()
    }

    /// The table built so far, if a header row was seen.
    #[must_use]
    pub fn table(&self) -> Option<&AttributeTable> {
        self.table.as_ref()
    }

    /// Consume the parser and return the recovered table.
    #[must_use]
    pub fn finish(self) -> Option<AttributeTable> {
        self.table
    }
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| c == '-' || c.is_whitespace())
}

/// Cell text of one segment: the single space after the delimiter is part
/// of the layout, trailing blanks are padding.
fn cell(segment: &str) -> &str {
    segment.strip_prefix(' ').unwrap_or(segment).trim_end()
}
