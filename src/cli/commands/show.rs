//! Show command implementation.

use crate::error::Result;
use crate::message::{CURRENT_COLUMN, DIFF_COLUMN, FINAL_COLUMNS, Mail, PREVIOUS_COLUMN};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
struct FieldOutput<'a> {
    name: &'a str,
    previous: &'a str,
    diff: &'a str,
    current: &'a str,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    headers: BTreeMap<&'a str, Vec<&'a str>>,
    fields: Vec<FieldOutput<'a>>,
    body: &'a [String],
}

impl<'a> ShowOutput<'a> {
    fn new(mail: &'a Mail) -> Self {
        let mut headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, value) in mail.headers.iter() {
            headers.entry(name).or_default().push(value);
        }

        let fields = mail
            .table
            .iter()
            .flat_map(|t| t.fields())
            .map(|f| FieldOutput {
                name: &f.name,
                previous: f.get(PREVIOUS_COLUMN),
                diff: f.get(DIFF_COLUMN),
                current: f.get(CURRENT_COLUMN),
            })
            .collect();

        Self {
            headers,
            fields,
            body: &mail.body,
        }
    }
}

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid record.
pub fn execute(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let layout = super::load_layout(config_path)?;
    let mail = layout.read_file(file)?;

    if json {
        println!("{}", serde_json::to_string(&ShowOutput::new(&mail))?);
        return Ok(());
    }

    for (name, value) in mail.headers.iter() {
        println!("{}: {value}", name.bold());
    }

    if let Some(table) = mail.table.as_ref().filter(|t| !t.is_empty()) {
        println!();
        let table = table
            .with_display_columns(FINAL_COLUMNS)
            .with_column_width(layout.column_width);
        print!("{}", table.render());
    }
    Ok(())
}
