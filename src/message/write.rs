//! Record serialization.

use std::io::Write;

use super::{FINAL_COLUMNS, Headers, Mail, TABLE_END, TABLE_START};
use crate::table::AttributeTable;

const TABLE_NOTICE: &str = "# This block will be automatically deleted from the text.";

/// Render `mail` the way it is stored: every table column shown as
/// `Previous | Diff | Current`, values wrapped at `column_width`.
#[must_use]
pub fn render_mail(mail: &Mail, column_width: usize) -> String {
    let table = mail.table.as_ref().map(|t| {
        t.with_display_columns(FINAL_COLUMNS)
            .with_column_width(column_width)
    });
    render_parts(&mail.headers, table.as_ref(), &mail.body)
}

/// Write `mail` to `w` in its stored form.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_mail<W: Write>(w: &mut W, mail: &Mail, column_width: usize) -> std::io::Result<()> {
    w.write_all(render_mail(mail, column_width).as_bytes())
}

/// Header block, table block and body.
///
/// Shared by [`render_mail`] and the checksum, which renders a narrowed
/// copy of the table.
pub(super) fn render_parts(
    headers: &Headers,
    table: Option<&AttributeTable>,
    body: &[String],
) -> String {
    let mut out = String::new();

    for (name, value) in headers.iter() {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');

    out.push_str(TABLE_START);
    out.push('\n');
    out.push_str(TABLE_NOTICE);
    out.push('\n');
    if let Some(table) = table.filter(|t| !t.is_empty()) {
        out.push_str("#\n");
        out.push_str(&table.with_prefix("# ").render());
        out.push_str("#\n");
    }
    out.push_str(TABLE_END);
    out.push_str("\n\n");

    for line in body {
        out.push_str(line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CURRENT_COLUMN, DIFF_COLUMN, PREVIOUS_COLUMN};

    fn sample() -> Mail {
        let mut mail = Mail::with_table();
        mail.headers.set("Subject", "[PRJ-1] Login fails");
        mail.headers.set("Message-Id", "<x@issue.jira>");
        mail.headers.add("Cc", "a <a@example.com>");
        mail.headers.add("Cc", "b <b@example.com>");
        mail.set_current("Status", "Open");
        mail.body = vec!["first".into(), String::new(), "third".into()];
        mail
    }

    #[test]
    fn test_render_layout() {
        let text = render_mail(&sample(), 55);
        let expected = "\
Cc: a <a@example.com>
Cc: b <b@example.com>
Message-Id: <x@issue.jira>
Subject: [PRJ-1] Login fails

{{{ jira
# This block will be automatically deleted from the text.
#
# Name   | Current
# ----------------
# Status | Open   \n\
# ----------------
#
}}}

first

third
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_without_table_rows() {
        let mut mail = sample();
        mail.table = None;
        let text = render_mail(&mail, 55);
        assert!(text.contains("{{{ jira\n# This block will be automatically deleted from the text.\n}}}\n\n"));
    }

    #[test]
    fn test_render_uses_final_columns_in_order() {
        let mut mail = sample();
        let table = mail.table.as_mut().unwrap();
        table.set("Status", DIFF_COLUMN, "!");
        table.set("Status", PREVIOUS_COLUMN, "New");

        let text = render_mail(&mail, 55);
        assert!(text.contains(&format!(
            "# Name   | {PREVIOUS_COLUMN} | {DIFF_COLUMN} | {CURRENT_COLUMN}\n"
        )));
        assert!(text.contains("# Status | New      | !    | Open   \n"));
    }

    #[test]
    fn test_write_mail_matches_render() {
        let mail = sample();
        let mut buf = Vec::new();
        write_mail(&mut buf, &mail, 55).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), render_mail(&mail, 55));
    }
}
