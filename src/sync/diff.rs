//! One level of attribute history.

use crate::message::{CURRENT_COLUMN, DIFF_COLUMN, DIFF_MARK, Mail, PREVIOUS_COLUMN};

/// Carry the stored values of `previous` into `new`.
///
/// For every field of the stored table, its current value becomes the
/// `Previous` value of `new`, and `Diff` is marked when the value changed.
/// Fields that only exist in `new` are left without history. Only `new`
/// is modified.
pub fn apply_history(new: &mut Mail, previous: &Mail) {
    let (Some(table), Some(old)) = (new.table.as_mut(), previous.table.as_ref()) else {
        return;
    };

    for field in old.fields() {
        let before = field.get(CURRENT_COLUMN);
        if table.get(&field.name, CURRENT_COLUMN) != before {
            table.set(&field.name, DIFF_COLUMN, DIFF_MARK);
        }
        table.set(&field.name, PREVIOUS_COLUMN, before);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(fields: &[(&str, &str)]) -> Mail {
        let mut mail = Mail::with_table();
        for (name, value) in fields {
            mail.set_current(name, value);
        }
        mail
    }

    #[test]
    fn test_changed_field_is_marked() {
        let previous = mail(&[("Status", "Open"), ("Priority", "Major")]);
        let mut new = mail(&[("Status", "Closed"), ("Priority", "Major")]);
        apply_history(&mut new, &previous);

        let table = new.table.as_ref().unwrap();
        assert_eq!(table.get("Status", PREVIOUS_COLUMN), "Open");
        assert_eq!(table.get("Status", DIFF_COLUMN), DIFF_MARK);
        assert_eq!(table.get("Status", CURRENT_COLUMN), "Closed");
        assert_eq!(table.get("Priority", PREVIOUS_COLUMN), "Major");
        assert_eq!(table.get("Priority", DIFF_COLUMN), "");
    }

    #[test]
    fn test_removed_field_keeps_previous_value() {
        let previous = mail(&[("Resolution", "Fixed")]);
        let mut new = mail(&[("Status", "Open")]);
        apply_history(&mut new, &previous);

        let table = new.table.as_ref().unwrap();
        assert_eq!(table.get("Resolution", PREVIOUS_COLUMN), "Fixed");
        assert_eq!(table.get("Resolution", DIFF_COLUMN), DIFF_MARK);
        assert_eq!(table.get("Resolution", CURRENT_COLUMN), "");
        // new-only fields get no history
        assert_eq!(table.get("Status", PREVIOUS_COLUMN), "");
        assert_eq!(table.get("Status", DIFF_COLUMN), "");
    }

    #[test]
    fn test_previous_is_not_modified() {
        let previous = mail(&[("Status", "Open")]);
        let snapshot = previous.clone();
        let mut new = mail(&[("Status", "Closed")]);
        apply_history(&mut new, &previous);
        assert_eq!(previous, snapshot);
    }

    #[test]
    fn test_records_without_tables() {
        let previous = Mail::new();
        let mut new = mail(&[("Status", "Open")]);
        let before = new.clone();
        apply_history(&mut new, &previous);
        assert_eq!(new, before);

        let mut bare = Mail::new();
        apply_history(&mut bare, &mail(&[("Status", "Open")]));
        assert!(bare.table.is_none());
    }
}
