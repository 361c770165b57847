//! Path variables of the synchronization traversal.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Immutable set of path variables.
///
/// Each traversal level extends the context of its parent with
/// [`with`](Self::with); the parent is never modified, so a variable set
/// for one board is gone as soon as the traversal returns from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    vars: Arc<BTreeMap<String, String>>,
}

impl PathContext {
    /// Root context of a remote.
    #[must_use]
    pub fn new(remote: &str, dest_dir: &str) -> Self {
        Self::default()
            .with("Remote", remote)
            .with("DestDir", dest_dir)
    }

    /// Copy of this context with `name` set to `value`.
    #[must_use]
    pub fn with(&self, name: &str, value: impl Into<String>) -> Self {
        let mut vars = (*self.vars).clone();
        vars.insert(name.to_string(), value.into());
        Self {
            vars: Arc::new(vars),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Fill the `{Var}` placeholders of `template`.
    ///
    /// `{{` and `}}` stand for literal braces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown variable or an unclosed
    /// placeholder.
    pub fn expand(&self, template: &str) -> Result<PathBuf> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(Error::Config(format!(
                            "unclosed placeholder in path template {template:?}"
                        )));
                    }
                    let value = self.get(&name).ok_or_else(|| {
                        Error::Config(format!(
                            "unknown variable {{{name}}} in path template {template:?}"
                        ))
                    })?;
                    out.push_str(value);
                }
                c => out.push(c),
            }
        }

        Ok(PathBuf::from(out))
    }
}

/// Make a remote name usable as one path component.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let ctx = PathContext::new("work", "/mail")
            .with("BoardName", "Team")
            .with("BoardID", "7");
        assert_eq!(
            ctx.expand("{DestDir}/boards/{BoardName} ({BoardID})").unwrap(),
            PathBuf::from("/mail/boards/Team (7)")
        );
        assert_eq!(ctx.expand("{{x}}").unwrap(), PathBuf::from("{x}"));
    }

    #[test]
    fn test_with_leaves_parent_untouched() {
        let root = PathContext::new("work", "/mail");
        let board = root.with("BoardName", "Team");
        assert_eq!(board.get("BoardName"), Some("Team"));
        assert_eq!(root.get("BoardName"), None);
        assert!(root.expand("{BoardName}").is_err());
    }

    #[test]
    fn test_unknown_and_unclosed() {
        let ctx = PathContext::new("work", "/mail");
        assert!(matches!(ctx.expand("{Nope}/x"), Err(Error::Config(_))));
        assert!(matches!(ctx.expand("/x/{DestDir"), Err(Error::Config(_))));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Sprint 1/2: Q3"), "Sprint 1_2_ Q3");
        assert_eq!(sanitize("../etc"), "_etc");
        assert_eq!(sanitize("  "), "_");
    }
}
