//! Keyed maildir store.
//!
//! Records live in a standard maildir (`tmp/`, `new/`, `cur/`). The file
//! name of a record is its key (the Message-Id without angle brackets);
//! names under `cur/` additionally carry the `:2,<flags>` info suffix.
//!
//! Writes are two-phase: a [`Delivery`] is written and fsynced under
//! `tmp/`, then [`Maildir::publish`] removes the previous copy and renames
//! the delivery to its final name. A reader never sees a partial record.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

const TMP: &str = "tmp";
const NEW: &str = "new";
const CUR: &str = "cur";

/// Separator between the key and the info part of a `cur/` file name.
const INFO_SEPARATOR: &str = ":2,";

/// Temporary deliveries older than this are removed by [`Maildir::clean`].
const STALE_TMP_AGE: Duration = Duration::from_secs(36 * 60 * 60);

/// A maildir directory.
#[derive(Debug, Clone)]
pub struct Maildir {
    root: PathBuf,
}

impl Maildir {
    /// Open the maildir at `path`, creating it (and its parents) if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotMaildir`] if `path` exists but is not a
    /// directory, or an I/O error if the directories cannot be created.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::NotMaildir {
                    path: path.to_path_buf(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "creating maildir");
            }
            Err(e) => return Err(e.into()),
        }

        for sub in [TMP, NEW, CUR] {
            fs::create_dir_all(path.join(sub))?;
        }

        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Every stored file of `key`, across `new/` and `cur/`.
    fn find(&self, key: &str) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for sub in [NEW, CUR] {
            for entry in fs::read_dir(self.root.join(sub))? {
                let entry = entry?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                if split_name(name).0 == key {
                    found.push(entry.path());
                }
            }
        }
        Ok(found)
    }

    /// Path of the stored record `key`.
    ///
    /// Returns `Ok(None)` when there is no such record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousRecord`] when more than one file carries
    /// the key, or an I/O error.
    pub fn lookup(&self, key: &str) -> Result<Option<PathBuf>> {
        let mut found = self.find(key)?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => Err(Error::AmbiguousRecord {
                id: key.to_string(),
                count,
                path: self.root.clone(),
            }),
        }
    }

    /// Flags of the stored record `key`: `Some("")` for a record in `new/`.
    ///
    /// # Errors
    ///
    /// See [`lookup`](Self::lookup).
    pub fn flags(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lookup(key)?.map(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| split_name(n).1.to_string())
                .unwrap_or_default()
        }))
    }

    /// Keys of every stored record, sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be read.
    pub fn identities(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for sub in [NEW, CUR] {
            for entry in fs::read_dir(self.root.join(sub))? {
                let entry = entry?;
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') {
                        keys.push(split_name(name).0.to_string());
                    }
                }
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Remove the stored record `key`. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// See [`lookup`](Self::lookup).
    pub fn purge(&self, key: &str) -> Result<bool> {
        match self.lookup(key)? {
            Some(path) => {
                fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Start a new delivery for `key` under `tmp/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for keys that cannot be file
    /// names, or an I/O error.
    pub fn deliver(&self, key: &str) -> Result<Delivery> {
        validate_key(key)?;
        let tmp = self
            .root
            .join(TMP)
            .join(format!("{}.{}", Uuid::new_v4().simple(), std::process::id()));
        let file = File::options().write(true).create_new(true).open(&tmp)?;
        Ok(Delivery {
            key: key.to_string(),
            tmp,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Finish `delivery` as the stored copy of `key`.
    ///
    /// The previous copy is removed. A copy from `cur/` keeps its flags,
    /// except `S` (seen): an updated record shows up as unread. Otherwise
    /// the record lands in `new/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery cannot be synced or renamed, or
    /// the previous copy is ambiguous. The temporary file is removed in
    /// that case.
    pub fn publish(&self, delivery: Delivery) -> Result<PathBuf> {
        let previous = self.lookup(&delivery.key)?;

        let key = delivery.key.clone();
        let tmp = delivery.close()?;

        let dest = match previous.as_deref().and_then(|p| self.cur_flags(p)) {
            Some(flags) => self
                .root
                .join(CUR)
                .join(format!("{key}{INFO_SEPARATOR}{}", flags.replace('S', ""))),
            None => self.root.join(NEW).join(&key),
        };

        if let Err(e) = self.purge(&key) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &dest) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(key = %key, path = %dest.display(), "published");
        Ok(dest)
    }

    /// Flags of a stored file, if it lives in `cur/`.
    fn cur_flags(&self, path: &Path) -> Option<String> {
        if path.parent() != Some(self.root.join(CUR).as_path()) {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        Some(split_name(name).1.to_string())
    }

    /// Replace the content of the stored record `key` in place.
    ///
    /// Returns `false` if there is no such record.
    ///
    /// # Errors
    ///
    /// See [`lookup`](Self::lookup).
    pub fn rewrite(&self, key: &str, content: &str) -> Result<bool> {
        let Some(path) = self.lookup(key)? else {
            return Ok(false);
        };

        let mut delivery = self.deliver(key)?;
        delivery.write_all(content.as_bytes())?;
        let tmp = delivery.close()?;

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Remove temporary deliveries left behind by interrupted runs.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if `tmp/` cannot be read.
    pub fn clean(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(self.root.join(TMP))? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age > STALE_TMP_AGE {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(path = %self.root.display(), removed, "cleaned stale deliveries");
        }
        Ok(removed)
    }
}

/// A record being written under `tmp/`.
///
/// Dropping an unfinished delivery removes its temporary file.
#[derive(Debug)]
pub struct Delivery {
    key: String,
    tmp: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl Delivery {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Discard the delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be removed.
    pub fn abort(mut self) -> Result<()> {
        self.writer = None;
        match fs::remove_file(&self.tmp) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Flush and fsync, returning the temporary path. Aborts on failure.
    fn close(mut self) -> Result<PathBuf> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(std::mem::take(&mut self.tmp));
        };
        let synced = writer
            .flush()
            .and_then(|()| writer.get_ref().sync_all());
        drop(writer);

        if let Err(e) = synced {
            let _ = fs::remove_file(&self.tmp);
            return Err(e.into());
        }

        // Finished: keep the file past drop.
        Ok(std::mem::take(&mut self.tmp))
    }
}

impl Write for Delivery {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => w.write(buf),
            None => Err(io::Error::other("delivery is closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.tmp.as_os_str().is_empty() {
            self.writer = None;
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// `(key, flags)` of a stored file name.
fn split_name(name: &str) -> (&str, &str) {
    name.split_once(INFO_SEPARATOR).unwrap_or((name, ""))
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\', ':', '\0']) {
        return Err(Error::InvalidArgument(format!(
            "{key:?} cannot be used as a maildir key"
        )));
    }
    Ok(())
}
