//!
//! URL-ACL store backed by a JSON file.
//!
//! Useful for staging reservations on a machine without http.sys, or for
//! keeping a reviewed copy of a host's reservations next to its deployment.
//! The file holds a JSON array of `{ "url": ..., "sddl": ... }` objects in
//! enumeration order.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{query_slice, same_url, ConfigStore, QueryNext, UrlAclRecord};
use crate::win32::Win32Error;

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> FileStore {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all records. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<UrlAclRecord>, Win32Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_status(&self.path, &e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "store file is not valid JSON");
            Win32Error::ERROR_INVALID_PARAMETER
        })
    }

    /// Writes the records through a sibling temp file and a rename.
    fn save(&self, records: &[UrlAclRecord]) -> Result<(), Win32Error> {
        let json = serde_json::to_string_pretty(records).map_err(|e| {
            tracing::warn!(error = %e, "failed to encode store records");
            Win32Error::ERROR_INVALID_PARAMETER
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| io_status(&self.path, &e))
    }
}

fn io_status(path: &Path, err: &io::Error) -> Win32Error {
    tracing::warn!(path = %path.display(), error = %err, "store file I/O failed");
    match err.kind() {
        io::ErrorKind::PermissionDenied => Win32Error::ERROR_ACCESS_DENIED,
        io::ErrorKind::NotFound => Win32Error::ERROR_FILE_NOT_FOUND,
        _ => os_status(err).unwrap_or(Win32Error::ERROR_INVALID_PARAMETER),
    }
}

/// On Windows the OS error already is a Win32 code.
#[cfg(windows)]
fn os_status(err: &io::Error) -> Option<Win32Error> {
    err.raw_os_error().map(|code| Win32Error(code as u32))
}

/// Elsewhere it is an errno, which has no Win32 meaning.
#[cfg(not(windows))]
fn os_status(_err: &io::Error) -> Option<Win32Error> {
    None
}

impl ConfigStore for FileStore {
    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error> {
        let mut records = self.load()?;
        if records.iter().any(|r| same_url(&r.url, &record.url)) {
            return Err(Win32Error::ERROR_ALREADY_EXISTS);
        }
        records.push(record.clone());
        self.save(&records)
    }

    fn delete(&self, url: &str) -> Result<(), Win32Error> {
        let mut records = self.load()?;
        let index = records
            .iter()
            .position(|r| same_url(&r.url, url))
            .ok_or(Win32Error::ERROR_FILE_NOT_FOUND)?;
        records.remove(index);
        self.save(&records)
    }

    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error> {
        Ok(query_slice(&self.load()?, token, buffer_len))
    }
}
