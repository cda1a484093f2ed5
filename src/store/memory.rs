//!
//! In-process URL-ACL store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{query_slice, same_url, ConfigStore, QueryNext, UrlAclRecord};
use crate::config::ApiVersion;
use crate::win32::Win32Error;

/// Keeps records in memory and answers with the same status codes and
/// buffer-size protocol as http.sys.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<UrlAclRecord>>,
    sessions: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = UrlAclRecord>) -> MemoryStore {
        MemoryStore { records: Mutex::new(records.into_iter().collect()), sessions: AtomicUsize::new(0) }
    }

    /// Copy of the stored records in enumeration order.
    pub fn records(&self) -> Vec<UrlAclRecord> {
        self.lock().clone()
    }

    /// Number of sessions opened and not yet terminated.
    pub fn open_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UrlAclRecord>> {
        // A poisoned list is still a consistent list of records.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryStore {
    fn initialize(&self, _version: ApiVersion) -> Result<(), Win32Error> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn terminate(&self) {
        self.sessions.fetch_sub(1, Ordering::SeqCst);
    }

    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error> {
        let mut records = self.lock();
        if records.iter().any(|r| same_url(&r.url, &record.url)) {
            return Err(Win32Error::ERROR_ALREADY_EXISTS);
        }
        records.push(record.clone());
        Ok(())
    }

    fn delete(&self, url: &str) -> Result<(), Win32Error> {
        let mut records = self.lock();
        let index = records
            .iter()
            .position(|r| same_url(&r.url, url))
            .ok_or(Win32Error::ERROR_FILE_NOT_FOUND)?;
        records.remove(index);
        Ok(())
    }

    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error> {
        Ok(query_slice(&self.lock(), token, buffer_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_delete_status_codes() {
        let store = MemoryStore::new();
        let record = UrlAclRecord::new("http://+:8080/", "D:(A;;GX;;;WD)");
        assert_eq!(store.set(&record), Ok(()));
        assert_eq!(
            store.set(&UrlAclRecord::new("HTTP://+:8080/", "D:")),
            Err(Win32Error::ERROR_ALREADY_EXISTS)
        );
        assert_eq!(store.delete("http://+:8080/"), Ok(()));
        assert_eq!(store.delete("http://+:8080/"), Err(Win32Error::ERROR_FILE_NOT_FOUND));
    }

    #[test]
    fn test_session_counting() {
        let store = MemoryStore::new();
        store.initialize(ApiVersion::V1).unwrap();
        assert_eq!(store.open_sessions(), 1);
        store.terminate();
        assert_eq!(store.open_sessions(), 0);
    }
}
