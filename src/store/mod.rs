//!
//! The URL-ACL configuration store abstraction.
//!
//! [`ConfigStore`] is the contract of the native HTTP Server API for the
//! `HttpServiceConfigUrlAclInfo` record kind: set, delete and "query next"
//! calls that answer with Win32 status codes. The client builds reservations
//! on top of it. The status-code protocol is kept as is, including the
//! insufficient-buffer and no-more-items signals used for paging, so every
//! implementation behaves like http.sys does.

use crate::config::ApiVersion;
use crate::sid::Sid;
use crate::win32::Win32Error;

pub mod file;
pub mod memory;

#[cfg(windows)]
pub mod native;

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use file::FileStore;
pub use memory::MemoryStore;

#[cfg(windows)]
pub use native::NativeStore;

/// A raw URL-ACL record: URL prefix and its SDDL string.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UrlAclRecord {
    pub url: String,
    pub sddl: String,
}

impl UrlAclRecord {
    pub fn new(url: impl Into<String>, sddl: impl Into<String>) -> UrlAclRecord {
        UrlAclRecord { url: url.into(), sddl: sddl.into() }
    }

    /// Size in bytes of the output block the native query fills for this record.
    pub fn native_size(&self) -> usize {
        record_size(&self.url, &self.sddl)
    }
}

/// Answer of a "query next" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNext {
    Record(UrlAclRecord),
    /// The output buffer was too small; `required` bytes are needed.
    InsufficientBuffer { required: usize },
    NoMoreItems,
}

/// Byte length of an `HTTP_SERVICE_CONFIG_URLACL_SET` output block:
/// two string pointers followed by both NUL-terminated UTF-16 strings.
pub fn record_size(url: &str, sddl: &str) -> usize {
    let utf16_len = |s: &str| (s.encode_utf16().count() + 1) * std::mem::size_of::<u16>();
    2 * std::mem::size_of::<usize>() + utf16_len(url) + utf16_len(sddl)
}

/// URL prefixes are matched without regard to case, as http.sys does.
pub fn same_url(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Primitive operations of the URL-ACL configuration store.
pub trait ConfigStore {
    /// Opens an API session. Paired with [`ConfigStore::terminate`].
    fn initialize(&self, _version: ApiVersion) -> Result<(), Win32Error> {
        Ok(())
    }

    fn terminate(&self) {}

    /// Inserts a record. Fails with `ERROR_ALREADY_EXISTS` when the URL is taken.
    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error>;

    /// Removes the record for `url`. Fails with `ERROR_FILE_NOT_FOUND` when absent.
    fn delete(&self, url: &str) -> Result<(), Win32Error>;

    /// Reads the record at position `token` into a buffer of `buffer_len` bytes.
    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error>;

    /// Account name (`DOMAIN\name`) for a SID, when the store can resolve one.
    fn account_name(&self, _sid: &Sid) -> Option<String> {
        None
    }
}

impl<S: ConfigStore + ?Sized> ConfigStore for &S {
    fn initialize(&self, version: ApiVersion) -> Result<(), Win32Error> {
        (**self).initialize(version)
    }

    fn terminate(&self) {
        (**self).terminate()
    }

    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error> {
        (**self).set(record)
    }

    fn delete(&self, url: &str) -> Result<(), Win32Error> {
        (**self).delete(url)
    }

    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error> {
        (**self).query_next(token, buffer_len)
    }

    fn account_name(&self, sid: &Sid) -> Option<String> {
        (**self).account_name(sid)
    }
}

impl<S: ConfigStore + ?Sized> ConfigStore for Box<S> {
    fn initialize(&self, version: ApiVersion) -> Result<(), Win32Error> {
        (**self).initialize(version)
    }

    fn terminate(&self) {
        (**self).terminate()
    }

    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error> {
        (**self).set(record)
    }

    fn delete(&self, url: &str) -> Result<(), Win32Error> {
        (**self).delete(url)
    }

    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error> {
        (**self).query_next(token, buffer_len)
    }

    fn account_name(&self, sid: &Sid) -> Option<String> {
        (**self).account_name(sid)
    }
}

/// Shared "query next" answer for stores that keep their records in a list.
pub(crate) fn query_slice(
    records: &[UrlAclRecord],
    token: u32,
    buffer_len: usize,
) -> QueryNext {
    match records.get(token as usize) {
        None => QueryNext::NoMoreItems,
        Some(record) => {
            let required = record.native_size();
            if buffer_len < required {
                QueryNext::InsufficientBuffer { required }
            } else {
                QueryNext::Record(record.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size_counts_utf16_and_terminators() {
        let header = 2 * std::mem::size_of::<usize>();
        assert_eq!(record_size("", ""), header + 4);
        assert_eq!(record_size("http://+:80/", "D:"), header + (12 + 1) * 2 + (2 + 1) * 2);
        // Non-BMP characters take two UTF-16 units.
        assert_eq!(record_size("\u{1F600}", ""), header + 3 * 2 + 2);
    }

    #[test]
    fn test_query_slice_protocol() {
        let records = vec![UrlAclRecord::new("http://+:80/", "D:(A;;GX;;;WD)")];
        let required = records[0].native_size();
        assert_eq!(query_slice(&records, 0, 0), QueryNext::InsufficientBuffer { required });
        assert_eq!(query_slice(&records, 0, required), QueryNext::Record(records[0].clone()));
        assert_eq!(query_slice(&records, 1, required), QueryNext::NoMoreItems);
    }
}
