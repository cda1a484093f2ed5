//!
//! Win32 status codes returned by the HTTP Server API configuration functions.

use std::fmt;

/// A raw Win32 error code as returned by `httpapi.dll`.
///
/// The configuration functions return the code directly instead of going
/// through `GetLastError`, so a value of `NO_ERROR` means success.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Win32Error(pub u32);

impl Win32Error {
    pub const NO_ERROR: Win32Error = Win32Error(0);
    pub const ERROR_FILE_NOT_FOUND: Win32Error = Win32Error(2);
    pub const ERROR_ACCESS_DENIED: Win32Error = Win32Error(5);
    pub const ERROR_INVALID_PARAMETER: Win32Error = Win32Error(87);
    pub const ERROR_INSUFFICIENT_BUFFER: Win32Error = Win32Error(122);
    pub const ERROR_ALREADY_EXISTS: Win32Error = Win32Error(183);
    pub const ERROR_NO_MORE_ITEMS: Win32Error = Win32Error(259);

    #[inline]
    pub fn code(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::NO_ERROR
    }

    /// Converts a raw status into `Ok(())` for `NO_ERROR`, `Err(self)` otherwise.
    #[inline]
    pub fn ok(self) -> Result<(), Win32Error> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Human readable text for the code.
    ///
    /// On Windows the text comes from the system message table. Elsewhere only
    /// the codes the URL-ACL store produces have a fixed description.
    #[cfg(windows)]
    pub fn message(self) -> String {
        std::io::Error::from_raw_os_error(self.0 as i32).to_string()
    }

    #[cfg(not(windows))]
    pub fn message(self) -> String {
        match self {
            Self::NO_ERROR => "The operation completed successfully.".to_string(),
            Self::ERROR_FILE_NOT_FOUND => "The system cannot find the file specified.".to_string(),
            Self::ERROR_ACCESS_DENIED => "Access is denied.".to_string(),
            Self::ERROR_INVALID_PARAMETER => "The parameter is incorrect.".to_string(),
            Self::ERROR_INSUFFICIENT_BUFFER => {
                "The data area passed to a system call is too small.".to_string()
            }
            Self::ERROR_ALREADY_EXISTS => {
                "Cannot create a file when that file already exists.".to_string()
            }
            Self::ERROR_NO_MORE_ITEMS => "No more data is available.".to_string(),
            Win32Error(code) => format!("Win32 error {}", code),
        }
    }
}

impl fmt::Display for Win32Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.0)
    }
}

impl From<u32> for Win32Error {
    fn from(code: u32) -> Self {
        Win32Error(code)
    }
}
