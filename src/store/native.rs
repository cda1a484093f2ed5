//!
//! The http.sys URL-ACL store, through `httpapi.dll`.
//!
//! Writing to the store needs an elevated process. Reading works for any user.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;

use windows_sys::Win32::Foundation::LocalFree;
use windows_sys::Win32::Networking::HttpServer::{
    HttpDeleteServiceConfiguration, HttpInitialize, HttpQueryServiceConfiguration,
    HttpServiceConfigQueryNext, HttpServiceConfigUrlAclInfo, HttpSetServiceConfiguration,
    HttpTerminate, HTTPAPI_VERSION, HTTP_INITIALIZE_CONFIG, HTTP_SERVICE_CONFIG_URLACL_KEY,
    HTTP_SERVICE_CONFIG_URLACL_PARAM, HTTP_SERVICE_CONFIG_URLACL_QUERY,
    HTTP_SERVICE_CONFIG_URLACL_SET,
};
use windows_sys::Win32::Security::Authorization::ConvertStringSidToSidW;
use windows_sys::Win32::Security::{LookupAccountSidW, PSID, SID_NAME_USE};

use super::{ConfigStore, QueryNext, UrlAclRecord};
use crate::config::ApiVersion;
use crate::sid::Sid;
use crate::win32::Win32Error;

/// The machine-wide URL reservation store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeStore;

impl NativeStore {
    pub fn new() -> NativeStore {
        NativeStore
    }

    fn write(&self, url: &str, sddl: Option<&str>, delete: bool) -> Result<(), Win32Error> {
        let mut url = wide(url);
        let mut sddl = sddl.map(wide);
        let set = HTTP_SERVICE_CONFIG_URLACL_SET {
            KeyDesc: HTTP_SERVICE_CONFIG_URLACL_KEY { pUrlPrefix: url.as_mut_ptr() },
            ParamDesc: HTTP_SERVICE_CONFIG_URLACL_PARAM {
                pStringSecurityDescriptor: sddl
                    .as_mut()
                    .map_or(ptr::null_mut(), |s| s.as_mut_ptr()),
            },
        };
        let info = &set as *const HTTP_SERVICE_CONFIG_URLACL_SET as *const c_void;
        let len = size_of::<HTTP_SERVICE_CONFIG_URLACL_SET>() as u32;

        // SAFETY: `set` points at NUL-terminated buffers that outlive the call.
        let status = unsafe {
            if delete {
                HttpDeleteServiceConfiguration(
                    ptr::null_mut(),
                    HttpServiceConfigUrlAclInfo,
                    info,
                    len,
                    ptr::null_mut(),
                )
            } else {
                HttpSetServiceConfiguration(
                    ptr::null_mut(),
                    HttpServiceConfigUrlAclInfo,
                    info,
                    len,
                    ptr::null_mut(),
                )
            }
        };
        Win32Error(status).ok()
    }
}

impl ConfigStore for NativeStore {
    fn initialize(&self, version: ApiVersion) -> Result<(), Win32Error> {
        let version = HTTPAPI_VERSION {
            HttpApiMajorVersion: version.major,
            HttpApiMinorVersion: version.minor,
        };
        // SAFETY: plain value arguments; the reserved pointer must be null.
        let status = unsafe { HttpInitialize(version, HTTP_INITIALIZE_CONFIG, ptr::null_mut()) };
        Win32Error(status).ok()
    }

    fn terminate(&self) {
        // SAFETY: paired with a successful `HttpInitialize` by `Session`.
        let status = unsafe { HttpTerminate(HTTP_INITIALIZE_CONFIG, ptr::null_mut()) };
        if status != 0 {
            tracing::warn!(code = %Win32Error(status), "HttpTerminate failed");
        }
    }

    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error> {
        self.write(&record.url, Some(&record.sddl), false)
    }

    fn delete(&self, url: &str) -> Result<(), Win32Error> {
        self.write(url, None, true)
    }

    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error> {
        let query = HTTP_SERVICE_CONFIG_URLACL_QUERY {
            QueryDesc: HttpServiceConfigQueryNext,
            KeyDesc: HTTP_SERVICE_CONFIG_URLACL_KEY { pUrlPrefix: ptr::null_mut() },
            dwToken: token,
        };
        let out_len = u32::try_from(buffer_len).map_err(|_| Win32Error::ERROR_INVALID_PARAMETER)?;
        // u64 cells keep the output block pointer-aligned.
        let mut buffer = vec![0u64; buffer_len.div_ceil(size_of::<u64>())];
        let out = if buffer.is_empty() {
            ptr::null_mut()
        } else {
            buffer.as_mut_ptr() as *mut c_void
        };
        let mut returned = 0u32;

        // SAFETY: `out` is valid for `out_len` bytes, `query` for its size.
        let status = unsafe {
            HttpQueryServiceConfiguration(
                ptr::null_mut(),
                HttpServiceConfigUrlAclInfo,
                &query as *const HTTP_SERVICE_CONFIG_URLACL_QUERY as *const c_void,
                size_of::<HTTP_SERVICE_CONFIG_URLACL_QUERY>() as u32,
                out,
                out_len,
                &mut returned,
                ptr::null_mut(),
            )
        };

        match Win32Error(status) {
            Win32Error::NO_ERROR => {
                if buffer_len < size_of::<HTTP_SERVICE_CONFIG_URLACL_SET>() {
                    return Err(Win32Error::ERROR_INSUFFICIENT_BUFFER);
                }
                // SAFETY: on success the buffer starts with a URLACL_SET whose
                // string pointers point into the same buffer.
                let record = unsafe {
                    let set = &*(buffer.as_ptr() as *const HTTP_SERVICE_CONFIG_URLACL_SET);
                    UrlAclRecord {
                        url: from_wide_ptr(set.KeyDesc.pUrlPrefix),
                        sddl: from_wide_ptr(set.ParamDesc.pStringSecurityDescriptor),
                    }
                };
                Ok(QueryNext::Record(record))
            }
            Win32Error::ERROR_INSUFFICIENT_BUFFER => {
                Ok(QueryNext::InsufficientBuffer { required: returned as usize })
            }
            Win32Error::ERROR_NO_MORE_ITEMS => Ok(QueryNext::NoMoreItems),
            code => Err(code),
        }
    }

    fn account_name(&self, sid: &Sid) -> Option<String> {
        let text = wide(&sid.to_string());
        let mut psid: PSID = ptr::null_mut();
        // SAFETY: `text` is NUL-terminated; on success `psid` is freed by `LocalSid`.
        if unsafe { ConvertStringSidToSidW(text.as_ptr(), &mut psid) } == 0 {
            return None;
        }
        let psid = LocalSid(psid);

        let mut name_len = 0u32;
        let mut domain_len = 0u32;
        let mut kind: SID_NAME_USE = 0;
        // SAFETY: size probe with null buffers, as documented for LookupAccountSidW.
        unsafe {
            LookupAccountSidW(
                ptr::null(),
                psid.0,
                ptr::null_mut(),
                &mut name_len,
                ptr::null_mut(),
                &mut domain_len,
                &mut kind,
            );
        }
        if name_len == 0 {
            tracing::debug!(%sid, "no account name for SID");
            return None;
        }

        let mut name = vec![0u16; name_len as usize];
        let mut domain = vec![0u16; domain_len.max(1) as usize];
        // SAFETY: buffers are sized from the probe above.
        let ok = unsafe {
            LookupAccountSidW(
                ptr::null(),
                psid.0,
                name.as_mut_ptr(),
                &mut name_len,
                domain.as_mut_ptr(),
                &mut domain_len,
                &mut kind,
            )
        };
        if ok == 0 {
            return None;
        }

        let name = String::from_utf16_lossy(&name[..name_len as usize]);
        let domain = String::from_utf16_lossy(&domain[..domain_len as usize]);
        Some(if domain.is_empty() { name } else { format!("{}\\{}", domain, name) })
    }
}

/// A SID allocated by `ConvertStringSidToSidW`.
struct LocalSid(PSID);

impl Drop for LocalSid {
    fn drop(&mut self) {
        // SAFETY: the pointer came from LocalAlloc inside ConvertStringSidToSidW.
        unsafe {
            LocalFree(self.0);
        }
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Reads a NUL-terminated UTF-16 string.
///
/// # Safety
/// `p` must be null or point to a NUL-terminated UTF-16 string.
unsafe fn from_wide_ptr(p: *const u16) -> String {
    if p.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *p.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(p, len))
}
