//!
//! Pairs `HttpInitialize` with `HttpTerminate` for the lifetime of one operation.

use crate::config::ApiVersion;
use crate::store::ConfigStore;
use crate::win32::Win32Error;

/// An open configuration session on a store. Dropping it terminates the session.
#[must_use = "the session closes as soon as it is dropped"]
pub struct Session<'a, S: ConfigStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ConfigStore + ?Sized> Session<'a, S> {
    pub fn open(store: &'a S, version: ApiVersion) -> Result<Session<'a, S>, Win32Error> {
        store.initialize(version).map_err(|code| {
            tracing::debug!(%code, %version, "HTTP Server API initialization failed");
            code
        })?;
        Ok(Session { store })
    }

    pub fn store(&self) -> &'a S {
        self.store
    }
}

impl<S: ConfigStore + ?Sized> Drop for Session<'_, S> {
    fn drop(&mut self) {
        self.store.terminate();
    }
}
