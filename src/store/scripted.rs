//!
//! A store wrapper that records calls and can inject failures, for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ConfigStore, MemoryStore, QueryNext, UrlAclRecord};
use crate::config::ApiVersion;
use crate::sid::Sid;
use crate::win32::Win32Error;

/// A call seen by [`ScriptedStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initialize(ApiVersion),
    Terminate,
    Set(UrlAclRecord),
    Delete(String),
    QueryNext { token: u32, buffer_len: usize },
}

/// Forwards to a [`MemoryStore`] unless a scripted answer is queued.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    calls: Mutex<Vec<Call>>,
    init_failures: Mutex<VecDeque<Win32Error>>,
    set_failures: Mutex<VecDeque<Win32Error>>,
    delete_failures: Mutex<VecDeque<Win32Error>>,
    query_answers: Mutex<VecDeque<Result<QueryNext, Win32Error>>>,
    accounts: Mutex<Vec<(Sid, String)>>,
}

impl ScriptedStore {
    pub fn new(inner: MemoryStore) -> ScriptedStore {
        ScriptedStore { inner, ..Default::default() }
    }

    pub fn fail_initialize(&self, code: Win32Error) {
        self.init_failures.lock().unwrap().push_back(code);
    }

    pub fn fail_set(&self, code: Win32Error) {
        self.set_failures.lock().unwrap().push_back(code);
    }

    pub fn fail_delete(&self, code: Win32Error) {
        self.delete_failures.lock().unwrap().push_back(code);
    }

    /// Queues an answer returned by the next `query_next` call instead of the inner store's.
    pub fn answer_query(&self, answer: Result<QueryNext, Win32Error>) {
        self.query_answers.lock().unwrap().push_back(answer);
    }

    pub fn name_account(&self, sid: Sid, account: impl Into<String>) {
        self.accounts.lock().unwrap().push((sid, account.into()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ConfigStore for ScriptedStore {
    fn initialize(&self, version: ApiVersion) -> Result<(), Win32Error> {
        self.record(Call::Initialize(version));
        if let Some(code) = self.init_failures.lock().unwrap().pop_front() {
            return Err(code);
        }
        self.inner.initialize(version)
    }

    fn terminate(&self) {
        self.record(Call::Terminate);
        self.inner.terminate();
    }

    fn set(&self, record: &UrlAclRecord) -> Result<(), Win32Error> {
        self.record(Call::Set(record.clone()));
        if let Some(code) = self.set_failures.lock().unwrap().pop_front() {
            return Err(code);
        }
        self.inner.set(record)
    }

    fn delete(&self, url: &str) -> Result<(), Win32Error> {
        self.record(Call::Delete(url.to_string()));
        if let Some(code) = self.delete_failures.lock().unwrap().pop_front() {
            return Err(code);
        }
        self.inner.delete(url)
    }

    fn query_next(&self, token: u32, buffer_len: usize) -> Result<QueryNext, Win32Error> {
        self.record(Call::QueryNext { token, buffer_len });
        if let Some(answer) = self.query_answers.lock().unwrap().pop_front() {
            return answer;
        }
        self.inner.query_next(token, buffer_len)
    }

    fn account_name(&self, sid: &Sid) -> Option<String> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s == sid)
            .map(|(_, name)| name.clone())
    }
}
