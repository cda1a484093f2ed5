//!
//! A URL reservation: a URL prefix and the principals allowed to use it.

use std::fmt;

use crate::error::{Result, UrlAclError};
use crate::rule::{AccessRule, RuleSet};

/// One record of the http.sys URL-ACL store.
///
/// Values are snapshots: they are produced by [`crate::UrlAclClient`] and
/// only change through it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UrlReservation {
    url: String,
    rules: RuleSet,
}

impl UrlReservation {
    pub(crate) fn new(url: impl Into<String>, rules: RuleSet) -> UrlReservation {
        UrlReservation { url: url.into(), rules }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn access_rules(&self) -> impl Iterator<Item = &AccessRule> {
        self.rules.iter()
    }

    pub(crate) fn set_rules(&mut self, rules: RuleSet) {
        self.rules = rules;
    }
}

impl fmt::Display for UrlReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Checks that `url` is a URL prefix http.sys will accept.
///
/// The prefix needs an `http` or `https` scheme, a host part (which may be a
/// `+` or `*` wildcard), and must end with `/`.
pub fn validate_url_prefix(url: &str) -> Result<()> {
    let invalid = |reason: &str| UrlAclError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.trim().is_empty() {
        return Err(invalid("URL prefix must not be empty"));
    }
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"))
        .ok_or_else(|| invalid("scheme must be http:// or https://"))?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || host.starts_with(':') {
        return Err(invalid("missing host"));
    }
    if !url.ends_with('/') {
        return Err(invalid("URL prefix must end with '/'"));
    }
    Ok(())
}
