//!
//! Access rules of a URL reservation and the ordered rule set built from them.
//!
//! A rule set keeps its entries in canonical ACL order, sorted by SID, which
//! is how Windows stores and returns the DACL of a reservation.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::rights::AccessRights;
use crate::sddl::{self, Ace, AceKind, SddlError, SecurityDescriptor};
use crate::sid::Sid;

/// A security principal, identified by SID.
///
/// `account` is the resolved `DOMAIN\name` when one was looked up. It is for
/// display only and takes no part in equality.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    pub sid: Sid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl Identity {
    pub fn new(sid: Sid) -> Identity {
        Identity { sid, account: None }
    }

    pub fn with_account(sid: Sid, account: impl Into<String>) -> Identity {
        Identity { sid, account: Some(account.into()) }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.sid == other.sid
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sid.hash(state);
    }
}

impl From<Sid> for Identity {
    fn from(sid: Sid) -> Self {
        Identity::new(sid)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Some(account) => f.write_str(account),
            None => write!(f, "{}", self.sid),
        }
    }
}

/// Grants `rights` on a URL reservation to `identity`.
///
/// URL reservation rules are always allow rules without inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AccessRule {
    pub identity: Identity,
    pub rights: AccessRights,
}

impl AccessRule {
    pub fn new(identity: impl Into<Identity>, rights: AccessRights) -> AccessRule {
        AccessRule { identity: identity.into(), rights }
    }

    pub fn sid(&self) -> &Sid {
        &self.identity.sid
    }

    fn to_ace(&self) -> Ace {
        Ace::allow(self.identity.sid.clone(), self.rights.mask())
    }
}

/// The rules of one reservation, at most one per SID, sorted by SID.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "Vec<AccessRule>", into = "Vec<AccessRule>")]
pub struct RuleSet {
    rules: Vec<AccessRule>,
}

impl RuleSet {
    pub fn new() -> RuleSet {
        RuleSet::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccessRule> {
        self.rules.iter()
    }

    pub fn rights_of(&self, sid: &Sid) -> Option<AccessRights> {
        self.rules.iter().find(|r| r.sid() == sid).map(|r| r.rights)
    }

    /// Adds a rule. An existing entry for the same SID gains the new rights.
    pub fn add(&mut self, rule: AccessRule) {
        match self.rules.binary_search_by(|r| r.sid().cmp(rule.sid())) {
            Ok(index) => {
                let existing = &mut self.rules[index];
                existing.rights = existing.rights.union(rule.rights);
                if existing.identity.account.is_none() {
                    existing.identity.account = rule.identity.account;
                }
            }
            Err(index) => self.rules.insert(index, rule),
        }
    }

    /// Takes the rule's rights away from the matching SID.
    ///
    /// Returns `true` when an entry for the SID held at least one of the
    /// rights. Entries left without any right are dropped.
    pub fn remove(&mut self, rule: &AccessRule) -> bool {
        let Ok(index) = self.rules.binary_search_by(|r| r.sid().cmp(rule.sid())) else {
            return false;
        };
        let current = self.rules[index].rights;
        if !current.intersects(rule.rights) {
            return false;
        }
        match current.difference(rule.rights) {
            Some(left) => self.rules[index].rights = left,
            None => {
                self.rules.remove(index);
            }
        }
        true
    }

    pub fn to_descriptor(&self) -> SecurityDescriptor {
        SecurityDescriptor::with_dacl(self.rules.iter().map(AccessRule::to_ace).collect())
    }

    /// The access-only SDDL stored for the reservation.
    pub fn to_sddl(&self) -> String {
        self.to_descriptor().to_access_sddl()
    }

    /// Builds a rule set from a parsed descriptor.
    ///
    /// Every DACL entry must be a plain allow ACE with a non-empty mask.
    /// Masks other than the URL reservation rights are kept as
    /// [`AccessRights::Other`]. Repeated SIDs are merged and the result is in
    /// canonical order whatever order the record listed them in.
    pub fn from_descriptor(sd: &SecurityDescriptor) -> Result<RuleSet, SddlError> {
        let mut set = RuleSet::new();
        for ace in &sd.dacl {
            if ace.kind != AceKind::Allow {
                return Err(SddlError::UnsupportedAce(format!(
                    "deny entry for {} in a URL reservation",
                    ace.trustee
                )));
            }
            if !ace.flags.is_empty() {
                return Err(SddlError::UnsupportedAce(format!(
                    "inheritance flags '{}' in a URL reservation",
                    ace.flags
                )));
            }
            let rights = AccessRights::from_mask(ace.mask).ok_or_else(|| {
                SddlError::UnsupportedAce(format!("empty access mask for {}", ace.trustee))
            })?;
            set.add(AccessRule::new(ace.trustee.clone(), rights));
        }
        Ok(set)
    }

    pub fn from_sddl(input: &str) -> Result<RuleSet, SddlError> {
        RuleSet::from_descriptor(&sddl::parse(input)?)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, AccessRule> {
        self.rules.iter_mut()
    }
}

impl FromIterator<AccessRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = AccessRule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.add(rule);
        }
        set
    }
}

impl From<Vec<AccessRule>> for RuleSet {
    fn from(rules: Vec<AccessRule>) -> Self {
        rules.into_iter().collect()
    }
}

impl From<RuleSet> for Vec<AccessRule> {
    fn from(set: RuleSet) -> Self {
        set.rules
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a AccessRule;
    type IntoIter = std::slice::Iter<'a, AccessRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
