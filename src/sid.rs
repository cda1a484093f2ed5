//!
//! Security identifiers (SIDs) in their string forms.
//!
//! A SID is written either canonically (`S-1-5-32-545`) or, in SDDL, as a
//! two-letter alias for one of the well-known SIDs (`BU`). Both forms parse to
//! the same value; `to_sddl` picks the alias when there is one, which is what
//! Windows does when it renders a security descriptor.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum number of sub-authorities a SID may carry (`SID_MAX_SUB_AUTHORITIES`).
pub const MAX_SUB_AUTHORITIES: usize = 15;

const MAX_AUTHORITY: u64 = (1 << 48) - 1;

/// Error produced when a SID string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid security identifier '{input}': {reason}")]
pub struct SidParseError {
    pub input: String,
    pub reason: &'static str,
}

/// A Windows security identifier.
///
/// SIDs order by identifier authority, then by number of sub-authorities,
/// then sub-authority by sub-authority. This is the order Windows uses when it
/// canonicalises the entries of an ACL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sid {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl Ord for Sid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.authority
            .cmp(&other.authority)
            .then_with(|| self.sub_authorities.len().cmp(&other.sub_authorities.len()))
            .then_with(|| self.sub_authorities.cmp(&other.sub_authorities))
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Sid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// SDDL aliases for well-known SIDs, as `(alias, authority, sub-authorities)`.
const WELL_KNOWN: &[(&str, u64, &[u32])] = &[
    ("WD", 1, &[0]),
    ("CO", 3, &[0]),
    ("CG", 3, &[1]),
    ("NU", 5, &[2]),
    ("IU", 5, &[4]),
    ("SU", 5, &[6]),
    ("AN", 5, &[7]),
    ("ER", 5, &[9]),
    ("PS", 5, &[10]),
    ("AU", 5, &[11]),
    ("RC", 5, &[12]),
    ("SY", 5, &[18]),
    ("LS", 5, &[19]),
    ("NS", 5, &[20]),
    ("BA", 5, &[32, 544]),
    ("BU", 5, &[32, 545]),
    ("BG", 5, &[32, 546]),
    ("PU", 5, &[32, 547]),
    ("AO", 5, &[32, 548]),
    ("SO", 5, &[32, 549]),
    ("PO", 5, &[32, 550]),
    ("BO", 5, &[32, 551]),
    ("RE", 5, &[32, 552]),
    ("RU", 5, &[32, 554]),
    ("RD", 5, &[32, 555]),
    ("NO", 5, &[32, 556]),
    ("MU", 5, &[32, 558]),
    ("LU", 5, &[32, 559]),
    ("IS", 5, &[32, 568]),
    ("AC", 15, &[2, 1]),
    ("LW", 16, &[4096]),
    ("ME", 16, &[8192]),
    ("HI", 16, &[12288]),
    ("SI", 16, &[16384]),
    ("SS", 18, &[2]),
];

impl Sid {
    /// Builds a revision-1 SID from its identifier authority and sub-authorities.
    pub fn new(authority: u64, sub_authorities: &[u32]) -> Result<Sid, SidParseError> {
        let err = |reason| SidParseError {
            input: format!("authority {} with {} sub-authorities", authority, sub_authorities.len()),
            reason,
        };
        if authority > MAX_AUTHORITY {
            return Err(err("identifier authority exceeds 48 bits"));
        }
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(err("too many sub-authorities"));
        }
        Ok(Sid { revision: 1, authority, sub_authorities: sub_authorities.to_vec() })
    }

    /// `S-1-1-0`, the Everyone group.
    pub fn everyone() -> Sid {
        Sid { revision: 1, authority: 1, sub_authorities: vec![0] }
    }

    /// Resolves a well-known SDDL alias such as `BU` or `NS`.
    pub fn from_sddl_alias(alias: &str) -> Option<Sid> {
        WELL_KNOWN
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(alias))
            .map(|(_, authority, subs)| Sid {
                revision: 1,
                authority: *authority,
                sub_authorities: subs.to_vec(),
            })
    }

    pub fn sddl_alias(&self) -> Option<&'static str> {
        WELL_KNOWN
            .iter()
            .find(|(_, authority, subs)| {
                *authority == self.authority && *subs == self.sub_authorities.as_slice()
            })
            .map(|(name, _, _)| *name)
    }

    /// The form used inside an SDDL string: alias when known, canonical otherwise.
    pub fn to_sddl(&self) -> String {
        match self.sddl_alias() {
            Some(alias) => alias.to_string(),
            None => self.to_string(),
        }
    }

    pub fn authority(&self) -> u64 {
        self.authority
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    fn parse_canonical(s: &str) -> Result<Sid, SidParseError> {
        let err = |reason| SidParseError { input: s.to_string(), reason };

        let mut parts = s.split('-');
        match parts.next() {
            Some(p) if p.eq_ignore_ascii_case("S") => {}
            _ => return Err(err("missing 'S-' prefix")),
        }
        let revision: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| err("missing revision"))?;
        if revision != 1 {
            return Err(err("unsupported revision"));
        }

        let authority_str = parts.next().ok_or_else(|| err("missing identifier authority"))?;
        let authority = match authority_str
            .strip_prefix("0x")
            .or_else(|| authority_str.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority_str.parse::<u64>(),
        }
        .map_err(|_| err("identifier authority is not a number"))?;
        if authority > MAX_AUTHORITY {
            return Err(err("identifier authority exceeds 48 bits"));
        }

        let mut sub_authorities = Vec::new();
        for part in parts {
            let value: u32 = part.parse().map_err(|_| err("sub-authority is not a 32-bit number"))?;
            sub_authorities.push(value);
        }
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(err("too many sub-authorities"));
        }

        Ok(Sid { revision, authority, sub_authorities })
    }
}

impl FromStr for Sid {
    type Err = SidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 2 {
            return Sid::from_sddl_alias(s).ok_or_else(|| SidParseError {
                input: s.to_string(),
                reason: "unknown SDDL alias",
            });
        }
        Sid::parse_canonical(s)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-", self.revision)?;
        // Windows switches to hex once the authority no longer fits in 32 bits.
        if self.authority >= 1 << 32 {
            write!(f, "0x{:012X}", self.authority)?;
        } else {
            write!(f, "{}", self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

impl serde::Serialize for Sid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Sid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
