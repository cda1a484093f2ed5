//!
//! Access rights that can be granted on a URL reservation.
//!
//! http.sys only understands two generic rights on a URL-ACL entry:
//! `GENERIC_EXECUTE` lets the principal register (listen on) the URL, and
//! `GENERIC_WRITE` lets it delegate sub-URLs to other principals.

use std::fmt;
use std::str::FromStr;

/// Raw ACE access mask.
pub type AccessMask = u32;

/// Raw mask bits used by URL reservations.
pub mod mask {
    use super::AccessMask;

    /// `GENERIC_EXECUTE`, SDDL `GX`.
    pub const LISTEN: AccessMask = 0x2000_0000;
    /// `GENERIC_WRITE`, SDDL `GW`.
    pub const DELEGATE: AccessMask = 0x4000_0000;
    pub const ALL: AccessMask = LISTEN | DELEGATE;
}

/// The rights a principal holds on a URL reservation.
///
/// `Other` carries any non-empty mask that is not one of the three URL
/// reservation masks, such as `GA` written by another tool. It is kept so the
/// record can be listed and written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessRights {
    /// Permission to bind a listener to the URL prefix.
    Listen,
    /// Permission to reserve sub-URLs on behalf of other principals.
    Delegate,
    ListenAndDelegate,
    Other(AccessMask),
}

impl AccessRights {
    #[inline]
    pub fn mask(self) -> AccessMask {
        match self {
            AccessRights::Listen => mask::LISTEN,
            AccessRights::Delegate => mask::DELEGATE,
            AccessRights::ListenAndDelegate => mask::ALL,
            AccessRights::Other(bits) => bits,
        }
    }

    /// Wraps any non-empty mask. Returns `None` for an empty one.
    pub fn from_mask(bits: AccessMask) -> Option<AccessRights> {
        match bits {
            0 => None,
            mask::LISTEN => Some(AccessRights::Listen),
            mask::DELEGATE => Some(AccessRights::Delegate),
            mask::ALL => Some(AccessRights::ListenAndDelegate),
            other => Some(AccessRights::Other(other)),
        }
    }

    /// True for the three masks http.sys grants on a reservation.
    pub fn is_standard(self) -> bool {
        Self::from_mask(self.mask()).is_some_and(|r| !matches!(r, AccessRights::Other(_)))
    }

    /// True when every bit of `other` is held by `self`.
    #[inline]
    pub fn contains(self, other: AccessRights) -> bool {
        (self.mask() & other.mask()) == other.mask()
    }

    #[inline]
    pub fn intersects(self, other: AccessRights) -> bool {
        (self.mask() & other.mask()) != 0
    }

    pub fn union(self, other: AccessRights) -> AccessRights {
        // The union of two non-empty masks is never empty.
        Self::from_mask(self.mask() | other.mask()).unwrap_or(self)
    }

    /// Removes the bits of `other`. Returns `None` when nothing is left.
    pub fn difference(self, other: AccessRights) -> Option<AccessRights> {
        Self::from_mask(self.mask() & !other.mask())
    }
}

impl TryFrom<AccessMask> for AccessRights {
    type Error = AccessMask;

    /// Only the three masks http.sys accepts are valid; anything else is handed back.
    fn try_from(value: AccessMask) -> Result<Self, Self::Error> {
        match Self::from_mask(value) {
            Some(rights) if rights.is_standard() => Ok(rights),
            _ => Err(value),
        }
    }
}

impl From<AccessRights> for AccessMask {
    fn from(rights: AccessRights) -> Self {
        rights.mask()
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessRights::Listen => f.write_str("listen"),
            AccessRights::Delegate => f.write_str("delegate"),
            AccessRights::ListenAndDelegate => f.write_str("listen-and-delegate"),
            AccessRights::Other(bits) => write!(f, "0x{:08x}", bits),
        }
    }
}

impl FromStr for AccessRights {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(hex) = lower.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(AccessRights::from_mask)
                .ok_or_else(|| format!("invalid access mask '{}'", s.trim()));
        }
        match lower.as_str() {
            "listen" => Ok(AccessRights::Listen),
            "delegate" => Ok(AccessRights::Delegate),
            "listen-and-delegate" | "listenanddelegate" | "both" => {
                Ok(AccessRights::ListenAndDelegate)
            }
            other => Err(format!(
                "unknown access right '{}' (expected listen, delegate or both)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_match_generic_rights() {
        assert_eq!(AccessRights::Listen.mask(), 0x2000_0000);
        assert_eq!(AccessRights::Delegate.mask(), 0x4000_0000);
        assert_eq!(AccessRights::ListenAndDelegate.mask(), 0x6000_0000);
    }

    #[test]
    fn test_try_from_rejects_other_masks() {
        assert_eq!(AccessRights::try_from(0x2000_0000u32), Ok(AccessRights::Listen));
        assert_eq!(AccessRights::try_from(0x1000_0000u32), Err(0x1000_0000));
        assert_eq!(AccessRights::try_from(0u32), Err(0));
    }

    #[test]
    fn test_union_and_difference() {
        let both = AccessRights::Listen.union(AccessRights::Delegate);
        assert_eq!(both, AccessRights::ListenAndDelegate);
        assert_eq!(both.difference(AccessRights::Listen), Some(AccessRights::Delegate));
        assert_eq!(AccessRights::Listen.difference(AccessRights::ListenAndDelegate), None);
        assert_eq!(AccessRights::Listen.difference(AccessRights::Delegate), Some(AccessRights::Listen));
    }

    #[test]
    fn test_contains() {
        assert!(AccessRights::ListenAndDelegate.contains(AccessRights::Listen));
        assert!(!AccessRights::Listen.contains(AccessRights::ListenAndDelegate));
        assert!(!AccessRights::Listen.intersects(AccessRights::Delegate));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Listen".parse::<AccessRights>(), Ok(AccessRights::Listen));
        assert_eq!("both".parse::<AccessRights>(), Ok(AccessRights::ListenAndDelegate));
        assert!("read".parse::<AccessRights>().is_err());
        assert_eq!(AccessRights::ListenAndDelegate.to_string(), "listen-and-delegate");
        assert_eq!("0x10000000".parse::<AccessRights>(), Ok(AccessRights::Other(0x1000_0000)));
        assert!("0x0".parse::<AccessRights>().is_err());
    }

    #[test]
    fn test_other_masks_are_kept() {
        assert_eq!(AccessRights::from_mask(0x1000_0000), Some(AccessRights::Other(0x1000_0000)));
        assert_eq!(AccessRights::from_mask(mask::LISTEN), Some(AccessRights::Listen));
        assert_eq!(AccessRights::from_mask(0), None);
        assert!(!AccessRights::Other(0x1000_0000).is_standard());
        assert_eq!(AccessRights::Other(0x1000_0000).to_string(), "0x10000000");

        let mixed = AccessRights::from_mask(0x1000_0000 | mask::LISTEN).unwrap();
        assert!(mixed.contains(AccessRights::Listen));
        assert_eq!(mixed.difference(AccessRights::Other(0x1000_0000)), Some(AccessRights::Listen));
    }
}
