//!
//! Parsing and generation of Security Descriptor Definition Language strings.
//!
//! URL reservations only ever store the access part of a descriptor
//! (`D:(A;;GX;;;WD)`), but the parser accepts a full descriptor with owner,
//! group and SACL sections so that records written by other tools load too.
//! The SACL is skipped; URL reservations have no audit rules.

use std::fmt;

use crate::rights::{mask, AccessMask};
use crate::sid::{Sid, SidParseError};

/// Errors raised while parsing an SDDL string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SddlError {
    #[error("unexpected end of SDDL string, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unexpected '{found}' at offset {offset}, expected {expected}")]
    Unexpected { offset: usize, found: char, expected: &'static str },
    #[error(transparent)]
    InvalidSid(#[from] SidParseError),
    #[error("invalid access mask '{token}' at offset {offset}")]
    InvalidMask { offset: usize, token: String },
    #[error("unsupported ACE: {0}")]
    UnsupportedAce(String),
}

/// Type of an access control entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AceKind {
    Allow,
    Deny,
}

impl AceKind {
    fn as_str(self) -> &'static str {
        match self {
            AceKind::Allow => "A",
            AceKind::Deny => "D",
        }
    }
}

/// One entry of a discretionary ACL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ace {
    pub kind: AceKind,
    /// Inheritance/audit flags, kept verbatim (`CI`, `OI`, ...).
    pub flags: String,
    pub mask: AccessMask,
    pub trustee: Sid,
}

impl Ace {
    pub fn allow(trustee: Sid, mask: AccessMask) -> Ace {
        Ace { kind: AceKind::Allow, flags: String::new(), mask, trustee }
    }
}

impl fmt::Display for Ace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({};{};{};;;{})",
            self.kind.as_str(),
            self.flags,
            format_mask(self.mask),
            self.trustee.to_sddl()
        )
    }
}

/// The parts of a security descriptor an SDDL string can carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityDescriptor {
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    /// DACL control flags (`P`, `AI`, `AR`), kept verbatim.
    pub dacl_flags: String,
    pub dacl: Vec<Ace>,
}

impl SecurityDescriptor {
    pub fn with_dacl(dacl: Vec<Ace>) -> SecurityDescriptor {
        SecurityDescriptor { dacl, ..Default::default() }
    }

    /// Renders only the access section, the form http.sys stores.
    pub fn to_access_sddl(&self) -> String {
        let mut out = String::with_capacity(2 + self.dacl.len() * 24);
        out.push_str("D:");
        out.push_str(&self.dacl_flags);
        for ace in &self.dacl {
            out.push_str(&ace.to_string());
        }
        out
    }
}

/// Named rights tokens. Generic rights first so they are preferred when formatting.
const RIGHTS: &[(&str, AccessMask)] = &[
    ("GA", 0x1000_0000),
    ("GR", 0x8000_0000),
    ("GW", mask::DELEGATE),
    ("GX", mask::LISTEN),
    ("RC", 0x0002_0000),
    ("SD", 0x0001_0000),
    ("WD", 0x0004_0000),
    ("WO", 0x0008_0000),
    ("FA", 0x001F_01FF),
    ("FR", 0x0012_0089),
    ("FW", 0x0012_0116),
    ("FX", 0x0012_00A0),
    ("KA", 0x000F_003F),
    ("KR", 0x0002_0019),
    ("KW", 0x0002_0006),
    ("KX", 0x0002_0019),
    ("CC", 0x0000_0001),
    ("DC", 0x0000_0002),
    ("LC", 0x0000_0004),
    ("SW", 0x0000_0008),
    ("RP", 0x0000_0010),
    ("WP", 0x0000_0020),
    ("DT", 0x0000_0040),
    ("LO", 0x0000_0080),
    ("CR", 0x0000_0100),
];

/// Formats an access mask the way URL-ACL records spell it.
pub fn format_mask(value: AccessMask) -> String {
    match value {
        mask::LISTEN => "GX".to_string(),
        mask::DELEGATE => "GW".to_string(),
        mask::ALL => "GXGW".to_string(),
        other => format!("0x{:x}", other),
    }
}

/// Parses the rights field of an ACE.
pub fn parse_mask(token: &str) -> Option<AccessMask> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse().ok();
    }
    if token.len() % 2 != 0 {
        return None;
    }
    let mut value = 0;
    for i in (0..token.len()).step_by(2) {
        let pair = token.get(i..i + 2)?;
        let (_, bits) = RIGHTS.iter().find(|(name, _)| *name == pair)?;
        value |= bits;
    }
    Some(value)
}

/// Parses an SDDL string into a [`SecurityDescriptor`].
pub fn parse(input: &str) -> Result<SecurityDescriptor, SddlError> {
    Parser { src: input, pos: 0 }.descriptor()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), SddlError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(found) => Err(SddlError::Unexpected { offset: self.pos, found, expected }),
            None => Err(SddlError::UnexpectedEnd { expected }),
        }
    }

    fn at_section_start(&self) -> bool {
        let mut chars = self.rest().chars();
        matches!(
            (chars.next(), chars.next()),
            (Some('O' | 'G' | 'D' | 'S'), Some(':'))
        )
    }

    fn descriptor(mut self) -> Result<SecurityDescriptor, SddlError> {
        let mut sd = SecurityDescriptor::default();
        loop {
            self.skip_ws();
            let Some(tag) = self.peek() else { break };
            if !self.at_section_start() {
                return Err(SddlError::Unexpected {
                    offset: self.pos,
                    found: tag,
                    expected: "a section tag (O:, G:, D: or S:)",
                });
            }
            self.pos += 2;
            match tag {
                'O' => sd.owner = Some(self.sid_token()?),
                'G' => sd.group = Some(self.sid_token()?),
                'D' => {
                    sd.dacl_flags = self.acl_flags();
                    sd.dacl = self.aces()?;
                }
                _ => {
                    self.acl_flags();
                    self.skip_aces()?;
                }
            }
        }
        Ok(sd)
    }

    /// Reads an owner/group SID. Aliases are exactly two letters; canonical
    /// SIDs stop at the first character that cannot belong to them.
    fn sid_token(&mut self) -> Result<Sid, SddlError> {
        self.skip_ws();
        let rest = self.rest();
        let len = if rest.starts_with("S-") || rest.starts_with("s-") {
            canonical_sid_len(rest)
        } else {
            rest.char_indices().nth(2).map_or(rest.len(), |(i, _)| i)
        };
        if len == 0 {
            return Err(SddlError::UnexpectedEnd { expected: "a SID" });
        }
        let sid: Sid = rest[..len].parse()?;
        self.pos += len;
        Ok(sid)
    }

    fn acl_flags(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_ascii_uppercase() || c == '_') || self.at_section_start() {
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    /// Steps over SACL entries without interpreting them.
    fn skip_aces(&mut self) -> Result<(), SddlError> {
        loop {
            self.skip_ws();
            if self.peek() != Some('(') {
                return Ok(());
            }
            let close = self
                .rest()
                .find(')')
                .ok_or(SddlError::UnexpectedEnd { expected: "')'" })?;
            self.pos += close + 1;
        }
    }

    fn aces(&mut self) -> Result<Vec<Ace>, SddlError> {
        let mut aces = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('(') {
                return Ok(aces);
            }
            aces.push(self.ace()?);
        }
    }

    fn ace(&mut self) -> Result<Ace, SddlError> {
        self.expect('(', "'('")?;
        let start = self.pos;
        let close = self
            .rest()
            .find(')')
            .ok_or(SddlError::UnexpectedEnd { expected: "')'" })?;
        let body = &self.src[start..start + close];
        self.pos = start + close + 1;

        let fields: Vec<&str> = body.split(';').map(str::trim).collect();
        if fields.len() != 6 {
            return Err(SddlError::UnsupportedAce(format!(
                "expected 6 fields, found {} in '({})'",
                fields.len(),
                body
            )));
        }

        let kind = match fields[0] {
            "A" => AceKind::Allow,
            "D" => AceKind::Deny,
            other => {
                return Err(SddlError::UnsupportedAce(format!("ACE type '{}'", other)));
            }
        };
        if !fields[3].is_empty() || !fields[4].is_empty() {
            return Err(SddlError::UnsupportedAce("object ACEs are not supported".to_string()));
        }
        let mask = parse_mask(fields[2]).ok_or_else(|| SddlError::InvalidMask {
            offset: start,
            token: fields[2].to_string(),
        })?;
        let trustee: Sid = fields[5].parse()?;

        Ok(Ace { kind, flags: fields[1].to_string(), mask, trustee })
    }
}

fn canonical_sid_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut len = 2;
    let mut hex = false;
    while len < bytes.len() {
        let b = bytes[len];
        if b == b'-' {
            hex = false;
        } else if (b == b'x' || b == b'X') && bytes[len - 1] == b'0' {
            hex = true;
        } else if !(b.is_ascii_digit() || (hex && b.is_ascii_hexdigit())) {
            break;
        }
        len += 1;
    }
    len
}
