//! Base station identities and the registry that resolves them.

use std::str::FromStr;

use hex::FromHex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum display name length in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Length of a full identifier in hex characters.
pub const FULL_ID_HEX_LEN: usize = 8;

/// The 32-bit identifier a version 1 base station expects in its commands.
///
/// Printed on the back of the unit as 8 hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FullId(u32);

impl FullId {
    /// Creates an identifier from its numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the identifier as 8 uppercase hex characters.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode_upper(self.0.to_be_bytes())
    }
}

impl FromStr for FullId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != FULL_ID_HEX_LEN {
            return Err(Error::InvalidIdentifier {
                value: s.to_string(),
                reason: format!("expected {FULL_ID_HEX_LEN} hex characters"),
            });
        }
        let bytes = <[u8; 4]>::from_hex(digits).map_err(|e| Error::InvalidIdentifier {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }
}

impl TryFrom<String> for FullId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FullId> for String {
    fn from(id: FullId) -> Self {
        id.to_hex()
    }
}

impl std::fmt::Debug for FullId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FullId({})", self.to_hex())
    }
}

impl std::fmt::Display for FullId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An operator-configured base station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Substring expected in the advertised name (e.g. `C21347` in `HTC BS C21347`).
    pub label: String,
    /// Identifier embedded in version 1 commands.
    pub full_id: FullId,
    /// Human display name.
    pub name: String,
}

impl Identity {
    /// Creates a new identity, truncating the display name.
    #[must_use]
    pub fn new(label: impl Into<String>, full_id: FullId, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            full_id,
            name: truncate_name(&name.into()),
        }
    }

    /// Returns true if an advertised name refers to this identity.
    #[must_use]
    pub fn matches(&self, advertised_name: &str) -> bool {
        !self.label.is_empty() && advertised_name.contains(self.label.as_str())
    }
}

/// Truncates a display name to [`MAX_NAME_LEN`] characters.
#[must_use]
pub fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

/// The scope of a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Target {
    /// Every base station found nearby.
    #[default]
    All,
    /// One configured identity, by registry index.
    Specific(usize),
}

impl Target {
    /// Returns true if the identity at `index` is in scope.
    #[must_use]
    pub const fn admits(self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::Specific(target) => target == index,
        }
    }

    /// Returns the targeted index, if any.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::All => None,
            Self::Specific(index) => Some(index),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Specific(index) => write!(f, "#{index}"),
        }
    }
}

/// Ordered collection of configured identities.
///
/// Order is significant: when an advertised name contains several labels,
/// the first identity in the registry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRegistry {
    identities: Vec<Identity>,
}

impl IdentityRegistry {
    /// Creates a registry from an ordered list of identities.
    #[must_use]
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    /// Returns the number of identities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.identities.len()
    }

    /// Returns true if no identity is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Returns the identity at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Identity> {
        self.identities.get(index)
    }

    /// Iterates over the identities in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    /// Returns the first identity whose label is contained in the advertised name.
    #[must_use]
    pub fn resolve(&self, advertised_name: &str) -> Option<&Identity> {
        self.resolve_index(advertised_name)
            .and_then(|index| self.identities.get(index))
    }

    /// Returns the full identifier for an advertised name.
    #[must_use]
    pub fn resolve_full_id(&self, advertised_name: &str) -> Option<FullId> {
        self.resolve(advertised_name).map(|identity| identity.full_id)
    }

    /// Returns the index of the first identity whose label is contained in
    /// the advertised name.
    #[must_use]
    pub fn resolve_index(&self, advertised_name: &str) -> Option<usize> {
        self.matches(advertised_name).next()
    }

    /// Iterates over the indices of all identities matching an advertised
    /// name, in registry order.
    pub fn matches<'a>(&'a self, advertised_name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.identities
            .iter()
            .enumerate()
            .filter(move |(_, identity)| identity.matches(advertised_name))
            .map(|(index, _)| index)
    }

    /// Checks that a target refers to a configured identity.
    pub fn check_target(&self, target: Target) -> Result<()> {
        match target {
            Target::All => Ok(()),
            Target::Specific(index) if index < self.count() => Ok(()),
            Target::Specific(index) => Err(Error::InvalidTarget {
                index,
                count: self.count(),
            }),
        }
    }

    /// Renames an identity, truncating to [`MAX_NAME_LEN`] characters.
    ///
    /// Returns the stored name.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<&str> {
        let count = self.count();
        let identity = self
            .identities
            .get_mut(index)
            .ok_or(Error::InvalidTarget { index, count })?;
        identity.name = truncate_name(name);
        Ok(&identity.name)
    }
}

impl From<Vec<Identity>> for IdentityRegistry {
    fn from(identities: Vec<Identity>) -> Self {
        Self::new(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(vec![
            Identity::new("C21347", FullId::new(0x3BBF_1347), "Room 1 Master"),
            Identity::new("F862BD", FullId::new(0x6BC1_62BD), "Room 2 Master"),
        ])
    }

    #[test]
    fn test_full_id_parse() {
        let id: FullId = "3BBF1347".parse().unwrap();
        assert_eq!(id.value(), 0x3BBF_1347);
        assert_eq!(id.to_string(), "3BBF1347");

        let lower: FullId = "0x6bc162bd".parse().unwrap();
        assert_eq!(lower.value(), 0x6BC1_62BD);
    }

    #[test]
    fn test_full_id_parse_rejects_bad_input() {
        assert!("3BBF134".parse::<FullId>().is_err());
        assert!("3BBF13470".parse::<FullId>().is_err());
        assert!("ZZBF1347".parse::<FullId>().is_err());
    }

    #[test]
    fn test_resolve_by_containment() {
        let registry = registry();
        assert_eq!(registry.resolve_index("HTC BS C21347"), Some(0));
        assert_eq!(registry.resolve_index("HTC BS F862BD"), Some(1));
        assert_eq!(registry.resolve_index("HTC BS 000000"), None);
        assert_eq!(
            registry.resolve_full_id("HTC BS F862BD"),
            Some(FullId::new(0x6BC1_62BD))
        );
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let registry = IdentityRegistry::new(vec![
            Identity::new("1347", FullId::new(1), "short"),
            Identity::new("C21347", FullId::new(2), "long"),
        ]);
        assert_eq!(registry.resolve_index("HTC BS C21347"), Some(0));
        assert_eq!(registry.matches("HTC BS C21347").collect::<Vec<_>>(), [0, 1]);
    }

    #[test]
    fn test_empty_label_never_matches() {
        let registry = IdentityRegistry::new(vec![Identity::new("", FullId::new(1), "blank")]);
        assert_eq!(registry.resolve_index("HTC BS C21347"), None);
    }

    #[test]
    fn test_rename_truncates() {
        let mut registry = registry();
        let stored = registry
            .rename(0, "a very long name far past twenty characters")
            .unwrap();
        assert_eq!(stored, "a very long name far");
        assert_eq!(stored.chars().count(), MAX_NAME_LEN);

        // Idempotent
        registry.rename(1, "Desk").unwrap();
        registry.rename(1, "Desk").unwrap();
        assert_eq!(registry.get(1).unwrap().name, "Desk");
    }

    #[test]
    fn test_rename_out_of_range() {
        let mut registry = registry();
        let err = registry.rename(2, "nope").unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { index: 2, count: 2 }));
    }

    #[test]
    fn test_check_target() {
        let registry = registry();
        assert!(registry.check_target(Target::All).is_ok());
        assert!(registry.check_target(Target::Specific(1)).is_ok());
        assert!(registry.check_target(Target::Specific(2)).is_err());
    }

    #[test]
    fn test_target_admits() {
        assert!(Target::All.admits(5));
        assert!(Target::Specific(1).admits(1));
        assert!(!Target::Specific(1).admits(0));
    }
}
