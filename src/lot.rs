use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical key used when a movement line specifies no batch.
pub const NO_LOT: &str = "NO_LOT";

/// Normalized lot key for a stock entry.
///
/// Resolution never fails: an absent or blank identifier maps to the
/// canonical no-lot marker, anything else is used verbatim. Whether the
/// accompanying expiration date is admissible for the resolved key is the
/// validator's decision, not the resolver's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotKey(String);

impl LotKey {
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if !s.trim().is_empty() => LotKey(s.to_string()),
            _ => LotKey(NO_LOT.to_string()),
        }
    }

    pub fn is_no_lot(&self) -> bool {
        self.0 == NO_LOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_lot_resolves_to_marker() {
        let key = LotKey::resolve(None);
        assert!(key.is_no_lot());
        assert_eq!(key.as_str(), NO_LOT);
    }

    #[test]
    fn empty_and_blank_lots_resolve_to_marker() {
        assert!(LotKey::resolve(Some("")).is_no_lot());
        assert!(LotKey::resolve(Some("   ")).is_no_lot());
    }

    #[test]
    fn named_lot_is_used_verbatim() {
        let key = LotKey::resolve(Some("L1"));
        assert!(!key.is_no_lot());
        assert_eq!(key.as_str(), "L1");
    }

    #[test]
    fn lot_named_like_the_marker_is_the_marker() {
        // A caller sending the literal marker collapses onto the canonical key.
        assert!(LotKey::resolve(Some(NO_LOT)).is_no_lot());
    }
}
