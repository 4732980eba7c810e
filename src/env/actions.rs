//! Legal action sets expressed as raw key codes.

use serde::{Deserialize, Serialize};

use crate::error::IllegalAction;

/// `Ctrl-C`; aborts an interactive session.
pub const INTERRUPT_KEY: u8 = b'c' & 0x1f;

/// `Enter`; acknowledges a `--More--` prompt.
pub const MORE_KEY: u8 = b'\r';

/// Compass keys: N E S W NE SE SW NW.
pub const COMPASS_KEYS: [u8; 8] = *b"kljhunby";

/// Run-until-something-interesting variants of [`COMPASS_KEYS`].
pub const COMPASS_LONGER_KEYS: [u8; 8] = *b"KLJHUNBY";

/// An ordered list of legal key codes. Actions are identified by their index
/// in this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    keys: Vec<u8>,
}

impl ActionSet {
    pub fn new(keys: Vec<u8>) -> Self {
        Self { keys }
    }

    /// MORE, the eight compass directions, and their longer variants.
    pub fn navigation() -> Self {
        let mut keys = vec![MORE_KEY];
        keys.extend_from_slice(&COMPASS_KEYS);
        keys.extend_from_slice(&COMPASS_LONGER_KEYS);
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key code of the action at `index`.
    pub fn key(&self, index: usize) -> Option<u8> {
        self.keys.get(index).copied()
    }

    /// Map a raw key to its action index.
    pub fn lookup(&self, key: u8) -> Result<usize, IllegalAction> {
        self.keys
            .iter()
            .position(|k| *k == key)
            .ok_or(IllegalAction { key })
    }

    /// Printable form of an action, e.g. `'k'` or `'\r'`.
    pub fn describe(&self, index: usize) -> String {
        match self.key(index) {
            Some(key) => format!("{:?}", char::from(key)),
            None => format!("<invalid action {index}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_set_has_seventeen_actions() {
        let set = ActionSet::navigation();
        assert_eq!(set.len(), 17);
        assert_eq!(set.key(0), Some(MORE_KEY));
        assert_eq!(set.key(1), Some(b'k'));
        assert_eq!(set.key(16), Some(b'Y'));
    }

    #[test]
    fn lookup_maps_legal_keys_and_rejects_others() {
        let set = ActionSet::navigation();
        assert_eq!(set.lookup(b'j'), Ok(3));
        assert_eq!(set.lookup(b'L'), Ok(10));
        assert_eq!(set.lookup(b'x'), Err(IllegalAction { key: b'x' }));
        assert!(set.lookup(INTERRUPT_KEY).is_err());
    }

    #[test]
    fn interrupt_is_ctrl_c() {
        assert_eq!(INTERRUPT_KEY, 3);
    }
}
