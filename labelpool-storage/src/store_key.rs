//! Namespaced byte keys for the LMDB backend.
//!
//! List metadata, list items, and document entries share one keyspace per
//! database; `StoreKey` keeps them from colliding.

/// Separator between the name and the suffix. Never valid inside UTF-8,
/// so no list or document name can contain it.
const SEPARATOR: u8 = 0xFF;

/// Kind of entry a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    ListLen,
    ListItem,
    DocEntry,
}

impl KeyKind {
    fn to_byte(self) -> u8 {
        match self {
            KeyKind::ListLen => 1,
            KeyKind::ListItem => 2,
            KeyKind::DocEntry => 3,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(KeyKind::ListLen),
            2 => Some(KeyKind::ListItem),
            3 => Some(KeyKind::DocEntry),
            _ => None,
        }
    }
}

/// A key scoped to a list or document name.
///
/// # Binary Format
///
/// - Byte 0: kind
/// - Bytes 1..n: name (UTF-8)
/// - Byte n: separator (0xFF)
/// - Remaining: suffix (big-endian sequence number for list items, the
///   entry key for documents, empty for list lengths)
///
/// Big-endian sequence numbers keep a list's items in push order under
/// LMDB's lexicographic key ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    kind: KeyKind,
    name: String,
    suffix: Vec<u8>,
}

impl StoreKey {
    pub fn list_len(list: &str) -> Self {
        Self {
            kind: KeyKind::ListLen,
            name: list.to_string(),
            suffix: Vec::new(),
        }
    }

    pub fn list_item(list: &str, seq: u64) -> Self {
        Self {
            kind: KeyKind::ListItem,
            name: list.to_string(),
            suffix: seq.to_be_bytes().to_vec(),
        }
    }

    pub fn doc_entry(name: &str, key: &str) -> Self {
        Self {
            kind: KeyKind::DocEntry,
            name: name.to_string(),
            suffix: key.as_bytes().to_vec(),
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sequence number of a list item key.
    pub fn seq(&self) -> Option<u64> {
        if self.kind != KeyKind::ListItem {
            return None;
        }
        let bytes: [u8; 8] = self.suffix.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.name.len() + self.suffix.len());
        bytes.push(self.kind.to_byte());
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(&self.suffix);
        bytes
    }

    /// Decode a key from bytes; `None` if malformed.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&kind, rest) = bytes.split_first()?;
        let kind = KeyKind::from_byte(kind)?;
        let sep = rest.iter().position(|&b| b == SEPARATOR)?;
        let name = std::str::from_utf8(&rest[..sep]).ok()?.to_string();
        let suffix = rest[sep + 1..].to_vec();
        Some(Self { kind, name, suffix })
    }
}
