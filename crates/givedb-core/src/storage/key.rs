//! Record key encoding.

/// Size of a record identifier in bytes.
pub const ID_SIZE: usize = 8;

/// Separator between the table name and the identifier.
const SEPARATOR: u8 = 0;

/// Prefix for per-table id sequences in the meta tree.
const SEQUENCE_PREFIX: &[u8] = b"seq:";

/// Key of a stored record.
///
/// Key format: `[table][0x00][id (8 bytes, big-endian)]`
///
/// Big-endian encoding keeps a table's records in ascending id order,
/// so a prefix scan yields them in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Storage table name.
    pub table: String,
    /// Record identifier.
    pub id: u64,
}

impl RecordKey {
    /// Create a new record key.
    pub fn new(table: impl Into<String>, id: u64) -> Self {
        Self {
            table: table.into(),
            id,
        }
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = table_prefix(&self.table);
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ID_SIZE + 1 {
            return None;
        }
        let split = bytes.len() - ID_SIZE;
        if bytes[split - 1] != SEPARATOR {
            return None;
        }
        let table = std::str::from_utf8(&bytes[..split - 1]).ok()?;
        let id = decode_id(&bytes[split..])?;

        Some(Self::new(table, id))
    }
}

/// Prefix shared by every record key of a table.
pub fn table_prefix(table: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(table.len() + 1 + ID_SIZE);
    buf.extend_from_slice(table.as_bytes());
    buf.push(SEPARATOR);
    buf
}

/// Meta tree key holding the last id handed out for a table.
pub fn sequence_key(table: &str) -> Vec<u8> {
    let mut buf = SEQUENCE_PREFIX.to_vec();
    buf.extend_from_slice(table.as_bytes());
    buf
}

/// Decode a big-endian id.
pub fn decode_id(bytes: &[u8]) -> Option<u64> {
    let buf: [u8; ID_SIZE] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(buf))
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let key = RecordKey::new("donations", 42);
        let decoded = RecordKey::decode(&key.encode()).unwrap();

        assert_eq!(key, decoded);
    }

    #[test]
    fn test_ordering_within_table() {
        let a = RecordKey::new("stories", 2).encode();
        let b = RecordKey::new("stories", 10).encode();
        let prefix = table_prefix("stories");

        assert!(a < b);
        assert!(a.starts_with(&prefix));
        assert!(!RecordKey::new("stories_archive", 1).encode().starts_with(&prefix));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(RecordKey::decode(b"short").is_none());
        assert!(RecordKey::decode(b"tablexxxxxxxxx").is_none());
        assert!(decode_id(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        // 2020-01-01 in microseconds
        assert!(current_timestamp() > 1_577_836_800_000_000);
    }
}
