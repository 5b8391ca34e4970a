use crate::tag::Tag;
use serde::{Deserialize, Serialize};

/// One shortened URL owned by a client.
///
/// An entry is created once per successful shorten request. Afterwards
/// only the delete pipeline mutates it, and only by flipping `deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortEntry {
    /// The globally unique short code for this URL.
    pub tag: Tag,
    /// The original URL that was shortened.
    pub long_url: String,
    /// Soft-delete marker; the entry is never physically removed.
    #[serde(default)]
    pub deleted: bool,
}

impl ShortEntry {
    /// Creates a new, active entry.
    pub fn new(tag: Tag, long_url: impl Into<String>) -> Self {
        Self {
            tag,
            long_url: long_url.into(),
            deleted: false,
        }
    }
}

/// Everything stored for one client identity.
///
/// Records are created lazily on first contact without a valid signed
/// identity. The cookie is the 32-character opaque id handed to the
/// client; the key is the 64-character secret its token is signed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub cookie: String,
    pub key: String,
    #[serde(default)]
    pub entries: Vec<ShortEntry>,
}

impl ClientRecord {
    /// Creates an empty record for a freshly issued identity.
    pub fn new(cookie: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            key: key.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the active (non-deleted) entry for `long_url`, if any.
    pub fn active_entry(&self, long_url: &str) -> Option<&ShortEntry> {
        self.entries
            .iter()
            .find(|e| !e.deleted && e.long_url == long_url)
    }

    /// Returns the entry identified by `tag`, deleted or not.
    pub fn entry_by_tag(&self, tag: &Tag) -> Option<&ShortEntry> {
        self.entries.iter().find(|e| &e.tag == tag)
    }
}

/// A request to soft-delete a set of tags owned by one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub cookie: String,
    pub tags: Vec<Tag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: &str, url: &str, deleted: bool) -> ShortEntry {
        ShortEntry {
            tag: Tag::new_unchecked(tag),
            long_url: url.to_string(),
            deleted,
        }
    }

    #[test]
    fn active_entry_skips_deleted() {
        let mut record = ClientRecord::new("c1", "k1");
        record.entries.push(entry("aaaaaaaa", "https://example.com", true));
        record.entries.push(entry("bbbbbbbb", "https://example.com", false));

        let found = record.active_entry("https://example.com").unwrap();
        assert_eq!(found.tag.as_str(), "bbbbbbbb");
    }

    #[test]
    fn active_entry_none_when_all_deleted() {
        let mut record = ClientRecord::new("c1", "k1");
        record.entries.push(entry("aaaaaaaa", "https://example.com", true));

        assert!(record.active_entry("https://example.com").is_none());
    }

    #[test]
    fn entry_by_tag_finds_deleted() {
        let mut record = ClientRecord::new("c1", "k1");
        record.entries.push(entry("aaaaaaaa", "https://example.com", true));

        let found = record.entry_by_tag(&Tag::new_unchecked("aaaaaaaa")).unwrap();
        assert!(found.deleted);
    }

    #[test]
    fn record_roundtrips_through_json() {
        let mut record = ClientRecord::new("c1", "k1");
        record.entries.push(entry("aaaaaaaa", "https://example.com", false));

        let json = serde_json::to_string(&record).unwrap();
        let back: ClientRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn missing_fields_default() {
        let json = r#"{"cookie":"c1","key":"k1"}"#;
        let record: ClientRecord = serde_json::from_str(json).unwrap();
        assert!(record.entries.is_empty());

        let json = r#"{"tag":"aaaaaaaa","long_url":"https://example.com"}"#;
        let entry: ShortEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.deleted);
    }
}
