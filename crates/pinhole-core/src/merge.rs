//! Set-union merge of client records.
//!
//! The in-memory and file backends enforce the active-uniqueness
//! invariant with these functions; the relational backend gets the same
//! behavior from a partial unique index instead. The two mechanisms must
//! stay observably identical.

use crate::error::{Result, StorageError};
use crate::model::{ClientRecord, ShortEntry};

/// Structural set union of two entry lists.
///
/// Preserves the ordering of `old` and appends items of `new` that are
/// not already present. Equality is over the whole entry (tag, URL,
/// deleted flag), so repeated merges with overlapping inputs are
/// idempotent.
pub fn merge_urls(old: &[ShortEntry], new: &[ShortEntry]) -> Vec<ShortEntry> {
    let mut merged = old.to_vec();
    for entry in new {
        if !merged.contains(entry) {
            merged.push(entry.clone());
        }
    }
    merged
}

/// Folds `incoming` into `records` without any uniqueness check.
///
/// If a record with the same cookie exists its entries are merged via
/// [`merge_urls`] (keeping the stored signing key); otherwise the whole
/// record is appended.
pub fn merge_data(records: &mut Vec<ClientRecord>, incoming: ClientRecord) {
    match records.iter_mut().find(|r| r.cookie == incoming.cookie) {
        Some(existing) => {
            existing.entries = merge_urls(&existing.entries, &incoming.entries);
        }
        None => records.push(incoming),
    }
}

/// Pre-checked merge used by the write path.
///
/// Fails with [`StorageError::DuplicateUrl`] before mutating anything if
/// any active URL of `incoming` already has an active entry under that
/// cookie — whether the clash is with the stored record or with an
/// earlier entry of `incoming` itself. Deleted incoming entries never
/// clash; this mirrors a partial unique index covering only active rows.
pub fn merge(records: &mut Vec<ClientRecord>, incoming: ClientRecord) -> Result<()> {
    let existing = records.iter().find(|r| r.cookie == incoming.cookie);

    let mut seen: Vec<&str> = Vec::new();
    for entry in &incoming.entries {
        if entry.deleted {
            continue;
        }
        if seen.contains(&entry.long_url.as_str())
            || existing.is_some_and(|r| r.active_entry(&entry.long_url).is_some())
        {
            return Err(StorageError::DuplicateUrl(entry.long_url.clone()));
        }
        seen.push(&entry.long_url);
    }

    merge_data(records, incoming);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    fn entry(tag: &str, url: &str, deleted: bool) -> ShortEntry {
        ShortEntry {
            tag: Tag::new_unchecked(tag),
            long_url: url.to_string(),
            deleted,
        }
    }

    fn record(cookie: &str, entries: Vec<ShortEntry>) -> ClientRecord {
        ClientRecord {
            cookie: cookie.to_string(),
            key: format!("key-{cookie}"),
            entries,
        }
    }

    #[test]
    fn merge_urls_appends_unseen() {
        let old = vec![entry("aaaaaaaa", "https://a.example", false)];
        let new = vec![entry("bbbbbbbb", "https://b.example", false)];

        let merged = merge_urls(&old, &new);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].tag.as_str(), "aaaaaaaa");
        assert_eq!(merged[1].tag.as_str(), "bbbbbbbb");
    }

    #[test]
    fn merge_urls_is_idempotent() {
        let old = vec![
            entry("aaaaaaaa", "https://a.example", false),
            entry("bbbbbbbb", "https://b.example", true),
        ];

        let once = merge_urls(&old, &old);
        let twice = merge_urls(&once, &old);
        assert_eq!(once, old);
        assert_eq!(twice, old);
    }

    #[test]
    fn merge_urls_preserves_old_ordering() {
        let old = vec![
            entry("cccccccc", "https://c.example", false),
            entry("aaaaaaaa", "https://a.example", false),
        ];
        let new = vec![
            entry("aaaaaaaa", "https://a.example", false),
            entry("bbbbbbbb", "https://b.example", false),
        ];

        let merged = merge_urls(&old, &new);
        let tags: Vec<&str> = merged.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["cccccccc", "aaaaaaaa", "bbbbbbbb"]);
    }

    #[test]
    fn merge_data_appends_new_cookie() {
        let mut records = vec![record("c1", vec![])];
        merge_data(&mut records, record("c2", vec![]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].cookie, "c2");
    }

    #[test]
    fn merge_data_keeps_stored_key() {
        let mut records = vec![record("c1", vec![])];
        let mut incoming = record("c1", vec![entry("aaaaaaaa", "https://a.example", false)]);
        incoming.key = "some-other-key".to_string();

        merge_data(&mut records, incoming);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "key-c1");
        assert_eq!(records[0].entries.len(), 1);
    }

    #[test]
    fn merge_rejects_active_duplicate() {
        let mut records = vec![record(
            "c1",
            vec![entry("aaaaaaaa", "https://a.example", false)],
        )];
        let incoming = record("c1", vec![entry("bbbbbbbb", "https://a.example", false)]);

        let err = merge(&mut records, incoming).unwrap_err();
        assert!(err.is_duplicate());
        // nothing was mutated
        assert_eq!(records[0].entries.len(), 1);
        assert_eq!(records[0].entries[0].tag.as_str(), "aaaaaaaa");
    }

    #[test]
    fn merge_allows_resurrecting_deleted_url() {
        let mut records = vec![record(
            "c1",
            vec![entry("aaaaaaaa", "https://a.example", true)],
        )];
        let incoming = record("c1", vec![entry("bbbbbbbb", "https://a.example", false)]);

        merge(&mut records, incoming).unwrap();
        assert_eq!(records[0].entries.len(), 2);
        assert!(records[0].entries[0].deleted);
        assert!(!records[0].entries[1].deleted);
    }

    #[test]
    fn merge_rejects_duplicate_within_incoming() {
        let mut records = vec![record("c1", vec![])];
        let incoming = record(
            "c1",
            vec![
                entry("aaaaaaaa", "https://a.example", false),
                entry("bbbbbbbb", "https://a.example", false),
            ],
        );

        let err = merge(&mut records, incoming).unwrap_err();
        assert!(err.is_duplicate());
        // nothing was mutated
        assert!(records[0].entries.is_empty());
    }

    #[test]
    fn merge_allows_deleted_duplicate_within_incoming() {
        let mut records = Vec::new();
        let incoming = record(
            "c1",
            vec![
                entry("aaaaaaaa", "https://a.example", true),
                entry("bbbbbbbb", "https://a.example", false),
            ],
        );

        merge(&mut records, incoming).unwrap();
        assert_eq!(records[0].entries.len(), 2);
    }

    #[test]
    fn merge_accepts_deleted_incoming_over_active_stored() {
        // only one active entry for the URL exists afterwards, so the
        // invariant holds; a partial index would accept this insert too
        let mut records = vec![record(
            "c1",
            vec![entry("aaaaaaaa", "https://a.example", false)],
        )];
        let incoming = record("c1", vec![entry("bbbbbbbb", "https://a.example", true)]);

        merge(&mut records, incoming).unwrap();
        assert_eq!(records[0].entries.len(), 2);
        assert!(records[0].entries[1].deleted);
    }

    #[test]
    fn merge_allows_same_url_under_other_cookie() {
        let mut records = vec![record(
            "c1",
            vec![entry("aaaaaaaa", "https://a.example", false)],
        )];
        let incoming = record("c2", vec![entry("bbbbbbbb", "https://a.example", false)]);

        merge(&mut records, incoming).unwrap();
        assert_eq!(records.len(), 2);
    }
}
