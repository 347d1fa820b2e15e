/// Heap file: a table's singly-linked chain of data pages.
///
/// New records append to the tail page; overflow links a fresh page and
/// advances the catalog's last-page pointer. Deletes compact a page in
/// place. Updates rewrite in place when the new serialization fits the old
/// slot, otherwise fall back to delete + append.
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SawitError};
use crate::exec::command::Criteria;
use crate::exec::eval;
use crate::index::IndexRegistry;
use crate::schema::catalog::{self, TableEntry};
use crate::storage::page::{PageId, MAX_RECORD_LEN};
use crate::storage::pager::Pager;
use crate::types::Record;

pub struct HeapFile {
    table: String,
    start_page: PageId,
    last_page: PageId,
}

impl HeapFile {
    pub fn open(entry: &TableEntry) -> Self {
        HeapFile {
            table: entry.name.clone(),
            start_page: entry.start_page,
            last_page: entry.last_page,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Append records, serializing each exactly once before any page is
    /// touched so a too-large record fails the whole batch up front.
    pub fn insert_many(
        &mut self,
        pager: &mut Pager,
        indexes: &mut IndexRegistry,
        records: &[Record],
    ) -> Result<usize> {
        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            let bytes = record.to_bytes()?;
            if bytes.len() > MAX_RECORD_LEN {
                return Err(SawitError::RecordTooLarge(bytes.len()));
            }
            encoded.push(bytes);
        }

        let placed = self.append_rows(pager, &encoded)?;
        for (record, page) in records.iter().zip(placed.iter()) {
            indexes.record_inserted(&self.table, record, *page);
        }
        Ok(records.len())
    }

    /// Low-level append without index maintenance. Returns the page each
    /// record landed on.
    fn append_rows(&mut self, pager: &mut Pager, encoded: &[Vec<u8>]) -> Result<Vec<PageId>> {
        let mut page_id = self.last_page;
        let mut page = pager.read_page(page_id)?;
        let mut placed = Vec::with_capacity(encoded.len());
        let mut dirty = false;

        for bytes in encoded {
            if page.free_space() < bytes.len() + 2 {
                let new_id = pager.alloc_page()?;
                page.set_next_page(new_id);
                pager.write_page(page_id, &page)?;
                catalog::set_last_page(pager, &self.table, new_id)?;
                self.last_page = new_id;
                page_id = new_id;
                page = pager.read_page(new_id)?;
                dirty = false;
            }
            page.push_record(bytes)?;
            placed.push(page_id);
            dirty = true;
        }

        if dirty {
            pager.write_page(page_id, &page)?;
        }
        Ok(placed)
    }

    /// Walk the chain applying `criteria`, stopping early at `limit`.
    /// A single comparison takes an inlined match loop instead of the
    /// recursive criteria walker.
    pub fn scan(
        &self,
        pager: &mut Pager,
        criteria: Option<&Criteria>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        let mut page_id = self.start_page;

        loop {
            let objects = pager.read_page_objects(page_id)?;
            match criteria {
                None => {
                    for record in objects.records {
                        out.push(record);
                        if at_limit(&out, limit) {
                            return Ok(out);
                        }
                    }
                }
                Some(Criteria::Leaf(cond)) => {
                    for record in objects.records {
                        if eval::eval_condition(cond, &record) {
                            out.push(record);
                            if at_limit(&out, limit) {
                                return Ok(out);
                            }
                        }
                    }
                }
                Some(tree) => {
                    for record in objects.records {
                        if eval::eval_criteria(tree, &record) {
                            out.push(record);
                            if at_limit(&out, limit) {
                                return Ok(out);
                            }
                        }
                    }
                }
            }
            if objects.next == 0 {
                break;
            }
            page_id = objects.next;
        }
        Ok(out)
    }

    /// Full scan yielding the page id alongside each record. Index rebuilds
    /// use this to seed page hints.
    pub fn scan_raw(&self, pager: &mut Pager) -> Result<Vec<(PageId, Record)>> {
        let mut out = Vec::new();
        let mut page_id = self.start_page;
        loop {
            let objects = pager.read_page_objects(page_id)?;
            for record in objects.records {
                out.push((page_id, record));
            }
            if objects.next == 0 {
                break;
            }
            page_id = objects.next;
        }
        Ok(out)
    }

    /// Matching records with their pages. With `restrict` the scan touches
    /// only the given pages (index page hints); the caller falls back to an
    /// unrestricted call when a hinted scan comes up empty.
    pub fn find_matching(
        &self,
        pager: &mut Pager,
        criteria: Option<&Criteria>,
        restrict: Option<&BTreeSet<PageId>>,
    ) -> Result<Vec<(PageId, Record)>> {
        let mut out = Vec::new();
        match restrict {
            Some(pages) => {
                for &page_id in pages {
                    let objects = pager.read_page_objects(page_id)?;
                    for record in objects.records {
                        if eval::matches(criteria, &record) {
                            out.push((page_id, record));
                        }
                    }
                }
            }
            None => {
                let mut page_id = self.start_page;
                loop {
                    let objects = pager.read_page_objects(page_id)?;
                    for record in objects.records {
                        if eval::matches(criteria, &record) {
                            out.push((page_id, record));
                        }
                    }
                    if objects.next == 0 {
                        break;
                    }
                    page_id = objects.next;
                }
            }
        }
        Ok(out)
    }

    /// Remove the given records and run index maintenance for each.
    pub fn remove_records(
        &self,
        pager: &mut Pager,
        indexes: &mut IndexRegistry,
        victims: &[(PageId, Record)],
    ) -> Result<usize> {
        let removed = self.remove_from_pages(pager, victims)?;
        for (_, record) in victims {
            indexes.record_removed(&self.table, record);
        }
        Ok(removed)
    }

    /// Compact each affected page in place: survivors re-packed from offset
    /// 8, counts updated, tail zero-filled. No index maintenance.
    fn remove_from_pages(&self, pager: &mut Pager, victims: &[(PageId, Record)]) -> Result<usize> {
        let mut by_page: BTreeMap<PageId, Vec<&Record>> = BTreeMap::new();
        for (page_id, record) in victims {
            by_page.entry(*page_id).or_default().push(record);
        }

        let mut removed = 0usize;
        for (page_id, mut pending) in by_page {
            let mut page = pager.read_page(page_id)?;
            let mut survivors: Vec<Vec<u8>> = Vec::new();
            for (_, bytes) in page.records() {
                match Record::from_bytes(bytes) {
                    Ok(record) => {
                        if let Some(pos) = pending.iter().position(|v| **v == record) {
                            pending.remove(pos);
                            removed += 1;
                        } else {
                            survivors.push(bytes.to_vec());
                        }
                    }
                    // Keep undecodable slots; scans skip them anyway.
                    Err(_) => survivors.push(bytes.to_vec()),
                }
            }
            page.repack(&survivors);
            pager.write_page(page_id, &page)?;
        }
        Ok(removed)
    }

    /// Apply `updates` to each victim. Fits-in-place rewrites keep the slot
    /// (old length prefix, NUL-padded tail); growth falls back to
    /// delete + append. Returns the post-image records.
    pub fn update_records(
        &mut self,
        pager: &mut Pager,
        indexes: &mut IndexRegistry,
        victims: &[(PageId, Record)],
        updates: &Record,
    ) -> Result<Vec<Record>> {
        if updates.is_empty() {
            // Visible no-op; report the matched rows untouched.
            return Ok(victims.iter().map(|(_, r)| r.clone()).collect());
        }

        let mut results = Vec::with_capacity(victims.len());
        for (page_id, old) in victims {
            let new = old.merged(updates);
            let bytes = new.to_bytes()?;
            if bytes.len() > MAX_RECORD_LEN {
                return Err(SawitError::RecordTooLarge(bytes.len()));
            }

            let mut page = pager.read_page(*page_id)?;
            let slot = page.records().find_map(|(offset, slice)| {
                match Record::from_bytes(slice) {
                    Ok(decoded) if decoded == *old => Some((offset, slice.len())),
                    _ => None,
                }
            });

            let landed = match slot {
                Some((offset, stored_len)) if bytes.len() <= stored_len => {
                    let start = offset + 2;
                    page.data[start..start + bytes.len()].copy_from_slice(&bytes);
                    page.data[start + bytes.len()..start + stored_len].fill(0);
                    pager.write_page(*page_id, &page)?;
                    *page_id
                }
                Some(_) => {
                    self.remove_from_pages(pager, &[(*page_id, old.clone())])?;
                    self.append_rows(pager, std::slice::from_ref(&bytes))?[0]
                }
                // The record is no longer on this page; nothing to rewrite.
                None => continue,
            };

            indexes.record_updated(&self.table, old, &new, updates, landed);
            results.push(new);
        }
        Ok(results)
    }
}

fn at_limit(out: &[Record], limit: Option<usize>) -> bool {
    matches!(limit, Some(n) if out.len() >= n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::command::{CmpOp, Operand};
    use crate::types::Value;
    use tempfile::TempDir;

    fn setup() -> (Pager, IndexRegistry, HeapFile, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&dir.path().join("test.db"), 16).unwrap();
        let entry = catalog::create_table(&mut pager, "t", false).unwrap();
        (pager, IndexRegistry::new(), HeapFile::open(&entry), dir)
    }

    fn row(id: i64, payload: &str) -> Record {
        Record::from_pairs([("id", Value::Int(id)), ("v", Value::from(payload))])
    }

    #[test]
    fn test_insert_and_scan() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        let rows: Vec<Record> = (1..=5).map(|i| row(i, "x")).collect();
        assert_eq!(heap.insert_many(&mut pager, &mut indexes, &rows).unwrap(), 5);

        let all = heap.scan(&mut pager, None, None).unwrap();
        assert_eq!(all, rows);

        let two = heap.scan(&mut pager, None, Some(2)).unwrap();
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn test_overflow_links_new_page_and_updates_catalog() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        // ~500-byte records: a 4 KiB page fits 8, so 20 need 3 pages.
        let big = "y".repeat(480);
        let rows: Vec<Record> = (0..20).map(|i| row(i, &big)).collect();
        heap.insert_many(&mut pager, &mut indexes, &rows).unwrap();

        let entry = catalog::find_table(&mut pager, "t").unwrap().unwrap();
        assert!(entry.last_page > entry.start_page);

        // Chain reaches the catalog tail and terminates there.
        let mut page_id = entry.start_page;
        let mut seen = vec![page_id];
        loop {
            let next = pager.read_page(page_id).unwrap().next_page();
            if next == 0 {
                break;
            }
            page_id = next;
            seen.push(page_id);
        }
        assert_eq!(*seen.last().unwrap(), entry.last_page);
        assert!(seen.len() >= 3);

        assert_eq!(heap.scan(&mut pager, None, None).unwrap().len(), 20);
    }

    #[test]
    fn test_record_too_large_rejected_before_write() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        let huge = row(1, &"z".repeat(5000));
        assert!(matches!(
            heap.insert_many(&mut pager, &mut indexes, &[row(0, "ok"), huge]),
            Err(SawitError::RecordTooLarge(_))
        ));
        // Nothing from the failed batch landed.
        assert!(heap.scan(&mut pager, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_compacts_page() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        let rows: Vec<Record> = (1..=4).map(|i| row(i, "v")).collect();
        heap.insert_many(&mut pager, &mut indexes, &rows).unwrap();

        let criteria = Criteria::eq("id", Value::Int(2));
        let victims = heap.find_matching(&mut pager, Some(&criteria), None).unwrap();
        assert_eq!(victims.len(), 1);
        assert_eq!(heap.remove_records(&mut pager, &mut indexes, &victims).unwrap(), 1);

        let entry = catalog::find_table(&mut pager, "t").unwrap().unwrap();
        let page = pager.read_page(entry.start_page).unwrap();
        assert_eq!(page.record_count(), 3);
        // Slots tile exactly: free_offset == 8 + sum(2 + len).
        let expected: usize = 8 + page.records().map(|(_, r)| 2 + r.len()).sum::<usize>();
        assert_eq!(page.free_offset() as usize, expected);

        let left = heap.scan(&mut pager, None, None).unwrap();
        assert_eq!(left.len(), 3);
        assert!(left.iter().all(|r| r.get("id") != Some(&Value::Int(2))));
    }

    #[test]
    fn test_update_in_place_keeps_slot() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        heap.insert_many(&mut pager, &mut indexes, &[row(1, "abcdef"), row(2, "x")])
            .unwrap();

        let entry = catalog::find_table(&mut pager, "t").unwrap().unwrap();
        let before = pager.read_page(entry.start_page).unwrap().free_offset();

        let criteria = Criteria::eq("id", Value::Int(1));
        let victims = heap.find_matching(&mut pager, Some(&criteria), None).unwrap();
        let mut updates = Record::new();
        updates.set("v".into(), Value::from("ab")); // shrink: fits in place
        let out = heap
            .update_records(&mut pager, &mut indexes, &victims, &updates)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("v"), Some(&Value::Str("ab".into())));

        let page = pager.read_page(entry.start_page).unwrap();
        assert_eq!(page.free_offset(), before);
        assert_eq!(page.record_count(), 2);

        let all = heap.scan(&mut pager, None, None).unwrap();
        assert_eq!(all[0].get("v"), Some(&Value::Str("ab".into())));
        // Field order survives the in-place rewrite.
        assert_eq!(all[0].keys().collect::<Vec<_>>(), vec!["id", "v"]);
    }

    #[test]
    fn test_update_growth_falls_back_to_move() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        heap.insert_many(&mut pager, &mut indexes, &[row(1, "s"), row(2, "t")])
            .unwrap();

        let criteria = Criteria::eq("id", Value::Int(1));
        let victims = heap.find_matching(&mut pager, Some(&criteria), None).unwrap();
        let mut updates = Record::new();
        updates.set("v".into(), Value::from("much longer than before"));
        heap.update_records(&mut pager, &mut indexes, &victims, &updates)
            .unwrap();

        let all = heap.scan(&mut pager, None, None).unwrap();
        assert_eq!(all.len(), 2);
        // Moved to the tail: id=2 now comes first.
        assert_eq!(all[0].get("id"), Some(&Value::Int(2)));
        assert_eq!(
            all[1].get("v"),
            Some(&Value::Str("much longer than before".into()))
        );
    }

    #[test]
    fn test_empty_updates_are_a_noop() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        heap.insert_many(&mut pager, &mut indexes, &[row(1, "keep")]).unwrap();
        let victims = heap.find_matching(&mut pager, None, None).unwrap();
        let out = heap
            .update_records(&mut pager, &mut indexes, &victims, &Record::new())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(heap.scan(&mut pager, None, None).unwrap()[0].get("v"),
                   Some(&Value::Str("keep".into())));
    }

    #[test]
    fn test_single_comparison_fast_path_matches_tree_path() {
        let (mut pager, mut indexes, mut heap, _dir) = setup();
        let rows: Vec<Record> = (1..=6).map(|i| row(i, if i % 2 == 0 { "e" } else { "o" })).collect();
        heap.insert_many(&mut pager, &mut indexes, &rows).unwrap();

        let leaf = Criteria::leaf("v", CmpOp::Eq, Operand::Value(Value::from("e")));
        let tree = Criteria::and(vec![leaf.clone()]);
        let via_leaf = heap.scan(&mut pager, Some(&leaf), None).unwrap();
        let via_tree = heap.scan(&mut pager, Some(&tree), None).unwrap();
        assert_eq!(via_leaf, via_tree);
        assert_eq!(via_leaf.len(), 3);
    }
}
