/// Table directory on the master page.
///
/// Page 0 layout after the 12-byte header: an array of 40-byte slots, one
/// per table, packed contiguously from slot 0:
///   name:       32 bytes, UTF-8, NUL-padded
///   start_page: u32 (head of the heap page chain)
///   last_page:  u32 (tail of the heap page chain)
use crate::error::{Result, SawitError};
use crate::schema::names;
use crate::storage::page::{Page, PageId, PAGE_SIZE};
use crate::storage::pager::Pager;

pub const CATALOG_HEADER_SIZE: usize = 12;
pub const SLOT_SIZE: usize = 40;
pub const NAME_SIZE: usize = 32;
pub const MAX_TABLES: usize = (PAGE_SIZE - CATALOG_HEADER_SIZE) / SLOT_SIZE;

/// Name of the system table persisting index definitions.
pub const INDEXES_TABLE: &str = "_indexes";

#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub name: String,
    pub start_page: PageId,
    pub last_page: PageId,
    /// Slot position on page 0 at read time.
    pub slot: usize,
}

fn slot_offset(slot: usize) -> usize {
    CATALOG_HEADER_SIZE + slot * SLOT_SIZE
}

fn read_slot(master: &Page, slot: usize) -> Option<TableEntry> {
    let off = slot_offset(slot);
    let name_bytes = &master.data[off..off + NAME_SIZE];
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
    if end == 0 {
        return None;
    }
    let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
    let start_page =
        u32::from_le_bytes(master.data[off + 32..off + 36].try_into().unwrap());
    let last_page =
        u32::from_le_bytes(master.data[off + 36..off + 40].try_into().unwrap());
    Some(TableEntry {
        name,
        start_page,
        last_page,
        slot,
    })
}

fn write_slot(master: &mut Page, slot: usize, name: &str, start: PageId, last: PageId) {
    let off = slot_offset(slot);
    master.data[off..off + NAME_SIZE].fill(0);
    master.data[off..off + name.len()].copy_from_slice(name.as_bytes());
    master.data[off + 32..off + 36].copy_from_slice(&start.to_le_bytes());
    master.data[off + 36..off + 40].copy_from_slice(&last.to_le_bytes());
}

/// Linear scan of the directory, bounded by `num_tables`.
pub fn find_table(pager: &mut Pager, name: &str) -> Result<Option<TableEntry>> {
    let master = pager.read_page(0)?;
    for slot in 0..master.num_tables() as usize {
        if let Some(entry) = read_slot(&master, slot) {
            if entry.name == name {
                return Ok(Some(entry));
            }
        }
    }
    Ok(None)
}

pub fn list_tables(pager: &mut Pager) -> Result<Vec<TableEntry>> {
    let master = pager.read_page(0)?;
    let mut entries = Vec::new();
    for slot in 0..master.num_tables() as usize {
        if let Some(entry) = read_slot(&master, slot) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Create a table: validate the name, allocate one empty heap page and
/// append a directory slot. `internal` bypasses the reserved-name set.
pub fn create_table(pager: &mut Pager, name: &str, internal: bool) -> Result<TableEntry> {
    if internal {
        names::validate_internal_name(name)?;
    } else {
        names::validate_table_name(name)?;
    }
    if find_table(pager, name)?.is_some() {
        return Err(SawitError::NameTaken(name.to_string()));
    }

    let master = pager.read_page(0)?;
    let slot = master.num_tables() as usize;
    if slot >= MAX_TABLES {
        return Err(SawitError::PageZeroFull);
    }

    let first_page = pager.alloc_page()?;

    // alloc_page rewrote page 0; reread before adding the slot.
    let mut master = pager.read_page(0)?;
    write_slot(&mut master, slot, name, first_page, first_page);
    master.set_num_tables(slot as u32 + 1);
    pager.write_page(0, &master)?;

    Ok(TableEntry {
        name: name.to_string(),
        start_page: first_page,
        last_page: first_page,
        slot,
    })
}

/// Remove a table's directory slot. The last slot is moved over the freed
/// one so the directory stays packed; the table's heap pages are leaked.
pub fn drop_table(pager: &mut Pager, name: &str) -> Result<TableEntry> {
    let entry =
        find_table(pager, name)?.ok_or_else(|| SawitError::TableMissing(name.to_string()))?;

    let mut master = pager.read_page(0)?;
    let last_slot = master.num_tables() as usize - 1;
    if entry.slot != last_slot {
        let moved = read_slot(&master, last_slot).ok_or(SawitError::InvalidPage)?;
        write_slot(
            &mut master,
            entry.slot,
            &moved.name,
            moved.start_page,
            moved.last_page,
        );
    }
    let off = slot_offset(last_slot);
    master.data[off..off + SLOT_SIZE].fill(0);
    master.set_num_tables(last_slot as u32);
    pager.write_page(0, &master)?;

    Ok(entry)
}

/// Update a single slot's tail-page pointer.
pub fn set_last_page(pager: &mut Pager, name: &str, last: PageId) -> Result<()> {
    let entry =
        find_table(pager, name)?.ok_or_else(|| SawitError::TableMissing(name.to_string()))?;
    let mut master = pager.read_page(0)?;
    let off = slot_offset(entry.slot);
    master.data[off + 36..off + 40].copy_from_slice(&last.to_le_bytes());
    pager.write_page(0, &master)?;
    Ok(())
}

/// The `_indexes` system table, created lazily on first open.
pub fn ensure_indexes_table(pager: &mut Pager) -> Result<TableEntry> {
    match find_table(pager, INDEXES_TABLE)? {
        Some(entry) => Ok(entry),
        None => create_table(pager, INDEXES_TABLE, true),
    }
}
