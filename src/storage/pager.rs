use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use tracing::warn;

use crate::error::{Result, SawitError};
use crate::storage::page::{Page, PageId, PAGE_SIZE};
use crate::types::Record;

/// Decoded view of a heap page, cached for hot scans.
#[derive(Clone)]
pub struct PageObjects {
    pub next: PageId,
    pub records: Vec<Record>,
}

/// Owns the database file. All page I/O funnels through here; writes are
/// followed by a best-effort fsync so a returned write is either durable or
/// recoverable from the WAL.
pub struct Pager {
    file: File,
    obj_cache: LruCache<PageId, PageObjects>,
}

impl Pager {
    /// Open the database file, creating and initializing it when absent.
    pub fn open(path: &Path, cache_capacity: usize) -> Result<Self> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap();
        let mut pager = Pager {
            file,
            obj_cache: LruCache::new(capacity),
        };

        if !existed || pager.file.metadata()?.len() < PAGE_SIZE as u64 {
            pager.write_page(0, &Page::new_master())?;
        } else {
            pager.read_page(0)?.check_magic()?;
        }

        Ok(pager)
    }

    pub fn read_page(&mut self, id: PageId) -> Result<Page> {
        let offset = id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut data = [0u8; PAGE_SIZE];
        self.file
            .read_exact(&mut data)
            .map_err(|_| SawitError::PageNotFound(id))?;
        Ok(Page::from_bytes(data))
    }

    /// Write exactly one page and force it down. A failed sync is tolerated;
    /// durability then rests on the WAL.
    pub fn write_page(&mut self, id: PageId, page: &Page) -> Result<()> {
        self.obj_cache.pop(&id);
        let offset = id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&page.data)?;
        if let Err(e) = self.file.sync_data() {
            warn!(page = id, error = %e, "page sync failed");
        }
        Ok(())
    }

    /// Allocate the next page id, bump `total_pages` on the master page and
    /// initialize the new page as an empty heap page.
    pub fn alloc_page(&mut self) -> Result<PageId> {
        let mut master = self.read_page(0)?;
        let new_id = master.total_pages();
        master.set_total_pages(new_id + 1);
        self.write_page(0, &master)?;
        self.write_page(new_id, &Page::new_heap())?;
        Ok(new_id)
    }

    pub fn total_pages(&mut self) -> Result<u32> {
        Ok(self.read_page(0)?.total_pages())
    }

    /// Read-through cache of a heap page decoded to records. Invalidated by
    /// any `write_page` for the same id. Records that fail to decode are
    /// skipped so a single corrupt slot cannot stall a scan.
    pub fn read_page_objects(&mut self, id: PageId) -> Result<PageObjects> {
        if let Some(objs) = self.obj_cache.get(&id) {
            return Ok(objs.clone());
        }

        let page = self.read_page(id)?;
        let mut records = Vec::with_capacity(page.record_count() as usize);
        for (offset, bytes) in page.records() {
            match Record::from_bytes(bytes) {
                Ok(rec) => records.push(rec),
                Err(e) => warn!(page = id, offset, error = %e, "skipping corrupt record"),
            }
        }
        let objs = PageObjects {
            next: page.next_page(),
            records,
        };
        self.obj_cache.put(id, objs.clone());
        Ok(objs)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
