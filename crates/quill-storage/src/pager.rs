//! Page cache over a single database file.

use crate::config::TableConfig;
use quill_common::page::{PageNum, PAGE_SIZE};
use quill_common::{QuillError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// A cached page and its write-back state.
struct CachedPage {
    /// Page data buffer.
    data: Box<[u8; PAGE_SIZE]>,
    /// Whether the page differs from its on-disk copy.
    dirty: bool,
}

/// Maps page numbers to in-memory buffers backed by one file.
///
/// Pages are loaded lazily and stay resident until the pager is closed. The
/// cache is a Vec indexed by page number, so `pages.len()` never exceeds
/// `max_pages`. Pages are only ever appended; nothing is recycled.
pub struct Pager {
    /// The database file.
    file: File,
    /// Path to the file.
    path: PathBuf,
    /// Number of whole pages currently on disk.
    file_pages: u32,
    /// Cached pages by page number (index = page_num).
    pages: Vec<Option<CachedPage>>,
    /// One past the highest page number touched so far.
    num_pages: u32,
    /// Hard ceiling on the page count.
    max_pages: u32,
    /// Call fsync after the final flush.
    fsync_on_close: bool,
    /// Set once close has run, so Drop does not flush again.
    closed: bool,
}

impl Pager {
    /// Opens or creates the database file.
    ///
    /// Fails with `Corrupt` if the file length is not a whole number of pages.
    pub fn open<P: AsRef<Path>>(path: P, config: &TableConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(QuillError::Corrupt { len: file_len });
        }

        let file_pages = (file_len / PAGE_SIZE as u64) as u32;
        if file_pages > config.max_pages {
            return Err(QuillError::ConfigError(format!(
                "file has {} pages but max_pages is {}",
                file_pages, config.max_pages
            )));
        }

        debug!(path = %path.display(), file_pages, "opened pager");

        Ok(Self {
            file,
            path,
            file_pages,
            pages: Vec::new(),
            num_pages: file_pages,
            max_pages: config.max_pages,
            fsync_on_close: config.fsync_on_close,
            closed: false,
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns one past the highest page number touched so far.
    #[inline]
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Returns the page ceiling.
    #[inline]
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Returns true if the page is loaded in the cache.
    pub fn is_cached(&self, page_num: PageNum) -> bool {
        matches!(self.pages.get(page_num as usize), Some(Some(_)))
    }

    /// Returns true if the page is cached and has unflushed changes.
    pub fn is_dirty(&self, page_num: PageNum) -> bool {
        matches!(self.pages.get(page_num as usize), Some(Some(page)) if page.dirty)
    }

    /// Returns the page number the next allocation will use.
    #[inline]
    pub fn get_unused_page_number(&self) -> PageNum {
        self.num_pages
    }

    /// Fails with `TableFull` unless `count` more pages can be allocated.
    pub fn ensure_capacity(&self, count: u32) -> Result<()> {
        if self.num_pages as u64 + count as u64 > self.max_pages as u64 {
            return Err(QuillError::TableFull {
                max_pages: self.max_pages,
            });
        }
        Ok(())
    }

    /// Claims the next unused page as a zeroed, dirty page.
    pub fn allocate_page(&mut self) -> Result<PageNum> {
        self.ensure_capacity(1)?;
        let page_num = self.get_unused_page_number();
        self.load(page_num)?;
        trace!(page_num, "allocated page");
        Ok(page_num)
    }

    /// Gets a page for reading, loading it from disk on first access.
    pub fn get_page(&mut self, page_num: PageNum) -> Result<&[u8; PAGE_SIZE]> {
        let page = self.load(page_num)?;
        Ok(&page.data)
    }

    /// Gets a page for writing and marks it dirty.
    pub fn get_page_mut(&mut self, page_num: PageNum) -> Result<&mut [u8; PAGE_SIZE]> {
        let page = self.load(page_num)?;
        page.dirty = true;
        Ok(&mut page.data)
    }

    /// Returns the cached page, reading it in on a miss.
    ///
    /// Pages past the end of the file start zeroed and dirty.
    fn load(&mut self, page_num: PageNum) -> Result<&mut CachedPage> {
        if page_num >= self.max_pages {
            return Err(QuillError::PageOutOfBounds {
                page_num,
                max_pages: self.max_pages,
            });
        }

        let idx = page_num as usize;
        if idx >= self.pages.len() {
            self.pages.resize_with(idx + 1, || None);
        }

        if self.pages[idx].is_none() {
            let mut data = Box::new([0u8; PAGE_SIZE]);
            let on_disk = page_num < self.file_pages;
            if on_disk {
                let offset = page_num as u64 * PAGE_SIZE as u64;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.read_exact(&mut data[..])?;
                trace!(page_num, "loaded page from disk");
            }

            self.pages[idx] = Some(CachedPage {
                data,
                dirty: !on_disk,
            });
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        self.pages[idx]
            .as_mut()
            .ok_or(QuillError::PageOutOfBounds {
                page_num,
                max_pages: self.max_pages,
            })
    }

    /// Writes a cached page back to disk at its offset.
    ///
    /// Flushing a page that was never loaded is a no-op.
    pub fn flush(&mut self, page_num: PageNum) -> Result<()> {
        let Some(Some(page)) = self.pages.get_mut(page_num as usize) else {
            warn!(page_num, "tried to flush a page that is not cached");
            return Ok(());
        };

        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&page.data[..])?;
        page.dirty = false;

        if page_num >= self.file_pages {
            self.file_pages = page_num + 1;
        }
        Ok(())
    }

    /// Flushes every dirty page in page order.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut flushed = 0u32;
        for page_num in 0..self.num_pages {
            if self.is_dirty(page_num) {
                self.flush(page_num)?;
                flushed += 1;
            }
        }
        trace!(flushed, "flushed dirty pages");
        Ok(())
    }

    /// Flushes all dirty pages and closes the file.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush_all()?;
        if self.fsync_on_close {
            self.file.sync_all()?;
        }
        debug!(path = %self.path.display(), num_pages = self.num_pages, "closed pager");
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush_all() {
            warn!(path = %self.path.display(), error = %e, "failed to flush pages on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config() -> TableConfig {
        TableConfig {
            fsync_on_close: false,
            ..Default::default()
        }
    }

    fn create_test_pager() -> (Pager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("test.db"), &test_config()).unwrap();
        (pager, dir)
    }

    #[test]
    fn test_pager_open_new_file() {
        let (pager, dir) = create_test_pager();
        assert_eq!(pager.num_pages(), 0);
        assert_eq!(pager.get_unused_page_number(), 0);
        assert_eq!(pager.max_pages(), 100);
        assert!(dir.path().join("test.db").exists());
    }

    #[test]
    fn test_pager_rejects_partial_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 10]).unwrap();

        let result = Pager::open(&path, &test_config());
        assert!(matches!(result, Err(QuillError::Corrupt { len }) if len == PAGE_SIZE as u64 + 10));

        // The file is left untouched.
        assert_eq!(std::fs::metadata(&path).unwrap().len(), PAGE_SIZE as u64 + 10);
    }

    #[test]
    fn test_pager_rejects_file_over_ceiling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE * 3]).unwrap();

        let config = TableConfig {
            max_pages: 2,
            ..test_config()
        };
        assert!(matches!(Pager::open(&path, &config), Err(QuillError::ConfigError(_))));
    }

    #[test]
    fn test_pager_get_page_zeroed() {
        let (mut pager, _dir) = create_test_pager();
        let page = pager.get_page(0).unwrap();
        assert!(page.iter().all(|&b| b == 0));
        assert_eq!(pager.num_pages(), 1);
        assert!(pager.is_dirty(0));
    }

    #[test]
    fn test_pager_tracks_highest_page() {
        let (mut pager, _dir) = create_test_pager();
        pager.get_page(5).unwrap();
        assert_eq!(pager.num_pages(), 6);
        assert_eq!(pager.get_unused_page_number(), 6);

        // Touching a lower page does not move the high-water mark.
        pager.get_page(2).unwrap();
        assert_eq!(pager.num_pages(), 6);
    }

    #[test]
    fn test_pager_page_out_of_bounds() {
        let (mut pager, _dir) = create_test_pager();
        let result = pager.get_page(100);
        assert!(matches!(
            result,
            Err(QuillError::PageOutOfBounds {
                page_num: 100,
                max_pages: 100
            })
        ));
        assert_eq!(pager.num_pages(), 0);
    }

    #[test]
    fn test_pager_allocate_page() {
        let (mut pager, _dir) = create_test_pager();
        assert_eq!(pager.allocate_page().unwrap(), 0);
        assert_eq!(pager.allocate_page().unwrap(), 1);
        assert_eq!(pager.allocate_page().unwrap(), 2);
        assert_eq!(pager.num_pages(), 3);
    }

    #[test]
    fn test_pager_allocate_until_full() {
        let dir = tempdir().unwrap();
        let config = TableConfig {
            max_pages: 3,
            ..test_config()
        };
        let mut pager = Pager::open(dir.path().join("small.db"), &config).unwrap();

        for _ in 0..3 {
            pager.allocate_page().unwrap();
        }
        assert!(matches!(
            pager.allocate_page(),
            Err(QuillError::TableFull { max_pages: 3 })
        ));
        assert!(pager.ensure_capacity(0).is_ok());
        assert!(pager.ensure_capacity(1).is_err());
    }

    #[test]
    fn test_pager_flush_uncached_is_noop() {
        let (mut pager, _dir) = create_test_pager();
        pager.flush(42).unwrap();
        assert_eq!(pager.num_pages(), 0);
        assert!(!pager.is_cached(42));
    }

    #[test]
    fn test_pager_flush_writes_at_offset() {
        let (mut pager, dir) = create_test_pager();
        pager.get_page_mut(1).unwrap()[0] = 0xAB;
        pager.flush(1).unwrap();
        assert!(!pager.is_dirty(1));

        let bytes = std::fs::read(dir.path().join("test.db")).unwrap();
        assert_eq!(bytes.len(), 2 * PAGE_SIZE);
        assert_eq!(bytes[PAGE_SIZE], 0xAB);
    }

    #[test]
    fn test_pager_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persist.db");

        {
            let mut pager = Pager::open(&path, &test_config()).unwrap();
            let page = pager.get_page_mut(0).unwrap();
            page[0] = 0xAA;
            page[PAGE_SIZE - 1] = 0xEF;
            pager.get_page_mut(1).unwrap()[100] = 0xCD;
            pager.close().unwrap();
        }

        {
            let mut pager = Pager::open(&path, &test_config()).unwrap();
            assert_eq!(pager.num_pages(), 2);
            let page = pager.get_page(0).unwrap();
            assert_eq!(page[0], 0xAA);
            assert_eq!(page[PAGE_SIZE - 1], 0xEF);
            assert_eq!(pager.get_page(1).unwrap()[100], 0xCD);
            assert!(!pager.is_dirty(0));
        }
    }

    #[test]
    fn test_pager_drop_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.db");

        {
            let mut pager = Pager::open(&path, &test_config()).unwrap();
            pager.get_page_mut(0).unwrap()[7] = 0x77;
        }

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), PAGE_SIZE);
        assert_eq!(bytes[7], 0x77);
    }

    #[test]
    fn test_pager_read_does_not_dirty_loaded_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clean.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE]).unwrap();

        let mut pager = Pager::open(&path, &test_config()).unwrap();
        pager.get_page(0).unwrap();
        assert!(pager.is_cached(0));
        assert!(!pager.is_dirty(0));

        pager.get_page_mut(0).unwrap();
        assert!(pager.is_dirty(0));
    }
}
