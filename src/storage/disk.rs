use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;
use crate::storage::page::{PageId, PAGE_SIZE};
use crate::storage::DiskManager;

/// Disk manager backed by a single database file. Page n lives at byte
/// offset n * PAGE_SIZE.
#[derive(Debug)]
pub struct FileDiskManager {
    file: Mutex<File>,
}

impl FileDiskManager {
    /// Open (or create) the database file at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileDiskManager> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(FileDiskManager { file: Mutex::new(file) })
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        // a read past the end of the file yields the zero page
        buf.fill(0);
        let mut nread = 0;
        while nread < buf.len() {
            let n = file.read(&mut buf[nread..])?;
            if n == 0 {
                break;
            }
            nread += n;
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }
}

/// In-memory disk manager double, for unit tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
}

impl MemoryDiskManager {
    pub fn new() -> MemoryDiskManager {
        MemoryDiskManager { pages: Mutex::new(HashMap::new()) }
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let pages = self.pages.lock()?;
        match pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(&data[..buf.len()]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut pages = self.pages.lock()?;
        pages.insert(page_id, data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() -> Result<()> {
        let disk = MemoryDiskManager::new();

        // a page never written reads back as zeroes
        let mut buf = vec![0xff; PAGE_SIZE];
        disk.read_page(3, &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        let mut data = vec![0; PAGE_SIZE];
        data[..5].copy_from_slice(b"hello");
        disk.write_page(3, &data)?;
        disk.read_page(3, &mut buf)?;
        assert_eq!(data, buf);

        Ok(())
    }

    #[test]
    fn test_file_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let disk = FileDiskManager::open(dir.path().join("pages.db"))?;

        let mut data = vec![0; PAGE_SIZE];
        data[..5].copy_from_slice(b"world");
        disk.write_page(2, &data)?;

        let mut buf = vec![0; PAGE_SIZE];
        disk.read_page(2, &mut buf)?;
        assert_eq!(data, buf);

        // pages 0 and 1 were never written, the file hole reads as zeroes
        disk.read_page(0, &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        // reads past the end of the file read as zeroes as well
        disk.read_page(9, &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        Ok(())
    }
}
