//! Memory-mapped backing stores for USRL shared-memory regions.
//!
//! A region lives in an ordinary file (typically under `/dev/shm`) that every
//! participant maps read-write. Creation is exclusive so that concurrent
//! initializers can race safely: exactly one process wins `create_excl`, the
//! others observe `AlreadyExists` and attach instead.

use memmap2::{Mmap, MmapMut};
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// A read-write mapping over a region backing file.
#[derive(Debug)]
pub struct MmapFileMut {
    /// File handle kept alive to maintain the memory map validity
    _file: File,
    /// Memory-mapped region providing mutable access to file contents
    mmap: MmapMut,
}

/// A read-only mapping over a region backing file.
pub struct MmapFile {
    /// File handle kept alive to maintain the memory map validity
    _file: File,
    /// Memory-mapped region providing read-only access to file contents
    mmap: Mmap,
}

impl MmapFileMut {
    /// Exclusively create the backing file, extend it to `size_bytes`, and
    /// map it read-write.
    ///
    /// Fails with `ErrorKind::AlreadyExists` if the file is present; callers
    /// treat that as the attach path. The extension leaves the file
    /// zero-filled, which is what establishes the "never written" state of
    /// every slot.
    pub fn create_excl<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(size_bytes)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Open an existing backing file and map it read-write at the size the
    /// OS reports for it. The mapped length always matches the object, so
    /// the unmap on drop is never mismatched.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "backing file is empty",
            ));
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Return raw pointer to start of memory mapped file data
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }
}

impl MmapFile {
    /// Open an existing file and map it read-only.
    pub fn open_ro<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::ErrorKind;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(tag: &str) -> String {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("/tmp/usrl_mmap_test_{tag}_{ts}")
    }

    #[test]
    fn create_excl_roundtrip_bytes() {
        let path = unique_path("rt");
        let size = 4096;

        {
            let mut mm = MmapFileMut::create_excl(&path, size).unwrap();
            unsafe {
                let p = mm.as_mut_ptr();
                *p.add(0) = 0xAB;
                *p.add(1) = 0xCD;
            }
        }
        {
            let mm = MmapFile::open_ro(&path).unwrap();
            unsafe {
                let p = mm.as_ptr();
                assert_eq!(*p.add(0), 0xAB);
                assert_eq!(*p.add(1), 0xCD);
            }
        }

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn create_excl_refuses_existing_file() {
        let path = unique_path("excl");
        let _first = MmapFileMut::create_excl(&path, 4096).unwrap();

        let err = MmapFileMut::create_excl(&path, 4096).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn open_rw_maps_reported_object_size() {
        let path = unique_path("size");
        {
            let _mm = MmapFileMut::create_excl(&path, 8192).unwrap();
        }

        let mm = MmapFileMut::open_rw(&path).unwrap();
        assert_eq!(mm.len(), 8192);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn fresh_file_reads_as_zeros() {
        let path = unique_path("zero");
        let mm = MmapFileMut::create_excl(&path, 4096).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(mm.as_ptr(), mm.len()) };
        assert!(bytes.iter().all(|&b| b == 0));

        let _ = fs::remove_file(&path);
    }
}
