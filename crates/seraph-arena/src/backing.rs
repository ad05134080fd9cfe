//! Storage behind an arena: an anonymous heap buffer, or a memory-mapped
//! file for arenas that must survive a process restart.

use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

pub enum Backing {
    Anon(Vec<u8>),
    Mapped { _file: File, map: MmapMut },
}

impl Backing {
    #[must_use]
    pub fn anon(capacity: usize) -> Self {
        Backing::Anon(vec![0u8; capacity])
    }

    /// Open (creating if needed) a file-backed region of exactly `capacity`
    /// bytes. `shared` picks a shared mapping (writes land in the file) vs.
    /// a private copy-on-write mapping.
    pub fn open_file(path: &Path, capacity: u64, shared: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        file.set_len(capacity)?;
        let map = if shared {
            unsafe { MmapOptions::new().map_mut(&file)? }
        } else {
            unsafe { MmapOptions::new().map_copy(&file)? }
        };
        Ok(Backing::Mapped { _file: file, map })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Anon(v) => v,
            Backing::Mapped { map, .. } => map,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Backing::Anon(v) => v,
            Backing::Mapped { map, .. } => map,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Flush a mapped backing to disk; a no-op for anonymous memory.
    pub fn sync(&self) -> io::Result<()> {
        match self {
            Backing::Anon(_) => Ok(()),
            Backing::Mapped { map, .. } => map.flush(),
        }
    }
}
