//! The flat virtual-memory image produced by a container loader.
//!
//! An owned buffer, a base virtual address, an entry point, and the
//! section/symbol stores that index into it.

use snafu::prelude::*;

use crate::section::SectionStore;
use crate::symbol::SymbolStore;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("address {address:#010X} falls inside no section"))]
    NoContainingSection { address: u32 },
}

type Result<T> = std::result::Result<T, Error>;

/// A loaded, flattened executable image: the decrypted/decompressed bytes
/// plus the metadata needed to interpret them as PowerPC code.
#[derive(Debug)]
pub struct Image {
    data: Box<[u8]>,
    pub base: u32,
    pub size: u32,
    pub entry_point: u32,
    pub sections: SectionStore,
    pub symbols: SymbolStore,
}

impl Image {
    #[must_use]
    pub fn new(data: Box<[u8]>, base: u32, entry_point: u32) -> Self {
        let size = data.len() as u32;
        Self { data, base, size, entry_point, sections: SectionStore::new(), symbols: SymbolStore::new() }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Converts a virtual address to an offset into the owned buffer, if the
    /// address lies within `[base, base+size)`.
    #[must_use]
    pub fn offset_of(&self, address: u32) -> Option<usize> {
        address
            .checked_sub(self.base)
            .filter(|&off| (off as u64) < u64::from(self.size))
            .map(|off| off as usize)
    }

    /// Reads a big-endian 32-bit word at a virtual address.
    ///
    /// # Errors
    /// Returns [`Error::NoContainingSection`] when `address` falls outside
    /// the image's owned buffer rather than being discovered via the section
    /// store; callers that need "is this code" semantics should also check
    /// [`Image::sections`].
    pub fn read_u32(&self, address: u32) -> Result<u32> {
        let offset = self.offset_of(address).context(NoContainingSectionSnafu { address })?;
        let bytes = self.data.get(offset..offset + 4).context(NoContainingSectionSnafu { address })?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// Overwrites a big-endian 32-bit word at a virtual address. Used by the
    /// container loader's import-thunk rewriting pass.
    pub fn write_u32(&mut self, address: u32, value: u32) -> Result<()> {
        let offset = self.offset_of(address).context(NoContainingSectionSnafu { address })?;
        let slot =
            self.data.get_mut(offset..offset + 4).context(NoContainingSectionSnafu { address })?;
        slot.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}
