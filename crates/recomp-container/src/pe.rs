//! PE/COFF header parsing for the decompressed XEX2 image body.
//!
//! A zerocopy struct-overlay walk from the DOS header through the section
//! table, producing [`recomp_symbols::prelude::Section`] records. Unlike
//! the big-endian XEX2 container around it, the embedded PE's own fields
//! are little-endian: this is an ordinary Windows PE header, just
//! carrying PowerPC code.

use recomp_symbols::prelude::{Section, SectionFlags};
use snafu::prelude::*;
use zerocopy::{FromBytes, Immutable, KnownLayout, LittleEndian, Unaligned, U16, U32};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("missing or malformed DOS header"))]
    BadDosHeader,
    #[snafu(display("missing or malformed PE header"))]
    BadPeHeader,
    #[snafu(display("truncated section header table"))]
    TruncatedSections,
}

type Result<T> = std::result::Result<T, Error>;

const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct DosHeader {
    e_magic: U16<LittleEndian>,
    _reserved: [u8; 0x3A],
    e_lfanew: U32<LittleEndian>,
}

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct CoffHeader {
    _machine: U16<LittleEndian>,
    section_count: U16<LittleEndian>,
    _timestamp: U32<LittleEndian>,
    _symbol_offset: U32<LittleEndian>,
    _symbol_count: U32<LittleEndian>,
    optional_size: U16<LittleEndian>,
    _attributes: U16<LittleEndian>,
}

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PeHeader {
    magic: U32<LittleEndian>,
    coff: CoffHeader,
}

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct SectionHeader {
    name: [u8; 8],
    virtual_size: U32<LittleEndian>,
    virtual_address: U32<LittleEndian>,
    _size_of_raw_data: U32<LittleEndian>,
    _pointer_to_raw_data: U32<LittleEndian>,
    _pointer_to_relocations: U32<LittleEndian>,
    _pointer_to_linenumbers: U32<LittleEndian>,
    _number_of_relocations: U16<LittleEndian>,
    _number_of_linenumbers: U16<LittleEndian>,
    characteristics: U32<LittleEndian>,
}

impl SectionHeader {
    fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Parses the section table of a decompressed XEX2 body (a PE image laid
/// out at `image_base`) and returns it as [`Section`] records. The caller
/// supplies `image_base` since the XEX2 security info's load address, not
/// anything in the PE header itself, is authoritative for where the image
/// was linked.
pub fn parse_sections(data: &[u8], image_base: u32) -> Result<Vec<Section>> {
    let dos = DosHeader::ref_from_bytes(data.get(..0x40).context(BadDosHeaderSnafu)?)
        .map_err(|_| Error::BadDosHeader)?;
    ensure!(dos.e_magic.get() == 0x5A4D, BadDosHeaderSnafu);

    let pe_offset = dos.e_lfanew.get() as usize;
    let pe_end = pe_offset + core::mem::size_of::<PeHeader>();
    let pe = PeHeader::ref_from_bytes(data.get(pe_offset..pe_end).context(BadPeHeaderSnafu)?)
        .map_err(|_| Error::BadPeHeader)?;
    ensure!(pe.magic.get() == 0x0000_4550, BadPeHeaderSnafu);

    let sections_offset = pe_end + pe.coff.optional_size.get() as usize;
    let section_count = pe.coff.section_count.get() as usize;
    let section_size = core::mem::size_of::<SectionHeader>();

    let mut sections = Vec::with_capacity(section_count);
    for index in 0..section_count {
        let start = sections_offset + index * section_size;
        let end = start + section_size;
        let raw = data.get(start..end).context(TruncatedSectionsSnafu)?;
        let header = SectionHeader::ref_from_bytes(raw).map_err(|_| Error::TruncatedSections)?;

        let mut flags = SectionFlags::empty();
        if header.characteristics.get() & IMAGE_SCN_CNT_CODE != 0 {
            flags |= SectionFlags::CODE;
        } else {
            flags |= SectionFlags::DATA;
        }

        sections.push(Section {
            name: header.name(),
            base: image_base + header.virtual_address.get(),
            size: header.virtual_size.get(),
            flags,
        });
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pe(section_characteristics: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x40];
        data[0..2].copy_from_slice(&0x5A4Du16.to_le_bytes());
        data[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());

        data.resize(0x80, 0);
        data.extend_from_slice(&0x0000_4550u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // machine
        data.extend_from_slice(&1u16.to_le_bytes()); // section_count
        data.extend_from_slice(&0u32.to_le_bytes()); // timestamp
        data.extend_from_slice(&0u32.to_le_bytes()); // symbol_offset
        data.extend_from_slice(&0u32.to_le_bytes()); // symbol_count
        data.extend_from_slice(&0u16.to_le_bytes()); // optional_size
        data.extend_from_slice(&0u16.to_le_bytes()); // attributes

        let mut name = [0u8; 8];
        name[..5].copy_from_slice(b".text");
        data.extend_from_slice(&name);
        data.extend_from_slice(&0x1000u32.to_le_bytes()); // virtual_size
        data.extend_from_slice(&0x1000u32.to_le_bytes()); // virtual_address
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&section_characteristics.to_le_bytes());

        data
    }

    #[test]
    fn marks_code_section_from_characteristics() {
        let data = sample_pe(IMAGE_SCN_CNT_CODE);
        let sections = parse_sections(&data, 0x8200_0000).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, ".text");
        assert_eq!(sections[0].base, 0x8200_1000);
        assert!(sections[0].is_code());
    }

    #[test]
    fn marks_non_code_section_as_data() {
        let data = sample_pe(0);
        let sections = parse_sections(&data, 0x8200_0000).unwrap();
        assert!(!sections[0].is_code());
    }
}
