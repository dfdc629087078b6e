//! 32-bit big-endian ELF fallback loader, used when the input isn't a XEX2
//! container.
//!
//! There's no ELF loader among the retrieved pack's example crates, so this
//! module is grounded directly on the public ELF32 header layout plus the
//! big-endian-accessor idiom from [`crate::xex`] / `crates/core/src/data.rs`.

use recomp_core::data::{DataCursor, DataCursorTrait, Endian, EndianRead};
use recomp_symbols::prelude::{Section, SectionFlags};
use snafu::prelude::*;

pub const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

const PT_LOAD: u32 = 1;
const SHF_EXECINSTR: u32 = 0x4;
const SHT_NULL: u32 = 0;
const SHT_STRTAB: u32 = 3;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("bad ELF magic"))]
    BadMagic,
    #[snafu(display("not a 32-bit big-endian ELF"))]
    UnsupportedClassOrEndianness,
    #[snafu(display("no PT_LOAD program header found"))]
    NoLoadSegment,
    #[snafu(display("data cursor error: {source}"))]
    Cursor { source: recomp_core::data::Error },
}

type Result<T> = std::result::Result<T, Error>;

impl From<recomp_core::data::Error> for Error {
    fn from(source: recomp_core::data::Error) -> Self {
        Error::Cursor { source }
    }
}

/// The parts of an ELF32 BE file this loader needs: the image base taken
/// from the first `PT_LOAD` segment, the entry point, and the section
/// table translated into [`Section`] records.
#[derive(Debug)]
pub struct ElfImage {
    pub base: u32,
    pub entry_point: u32,
    pub sections: Vec<Section>,
}

/// Parses `data` as a 32-bit big-endian ELF and extracts the fields this
/// loader cares about.
///
/// # Errors
/// Returns [`Error::BadMagic`] or [`Error::UnsupportedClassOrEndianness`] if
/// the input isn't a 32-bit big-endian ELF, and [`Error::NoLoadSegment`] if
/// no `PT_LOAD` program header is present.
pub fn parse(data: &[u8]) -> Result<ElfImage> {
    ensure!(data.get(0..4) == Some(&MAGIC[..]), BadMagicSnafu);
    ensure!(data.get(4) == Some(&1u8) && data.get(5) == Some(&2u8), UnsupportedClassOrEndiannessSnafu);

    let mut cursor = DataCursor::new(data.to_vec(), Endian::Big);
    cursor.set_position(0x10);
    let _file_type = cursor.read_u16()?;
    let _machine = cursor.read_u16()?;
    let _version = cursor.read_u32()?;
    let entry_point = cursor.read_u32()?;
    let phoff = cursor.read_u32()? as usize;
    let shoff = cursor.read_u32()? as usize;
    let _flags = cursor.read_u32()?;
    let _ehsize = cursor.read_u16()?;
    let phentsize = cursor.read_u16()? as usize;
    let phnum = cursor.read_u16()? as usize;
    let shentsize = cursor.read_u16()? as usize;
    let shnum = cursor.read_u16()? as usize;
    let shstrndx = cursor.read_u16()? as usize;

    let base = find_load_base(&mut cursor, phoff, phentsize, phnum)?;
    let sections = parse_sections(&mut cursor, data, shoff, shentsize, shnum, shstrndx)?;

    Ok(ElfImage { base, entry_point, sections })
}

fn find_load_base(
    cursor: &mut DataCursor,
    phoff: usize,
    phentsize: usize,
    phnum: usize,
) -> Result<u32> {
    for index in 0..phnum {
        cursor.set_position(phoff + index * phentsize);
        let p_type = cursor.read_u32()?;
        if p_type != PT_LOAD {
            continue;
        }
        let _p_offset = cursor.read_u32()?;
        let p_vaddr = cursor.read_u32()?;
        return Ok(p_vaddr);
    }
    NoLoadSegmentSnafu.fail()
}

fn parse_sections(
    cursor: &mut DataCursor,
    data: &[u8],
    shoff: usize,
    shentsize: usize,
    shnum: usize,
    shstrndx: usize,
) -> Result<Vec<Section>> {
    if shnum == 0 {
        return Ok(Vec::new());
    }

    cursor.set_position(shoff + shstrndx * shentsize + 0x10);
    let strtab_offset = cursor.read_u32()? as usize;

    let mut sections = Vec::with_capacity(shnum);
    for index in 0..shnum {
        cursor.set_position(shoff + index * shentsize);
        let name_offset = cursor.read_u32()? as usize;
        let sh_type = cursor.read_u32()?;
        let sh_flags = cursor.read_u32()?;
        let sh_addr = cursor.read_u32()?;
        let _sh_offset = cursor.read_u32()?;
        let sh_size = cursor.read_u32()?;

        if sh_type == SHT_NULL || sh_type == SHT_STRTAB {
            continue;
        }

        let name = read_c_string(data, strtab_offset + name_offset);
        let flags = if sh_flags & SHF_EXECINSTR != 0 { SectionFlags::CODE } else { SectionFlags::DATA };
        sections.push(Section { name, base: sh_addr, size: sh_size, flags });
    }

    Ok(sections)
}

fn read_c_string(data: &[u8], offset: usize) -> String {
    let bytes = &data[offset.min(data.len())..];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_elf() -> Vec<u8> {
        let mut data = vec![0u8; 0x34];
        data[0..4].copy_from_slice(&MAGIC);
        data[4] = 1; // ELFCLASS32
        data[5] = 2; // ELFDATA2MSB
        data[0x10..0x12].copy_from_slice(&2u16.to_be_bytes()); // e_type
        data[0x12..0x14].copy_from_slice(&0x14u16.to_be_bytes()); // e_machine (PowerPC)
        data[0x18..0x1C].copy_from_slice(&0x8200_1234u32.to_be_bytes()); // e_entry
        data[0x1C..0x20].copy_from_slice(&0x34u32.to_be_bytes()); // e_phoff
        data[0x20..0x24].copy_from_slice(&0u32.to_be_bytes()); // e_shoff (none)
        data[0x2C..0x2E].copy_from_slice(&0x20u16.to_be_bytes()); // e_phentsize
        data[0x2E..0x30].copy_from_slice(&1u16.to_be_bytes()); // e_phnum
        data[0x30..0x32].copy_from_slice(&0u16.to_be_bytes()); // e_shentsize
        data[0x32..0x34].copy_from_slice(&0u16.to_be_bytes()); // e_shnum

        // One PT_LOAD program header.
        let mut phdr = vec![0u8; 0x20];
        phdr[0..4].copy_from_slice(&PT_LOAD.to_be_bytes());
        phdr[4..8].copy_from_slice(&0u32.to_be_bytes()); // p_offset
        phdr[8..12].copy_from_slice(&0x8200_0000u32.to_be_bytes()); // p_vaddr
        data.extend_from_slice(&phdr);

        data
    }

    #[test]
    fn finds_base_from_first_load_segment() {
        let image = parse(&minimal_elf()).unwrap();
        assert_eq!(image.base, 0x8200_0000);
        assert_eq!(image.entry_point, 0x8200_1234);
        assert!(image.sections.is_empty());
    }

    #[test]
    fn rejects_non_elf_magic() {
        let mut data = minimal_elf();
        data[0] = 0;
        assert!(matches!(parse(&data), Err(Error::BadMagic)));
    }
}
