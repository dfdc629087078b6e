//! XEX2/ELF/PE container loading, decryption, decompression, and delta
//! patching for Xbox 360 executables and their embedded PE images.

pub mod crypto;
pub mod elf;
pub mod lzx;
pub mod patch;
pub mod pe;
pub mod xex;

use recomp_symbols::prelude::{Image, Section, SectionFlags, Symbol, SymbolKind};
use snafu::prelude::*;

use crate::xex::{header_key, CompressionType, EncryptionType, FileFormatInfo, SecurityInfo, XexHeader};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("not a recognized container format (expected 'XEX2' or ELF magic)"))]
    UnrecognizedFormat,
    #[snafu(display("xex header error: {source}"))]
    Xex { source: xex::Error },
    #[snafu(display("elf header error: {source}"))]
    Elf { source: elf::Error },
    #[snafu(display("pe header error: {source}"))]
    Pe { source: pe::Error },
    #[snafu(display("lzx decompression error: {source}"))]
    Lzx { source: lzx::Error },
    #[snafu(display("unsupported encryption type {value:#X}"))]
    UnsupportedEncryption { value: u16 },
    #[snafu(display("unsupported compression type {value:#X}"))]
    UnsupportedCompression { value: u16 },
    #[snafu(display("container is missing a required optional header {key:#010X}"))]
    MissingOptionalHeader { key: u32 },
}

type Result<T> = std::result::Result<T, Error>;

impl From<xex::Error> for Error {
    fn from(source: xex::Error) -> Self {
        Error::Xex { source }
    }
}
impl From<elf::Error> for Error {
    fn from(source: elf::Error) -> Self {
        Error::Elf { source }
    }
}
impl From<pe::Error> for Error {
    fn from(source: pe::Error) -> Self {
        Error::Pe { source }
    }
}
impl From<lzx::Error> for Error {
    fn from(source: lzx::Error) -> Self {
        Error::Lzx { source }
    }
}

/// Loads a byte blob as either a XEX2 container or, failing that magic
/// check, a 32-bit big-endian ELF, producing a flattened [`Image`] with its
/// section table populated. Symbol/function discovery is a separate step
/// (see `recomp_symbols::function`) since it needs `.pdata`, which only
/// XEX2-packaged titles carry in the container proper.
pub fn load_image(data: &[u8]) -> Result<Image> {
    if data.get(0..4) == Some(&elf::MAGIC[..]) {
        return load_elf(data);
    }
    load_xex(data)
}

fn load_elf(data: &[u8]) -> Result<Image> {
    let parsed = elf::parse(data)?;
    let mut image = Image::new(data.to_vec().into_boxed_slice(), parsed.base, parsed.entry_point);
    for section in parsed.sections {
        image.sections.insert(section);
    }
    Ok(image)
}

fn load_xex(data: &[u8]) -> Result<Image> {
    let header = XexHeader::parse(data)?;

    let format_offset = header
        .optional_header(header_key::FILE_FORMAT_INFO)
        .context(MissingOptionalHeaderSnafu { key: header_key::FILE_FORMAT_INFO })?;
    let format = FileFormatInfo::parse(data, format_offset)?;
    ensure!(
        format.encryption == EncryptionType::None as u16 || format.encryption == EncryptionType::Normal as u16,
        UnsupportedEncryptionSnafu { value: format.encryption }
    );

    let security = SecurityInfo::parse(data, header.security_offset)?;
    let body = &data[header.header_size as usize..];

    let decrypted;
    let plaintext: &[u8] = if format.encryption == EncryptionType::Normal as u16 {
        let key = crypto::decrypt_key(&crypto::RETAIL_KEY, &security.aes_key);
        decrypted = {
            let mut buf = body.to_vec();
            crypto::decrypt_cbc(&key, &mut buf);
            buf
        };
        &decrypted
    } else {
        body
    };

    let pe_bytes = match CompressionType::try_from(format.compression)? {
        CompressionType::None => plaintext.to_vec(),
        CompressionType::Basic => lzx::decompress_basic(plaintext, security.image_size as usize),
        CompressionType::Normal => {
            let window = lzx::window_size(format.window_size_kib);
            lzx::decompress_normal(plaintext, window, security.image_size as usize)?
        }
        CompressionType::Delta => return UnsupportedCompressionSnafu { value: format.compression }.fail(),
    };

    let image_base = header
        .optional_header(header_key::IMAGE_BASE_ADDRESS)
        .unwrap_or(security.load_address);
    let entry_point = header.optional_header(header_key::ENTRY_POINT).unwrap_or(security.load_address);

    let sections = pe::parse_sections(&pe_bytes, image_base)?;
    let mut image = Image::new(pe_bytes.into_boxed_slice(), image_base, entry_point);
    for section in sections {
        image.sections.insert(section);
    }

    if let Some(library_offset) = header.optional_header(header_key::IMPORT_LIBRARIES) {
        rewrite_import_thunks(&mut image, data, library_offset);
    }

    Ok(image)
}

/// Rewrites each resolved import thunk word to the canonical trap sequence
/// and registers a symbol when the exporting library was recognized. A
/// thunk is only rewritten when its on-image word, byte-swapped, decodes to
/// an `ordinal+type` record with a non-zero `type` (bits 24-31) — the
/// geometry of the import-library header only tells us where thunks live,
/// not whether a given one is still the original unlinked form.
fn rewrite_import_thunks(image: &mut Image, xex_data: &[u8], library_offset: u32) {
    let library_records = xex::parse_import_libraries(xex_data, library_offset);
    let thunks = xex::parse_import_thunks(xex_data, &library_records);

    for thunk in thunks {
        let Ok(word) = image.read_u32(thunk.address) else { continue };
        if (word >> 24) & 0xFF == 0 {
            continue;
        }

        for (i, &trap_word) in xex::TRAP_SEQUENCE.iter().enumerate() {
            let _ = image.write_u32(thunk.address + i as u32 * 4, trap_word);
        }

        if let Some(name) = thunk.name {
            image.symbols.insert(Symbol {
                name,
                address: thunk.address,
                size: (xex::TRAP_SEQUENCE.len() * 4) as u32,
                kind: SymbolKind::Function,
            });
        }
    }
}

#[must_use]
pub fn well_known_code_sections(image: &Image) -> Vec<&Section> {
    image.sections.iter().filter(|s| s.flags.contains(SectionFlags::CODE)).collect()
}

impl TryFrom<u16> for CompressionType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Basic),
            2 => Ok(CompressionType::Normal),
            3 => Ok(CompressionType::Delta),
            other => UnsupportedCompressionSnafu { value: other }.fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_magic_is_rejected() {
        let data = vec![0u8; 64];
        assert!(matches!(load_image(&data), Err(Error::Xex { .. })));
    }
}
