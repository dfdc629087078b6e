//! LZX "normal" block decompression and `BASIC` block expansion.
//!
//! The payload is a chain of outer blocks, each `{nextBlockSize: u32,
//! sha1: [u8; 20]}` followed by a run of `(chunkSize: u16, chunk: [u8;
//! chunkSize])` records terminated by a zero `chunkSize`. Every outer
//! block's SHA-1 (header included) must match before its chunks are fed
//! to the LZX decoder.
//!
//! There is no Rust binding for `mspack`'s single-shot `lzxd_decompress`
//! in this workspace, so this module instead drives the `lzxd` crate's
//! incremental `decompress_next` once per chunk record — the chunk
//! boundaries already in the wire format are exactly the boundaries that
//! API wants, so no buffering beyond one chunk is needed.

use lzxd::{Lzxd, WindowSize};
use sha1::{Digest, Sha1};
use snafu::prelude::*;

const OUTER_HEADER_LEN: usize = 4 + 20;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("LZX outer block at offset {offset:#X} is truncated"))]
    Truncated { offset: usize },
    #[snafu(display("LZX outer block at offset {offset:#X} failed SHA-1 verification"))]
    ShaMismatch { offset: usize },
    #[snafu(display("LZX chunk at offset {offset:#X} is truncated"))]
    ChunkTruncated { offset: usize },
    #[snafu(display("LZX decoder failed to decompress a chunk: {source}"))]
    Decode { source: lzxd::DecodeFailed },
}

type Result<T> = std::result::Result<T, Error>;

/// Maps the XEX2 compression descriptor's window-size field to the `lzxd`
/// crate's enum. XEX2 only ever uses 32 KiB or 64 KiB windows in practice.
#[must_use]
pub fn window_size(kib: u32) -> WindowSize {
    match kib {
        64 => WindowSize::KB64,
        _ => WindowSize::KB32,
    }
}

/// Decompresses a `NORMAL`-compression payload into `image_size` bytes.
///
/// # Errors
/// Returns [`Error::ShaMismatch`] if any outer block's digest doesn't match
/// its recorded SHA-1, or [`Error::Decode`] if the LZX decoder rejects a
/// chunk.
pub fn decompress_normal(payload: &[u8], window: WindowSize, image_size: usize) -> Result<Vec<u8>> {
    let mut lzxd = Lzxd::new(window);
    let mut out = Vec::with_capacity(image_size);
    let mut offset = 0usize;

    while offset + 4 <= payload.len() {
        let next_block_size =
            u32::from_be_bytes(payload[offset..offset + 4].try_into().unwrap()) as usize;
        if next_block_size == 0 {
            break;
        }
        ensure!(
            offset + next_block_size <= payload.len() && next_block_size >= OUTER_HEADER_LEN,
            TruncatedSnafu { offset }
        );

        let block = &payload[offset..offset + next_block_size];
        let stored_sha1 = &block[4..OUTER_HEADER_LEN];
        let mut hasher = Sha1::new();
        hasher.update(block);
        let computed: [u8; 20] = hasher.finalize().into();
        ensure!(computed == stored_sha1, ShaMismatchSnafu { offset });

        let mut chunk_cursor = OUTER_HEADER_LEN;
        let body = block;
        while chunk_cursor + 2 <= body.len() {
            let chunk_size =
                u16::from_be_bytes(body[chunk_cursor..chunk_cursor + 2].try_into().unwrap())
                    as usize;
            chunk_cursor += 2;
            if chunk_size == 0 {
                break;
            }
            ensure!(
                chunk_cursor + chunk_size <= body.len(),
                ChunkTruncatedSnafu { offset: offset + chunk_cursor }
            );

            let chunk = &body[chunk_cursor..chunk_cursor + chunk_size];
            let decompressed = lzxd.decompress_next(chunk).map_err(|source| Error::Decode { source })?;
            out.extend_from_slice(decompressed);
            chunk_cursor += chunk_size;
        }

        offset += next_block_size;
    }

    out.truncate(image_size);
    Ok(out)
}

/// Expands a `BASIC`-compression payload: a sequence of `{dataSize:u32,
/// zeroSize:u32}` blocks, each contributing `dataSize` copied bytes followed
/// by `zeroSize` zero bytes.
#[must_use]
pub fn decompress_basic(payload: &[u8], image_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(image_size);
    let mut cursor = 0usize;

    while cursor + 8 <= payload.len() {
        let data_size = u32::from_be_bytes(payload[cursor..cursor + 4].try_into().unwrap()) as usize;
        let zero_size = u32::from_be_bytes(payload[cursor + 4..cursor + 8].try_into().unwrap()) as usize;
        cursor += 8;

        if data_size == 0 && zero_size == 0 {
            break;
        }

        let data_size = data_size.min(payload.len() - cursor);
        out.extend_from_slice(&payload[cursor..cursor + data_size]);
        out.resize(out.len() + zero_size, 0);
        cursor += data_size;
    }

    out.resize(image_size, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_expands_data_then_zero_runs() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&4u32.to_be_bytes());
        payload.extend_from_slice(&4u32.to_be_bytes());
        payload.extend_from_slice(b"ABCD");
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());

        let out = decompress_basic(&payload, 12);
        assert_eq!(&out[0..4], b"ABCD");
        assert_eq!(&out[4..12], &[0u8; 8]);
    }

    #[test]
    fn normal_rejects_bad_sha1() {
        let mut block = Vec::new();
        let body_len = 24 + 2; // header + zero-chunk terminator only
        block.extend_from_slice(&(body_len as u32).to_be_bytes());
        block.extend_from_slice(&[0u8; 20]); // wrong digest on purpose
        block.extend_from_slice(&0u16.to_be_bytes());

        let result = decompress_normal(&block, WindowSize::KB32, 0);
        assert!(matches!(result, Err(Error::ShaMismatch { .. })));
    }
}
