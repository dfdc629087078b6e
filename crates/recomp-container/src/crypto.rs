//! AES-128-CBC primitives used by both the container loader and the patch
//! applier: the fixed retail key and the all-zero IV every retail XEX2
//! uses.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

/// The fixed AES-128 key every retail XEX2's embedded per-file key is itself
/// encrypted under.
pub const RETAIL_KEY: [u8; 16] = [
    0x20, 0xB1, 0x85, 0xA5, 0x9D, 0x28, 0xFD, 0xC3, 0x40, 0x58, 0x3F, 0xBB, 0x08, 0x96, 0xBF, 0x91,
];

/// XEX2 never varies the IV; every AES-CBC operation in the format uses an
/// all-zero block.
pub const BLANK_IV: [u8; 16] = [0u8; 16];

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Decrypts `data` in place with AES-128-CBC under `key` and the blank IV.
/// `data.len()` must be a multiple of the 16-byte block size.
pub fn decrypt_cbc(key: &[u8; 16], data: &mut [u8]) {
    let mut decryptor = Aes128CbcDec::new(key.into(), &BLANK_IV.into());
    for block in data.chunks_exact_mut(16) {
        decryptor.decrypt_block_mut(block.into());
    }
}

/// Decrypts a single 16-byte key block under `key`, returning the recovered
/// key. Used to walk the base -> new -> patch AES key chain during patch
/// application.
#[must_use]
pub fn decrypt_key(key: &[u8; 16], encrypted: &[u8; 16]) -> [u8; 16] {
    let mut buf = *encrypted;
    decrypt_cbc(key, &mut buf);
    buf
}

/// Encrypts a single 16-byte key block under `key`. The inverse of
/// [`decrypt_key`]; used by tests elsewhere in this crate to construct
/// synthetic AES key chains.
#[cfg(test)]
#[must_use]
pub(crate) fn encrypt_key(key: &[u8; 16], plain: &[u8; 16]) -> [u8; 16] {
    use aes::cipher::BlockEncryptMut;
    use cbc::cipher::KeyIvInit as _;
    type Aes128CbcEnc = cbc::Encryptor<Aes128>;

    let mut buf = *plain;
    let mut encryptor = Aes128CbcEnc::new(key.into(), &BLANK_IV.into());
    encryptor.encrypt_block_mut((&mut buf).into());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_cbc_is_self_consistent_with_encrypt() {
        use aes::cipher::{BlockEncryptMut, KeyIvInit as _};
        type Enc = cbc::Encryptor<Aes128>;

        let key = [0x42u8; 16];
        let plaintext = [0xAAu8; 32];

        let mut encrypted = plaintext;
        let mut encryptor = Enc::new(&key.into(), &BLANK_IV.into());
        for block in encrypted.chunks_exact_mut(16) {
            encryptor.encrypt_block_mut(block.into());
        }

        let mut decrypted = encrypted;
        decrypt_cbc(&key, &mut decrypted);
        assert_eq!(decrypted, plaintext);

        // Identical plaintext blocks must diverge under real CBC chaining;
        // equal ciphertext blocks here would mean each block was encrypted
        // against the original IV instead of the previous block.
        assert_ne!(encrypted[0..16], encrypted[16..32]);
    }
}
