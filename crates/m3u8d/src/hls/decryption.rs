// Segment decryption: AES-CBC with PKCS#7 padding, IV taken from the key bytes.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::error::{M3u8Error, Result};

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const AES_BLOCK_SIZE: usize = 16;

/// Decrypt a segment body.
///
/// The key length selects AES-128/192/256. The IV is the first block of the
/// key itself rather than the playlist's `IV` attribute; the sources this tool
/// targets encode segments that way.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() < AES_BLOCK_SIZE {
        return Err(invalid_key_length(key.len()));
    }
    let iv = &key[..AES_BLOCK_SIZE];

    match key.len() {
        16 => decrypt_with::<Aes128CbcDec>(ciphertext, key, iv),
        24 => decrypt_with::<Aes192CbcDec>(ciphertext, key, iv),
        32 => decrypt_with::<Aes256CbcDec>(ciphertext, key, iv),
        len => Err(invalid_key_length(len)),
    }
}

fn decrypt_with<D>(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let cipher = D::new_from_slices(key, iv).map_err(|e| {
        M3u8Error::Crypto(format!("Failed to initialize AES decryptor: {e}"))
    })?;

    let mut buffer = ciphertext.to_vec();
    let decrypted_len = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|e| {
            M3u8Error::Crypto(format!(
                "Decryption failed for {} byte payload: {e}",
                ciphertext.len()
            ))
        })?
        .len();

    buffer.truncate(decrypted_len);
    Ok(buffer)
}

fn invalid_key_length(len: usize) -> M3u8Error {
    M3u8Error::Crypto(format!(
        "invalid AES key length: {len} bytes (expected 16, 24 or 32)"
    ))
}
