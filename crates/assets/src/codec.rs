//! Asset wire format: CBOR, optionally wrapped in a zstd frame.
//!
//! Readers detect compression from the zstd frame magic, so both forms can
//! sit side by side on disk.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

use crate::error::CodecError;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Serialize an asset to CBOR, compressing it when `compress` is set.
pub fn encode_asset<T: Serialize + ?Sized>(value: &T, compress: bool) -> Result<Vec<u8>, CodecError> {
    let cbor_bytes = cbor_serialize(value)?;
    if compress {
        zstd_compress(&cbor_bytes)
    } else {
        Ok(cbor_bytes)
    }
}

/// Decode an asset written by [`encode_asset`].
pub fn decode_asset<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, CodecError> {
    if data.starts_with(&ZSTD_MAGIC) {
        let cbor_bytes = zstd_decompress(data)?;
        cbor_deserialize(&cbor_bytes)
    } else {
        cbor_deserialize(data)
    }
}

/// Content id over a sequence of fetched blobs: first 8 bytes of their SHA-256.
pub fn content_id<'a>(blobs: impl IntoIterator<Item = &'a [u8]>) -> u64 {
    let mut hasher = Sha256::new();
    for blob in blobs {
        hasher.update((blob.len() as u64).to_le_bytes());
        hasher.update(blob);
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    u64::from_le_bytes(bytes)
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, CodecError> {
    ciborium::from_reader(data).map_err(|e| CodecError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}
