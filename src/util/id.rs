//! ID utilities (room tokens, verification codes, one-time codes).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, Rng, RngCore};

pub const DEFAULT_TOKEN_BYTES: usize = 16;
pub const DEFAULT_VERIFICATION_CODE_BYTES: usize = 6;

/// Generate a room access token: `byte_len` bytes from the OS CSPRNG,
/// base64url encoded without padding.
///
/// Panics if the operating system cannot provide randomness.
pub fn generate_room_token(byte_len: usize) -> String {
    URL_SAFE_NO_PAD.encode(secure_bytes(byte_len))
}

/// Generate a secondary verification code as lower-case hex.
pub fn generate_verification_code(byte_len: usize) -> String {
    hex::encode(secure_bytes(byte_len))
}

/// Six-digit, zero-padded one-time code.
pub fn generate_otp() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Length of the encoded token for a given number of raw bytes.
pub fn encoded_token_len(byte_len: usize) -> usize {
    (byte_len * 8).div_ceil(6)
}

fn secure_bytes(byte_len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
