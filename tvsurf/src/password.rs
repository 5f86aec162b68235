//! Client side password hashing.
//!
//! The backend never sees plain text passwords. Each password is hashed with
//! bcrypt using a salt derived from the username, so the same credentials
//! always produce the same hash and the backend can compare hashes directly.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use bcrypt::Version;

const COST: u32 = 10;
const SALT_CHARS: &[u8; 64] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SALT_LEN: usize = 22;

const SALT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::BCRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid salt: {0}")]
    Salt(#[from] base64::DecodeError),
    #[error("invalid salt length {0}")]
    SaltLength(usize),
    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// 32-bit rolling string hash (`h * 31 + c` over UTF-16 code units).
fn username_hash(username: &str) -> u64 {
    let hash = username
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c)));
    u64::from(hash.unsigned_abs())
}

/// The 22 character bcrypt salt for `username`.
#[must_use]
pub fn salt_for(username: &str) -> String {
    let hash = username_hash(username);
    let base = SALT_CHARS.len() as u64;
    let mut current = hash;
    let mut salt = String::with_capacity(SALT_LEN);
    for i in 0..SALT_LEN as u64 {
        #[allow(clippy::cast_possible_truncation)]
        salt.push(char::from(SALT_CHARS[(current % base) as usize]));
        current = match current / base {
            0 => hash + i,
            next => next,
        };
    }
    salt
}

/// Hash `password` for `username` in the `$2a$10$` format the backend expects.
///
/// # Errors
/// [`PasswordError::Bcrypt`]: If bcrypt rejects the input.
pub fn hash_password(password: &str, username: &str) -> Result<String, PasswordError> {
    let encoded = salt_for(username);
    let decoded = SALT_ENGINE.decode(encoded)?;
    let salt: [u8; 16] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| PasswordError::SaltLength(decoded.len()))?;
    let parts = bcrypt::hash_with_salt(password, COST, salt)?;
    Ok(parts.format_for_version(Version::TwoA))
}

/// Usernames are non-empty and limited to ASCII letters, digits, `_` and `-`.
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
