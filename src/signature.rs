// src/signature.rs

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::STANDARD},
};
use bcrypt::Version;

use crate::errors::AppError;

/// Header the provider issues secrets with; used for secrets that carry none.
const DEFAULT_SALT_HEADER: &str = "$2a$04$";
/// `$2a$NN$` plus 22 characters of encoded salt.
pub const MIN_SALT_LENGTH: usize = 29;
/// Zero digit of the bcrypt base64 alphabet.
pub const SALT_PAD_CHAR: char = '.';
const ENCODED_SALT_LENGTH: usize = 22;

const BCRYPT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::BCRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Computes `client_secret_sign` for the token request:
/// `base64(bcrypt("{application_id}_{timestamp_ms}", salt = application_secret))`.
pub fn sign(
    application_id: &str,
    application_secret: &str,
    timestamp_ms: i64,
) -> Result<String, AppError> {
    let password = format!("{}_{}", application_id, timestamp_ms);
    let (cost, salt) = parse_salt(application_secret)?;

    let hashed = bcrypt::hash_with_salt(password.as_bytes(), cost, salt)
        .map_err(|e| AppError::Configuration(format!("bcrypt signing failed: {}", e)))?
        .format_for_version(Version::TwoA);

    Ok(STANDARD.encode(hashed))
}

/// Brings the secret up to the minimum salt length. The result is the same
/// on every call for the same secret.
pub fn normalize_salt(application_secret: &str) -> String {
    let mut salt = if has_bcrypt_header(application_secret) {
        application_secret.to_string()
    } else {
        format!("{}{}", DEFAULT_SALT_HEADER, application_secret)
    };
    while salt.chars().count() < MIN_SALT_LENGTH {
        salt.push(SALT_PAD_CHAR);
    }
    salt
}

fn has_bcrypt_header(secret: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| secret.starts_with(prefix))
}

fn parse_salt(application_secret: &str) -> Result<(u32, [u8; 16]), AppError> {
    let salt = normalize_salt(application_secret);

    // "$2a$" | "04" | "$" | salt chars
    let cost_text = salt.get(4..6).ok_or_else(|| malformed("missing cost"))?;
    let cost: u32 = cost_text
        .parse()
        .map_err(|_| malformed("cost is not a number"))?;
    if salt.get(6..7) != Some("$") {
        return Err(malformed("missing cost separator"));
    }

    let encoded: String = salt[7..].chars().take(ENCODED_SALT_LENGTH).collect();
    let encoded = format!("{:.<width$}", encoded, width = ENCODED_SALT_LENGTH);

    let decoded = BCRYPT_BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| malformed(&format!("invalid salt characters ({})", e)))?;
    let salt_bytes: [u8; 16] = decoded
        .try_into()
        .map_err(|_| malformed("salt does not decode to 16 bytes"))?;

    Ok((cost, salt_bytes))
}

fn malformed(reason: &str) -> AppError {
    AppError::Configuration(format!("application secret is not a usable salt: {}", reason))
}
