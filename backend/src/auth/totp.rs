//! RFC 6238 time-based one-time passwords and backup codes.

use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use sha1::Sha1;
use subtle::ConstantTimeEq;

pub const TOTP_DIGITS: u32 = 6;
pub const TOTP_PERIOD_SECS: u64 = 30;
pub const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_HALF_LENGTH: usize = 5;
const SECRET_BYTES: usize = 20;
const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const BACKUP_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

type HmacSha1 = Hmac<Sha1>;

/// New base32 secret, the form authenticator apps expect.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base32_encode(&bytes)
}

pub fn totp_uri(secret: &str, issuer: &str, account: &str) -> String {
    let issuer_encoded: String = url::form_urlencoded::byte_serialize(issuer.as_bytes()).collect();
    let account_encoded: String =
        url::form_urlencoded::byte_serialize(account.as_bytes()).collect();

    format!(
        "otpauth://totp/{issuer_encoded}:{account_encoded}?secret={secret}&issuer={issuer_encoded}&digits={TOTP_DIGITS}&period={TOTP_PERIOD_SECS}"
    )
}

pub fn code_at(secret: &str, unix_secs: u64) -> Option<String> {
    let key = base32_decode(secret)?;
    Some(hotp(&key, unix_secs / TOTP_PERIOD_SECS))
}

/// Accepts the current window and one on either side for clock skew.
pub fn verify(secret: &str, code: &str, unix_secs: u64) -> bool {
    let code = code.trim();
    if code.len() != TOTP_DIGITS as usize {
        return false;
    }
    let Some(key) = base32_decode(secret) else {
        return false;
    };

    let counter = unix_secs / TOTP_PERIOD_SECS;
    [counter.checked_sub(1), Some(counter), counter.checked_add(1)]
        .into_iter()
        .flatten()
        .any(|step| bool::from(hotp(&key, step).as_bytes().ct_eq(code.as_bytes())))
}

fn hotp(key: &[u8], counter: u64) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha1::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    format!(
        "{:0width$}",
        binary % 10u32.pow(TOTP_DIGITS),
        width = TOTP_DIGITS as usize
    )
}

pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut half = || -> String {
        (0..BACKUP_CODE_HALF_LENGTH)
            .map(|_| BACKUP_CODE_ALPHABET[rng.gen_range(0..BACKUP_CODE_ALPHABET.len())] as char)
            .collect()
    };

    (0..BACKUP_CODE_COUNT)
        .map(|_| {
            let left = half();
            let right = half();
            format!("{left}-{right}")
        })
        .collect()
}

/// Removes `input` from `codes`; `None` when it was not one of them.
pub fn consume_backup_code(codes: &[String], input: &str) -> Option<Vec<String>> {
    let input = input.trim();
    let position = codes
        .iter()
        .position(|code| bool::from(code.as_bytes().ct_eq(input.as_bytes())))?;

    let mut remaining = codes.to_vec();
    remaining.remove(position);
    Some(remaining)
}

fn base32_encode(data: &[u8]) -> String {
    let mut result = String::new();
    let mut buffer: u64 = 0;
    let mut bits_left = 0;

    for &byte in data {
        buffer = (buffer << 8) | byte as u64;
        bits_left += 8;
        while bits_left >= 5 {
            bits_left -= 5;
            result.push(BASE32_ALPHABET[((buffer >> bits_left) & 0x1f) as usize] as char);
        }
    }
    if bits_left > 0 {
        result.push(BASE32_ALPHABET[((buffer << (5 - bits_left)) & 0x1f) as usize] as char);
    }

    result
}

fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut result = Vec::new();
    let mut buffer: u64 = 0;
    let mut bits_left = 0;

    for ch in encoded.trim_end_matches('=').chars() {
        let upper = ch.to_ascii_uppercase() as u8;
        let value = BASE32_ALPHABET.iter().position(|&c| c == upper)? as u64;
        buffer = (buffer << 5) | value;
        bits_left += 5;
        if bits_left >= 8 {
            bits_left -= 8;
            result.push(((buffer >> bits_left) & 0xff) as u8);
        }
    }

    Some(result)
}
