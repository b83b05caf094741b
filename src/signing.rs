//! Canonicalization and MAC/signature primitives.
//!
//! Every provider protocol reduces to the same shape: assemble a canonical
//! byte string from selected field values in a fixed order, then run a hash,
//! HMAC, or RSA signature over it. The canonical forms in use are:
//!
//! - **`&`-delimited**: values joined with `&` and a trailing `&`, secret
//!   appended or prepended (SOLO / Samlink / Danske family).
//! - **Concatenated**: values joined with no delimiter (Handelsbanken,
//!   Luottokunta, Osuuspankki, Sampo).
//! - **Sorted `key=value`**: all fields except the MAC field itself, sorted
//!   by ordinal byte comparison and joined as `key=value` pairs with `&`
//!   (DIBS family).
//! - **Length-prefixed**: each value prefixed with its `%03d` length, no
//!   separator (iPizza RSA family).
//!
//! Field selection and order are fixed per provider and owned by the
//! adapters; this module only supplies the deterministic assembly and the
//! primitives.

use hmac::{Hmac, Mac};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::{Error, Fields, Result};

type HmacSha256 = Hmac<Sha256>;

/// Bare-hash algorithm selector. Which one applies is dictated by the
/// provider protocol (and its revision), not chosen freely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlg {
    Md5,
    Sha256,
    Sha512,
}

/// Joins values with `&` and a trailing `&`: `a&b&c&`.
pub fn amp_delimited(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        out.push_str(part);
        out.push('&');
    }
    out
}

/// Joins values with no delimiter.
pub fn concatenated(parts: &[&str]) -> String {
    parts.concat()
}

/// Sorted `key=value` canonicalization: every field except `exclude` (the
/// MAC field itself), sorted by ordinal byte comparison, joined with `&`.
pub fn sorted_pairs(fields: &Fields, exclude: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = fields.iter().filter(|(n, _)| *n != exclude).collect();
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    pairs
        .iter()
        .map(|(n, v)| format!("{n}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Length-prefixed concatenation: each value preceded by its `%03d` length,
/// no separator. The length counts UTF-16 code units, not bytes; that is
/// what the iPizza services compute, even though the signature runs over
/// the UTF-8 encoding.
pub fn length_prefixed(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        out.push_str(&format!("{:03}", part.encode_utf16().count()));
        out.push_str(part);
    }
    out
}

/// The legacy bank services hash the ASCII encoding of the canonical
/// string; characters outside ASCII are substituted with `?`.
fn ascii_bytes(input: &str) -> Vec<u8> {
    input
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

/// Bare hash over the ASCII encoding, lowercase hex.
pub fn hash_hex(alg: HashAlg, input: &str) -> String {
    let bytes = ascii_bytes(input);
    match alg {
        HashAlg::Md5 => format!("{:x}", md5::compute(&bytes)),
        HashAlg::Sha256 => hex::encode(Sha256::digest(&bytes)),
        HashAlg::Sha512 => hex::encode(Sha512::digest(&bytes)),
    }
}

/// Bare hash over the ASCII encoding, uppercase hex. This is the dominant
/// output convention in the Nordic protocols.
pub fn hash_hex_upper(alg: HashAlg, input: &str) -> String {
    hash_hex(alg, input).to_uppercase()
}

/// HMAC-SHA256 over the UTF-8 encoding, lowercase hex. Whether `key` is the
/// raw secret bytes or a hex-decoded key is a per-provider decision made at
/// adapter construction.
pub fn hmac_sha256_hex(key: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Decodes a hex-encoded shared secret into key bytes, failing with a
/// configuration error naming `parameter` when the value is not hex.
pub fn hex_key(parameter: &'static str, secret: &str) -> Result<Vec<u8>> {
    hex::decode(secret).map_err(|_| Error::InvalidParameter {
        parameter,
        reason: "expected a hex-encoded key".into(),
    })
}

/// RSA PKCS#1 v1.5 signature with SHA-1 over the UTF-8 encoding, Base64
/// output. SHA-1 is what the iPizza protocol revision in use mandates.
pub fn rsa_sha1_sign_base64(key: &RsaPrivateKey, message: &str) -> Result<String> {
    let digest = Sha1::digest(message.as_bytes());
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
        .map_err(|e| Error::Signing(e.to_string()))?;
    Ok(BASE64.encode(signature))
}

/// Verifies a Base64 RSA-SHA1 signature against the counterparty public
/// key. Undecodable signatures are simply invalid, not errors.
pub fn rsa_sha1_verify_base64(key: &RsaPublicKey, message: &str, signature: &str) -> bool {
    let Ok(signature) = BASE64.decode(signature) else {
        return false;
    };
    let digest = Sha1::digest(message.as_bytes());
    key.verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
        .is_ok()
}
