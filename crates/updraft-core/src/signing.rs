//! Detached-signature verification for downloaded payloads.
//!
//! Two interchangeable schemes, selected at runtime by the enclosure's
//! declared algorithm:
//!
//! - **DSA** (legacy): a SHA-1 digest of the payload is hashed *again* and
//!   the DSA signature is verified over that double digest. The double hash
//!   is required for interoperability with previously issued signatures;
//!   do not collapse it. Keys are PEM, signatures ASN.1/DER in base64.
//! - **Ed25519**: the signature verifies directly over the raw payload
//!   bytes; the scheme hashes internally. Keys are base64-encoded raw
//!   32-byte public keys.
//!
//! Everything here is a pure check: any decode failure, key-load failure or
//! mismatch returns `false`, and untrusted input can never panic. The
//! `None` algorithm is a caller-side sentinel and always fails here.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signature as EdSignature, Verifier, VerifyingKey as EdVerifyingKey};
use pkcs8::DecodePublicKey;
use sha1::{Digest, Sha1};
use signature::DigestVerifier;
use tracing::debug;
use updraft_schema::SignatureAlgorithm;

/// Read size for file-backed payloads.
const FILE_CHUNK: usize = 1 << 20;

/// A payload to verify: an on-disk file (read in fixed-size chunks) or an
/// in-memory buffer.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// File on disk, streamed.
    File(&'a Path),
    /// Bytes already in memory.
    Buffer(&'a [u8]),
}

/// Structural well-formedness check of a public key for the given scheme.
///
/// No side effects: DSA keys must parse as a PEM public-key document,
/// Ed25519 keys must base64-decode to exactly 32 bytes that form a valid
/// point. `None` never validates.
pub fn is_valid_public_key(algorithm: SignatureAlgorithm, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    match algorithm {
        SignatureAlgorithm::None => false,
        SignatureAlgorithm::Dsa => dsa::VerifyingKey::from_public_key_pem(key).is_ok(),
        SignatureAlgorithm::Ed25519 => decode_ed25519_key(key).is_some(),
    }
}

/// Verify a detached signature over a payload.
///
/// Returns `false` for any failure: bad base64, malformed key or signature,
/// unreadable file, empty buffer, or a genuine mismatch.
pub fn verify(
    algorithm: SignatureAlgorithm,
    payload: Payload<'_>,
    signature_base64: &str,
    public_key: &str,
) -> bool {
    if signature_base64.is_empty() || public_key.is_empty() {
        return false;
    }
    if let Payload::Buffer(data) = payload {
        if data.is_empty() {
            return false;
        }
    }
    let verified = match algorithm {
        SignatureAlgorithm::None => false,
        SignatureAlgorithm::Dsa => verify_dsa(payload, signature_base64, public_key).is_some(),
        SignatureAlgorithm::Ed25519 => {
            verify_ed25519(payload, signature_base64, public_key).is_some()
        }
    };
    if !verified {
        debug!("signature verification failed ({algorithm:?})");
    }
    verified
}

/// [`verify`] over a file path.
pub fn verify_file(
    algorithm: SignatureAlgorithm,
    path: &Path,
    signature_base64: &str,
    public_key: &str,
) -> bool {
    verify(algorithm, Payload::File(path), signature_base64, public_key)
}

/// [`verify`] over an in-memory buffer.
pub fn verify_buffer(
    algorithm: SignatureAlgorithm,
    data: &[u8],
    signature_base64: &str,
    public_key: &str,
) -> bool {
    verify(algorithm, Payload::Buffer(data), signature_base64, public_key)
}

/// Base64 decode tolerant of surrounding/embedded whitespace (signatures
/// copied out of XML attributes or PEM-ish blocks often carry line breaks).
fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    BASE64.decode(compact).ok()
}

fn decode_ed25519_key(key: &str) -> Option<EdVerifyingKey> {
    let raw = decode_base64(key)?;
    let raw: [u8; 32] = raw.try_into().ok()?;
    EdVerifyingKey::from_bytes(&raw).ok()
}

fn verify_ed25519(payload: Payload<'_>, signature_base64: &str, public_key: &str) -> Option<()> {
    let signature = decode_base64(signature_base64)?;
    let signature: [u8; 64] = signature.try_into().ok()?;
    let signature = EdSignature::from_bytes(&signature);
    let key = decode_ed25519_key(public_key)?;

    // the scheme signs the whole message; file payloads are accumulated in
    // chunked reads rather than one oversized read
    let message = match payload {
        Payload::Buffer(data) => data.to_vec(),
        Payload::File(path) => read_file_chunked(path)?,
    };
    key.verify(&message, &signature).ok()
}

fn verify_dsa(payload: Payload<'_>, signature_base64: &str, public_key: &str) -> Option<()> {
    let key = dsa::VerifyingKey::from_public_key_pem(public_key).ok()?;
    let signature_der = decode_base64(signature_base64)?;
    let signature = dsa::Signature::try_from(signature_der.as_slice()).ok()?;

    let content_digest = match payload {
        Payload::Buffer(data) => Sha1::digest(data),
        Payload::File(path) => sha1_file(path)?,
    };

    // verification runs over SHA1(SHA1(payload))
    let mut outer = Sha1::new();
    outer.update(content_digest);
    key.verify_digest(outer, &signature).ok()
}

fn sha1_file(path: &Path) -> Option<sha1::digest::Output<Sha1>> {
    let mut file = File::open(path).ok()?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; FILE_CHUNK];
    loop {
        let read = file.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Some(hasher.finalize())
}

fn read_file_chunked(path: &Path) -> Option<Vec<u8>> {
    let mut file = File::open(path).ok()?;
    let mut message = Vec::new();
    let mut buf = vec![0u8; FILE_CHUNK];
    loop {
        let read = file.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        message.extend_from_slice(&buf[..read]);
    }
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // RFC 8032 section 7.1, TEST 3.
    const ED_PUBLIC_HEX: &str = "fc51cd8e6218a1a38da47ed00230f0580816ed13ba3303ac5deb911548908025";
    const ED_MESSAGE_HEX: &str = "af82";
    const ED_SIGNATURE_HEX: &str = "6291d657deec24024827e69c3abe01a30ce548a284743a445e3680d7db5ac3ac\
                                    18ff9b538d16f290ae67f760984dc6594a7c15e9716ed28dc027beceea1ec40a";
    // RFC 8032 section 7.1, TEST 2 public key (a different valid key).
    const ED_OTHER_PUBLIC_HEX: &str =
        "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c";

    fn b64_of_hex(hex_text: &str) -> String {
        BASE64.encode(hex::decode(hex_text).unwrap())
    }

    fn ed_message() -> Vec<u8> {
        hex::decode(ED_MESSAGE_HEX).unwrap()
    }

    #[test]
    fn ed25519_round_trip_over_buffer() {
        assert!(verify_buffer(
            SignatureAlgorithm::Ed25519,
            &ed_message(),
            &b64_of_hex(ED_SIGNATURE_HEX),
            &b64_of_hex(ED_PUBLIC_HEX),
        ));
    }

    #[test]
    fn ed25519_round_trip_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&ed_message()).unwrap();
        file.flush().unwrap();

        assert!(verify_file(
            SignatureAlgorithm::Ed25519,
            file.path(),
            &b64_of_hex(ED_SIGNATURE_HEX),
            &b64_of_hex(ED_PUBLIC_HEX),
        ));
    }

    #[test]
    fn ed25519_rejects_a_mutated_signature() {
        let mut sig = hex::decode(ED_SIGNATURE_HEX).unwrap();
        sig[0] ^= 0x01;
        assert!(!verify_buffer(
            SignatureAlgorithm::Ed25519,
            &ed_message(),
            &BASE64.encode(sig),
            &b64_of_hex(ED_PUBLIC_HEX),
        ));
    }

    #[test]
    fn ed25519_rejects_the_wrong_key() {
        assert!(!verify_buffer(
            SignatureAlgorithm::Ed25519,
            &ed_message(),
            &b64_of_hex(ED_SIGNATURE_HEX),
            &b64_of_hex(ED_OTHER_PUBLIC_HEX),
        ));
    }

    #[test]
    fn ed25519_rejects_a_mutated_message() {
        assert!(!verify_buffer(
            SignatureAlgorithm::Ed25519,
            b"different payload",
            &b64_of_hex(ED_SIGNATURE_HEX),
            &b64_of_hex(ED_PUBLIC_HEX),
        ));
    }

    #[test]
    fn ed25519_key_well_formedness() {
        assert!(is_valid_public_key(
            SignatureAlgorithm::Ed25519,
            &b64_of_hex(ED_PUBLIC_HEX)
        ));
        // wrong length
        assert!(!is_valid_public_key(
            SignatureAlgorithm::Ed25519,
            &BASE64.encode([0u8; 16])
        ));
        // not base64 at all
        assert!(!is_valid_public_key(SignatureAlgorithm::Ed25519, "%%%"));
        assert!(!is_valid_public_key(SignatureAlgorithm::Ed25519, ""));
    }

    #[test]
    fn ed25519_key_tolerates_embedded_whitespace() {
        let b64 = b64_of_hex(ED_PUBLIC_HEX);
        let (head, tail) = b64.split_at(20);
        let wrapped = format!("  {head}\n{tail}\n");
        assert!(is_valid_public_key(SignatureAlgorithm::Ed25519, &wrapped));
    }

    #[test]
    fn dsa_key_well_formedness_rejects_garbage() {
        assert!(!is_valid_public_key(SignatureAlgorithm::Dsa, ""));
        assert!(!is_valid_public_key(SignatureAlgorithm::Dsa, "not a pem"));
        assert!(!is_valid_public_key(
            SignatureAlgorithm::Dsa,
            "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n"
        ));
        // a valid Ed25519 key is not a DSA key
        assert!(!is_valid_public_key(
            SignatureAlgorithm::Dsa,
            &b64_of_hex(ED_PUBLIC_HEX)
        ));
    }

    #[test]
    fn dsa_verification_fails_closed_on_malformed_input() {
        assert!(!verify_buffer(
            SignatureAlgorithm::Dsa,
            b"payload",
            "c2ln",
            "not a pem"
        ));
        assert!(!verify_file(
            SignatureAlgorithm::Dsa,
            Path::new("/definitely/not/here"),
            "c2ln",
            "not a pem"
        ));
    }

    #[test]
    fn none_algorithm_never_verifies() {
        assert!(!verify_buffer(
            SignatureAlgorithm::None,
            b"payload",
            "c2ln",
            "key"
        ));
        assert!(!is_valid_public_key(SignatureAlgorithm::None, "anything"));
    }

    #[test]
    fn empty_inputs_never_verify() {
        let sig = b64_of_hex(ED_SIGNATURE_HEX);
        let key = b64_of_hex(ED_PUBLIC_HEX);
        assert!(!verify_buffer(SignatureAlgorithm::Ed25519, b"", &sig, &key));
        assert!(!verify_buffer(SignatureAlgorithm::Ed25519, b"x", "", &key));
        assert!(!verify_buffer(SignatureAlgorithm::Ed25519, b"x", &sig, ""));
    }

    #[test]
    fn missing_file_fails_closed() {
        assert!(!verify_file(
            SignatureAlgorithm::Ed25519,
            Path::new("/no/such/payload.bin"),
            &b64_of_hex(ED_SIGNATURE_HEX),
            &b64_of_hex(ED_PUBLIC_HEX),
        ));
    }

    #[test]
    fn base64_padding_is_decoded_exactly() {
        assert_eq!(decode_base64("TWFu").unwrap(), b"Man");
        assert_eq!(decode_base64("TWE=").unwrap(), b"Ma");
        assert_eq!(decode_base64("TQ==").unwrap(), b"M");
        assert!(decode_base64("T").is_none());
        assert!(decode_base64("").is_none());
        assert!(decode_base64("  \n ").is_none());
    }
}
