// RSA encryption step of the signing protocol

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::errors::ProtocolError;

/// Parses a base64-encoded SPKI DER public key.
pub fn parse_public_key(b64_spki: &str) -> Result<RsaPublicKey, ProtocolError> {
    let der = BASE64
        .decode(b64_spki.trim())
        .map_err(|e| ProtocolError::Crypto(format!("public key is not valid base64: {}", e)))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| ProtocolError::Crypto(format!("public key DER rejected: {}", e)))
}

/// PKCS#1 v1.5 encryption of `plaintext`, returned base64-encoded the way
/// the check-in endpoint expects its `pass` field.
pub fn encrypt(key: &RsaPublicKey, plaintext: &[u8]) -> Result<String, ProtocolError> {
    let ciphertext = key
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, plaintext)
        .map_err(|e| ProtocolError::Crypto(e.to_string()))?;
    Ok(BASE64.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PUBLIC_KEY_B64;

    #[test]
    fn test_parse_the_service_public_key() {
        let key = parse_public_key(PUBLIC_KEY_B64).expect("service key must parse");
        // 2048-bit modulus
        assert_eq!(rsa::traits::PublicKeyParts::size(&key), 256);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_public_key("not base64 at all!").is_err());

        let valid_b64_bad_der = BASE64.encode(b"hello world");
        assert!(parse_public_key(&valid_b64_bad_der).is_err());
    }

    #[test]
    fn test_encrypt_produces_one_base64_block() {
        let key = parse_public_key(PUBLIC_KEY_B64).expect("service key must parse");
        let pass = encrypt(&key, b"1718000000").expect("encrypt");

        let raw = BASE64.decode(&pass).expect("output must be base64");
        assert_eq!(raw.len(), 256);
    }

    #[test]
    fn test_encrypt_is_randomized() {
        let key = parse_public_key(PUBLIC_KEY_B64).expect("service key must parse");
        let a = encrypt(&key, b"1718000000").expect("encrypt");
        let b = encrypt(&key, b"1718000000").expect("encrypt");
        // PKCS#1 v1.5 pads with random bytes
        assert_ne!(a, b);
    }
}
