//! Utilities for cryptographic algorithms
use error_stack::{report, ResultExt};
use openssl::{
    hash::MessageDigest,
    pkey::{PKey, Private, Public},
    sign::{Signer, Verifier},
    x509::X509,
};

use crate::errors::{self, CustomResult};

/// Trait for cryptographically signing messages
pub trait SignMessage {
    /// Takes in a secret and a message and returns the calculated signature as bytes
    fn sign_message(&self, secret: &[u8], msg: &[u8])
        -> CustomResult<Vec<u8>, errors::CryptoError>;
}

/// Trait for cryptographically verifying a message against a signature
pub trait VerifySignature {
    /// Takes in a secret, the signature and the message and verifies the message
    /// against the signature
    fn verify_signature(
        &self,
        secret: &[u8],
        signature: &[u8],
        msg: &[u8],
    ) -> CustomResult<bool, errors::CryptoError>;
}

/// Trait for generating a digest for SHA
pub trait GenerateDigest {
    /// takes a message and creates a digest for it
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError>;
}

/// MD5 hash function
#[derive(Debug)]
pub struct Md5;

impl GenerateDigest for Md5 {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError> {
        let digest = md5::compute(message);
        Ok(digest.as_ref().to_vec())
    }
}

impl VerifySignature for Md5 {
    fn verify_signature(
        &self,
        _secret: &[u8],
        signature: &[u8],
        msg: &[u8],
    ) -> CustomResult<bool, errors::CryptoError> {
        let hashed_digest = Self
            .generate_digest(msg)
            .change_context(errors::CryptoError::SignatureVerificationFailed)?;
        Ok(constant_time_eq(&hashed_digest, signature))
    }
}

/// RSA PKCS#1 v1.5 signatures over a SHA-1 digest.
///
/// The `secret` handed to [`SignMessage`] is a PEM encoded private key, the one
/// handed to [`VerifySignature`] a PEM encoded public key or X.509 certificate.
#[derive(Debug)]
pub struct RsaSha1;

impl RsaSha1 {
    pub fn private_key(pem: &[u8]) -> CustomResult<PKey<Private>, errors::CryptoError> {
        PKey::private_key_from_pem(pem)
            .change_context(errors::CryptoError::InvalidKeyMaterial)
            .attach_printable("Failed to parse PEM private key")
    }

    pub fn public_key(pem: &[u8]) -> CustomResult<PKey<Public>, errors::CryptoError> {
        if let Ok(key) = PKey::public_key_from_pem(pem) {
            return Ok(key);
        }
        X509::from_pem(pem)
            .and_then(|certificate| certificate.public_key())
            .change_context(errors::CryptoError::InvalidKeyMaterial)
            .attach_printable("Neither a PEM public key nor a PEM certificate")
    }
}

impl SignMessage for RsaSha1 {
    fn sign_message(
        &self,
        secret: &[u8],
        msg: &[u8],
    ) -> CustomResult<Vec<u8>, errors::CryptoError> {
        let key = Self::private_key(secret)?;
        let mut signer = Signer::new(MessageDigest::sha1(), &key)
            .change_context(errors::CryptoError::MessageSigningFailed)?;
        signer
            .update(msg)
            .change_context(errors::CryptoError::MessageSigningFailed)?;
        signer
            .sign_to_vec()
            .change_context(errors::CryptoError::MessageSigningFailed)
    }
}

impl VerifySignature for RsaSha1 {
    fn verify_signature(
        &self,
        secret: &[u8],
        signature: &[u8],
        msg: &[u8],
    ) -> CustomResult<bool, errors::CryptoError> {
        let key = Self::public_key(secret)?;
        let mut verifier = Verifier::new(MessageDigest::sha1(), &key)
            .change_context(errors::CryptoError::SignatureVerificationFailed)?;
        verifier
            .update(msg)
            .change_context(errors::CryptoError::SignatureVerificationFailed)?;
        // openssl reports a signature of the wrong size as an error, not a mismatch
        Ok(verifier.verify(signature).unwrap_or(false))
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len() && openssl::memcmp::eq(left, right)
}

/// Hex encoded MD5 digest of `message`, lower case.
pub fn md5_hex(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Md5.generate_digest(message).map(hex::encode)
}

/// Signs `message` with [`RsaSha1`] and encodes the signature as standard base64.
pub fn rsa_sha1_base64(
    private_key_pem: &[u8],
    message: &[u8],
) -> CustomResult<String, errors::CryptoError> {
    use base64::Engine;

    RsaSha1
        .sign_message(private_key_pem, message)
        .map(|signature| crate::consts::BASE64_ENGINE.encode(signature))
}

/// Decodes a base64 signature; anything that is not valid base64 is reported as
/// a verification failure rather than a panic.
pub fn decode_base64_signature(signature: &str) -> CustomResult<Vec<u8>, errors::CryptoError> {
    use base64::Engine;

    crate::consts::BASE64_ENGINE
        .decode(signature.trim())
        .map_err(|_| report!(errors::CryptoError::SignatureVerificationFailed))
        .attach_printable("Signature is not valid base64")
}

#[cfg(test)]
mod crypto_tests {
    #![allow(clippy::expect_used)]
    use openssl::rsa::Rsa;

    use super::{GenerateDigest, SignMessage, VerifySignature};

    fn rsa_key_pair() -> (Vec<u8>, Vec<u8>) {
        let rsa = Rsa::generate(2048).expect("RSA key generation");
        let private = rsa.private_key_to_pem().expect("Private key PEM");
        let public = rsa.public_key_to_pem().expect("Public key PEM");
        (private, public)
    }

    #[test]
    fn test_md5_digest() {
        let message = "abcdefghijklmnopqrstuvwxyz".as_bytes();
        assert_eq!(
            hex::encode(super::Md5.generate_digest(message).expect("Digest")),
            "c3fcd3d76192e4007dfb496cca67e13b"
        );
    }

    #[test]
    fn test_md5_verify_signature() {
        let right_signature =
            hex::decode("c3fcd3d76192e4007dfb496cca67e13b").expect("signature decoding");
        let wrong_signature =
            hex::decode("d5550730377011948f12cc28889bee59").expect("Wrong signature decoding");
        let data = "abcdefghijklmnopqrstuvwxyz".as_bytes();

        let right_verified = super::Md5
            .verify_signature(&[], &right_signature, data)
            .expect("Right signature verification result");
        assert!(right_verified);

        let wrong_verified = super::Md5
            .verify_signature(&[], &wrong_signature, data)
            .expect("Wrong signature verification result");
        assert!(!wrong_verified);

        let short_verified = super::Md5
            .verify_signature(&[], &right_signature[..4], data)
            .expect("Short signature verification result");
        assert!(!short_verified);
    }

    #[test]
    fn test_rsa_sha1_sign_and_verify() {
        let (private, public) = rsa_key_pair();
        let message = b"secret|1000|ABC123";

        let signature = super::RsaSha1
            .sign_message(&private, message)
            .expect("Signature");
        assert!(super::RsaSha1
            .verify_signature(&public, &signature, message)
            .expect("Verification"));
        assert!(!super::RsaSha1
            .verify_signature(&public, &signature, b"secret|1001|ABC123")
            .expect("Verification of tampered message"));
        assert!(!super::RsaSha1
            .verify_signature(&public, b"garbage", message)
            .expect("Verification of truncated signature"));
    }

    #[test]
    fn test_rsa_sha1_accepts_certificate_as_public_key() {
        use openssl::{
            asn1::Asn1Time, bn::BigNum, hash::MessageDigest, pkey::PKey, x509::X509NameBuilder,
            x509::X509,
        };

        let rsa = Rsa::generate(2048).expect("RSA key generation");
        let key = PKey::from_rsa(rsa).expect("PKey");
        let mut name = X509NameBuilder::new().expect("Name builder");
        name.append_entry_by_text("CN", "bidv-test").expect("CN");
        let name = name.build();
        let mut builder = X509::builder().expect("X509 builder");
        builder.set_version(2).expect("Version");
        builder
            .set_serial_number(&BigNum::from_u32(1).expect("Serial").to_asn1_integer().expect("Asn1"))
            .expect("Serial number");
        builder.set_subject_name(&name).expect("Subject");
        builder.set_issuer_name(&name).expect("Issuer");
        builder.set_pubkey(&key).expect("Public key");
        builder
            .set_not_before(&Asn1Time::days_from_now(0).expect("Not before"))
            .expect("Not before");
        builder
            .set_not_after(&Asn1Time::days_from_now(1).expect("Not after"))
            .expect("Not after");
        builder.sign(&key, MessageDigest::sha256()).expect("Self sign");
        let certificate = builder.build().to_pem().expect("Certificate PEM");

        let private = key.private_key_to_pem_pkcs8().expect("Private key PEM");
        let signature = super::RsaSha1
            .sign_message(&private, b"payload")
            .expect("Signature");
        assert!(super::RsaSha1
            .verify_signature(&certificate, &signature, b"payload")
            .expect("Verification"));
    }

    #[test]
    fn test_invalid_key_material_is_an_error() {
        let err = super::RsaSha1
            .sign_message(b"not a key", b"payload")
            .expect_err("Signing with garbage key material");
        assert!(matches!(
            err.current_context(),
            super::errors::CryptoError::InvalidKeyMaterial
        ));
    }

    #[test]
    fn test_decode_base64_signature_rejects_garbage() {
        assert!(super::decode_base64_signature("%%%not-base64%%%").is_err());
        assert_eq!(
            super::decode_base64_signature("YWJj").expect("Valid base64"),
            b"abc".to_vec()
        );
    }
}
