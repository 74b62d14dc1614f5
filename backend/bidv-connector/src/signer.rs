//! Computes and checks the `Secure_Code` field.
//!
//! The signing string is the shared secret followed by every field value in
//! order, all joined with `|`. MD5 mode sends the hex digest of that string,
//! RSA mode a base64 RSA-SHA1 signature made with the merchant private key.

use std::path::{Path, PathBuf};

use common_utils::{
    crypto::{self, RsaSha1, VerifySignature},
    errors::CryptoError,
    CustomResult,
};
use error_stack::{report, Report, ResultExt};
use hyperswitch_masking::{ExposeInterface, PeekInterface, Secret};

use crate::{
    configs::GatewayConfig,
    constants,
    errors::GatewayError,
    types::{RequestParameters, SignMode, SignatureAlgorithm},
};

/// PEM bytes read from a key file. Read fresh on every use, never cached.
pub struct KeyMaterial {
    path: PathBuf,
    pem: Secret<Vec<u8>>,
}

impl KeyMaterial {
    pub fn load_private(path: &Path) -> CustomResult<Self, GatewayError> {
        let key = Self::read(path)?;
        RsaSha1::private_key(key.pem.peek()).change_context(key.load_error())?;
        Ok(key)
    }

    pub fn load_public(path: &Path) -> CustomResult<Self, GatewayError> {
        let key = Self::read(path)?;
        RsaSha1::public_key(key.pem.peek()).change_context(key.load_error())?;
        Ok(key)
    }

    fn read(path: &Path) -> CustomResult<Self, GatewayError> {
        let pem = std::fs::read(path).change_context(GatewayError::KeyLoadError {
            path: path.display().to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            pem: Secret::new(pem),
        })
    }

    fn load_error(&self) -> GatewayError {
        GatewayError::KeyLoadError {
            path: self.path.display().to_string(),
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("path", &self.path)
            .field("pem", &self.pem)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Signer {
    algorithm: SignatureAlgorithm,
    shared_secret: Secret<String>,
    private_key_path: Option<PathBuf>,
    public_key_path: Option<PathBuf>,
}

impl Signer {
    pub fn new(algorithm: SignatureAlgorithm, shared_secret: Secret<String>) -> Self {
        Self {
            algorithm,
            shared_secret,
            private_key_path: None,
            public_key_path: None,
        }
    }

    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    pub fn with_public_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.public_key_path = Some(path.into());
        self
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            algorithm: config.signature_algorithm,
            shared_secret: config.shared_secret.clone(),
            private_key_path: config.private_key_path.clone(),
            public_key_path: config.public_key_path.clone(),
        }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// `secret|v1|v2|...`, optionally with its last character dropped.
    pub fn signing_string(&self, params: &RequestParameters, mode: SignMode) -> Secret<String> {
        let mut signing_string = std::iter::once(self.shared_secret.peek().as_str())
            .chain(params.values_for_signing())
            .collect::<Vec<_>>()
            .join(constants::SIGNING_DELIMITER);
        if mode == SignMode::TrailingCharRemoved {
            signing_string.pop();
        }
        Secret::new(signing_string)
    }

    pub fn sign(
        &self,
        params: &RequestParameters,
        mode: SignMode,
    ) -> CustomResult<String, GatewayError> {
        let message = self.signing_string(params, mode).expose();
        match self.algorithm {
            SignatureAlgorithm::Md5 => crypto::md5_hex(message.as_bytes())
                .change_context(GatewayError::SigningFailed),
            SignatureAlgorithm::RsaSha1 => {
                let key = KeyMaterial::load_private(self.key_path(&self.private_key_path)?)?;
                crypto::rsa_sha1_base64(key.pem.peek(), message.as_bytes())
                    .map_err(|err| signing_error(err, &key))
            }
        }
    }

    /// Checks `signature` against `params`.
    ///
    /// A malformed signature is a plain mismatch; only unreadable or invalid
    /// key files are reported as errors.
    pub fn verify(
        &self,
        signature: &str,
        params: &RequestParameters,
        mode: SignMode,
    ) -> CustomResult<bool, GatewayError> {
        let message = self.signing_string(params, mode).expose();
        match self.algorithm {
            SignatureAlgorithm::Md5 => {
                let Ok(signature) = hex::decode(signature.trim()) else {
                    return Ok(false);
                };
                Ok(crypto::Md5
                    .verify_signature(&[], &signature, message.as_bytes())
                    .unwrap_or(false))
            }
            SignatureAlgorithm::RsaSha1 => {
                let key = KeyMaterial::load_public(self.key_path(&self.public_key_path)?)?;
                let Ok(signature) = crypto::decode_base64_signature(signature) else {
                    return Ok(false);
                };
                RsaSha1
                    .verify_signature(key.pem.peek(), &signature, message.as_bytes())
                    .map_err(|err| signing_error(err, &key))
            }
        }
    }

    fn key_path<'a>(&self, path: &'a Option<PathBuf>) -> CustomResult<&'a Path, GatewayError> {
        path.as_deref().ok_or_else(|| {
            report!(GatewayError::KeyLoadError {
                path: String::new(),
            })
            .attach_printable(format!(
                "No key file configured for {} signatures",
                self.algorithm
            ))
        })
    }
}

fn signing_error(err: Report<CryptoError>, key: &KeyMaterial) -> Report<GatewayError> {
    let context = match err.current_context() {
        CryptoError::InvalidKeyMaterial => key.load_error(),
        CryptoError::MessageSigningFailed
        | CryptoError::SignatureVerificationFailed => GatewayError::SigningFailed,
    };
    err.change_context(context)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    use std::io::Write;

    use openssl::rsa::Rsa;
    use tempfile::NamedTempFile;

    use super::*;

    fn md5_signer() -> Signer {
        Signer::new(SignatureAlgorithm::Md5, Secret::new("secret".to_string()))
    }

    fn order_params() -> RequestParameters {
        RequestParameters::new()
            .with("Amount", "1000")
            .with("OrderId", "ABC123")
    }

    fn pem_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Temp key file");
        file.write_all(contents).expect("Write key file");
        file
    }

    fn rsa_key_files() -> (NamedTempFile, NamedTempFile) {
        let rsa = Rsa::generate(2048).expect("RSA key generation");
        let private = pem_file(&rsa.private_key_to_pem().expect("Private key PEM"));
        let public = pem_file(&rsa.public_key_to_pem().expect("Public key PEM"));
        (private, public)
    }

    #[test]
    fn signing_string_prefixes_secret_and_joins_with_pipes() {
        let signer = md5_signer();
        assert_eq!(
            signer.signing_string(&order_params(), SignMode::Standard).peek(),
            "secret|1000|ABC123"
        );
        assert_eq!(
            signer
                .signing_string(&order_params(), SignMode::TrailingCharRemoved)
                .peek(),
            "secret|1000|ABC12"
        );
        assert_eq!(
            signer
                .signing_string(&RequestParameters::new(), SignMode::Standard)
                .peek(),
            "secret"
        );
    }

    #[test]
    fn md5_signature_is_hex_digest_of_signing_string() {
        let signature = md5_signer()
            .sign(&order_params(), SignMode::Standard)
            .expect("MD5 signature");
        assert_eq!(signature, "79cba1d11aacfc225aacbe835fa19d40");
    }

    #[test]
    fn md5_round_trip_and_tampering() {
        let signer = md5_signer();
        let params = order_params();
        let signature = signer.sign(&params, SignMode::Standard).expect("Signature");

        assert!(signer
            .verify(&signature, &params, SignMode::Standard)
            .expect("Verification"));
        assert!(signer
            .verify(&signature.to_uppercase(), &params, SignMode::Standard)
            .expect("Upper case hex verification"));

        let tampered = params.clone().with("Amount", "1001");
        assert!(!signer
            .verify(&signature, &tampered, SignMode::Standard)
            .expect("Tampered verification"));
    }

    #[test]
    fn md5_malformed_signature_is_a_mismatch() {
        let signer = md5_signer();
        assert!(!signer
            .verify("not-hex", &order_params(), SignMode::Standard)
            .expect("Malformed signature"));
        assert!(!signer
            .verify("", &order_params(), SignMode::Standard)
            .expect("Empty signature"));
    }

    #[test]
    fn rsa_round_trip_and_tampering() {
        let (private, public) = rsa_key_files();
        let signer = Signer::new(SignatureAlgorithm::RsaSha1, Secret::new("secret".to_string()))
            .with_private_key_path(private.path())
            .with_public_key_path(public.path());
        let params = order_params();

        let signature = signer.sign(&params, SignMode::Standard).expect("RSA signature");
        assert!(signer
            .verify(&signature, &params, SignMode::Standard)
            .expect("Verification"));

        let tampered = params.clone().with("OrderId", "ABC124");
        assert!(!signer
            .verify(&signature, &tampered, SignMode::Standard)
            .expect("Tampered verification"));
        assert!(!signer
            .verify("%%not base64%%", &params, SignMode::Standard)
            .expect("Malformed signature"));
    }

    #[test]
    fn missing_private_key_file_is_a_key_load_error() {
        let signer = Signer::new(SignatureAlgorithm::RsaSha1, Secret::new("secret".to_string()))
            .with_private_key_path("/nonexistent/bidv/private.pem");

        let err = signer
            .sign(&order_params(), SignMode::Standard)
            .expect_err("Missing key file");
        assert!(matches!(
            err.current_context(),
            GatewayError::KeyLoadError { path } if path == "/nonexistent/bidv/private.pem"
        ));
    }

    #[test]
    fn unparseable_public_key_is_a_key_load_error() {
        let garbage = pem_file(b"-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----\n");
        let signer = Signer::new(SignatureAlgorithm::RsaSha1, Secret::new("secret".to_string()))
            .with_public_key_path(garbage.path());

        let err = signer
            .verify("c2ln", &order_params(), SignMode::Standard)
            .expect_err("Invalid key file");
        assert!(matches!(
            err.current_context(),
            GatewayError::KeyLoadError { .. }
        ));
    }

    #[test]
    fn unconfigured_key_path_is_a_key_load_error() {
        let signer = Signer::new(SignatureAlgorithm::RsaSha1, Secret::new("secret".to_string()));
        let err = signer
            .sign(&order_params(), SignMode::Standard)
            .expect_err("No key path");
        assert!(matches!(
            err.current_context(),
            GatewayError::KeyLoadError { .. }
        ));
    }
}
