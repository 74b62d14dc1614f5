use std::{path::PathBuf, time::Duration};

use common_utils::consts;
use external_services::Proxy;
use hyperswitch_masking::{PeekInterface, Secret};

use crate::{
    constants,
    errors::ConfigurationError,
    logger::config::Log,
    types::{Locale, SignatureAlgorithm},
};

/// Connection and signing settings for one merchant account on the gateway.
#[derive(Clone, serde::Deserialize, Debug)]
pub struct GatewayConfig {
    /// Base URL of the gateway, e.g. `https://www.bidv.net/NCCWallet`.
    pub endpoint_url: String,
    pub service_id: String,
    pub merchant_id: String,
    /// Secret prefixed to every signing string.
    #[serde(alias = "private_key")]
    pub shared_secret: Secret<String>,
    /// Merchant private key (PEM), used when signing with RSA.
    #[serde(alias = "private_key_9pay", default)]
    pub private_key_path: Option<PathBuf>,
    /// Gateway public key or certificate (PEM), used when verifying with RSA.
    #[serde(alias = "public_key_bidv", default)]
    pub public_key_path: Option<PathBuf>,
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub proxy: Proxy,
}

fn default_request_timeout_secs() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_SECS
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("endpoint_url", self.endpoint_url.as_str()),
            ("service_id", self.service_id.as_str()),
            ("merchant_id", self.merchant_id.as_str()),
            ("shared_secret", self.shared_secret.peek().as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigurationError::InvalidConfigValue {
                field: *field,
                reason: "must not be empty".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidConfigValue {
                field: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.signature_algorithm == SignatureAlgorithm::RsaSha1 {
            if self.private_key_path.is_none() {
                return Err(ConfigurationError::InvalidConfigValue {
                    field: "private_key_path",
                    reason: "required for RSA signatures".to_string(),
                });
            }
            if self.public_key_path.is_none() {
                return Err(ConfigurationError::InvalidConfigValue {
                    field: "public_key_path",
                    reason: "required for RSA signatures".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, serde::Deserialize, Debug)]
pub struct Settings {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub log: Log,
}

impl Settings {
    /// Function to build the configuration by picking it from default locations
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::new_with_config_path(None)
    }

    /// Loads `config/<env>.toml` (or `explicit_config_path`), then overlays
    /// `BIDV__SECTION__KEY` environment variables.
    pub fn new_with_config_path(
        explicit_config_path: Option<PathBuf>,
    ) -> Result<Self, ConfigurationError> {
        let env = consts::Env::current_env();
        let config_path = Self::config_path(&env, explicit_config_path);

        let config = config::Config::builder()
            .set_override("env", env.to_string())?
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(consts::ENV_PREFIX)
                    .try_parsing(true)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("gateway.proxy.bypass_proxy_urls"),
            )
            .build()?;

        #[allow(clippy::print_stderr)]
        let settings: Self = serde_path_to_error::deserialize(config).map_err(|error| {
            eprintln!("Unable to deserialize gateway configuration: {error}");
            error.into_inner()
        })?;

        settings.gateway.validate()?;

        Ok(settings)
    }

    pub fn config_path(environment: &consts::Env, explicit_config_path: Option<PathBuf>) -> PathBuf {
        match explicit_config_path {
            Some(path) => path,
            None => {
                let mut config_path = workspace_path();
                config_path.push("config");
                config_path.push(environment.config_path());
                config_path
            }
        }
    }
}

pub fn workspace_path() -> PathBuf {
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let mut path = PathBuf::from(manifest_dir);
        path.pop();
        path.pop();
        path
    } else {
        PathBuf::from(".")
    }
}
