/// Placeholder written wherever a masked value would otherwise be printed
pub const MASKED_VALUE: &str = "*** alloc::string::String ***";

/// Prefix of environment variables read by the configuration loader
pub const ENV_PREFIX: &str = "BIDV";

/// Environment variable that selects the runtime environment
pub const ENV_SELECTOR: &str = "BIDV_ENV";

pub const BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Runtime environment, used to pick the default configuration file
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Env {
    #[default]
    Development,
    Sandbox,
    Production,
}

impl Env {
    /// Environment selected through `BIDV_ENV`, falling back to development.
    pub fn current_env() -> Self {
        std::env::var(ENV_SELECTOR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub const fn config_path(self) -> &'static str {
        match self {
            Self::Development => "development.toml",
            Self::Sandbox => "sandbox.toml",
            Self::Production => "production.toml",
        }
    }
}
