//! Client for the BIDV wallet gateway.
//!
//! Requests are signed (MD5 or RSA-SHA1), wrapped in a SOAP envelope and
//! posted over HTTP; the flat XML answer is decoded, its signature verified
//! and its response code resolved to a readable message.

pub mod client;
pub mod configs;
pub mod constants;
pub mod errors;
pub mod logger;
pub mod response_codes;
pub mod signer;
pub mod types;
pub mod xml;

pub use client::GatewayClient;
pub use configs::{GatewayConfig, Settings};
pub use errors::{ConfigurationError, GatewayError};
pub use response_codes::ResponseCodeTable;
pub use signer::{KeyMaterial, Signer};
pub use types::{
    Locale, ParamValue, RequestParameters, ResponseFields, SignMode, SignatureAlgorithm,
};
pub use xml::XmlEnvelopeCodec;
