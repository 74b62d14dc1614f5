//! Common utilities for the BIDV connector

pub mod consts;
pub mod crypto;
pub mod errors;
pub mod request;

pub use errors::{ApiClientError, CryptoError, CustomResult};
pub use request::{Method, Request, RequestBuilder, RequestContent};
