use std::{str::FromStr, time::Duration};

use bytes::Bytes;
use common_utils::{
    consts::MASKED_VALUE,
    errors::ApiClientError,
    request::{Headers, Method, Request, RequestContent},
    CustomResult,
};
use error_stack::{report, ResultExt};
use hyperswitch_masking::Maskable;
use reqwest::Client;
use serde_json::{json, Value};

use crate::metrics;

const FLOW_LABEL_UNKNOWN: &str = "unknown";

/// Outbound proxy settings of one gateway client.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Proxy {
    pub http_url: Option<String>,
    pub https_url: Option<String>,
    pub idle_pool_connection_timeout: Option<u64>,
    pub bypass_proxy_urls: Vec<String>,
}

/// Raw HTTP response as received from the connector.
#[derive(Clone, Debug)]
pub struct Response {
    pub response: Bytes,
    pub status_code: u16,
}

/// Sends `request` and classifies the outcome.
///
/// `Ok(Ok(_))` carries a 2xx (or 302) body, `Ok(Err(_))` a 4xx/5xx body, and
/// `Err(_)` means no usable response was obtained at all.
pub async fn call_connector_api(
    client: &Client,
    request: Request,
    flow_name: &str,
) -> CustomResult<Result<Response, Response>, ApiClientError> {
    let url =
        reqwest::Url::parse(&request.url).change_context(ApiClientError::UrlEncodingFailed)?;

    let headers = request.headers.construct_header_map()?;
    let method = request.method;
    let flow_label = if flow_name.is_empty() {
        FLOW_LABEL_UNKNOWN
    } else {
        flow_name
    };

    metrics::EXTERNAL_SERVICE_TOTAL_API_CALLS
        .with_label_values(&[flow_label, &method.to_string()])
        .inc();

    let request_builder = {
        match method {
            Method::Get => client.get(url),
            Method::Post => {
                let client = client.post(url);
                match request.body {
                    Some(body @ RequestContent::Xml(_)) => client.body(body.into_body_bytes()),
                    None => client,
                }
            }
        }
        .add_headers(headers)
    };
    let request_builder = match request.timeout {
        Some(timeout) => request_builder.timeout(timeout),
        None => request_builder,
    };

    let external_service_start_latency = tokio::time::Instant::now();
    let send_request = async {
        request_builder.send().await.map_err(|error| {
            let api_error = match error {
                error if error.is_timeout() => ApiClientError::RequestTimeoutReceived,
                _ => ApiClientError::RequestNotSent(error.to_string()),
            };
            info_log(
                "REQUEST_FAILURE",
                &json!(format!("Unable to send request to connector. Error: {api_error}")),
            );
            report!(api_error)
        })
    };

    let response = handle_response(send_request.await).await;

    metrics::EXTERNAL_SERVICE_API_CALLS_LATENCY
        .with_label_values(&[flow_label, &method.to_string()])
        .observe(external_service_start_latency.elapsed().as_secs_f64());

    let error_label = match &response {
        Ok(Ok(_)) => None,
        Ok(Err(body)) => Some(body.status_code.to_string()),
        Err(err) => Some(err.current_context().to_string()),
    };
    if let Some(error_label) = error_label {
        metrics::EXTERNAL_SERVICE_API_CALLS_ERRORS
            .with_label_values(&[flow_label, &method.to_string(), &error_label])
            .inc();
    }

    response
}

/// Builds the HTTP client used for calls to `url`. Nothing is cached, each
/// caller owns the client it gets back.
pub fn create_client(proxy_config: &Proxy, url: &str) -> CustomResult<Client, ApiClientError> {
    let url = reqwest::Url::parse(url).change_context(ApiClientError::UrlEncodingFailed)?;
    let should_bypass_proxy = proxy_config.bypass_proxy_urls.contains(&url.to_string());

    get_client_builder(proxy_config, should_bypass_proxy)?
        .build()
        .change_context(ApiClientError::ClientConstructionFailed)
        .inspect_err(|err| {
            info_log(
                "ERROR",
                &json!(format!("Failed to construct base client. Error: {:?}", err)),
            );
        })
}

fn get_client_builder(
    proxy_config: &Proxy,
    should_bypass_proxy: bool,
) -> CustomResult<reqwest::ClientBuilder, ApiClientError> {
    let mut client_builder = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(Duration::from_secs(
            proxy_config
                .idle_pool_connection_timeout
                .unwrap_or_default(),
        ));

    // Only the configured proxy applies; system proxy variables are ignored
    if should_bypass_proxy
        || (proxy_config.http_url.is_none() && proxy_config.https_url.is_none())
    {
        return Ok(client_builder.no_proxy());
    }

    // Proxy all HTTPS traffic through the configured HTTPS proxy
    if let Some(url) = proxy_config.https_url.as_ref() {
        client_builder = client_builder.proxy(
            reqwest::Proxy::https(url)
                .change_context(ApiClientError::InvalidProxyConfiguration)
                .inspect_err(|err| {
                    info_log(
                        "PROXY_ERROR",
                        &json!(format!("HTTPS proxy configuration error. Error: {:?}", err)),
                    );
                })?,
        );
    }

    // Proxy all HTTP traffic through the configured HTTP proxy
    if let Some(url) = proxy_config.http_url.as_ref() {
        client_builder = client_builder.proxy(
            reqwest::Proxy::http(url)
                .change_context(ApiClientError::InvalidProxyConfiguration)
                .inspect_err(|err| {
                    info_log(
                        "PROXY_ERROR",
                        &json!(format!("HTTP proxy configuration error. Error: {:?}", err)),
                    );
                })?,
        );
    }

    Ok(client_builder)
}

async fn handle_response(
    response: CustomResult<reqwest::Response, ApiClientError>,
) -> CustomResult<Result<Response, Response>, ApiClientError> {
    let resp = response?;
    let status_code = resp.status().as_u16();
    match status_code {
        200..=202 | 302 | 204 => {
            let response = read_body(resp).await?;
            Ok(Ok(Response {
                response,
                status_code,
            }))
        }
        400..=599 => {
            let response = read_body(resp).await?;
            Ok(Err(Response {
                response,
                status_code,
            }))
        }
        _ => {
            info_log(
                "UNEXPECTED_RESPONSE",
                &json!("Unexpected response from server."),
            );
            Err(report!(ApiClientError::UnexpectedServerResponse))
        }
    }
}

async fn read_body(resp: reqwest::Response) -> CustomResult<Bytes, ApiClientError> {
    resp.bytes().await.map_err(|error| {
        let api_error = if error.is_timeout() {
            ApiClientError::RequestTimeoutReceived
        } else {
            ApiClientError::ResponseDecodingFailed
        };
        report!(error).change_context(api_error)
    })
}

/// Decodes a response body as UTF-8, dropping a leading byte order mark.
pub fn strip_bom_and_convert_to_string(response_bytes: &[u8]) -> Option<String> {
    String::from_utf8(response_bytes.to_vec()).ok().map(|s| {
        // Remove BOM if present (UTF-8 BOM is 0xEF, 0xBB, 0xBF)
        if s.starts_with('\u{FEFF}') {
            s.trim_start_matches('\u{FEFF}').to_string()
        } else {
            s
        }
    })
}

/// Header map rendered for logs, masked values replaced.
pub fn masked_headers(headers: &Headers) -> Value {
    let map = headers
        .iter()
        .fold(serde_json::Map::new(), |mut acc, (k, v)| {
            let value = match v {
                Maskable::Normal(val) => val.clone(),
                Maskable::Masked(_) => MASKED_VALUE.to_string(),
            };
            acc.insert(k.clone(), Value::String(value));
            acc
        });
    Value::Object(map)
}

pub(super) trait HeaderExt {
    fn construct_header_map(self) -> CustomResult<reqwest::header::HeaderMap, ApiClientError>;
}

impl HeaderExt for Headers {
    fn construct_header_map(self) -> CustomResult<reqwest::header::HeaderMap, ApiClientError> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        self.into_iter().try_fold(
            HeaderMap::new(),
            |mut header_map, (header_name, header_value)| {
                let header_name = HeaderName::from_str(&header_name)
                    .change_context(ApiClientError::HeaderMapConstructionFailed)?;
                let header_value = header_value.into_inner();
                let header_value = HeaderValue::from_str(&header_value)
                    .change_context(ApiClientError::HeaderMapConstructionFailed)?;
                header_map.append(header_name, header_value);
                Ok(header_map)
            },
        )
    }
}

pub(super) trait RequestBuilderExt {
    fn add_headers(self, headers: reqwest::header::HeaderMap) -> Self;
}

impl RequestBuilderExt for reqwest::RequestBuilder {
    fn add_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self = self.headers(headers);
        self
    }
}

#[derive(Debug, Default, serde::Deserialize, Clone, strum::EnumString, strum::Display)]
pub enum Tag {
    /// General.
    #[default]
    General,
    /// Incoming response
    IncomingApi,
    /// Api Outgoing Request
    OutgoingApi,
}

#[inline]
pub fn info_log(action: &str, message: &Value) {
    tracing::info!(tags = %action, json_value= %message);
}

#[inline]
pub fn error_log(action: &str, message: &Value) {
    tracing::error!(tags = %action, json_value= %message);
}

#[inline]
pub fn warn_log(action: &str, message: &Value) {
    tracing::warn!(tags = %action, json_value= %message);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    use hyperswitch_masking::Secret;

    use super::*;

    #[test]
    fn header_map_is_built_from_ordered_headers() {
        let headers: Headers = vec![
            ("SOAPAction".to_string(), Maskable::new_normal("init".to_string())),
            ("Content-Type".to_string(), "text/xml".into()),
        ];
        let map = headers.construct_header_map().expect("Header map");
        assert_eq!(map.get("soapaction").map(|v| v.as_bytes()), Some(&b"init"[..]));
        assert_eq!(map.get("content-type").map(|v| v.as_bytes()), Some(&b"text/xml"[..]));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let headers: Headers = vec![("bad header".to_string(), "x".into())];
        let err = headers.construct_header_map().expect_err("Invalid header name");
        assert_eq!(
            *err.current_context(),
            ApiClientError::HeaderMapConstructionFailed
        );
    }

    #[test]
    fn masked_headers_hide_secret_values() {
        let headers: Headers = vec![
            ("Operation".to_string(), "/wallet".into()),
            ("Authorization".to_string(), Maskable::new_masked(Secret::new("token".to_string()))),
        ];
        let rendered = masked_headers(&headers);
        assert_eq!(rendered["Operation"], "/wallet");
        assert_eq!(rendered["Authorization"], common_utils::consts::MASKED_VALUE);
    }

    #[test]
    fn client_requires_an_absolute_url() {
        let err = create_client(&Proxy::default(), "not a url").expect_err("Relative URL");
        assert_eq!(*err.current_context(), ApiClientError::UrlEncodingFailed);
        assert!(create_client(&Proxy::default(), "http://gateway.test/ws").is_ok());
    }

    #[test]
    fn bom_is_stripped() {
        let body = "\u{FEFF}<a/>".as_bytes();
        assert_eq!(strip_bom_and_convert_to_string(body).as_deref(), Some("<a/>"));
        assert_eq!(strip_bom_and_convert_to_string(&[0xff, 0xfe]), None);
    }
}
