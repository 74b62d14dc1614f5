use common_utils::{
    consts::MASKED_VALUE,
    request::{Headers, Method, RequestBuilder, RequestContent},
    CustomResult,
};
use error_stack::{report, ResultExt};
use external_services::{
    call_connector_api, create_client, error_log, info_log, masked_headers, strip_bom_and_convert_to_string,
    warn_log, Tag,
};
use serde_json::{json, Value};

use crate::{
    configs::GatewayConfig,
    constants::{self, headers},
    errors::{ConfigurationError, GatewayError},
    response_codes::ResponseCodeTable,
    signer::Signer,
    types::{ParamValue, RequestParameters, ResponseFields, SignMode},
    xml::XmlEnvelopeCodec,
};

/// Performs signed request/response exchanges with the gateway.
///
/// Each call is independent: key files are read per call and no state is
/// carried between calls besides the configuration.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    config: GatewayConfig,
    signer: Signer,
    http_client: reqwest::Client,
}

impl GatewayClient {
    /// Validates `config` and builds the HTTP client for its endpoint and proxy.
    pub fn new(config: GatewayConfig) -> CustomResult<Self, ConfigurationError> {
        config.validate()?;
        let http_client = create_client(&config.proxy, &config.endpoint_url)
            .change_context(ConfigurationError::HttpClientSetupFailed)?;
        let signer = Signer::from_config(&config);
        Ok(Self {
            config,
            signer,
            http_client,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Prepends `Service_Id` and `Merchant_Id`, then appends `Secure_Code`
    /// computed over everything before it.
    ///
    /// Caller fields named like the fixed ones are dropped; a caller supplied
    /// `Secure_Code` is replaced.
    pub fn build_params(
        &self,
        params: RequestParameters,
    ) -> CustomResult<RequestParameters, GatewayError> {
        let mut params = RequestParameters::new()
            .with(constants::SERVICE_ID, self.config.service_id.as_str())
            .with(constants::MERCHANT_ID, self.config.merchant_id.as_str())
            .union(params);
        params.remove(constants::SECURE_CODE_REQUEST);

        let secure_code = self.signer.sign(&params, SignMode::Standard)?;
        params.insert(constants::SECURE_CODE_REQUEST, secure_code);
        Ok(params)
    }

    /// Sends one signed request to the gateway and returns its verified answer.
    ///
    /// `path` goes out as the `Operation` header and `action` as `SOAPAction`.
    /// A response whose signature does not verify is returned inside
    /// [`GatewayError::SignatureMismatch`].
    #[tracing::instrument(
        name = "bidv_gateway_call",
        fields(
            operation = %path,
            action = %action,
            merchant_id = %self.config.merchant_id,
            status_code = tracing::field::Empty,
            response_code = tracing::field::Empty,
            is_correct_sign = tracing::field::Empty,
            response_time = tracing::field::Empty,
            message_ = "Golden Log Line (outgoing)",
        ),
        skip_all
    )]
    pub async fn call(
        &self,
        path: &str,
        action: &str,
        params: RequestParameters,
    ) -> CustomResult<ResponseFields, GatewayError> {
        let params = self.build_params(params)?;
        let body = XmlEnvelopeCodec::encode(&params)?;
        let headers = soap_headers(path, action);

        info_log(
            &Tag::OutgoingApi.to_string(),
            &json!({
                "url": self.config.endpoint_url,
                "headers": masked_headers(&headers),
                "params": params_for_logging(&params),
            }),
        );

        let request = RequestBuilder::new()
            .method(Method::Post)
            .url(&self.config.endpoint_url)
            .headers(headers)
            .set_body(RequestContent::Xml(body))
            .timeout(self.config.request_timeout())
            .build();

        let start = tokio::time::Instant::now();
        let response = call_connector_api(&self.http_client, request, action).await;
        let span = tracing::Span::current();
        span.record("response_time", start.elapsed().as_millis());

        let response = response.map_err(|report| {
            let context = GatewayError::from(report.current_context());
            report.change_context(context)
        })?;

        let response = match response {
            Ok(response) => response,
            Err(error_response) => {
                span.record("status_code", error_response.status_code);
                let body = String::from_utf8_lossy(&error_response.response).into_owned();
                error_log(
                    &Tag::IncomingApi.to_string(),
                    &json!({
                        "status_code": error_response.status_code,
                        "body": body,
                    }),
                );
                return Err(report!(GatewayError::ErrorResponseReceived {
                    status_code: error_response.status_code,
                }))
                .attach_printable(body);
            }
        };
        span.record("status_code", response.status_code);

        let body = strip_bom_and_convert_to_string(&response.response).ok_or_else(|| {
            report!(GatewayError::DecodingError).attach_printable("Response body is not valid UTF-8")
        })?;
        info_log(
            &Tag::IncomingApi.to_string(),
            &json!({ "status_code": response.status_code, "body": body }),
        );

        let fields = XmlEnvelopeCodec::decode(&body)?;
        if let Some(code) = fields.response_code() {
            span.record("response_code", code);
        }

        let result = self.finalize_response(fields);
        span.record(
            "is_correct_sign",
            result.as_ref().is_ok_and(|fields| fields.is_correct_sign),
        );
        result
    }

    /// [`Self::call`] with every failure folded into the catch-all response
    /// (`RESPONSE_CODE=500`, generic message, `IS_CORRECT_SIGN=false`).
    ///
    /// A response that failed verification is returned as received, with
    /// `is_correct_sign` unset.
    pub async fn call_or_fallback(
        &self,
        path: &str,
        action: &str,
        params: RequestParameters,
    ) -> ResponseFields {
        match self.call(path, action, params).await {
            Ok(response) => response,
            Err(report) => {
                error_log(
                    &Tag::General.to_string(),
                    &json!({
                        "operation": path,
                        "error_kind": report.current_context().kind(),
                        "error": format!("{report:?}"),
                    }),
                );
                match report.current_context() {
                    GatewayError::SignatureMismatch { response } => (**response).clone(),
                    _ => ResponseFields::fallback(ResponseCodeTable::fallback_message(
                        self.config.locale,
                    )),
                }
            }
        }
    }

    /// Checks `SECURE_CODE` and attaches the message for `RESPONSE_CODE`.
    ///
    /// Nothing is derived when the response carries no response code. The
    /// signature is verified over the remaining fields followed by an empty
    /// `IS_CORRECT_SIGN` placeholder, with the trailing delimiter dropped.
    fn finalize_response(
        &self,
        mut fields: ResponseFields,
    ) -> CustomResult<ResponseFields, GatewayError> {
        let Some(code) = fields.response_code().map(str::to_owned) else {
            warn_log(
                &Tag::IncomingApi.to_string(),
                &json!("Gateway response carries no RESPONSE_CODE"),
            );
            return Ok(fields);
        };

        let is_signed = fields
            .get(constants::SECURE_CODE_RESPONSE)
            .is_some_and(|signature| !signature.is_empty());
        let signature = if is_signed {
            fields.remove(constants::SECURE_CODE_RESPONSE)
        } else {
            None
        };

        let verified = match signature {
            Some(signature) => {
                let mut signed_fields = RequestParameters::from(&fields);
                signed_fields.insert(constants::IS_CORRECT_SIGN, "");
                Some(
                    self.signer
                        .verify(&signature, &signed_fields, SignMode::TrailingCharRemoved)?,
                )
            }
            None => None,
        };

        fields.message = Some(ResponseCodeTable::message(&code, self.config.locale).to_string());

        match verified {
            Some(true) => {
                fields.is_correct_sign = true;
                Ok(fields)
            }
            Some(false) => Err(report!(GatewayError::SignatureMismatch {
                response: Box::new(fields),
            }))
            .attach_printable(format!(
                "{} signature of the response for code {code} does not verify",
                self.signer.algorithm()
            )),
            None => {
                warn_log(
                    &Tag::IncomingApi.to_string(),
                    &json!(format!("Response for code {code} is not signed")),
                );
                Ok(fields)
            }
        }
    }
}

fn soap_headers(path: &str, action: &str) -> Headers {
    vec![
        (headers::SOAP_ACTION.to_string(), action.into()),
        (headers::OPERATION.to_string(), path.into()),
        (headers::CONTENT_TYPE.to_string(), constants::CONTENT_TYPE_XML.into()),
        (headers::ACCEPT.to_string(), constants::ACCEPT_ANY.into()),
        (
            headers::ACCEPT_ENCODING.to_string(),
            constants::ACCEPT_ENCODING_GZIP_DEFLATE.into(),
        ),
    ]
}

/// Request fields as they may appear in logs, `Secure_Code` masked.
fn params_for_logging(params: &RequestParameters) -> Value {
    let map = params
        .iter()
        .fold(serde_json::Map::new(), |mut acc, (key, value)| {
            let value = match value {
                ParamValue::Scalar(_) if key == constants::SECURE_CODE_REQUEST => {
                    Value::String(MASKED_VALUE.to_string())
                }
                ParamValue::Scalar(text) => Value::String(text.clone()),
                ParamValue::Nested(nested) => params_for_logging(nested),
            };
            acc.insert(key.to_string(), value);
            acc
        });
    Value::Object(map)
}
