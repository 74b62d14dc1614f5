// BIDV wallet gateway wire constants

/// Prefix given to every top-level request element.
pub const NCC_PREFIX: &str = "ncc:";

pub const ENVELOPE_HEADER: &str = concat!(
    r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
    r#"xmlns:ncc="NCCWalletInput_Schema"><soapenv:Header/><soapenv:Body><ncc:root>"#
);
pub const ENVELOPE_FOOTER: &str = "</ncc:root></soapenv:Body></soapenv:Envelope>";

/// Delimiter of the signing string.
pub const SIGNING_DELIMITER: &str = "|";

// Outbound field names
pub const SERVICE_ID: &str = "Service_Id";
pub const MERCHANT_ID: &str = "Merchant_Id";
pub const SECURE_CODE_REQUEST: &str = "Secure_Code";

// Inbound field names
pub const RESPONSE_CODE: &str = "RESPONSE_CODE";
pub const SECURE_CODE_RESPONSE: &str = "SECURE_CODE";
pub const IS_CORRECT_SIGN: &str = "IS_CORRECT_SIGN";
pub const MESSAGE: &str = "MESSAGE";

pub const FALLBACK_RESPONSE_CODE: &str = "500";

pub mod headers {
    pub const SOAP_ACTION: &str = "SOAPAction";
    pub const OPERATION: &str = "Operation";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const ACCEPT: &str = "Accept";
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
}

pub const CONTENT_TYPE_XML: &str = "text/xml";
pub const ACCEPT_ANY: &str = "*/*";
pub const ACCEPT_ENCODING_GZIP_DEFLATE: &str = "gzip, deflate";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
