//! SOAP envelope encoding for requests and flat tag/text decoding for responses.

use common_utils::CustomResult;
use error_stack::{report, ResultExt};
use quick_xml::{
    escape::escape,
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::{
    constants,
    errors::GatewayError,
    logger,
    types::{ParamValue, RequestParameters, ResponseFields},
};

pub struct XmlEnvelopeCodec;

impl XmlEnvelopeCodec {
    /// Renders `params` inside the fixed envelope.
    ///
    /// Top-level fields are written as `ncc:<name>`; nested groups become
    /// child elements without a prefix. Field names must be valid XML names.
    pub fn encode(params: &RequestParameters) -> CustomResult<String, GatewayError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .get_mut()
            .extend_from_slice(constants::ENVELOPE_HEADER.as_bytes());
        for (name, value) in params.iter() {
            let tag = format!("{}{}", constants::NCC_PREFIX, validate_name(name)?);
            write_element(&mut writer, &tag, value)?;
        }
        writer
            .get_mut()
            .extend_from_slice(constants::ENVELOPE_FOOTER.as_bytes());

        String::from_utf8(writer.into_inner())
            .change_context(GatewayError::EncodingError)
            .attach_printable("Rendered envelope is not valid UTF-8")
    }

    /// Collects every leaf element of `body` as tag name to text.
    ///
    /// Namespace prefixes are stripped and tag names upper-cased, self-closing and empty elements map to
    /// an empty string, and split text or CDATA sections are joined. Elements
    /// holding child elements are not recorded themselves.
    pub fn decode(body: &str) -> CustomResult<ResponseFields, GatewayError> {
        let mut reader = Reader::from_str(body);
        let mut open: Vec<OpenElement> = Vec::new();
        let mut fields = ResponseFields::new();
        let mut seen_element = false;

        loop {
            let event = reader
                .read_event()
                .change_context(GatewayError::DecodingError)
                .attach_printable_lazy(|| {
                    format!("Malformed XML at byte {}", reader.buffer_position())
                })?;

            match event {
                Event::Start(start) => {
                    seen_element = true;
                    if let Some(parent) = open.last_mut() {
                        parent.has_children = true;
                    }
                    open.push(OpenElement {
                        name: local_name(start.local_name().as_ref())?,
                        text: String::new(),
                        has_children: false,
                    });
                }
                Event::Empty(empty) => {
                    seen_element = true;
                    if let Some(parent) = open.last_mut() {
                        parent.has_children = true;
                    }
                    fields.insert(local_name(empty.local_name().as_ref())?, "");
                }
                Event::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        let text = text
                            .unescape()
                            .change_context(GatewayError::DecodingError)
                            .attach_printable("Invalid character reference in element text")?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(current) = open.last_mut() {
                        let text = std::str::from_utf8(&cdata)
                            .change_context(GatewayError::DecodingError)
                            .attach_printable("CDATA section is not valid UTF-8")?;
                        current.text.push_str(text);
                    }
                }
                Event::End(_) => {
                    let element = open.pop().ok_or_else(|| {
                        report!(GatewayError::DecodingError)
                            .attach_printable("Closing tag without a matching opening tag")
                    })?;
                    if !element.has_children {
                        fields.insert(element.name, element.text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(element) = open.last() {
            return Err(report!(GatewayError::DecodingError))
                .attach_printable(format!("Element `{}` is never closed", element.name));
        }
        if !seen_element {
            return Err(report!(GatewayError::DecodingError))
                .attach_printable("Response body contains no XML element");
        }

        Ok(fields)
    }

    /// [`Self::decode`] that yields an empty response for malformed input.
    pub fn decode_lenient(body: &str) -> ResponseFields {
        Self::decode(body).unwrap_or_else(|error| {
            logger::warn!(?error, "Discarding malformed gateway response");
            ResponseFields::new()
        })
    }
}

struct OpenElement {
    name: String,
    text: String,
    has_children: bool,
}

/// Tag name without its namespace prefix, upper-cased.
fn local_name(raw: &[u8]) -> CustomResult<String, GatewayError> {
    std::str::from_utf8(raw)
        .map(str::to_ascii_uppercase)
        .change_context(GatewayError::DecodingError)
        .attach_printable("Tag name is not valid UTF-8")
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    value: &ParamValue,
) -> CustomResult<(), GatewayError> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .change_context(GatewayError::EncodingError)?;
    match value {
        ParamValue::Scalar(text) => {
            // Apostrophes go out as `&#039;`
            let escaped = escape(text.as_str()).replace("&apos;", "&#039;");
            writer
                .write_event(Event::Text(BytesText::from_escaped(escaped)))
                .change_context(GatewayError::EncodingError)?;
        }
        ParamValue::Nested(children) => {
            for (name, child) in children.iter() {
                write_element(writer, validate_name(name)?, child)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .change_context(GatewayError::EncodingError)?;
    Ok(())
}

fn validate_name(name: &str) -> CustomResult<&str, GatewayError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    let reserved = name
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"));

    if valid_start && valid_rest && !reserved {
        Ok(name)
    } else {
        Err(report!(GatewayError::EncodingError))
            .attach_printable(format!("`{name}` is not a valid XML element name"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    use super::*;

    #[test]
    fn encode_produces_literal_envelope() {
        let params = RequestParameters::new()
            .with("Service_Id", "SVC01")
            .with("Amount", 1000);

        let body = XmlEnvelopeCodec::encode(&params).expect("Envelope");
        assert_eq!(
            body,
            concat!(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
                r#"xmlns:ncc="NCCWalletInput_Schema"><soapenv:Header/><soapenv:Body><ncc:root>"#,
                "<ncc:Service_Id>SVC01</ncc:Service_Id><ncc:Amount>1000</ncc:Amount>",
                "</ncc:root></soapenv:Body></soapenv:Envelope>"
            )
        );
    }

    #[test]
    fn nested_groups_render_without_prefix() {
        let params = RequestParameters::new().with(
            "Payer",
            RequestParameters::new().with("Name", "A").with("Phone", "0900"),
        );

        let body = XmlEnvelopeCodec::encode(&params).expect("Envelope");
        assert!(body.contains("<ncc:Payer><Name>A</Name><Phone>0900</Phone></ncc:Payer>"));
    }

    #[test]
    fn special_characters_are_escaped_and_round_trip() {
        let original = r#"Tom & Jerry <"quoted"> 'single'"#;
        let params = RequestParameters::new()
            .with("Description", original)
            .with("OrderId", "ABC123");

        let body = XmlEnvelopeCodec::encode(&params).expect("Envelope");
        assert!(!body.contains(original));
        assert!(body.contains(
            "<ncc:Description>Tom &amp; Jerry &lt;&quot;quoted&quot;&gt; &#039;single&#039;</ncc:Description>"
        ));

        let decoded = XmlEnvelopeCodec::decode(&body).expect("Decoded envelope");
        assert_eq!(decoded.get("DESCRIPTION"), Some(original));
        assert_eq!(decoded.get("ORDERID"), Some("ABC123"));
        assert_eq!(decoded.get("HEADER"), Some(""));
        assert_eq!(decoded.get("ROOT"), None);
    }

    #[test]
    fn invalid_field_name_is_an_encoding_error() {
        for name in ["", "1Amount", "Order Id", "ncc:Amount", "xmlField"] {
            let params = RequestParameters::new().with(name, "1");
            let err = XmlEnvelopeCodec::encode(&params).expect_err("Invalid name");
            assert!(matches!(err.current_context(), GatewayError::EncodingError));
        }
    }

    #[test]
    fn decode_strips_namespace_prefixes_in_document_order() {
        let body = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<soapenv:Body><NS0:root xmlns:NS0=\"NCCWalletOutput_Schema\">",
            "<NS0:RESPONSE_CODE>000</NS0:RESPONSE_CODE>",
            "<NS0:ORDER_ID>ABC123</NS0:ORDER_ID>",
            "<NS0:NOTE/>",
            "<NS0:SECURE_CODE>abc</NS0:SECURE_CODE>",
            "</NS0:root></soapenv:Body></soapenv:Envelope>"
        );

        let fields = XmlEnvelopeCodec::decode(body).expect("Decoded response");
        let pairs: Vec<(&str, &str)> = fields.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("RESPONSE_CODE", "000"),
                ("ORDER_ID", "ABC123"),
                ("NOTE", ""),
                ("SECURE_CODE", "abc"),
            ]
        );
    }

    #[test]
    fn tag_names_are_upper_cased_after_prefix_stripping() {
        let body = concat!(
            "<NS0:root xmlns:NS0=\"NCCWalletOutput_Schema\" xmlns:ns0=\"NCCWalletOutput_Schema\">",
            "<NS0:Response_Code>000</NS0:Response_Code>",
            "<ns0:secure_code>ab</ns0:secure_code>",
            "</NS0:root>"
        );

        let fields = XmlEnvelopeCodec::decode(body).expect("Decoded response");
        let keys: Vec<&str> = fields.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["RESPONSE_CODE", "SECURE_CODE"]);
        assert_eq!(fields.response_code(), Some("000"));
    }

    #[test]
    fn split_text_and_cdata_are_coalesced() {
        let body = "<root><MESSAGE>Giao dich <![CDATA[thanh <cong>]]> &amp; xong</MESSAGE></root>";
        let fields = XmlEnvelopeCodec::decode(body).expect("Decoded response");
        assert_eq!(fields.get("MESSAGE"), Some("Giao dich thanh <cong> & xong"));
    }

    #[test]
    fn malformed_xml_is_a_decoding_error() {
        for body in [
            "<root><RESPONSE_CODE>000</root>",
            "<root><RESPONSE_CODE>000</RESPONSE_CODE>",
            "not xml at all",
            "",
        ] {
            let err = XmlEnvelopeCodec::decode(body).expect_err("Malformed body");
            assert!(matches!(err.current_context(), GatewayError::DecodingError));
            assert!(XmlEnvelopeCodec::decode_lenient(body).is_empty());
        }
    }
}
