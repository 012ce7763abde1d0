//! Minimal SOAP 1.1 plumbing.
//!
//! Both the device's management RPC interface and the activation service are
//! document/rpc SOAP endpoints with flat responses, so this module only needs
//! to build envelopes and pull named elements back out of the reply.

use regex::Regex;
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// A parameter value inside an RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapValue {
    Text(String),
    /// `<name><item>..</item>..</name>`
    Array(Vec<String>),
    /// `<name><field>..</field>..</name>`
    Struct(Vec<(String, String)>),
}

/// One RPC operation in a SOAP envelope.
#[derive(Debug, Clone)]
pub struct SoapCall {
    namespace: String,
    operation: String,
    params: Vec<(String, SoapValue)>,
}

impl SoapCall {
    pub fn new(namespace: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), SoapValue::Text(value.into())));
        self
    }

    pub fn array(mut self, name: impl Into<String>, items: Vec<String>) -> Self {
        self.params.push((name.into(), SoapValue::Array(items)));
        self
    }

    pub fn structure(mut self, name: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        self.params.push((name.into(), SoapValue::Struct(fields)));
        self
    }

    /// Value for the `SOAPAction` header.
    pub fn action(&self) -> String {
        format!("{}#{}", self.namespace, self.operation)
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn to_envelope(&self) -> String {
        let mut body = String::new();
        for (name, value) in &self.params {
            match value {
                SoapValue::Text(text) => {
                    body.push_str(&format!("<{name}>{}</{name}>", escape(text)));
                }
                SoapValue::Array(items) => {
                    body.push_str(&format!("<{name}>"));
                    for item in items {
                        body.push_str(&format!("<item>{}</item>", escape(item)));
                    }
                    body.push_str(&format!("</{name}>"));
                }
                SoapValue::Struct(fields) => {
                    body.push_str(&format!("<{name}>"));
                    for (field, text) in fields {
                        body.push_str(&format!("<{field}>{}</{field}>", escape(text)));
                    }
                    body.push_str(&format!("</{name}>"));
                }
            }
        }

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" "#,
                r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
                r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
                r#"<SOAP-ENV:Body><m:{op} xmlns:m="{ns}">{body}</m:{op}></SOAP-ENV:Body>"#,
                r#"</SOAP-ENV:Envelope>"#
            ),
            op = self.operation,
            ns = self.namespace,
            body = body
        )
    }
}

/// Failures of a single SOAP exchange, before they are given workflow meaning.
#[derive(Debug, Error)]
pub enum SoapError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected (HTTP {0})")]
    Unauthorized(u16),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("SOAP fault: {0}")]
    Fault(String),

    #[error("response is missing <{0}>")]
    Missing(String),
}

/// Basic-auth principal for a SOAP endpoint.
pub struct BasicAuth<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// POST `call` to `endpoint` and return the raw response body.
///
/// A `<faultstring>` anywhere in the reply is reported as [`SoapError::Fault`],
/// regardless of HTTP status.
pub async fn invoke(
    client: &Client,
    endpoint: &str,
    call: &SoapCall,
    auth: Option<BasicAuth<'_>>,
) -> Result<String, SoapError> {
    let mut request = client
        .post(endpoint)
        .header("Content-Type", "text/xml; charset=utf-8")
        .header("SOAPAction", call.action())
        .body(call.to_envelope());

    if let Some(auth) = auth {
        request = request.basic_auth(auth.username, Some(auth.password));
    }

    let resp = request.send().await?;
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SoapError::Unauthorized(status.as_u16()));
    }

    let body = resp.text().await?;

    if let Some(fault) = extract(&body, "faultstring") {
        return Err(SoapError::Fault(fault));
    }
    if !status.is_success() {
        return Err(SoapError::Status(status.as_u16()));
    }

    Ok(body)
}

/// Text content of the first element called `name`, ignoring any namespace
/// prefix and attributes. Entities are decoded.
pub fn extract(xml: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?s)<(?:[\w.-]+:)?{0}(?:\s[^>]*)?>(.*?)</(?:[\w.-]+:)?{0}>",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str().trim()))
}

/// Like [`extract`], but a missing element is an error.
pub fn require(xml: &str, name: &str) -> Result<String, SoapError> {
    extract(xml, name).ok_or_else(|| SoapError::Missing(name.to_string()))
}

/// Value of `attribute` on the first element called `element`.
pub fn attribute(xml: &str, element: &str, attribute: &str) -> Option<String> {
    let pattern = format!(
        r#"(?s)<(?:[\w.-]+:)?{}\s[^>]*?\b{}\s*=\s*["']([^"']*)["']"#,
        regex::escape(element),
        regex::escape(attribute)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()))
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#xD;", "\r")
        .replace("&#13;", "\r")
        .replace("&#xA;", "\n")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_contains_operation_and_params() {
        let call = SoapCall::new("urn:iControl:Management/LicenseAdministration", "get_system_dossier")
            .array("registration_keys", vec!["AAAAA-BBBBB".to_string()]);

        let xml = call.to_envelope();
        assert!(xml.contains(r#"<m:get_system_dossier xmlns:m="urn:iControl:Management/LicenseAdministration">"#));
        assert!(xml.contains("<registration_keys><item>AAAAA-BBBBB</item></registration_keys>"));
        assert_eq!(
            call.action(),
            "urn:iControl:Management/LicenseAdministration#get_system_dossier"
        );
    }

    #[test]
    fn envelope_escapes_text() {
        let call = SoapCall::new("urn:x", "op").text("eula", "Terms & <Conditions>");
        assert!(call.to_envelope().contains("<eula>Terms &amp; &lt;Conditions&gt;</eula>"));
    }

    #[test]
    fn extract_ignores_prefix_and_attributes() {
        let xml = r#"<soap:Body><ns1:resp><return xsi:type="xsd:string">STATE_ENABLED</return></ns1:resp></soap:Body>"#;
        assert_eq!(extract(xml, "return").as_deref(), Some("STATE_ENABLED"));
        assert_eq!(extract(xml, "missing"), None);
    }

    #[test]
    fn extract_decodes_entities() {
        let xml = "<eula>A &amp; B &lt;1&gt;</eula>";
        assert_eq!(extract(xml, "eula").as_deref(), Some("A & B <1>"));
    }

    #[test]
    fn extract_spans_lines() {
        let xml = "<license>line one\nline two</license>";
        assert_eq!(extract(xml, "license").as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn attribute_reads_soap_address() {
        let wsdl = r#"<wsdl:port name="p"><wsdlsoap:address location="https://lic.example/svc"/></wsdl:port>"#;
        assert_eq!(
            attribute(wsdl, "address", "location").as_deref(),
            Some("https://lic.example/svc")
        );
    }
}
