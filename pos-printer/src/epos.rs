//! ePOS-Print markup builder and SOAP envelope
//!
//! Networked receipt printers that speak ePOS accept an `epos-print` XML
//! document POSTed inside a SOAP envelope. The builder mirrors
//! [`crate::EscPosBuilder`]: callers push text and layout commands and
//! receive a finished document string.

/// `epos-print` document namespace
pub const EPOS_PRINT_NS: &str = "http://www.epson-pos.com/schemas/2011/03/epos-print";

/// SOAP 1.1 envelope namespace
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Fixed service path on the device
pub const EPOS_SERVICE_PATH: &str = "/cgi-bin/epos/service.cgi";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Escape the five XML special characters
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// `epos-print` document builder
///
/// All text handed to [`EposBuilder::line`] is escaped; attribute values are
/// produced by the builder itself.
#[derive(Debug, Default)]
pub struct EposBuilder {
    body: String,
}

impl EposBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set alignment for subsequent text
    pub fn align(&mut self, align: Align) -> &mut Self {
        self.body
            .push_str(&format!(r#"<text align="{}"/>"#, align.as_str()));
        self
    }

    /// Set character scale (1..=8) for subsequent text
    pub fn size(&mut self, width: u8, height: u8) -> &mut Self {
        let width = width.clamp(1, 8);
        let height = height.clamp(1, 8);
        self.body
            .push_str(&format!(r#"<text width="{}" height="{}"/>"#, width, height));
        self
    }

    /// Toggle emphasis for subsequent text
    pub fn emphasis(&mut self, on: bool) -> &mut Self {
        self.body.push_str(&format!(r#"<text em="{}"/>"#, on));
        self
    }

    /// Write one line of escaped text followed by a line feed
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.body.push_str("<text>");
        self.body.push_str(&escape_xml(s));
        self.body.push_str("&#10;</text>");
        self
    }

    /// Feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.body.push_str(&format!(r#"<feed line="{}"/>"#, lines));
        self
    }

    /// Feed to the cutter and cut
    pub fn cut(&mut self) -> &mut Self {
        self.body.push_str(r#"<cut type="feed"/>"#);
        self
    }

    /// Finish the `epos-print` document
    pub fn build(self) -> String {
        format!(
            r#"<epos-print xmlns="{}">{}</epos-print>"#,
            EPOS_PRINT_NS, self.body
        )
    }
}

/// How the print document is carried inside the SOAP body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeStyle {
    /// `epos-print` element placed directly in `soap:Body`
    Direct,
    /// `Action_PrintXMLString` action carrying the document as escaped text
    PrintXmlString { device_id: String, timeout_ms: u64 },
}

/// Wrap an `epos-print` document in a SOAP envelope
pub fn soap_envelope(document: &str, style: &EnvelopeStyle) -> String {
    let body = match style {
        EnvelopeStyle::Direct => document.to_string(),
        EnvelopeStyle::PrintXmlString {
            device_id,
            timeout_ms,
        } => {
            let inner = format!("{}{}", XML_DECL, document);
            format!(
                r#"<Action_PrintXMLString xmlns="{}"><devid>{}</devid><timeout>{}</timeout><xmlstring>{}</xmlstring></Action_PrintXMLString>"#,
                EPOS_PRINT_NS,
                escape_xml(device_id),
                timeout_ms,
                escape_xml(&inner)
            )
        }
    };

    format!(
        r#"{}<soap:Envelope xmlns:soap="{}"><soap:Body>{}</soap:Body></soap:Envelope>"#,
        XML_DECL, SOAP_ENVELOPE_NS, body
    )
}

/// Parsed `<response>` element of an ePOS reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EposResponse {
    pub success: bool,
    pub code: Option<String>,
    pub status: Option<String>,
}

impl EposResponse {
    /// Parse the device reply
    ///
    /// The job counts as printed only when the `response` element carries
    /// `success="true"`. A body without that marker is a failure.
    pub fn parse(body: &str) -> Self {
        let Some(start) = body.find("<response") else {
            return Self::default();
        };
        let rest = &body[start..];
        let tag = match rest.find('>') {
            Some(end) => &rest[..end],
            None => rest,
        };

        Self {
            success: attr_value(tag, "success").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            code: attr_value(tag, "code").filter(|v| !v.is_empty()),
            status: attr_value(tag, "status").filter(|v| !v.is_empty()),
        }
    }
}

/// Extract `name="value"` (or single-quoted) from a start tag
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let mut search = tag;
    while let Some(pos) = search.find(name) {
        let preceded_ok = search[..pos]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        let after = search[pos + name.len()..].trim_start();
        if preceded_ok && let Some(after_eq) = after.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let quote = after_eq.chars().next()?;
            if quote == '"' || quote == '\'' {
                let value = &after_eq[1..];
                let end = value.find(quote)?;
                return Some(value[..end].to_string());
            }
        }
        search = &search[pos + name.len()..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_five() {
        assert_eq!(
            escape_xml(r#"<a & 'b' "c">"#),
            "&lt;a &amp; &apos;b&apos; &quot;c&quot;&gt;"
        );
    }

    #[test]
    fn test_builder_escapes_text() {
        let mut b = EposBuilder::new();
        b.align(Align::Center).line("Fish & Chips <L>").cut();
        let doc = b.build();

        assert!(doc.starts_with(r#"<epos-print xmlns="http://www.epson-pos.com"#));
        assert!(doc.contains("<text>Fish &amp; Chips &lt;L&gt;&#10;</text>"));
        assert!(doc.ends_with(r#"<cut type="feed"/></epos-print>"#));
    }

    #[test]
    fn test_direct_envelope() {
        let env = soap_envelope("<epos-print/>", &EnvelopeStyle::Direct);
        assert!(env.contains("<soap:Body><epos-print/></soap:Body>"));
        assert!(env.starts_with("<?xml"));
    }

    #[test]
    fn test_print_xml_string_envelope_escapes_document() {
        let style = EnvelopeStyle::PrintXmlString {
            device_id: "local_printer".to_string(),
            timeout_ms: 30000,
        };
        let env = soap_envelope("<epos-print><text>a&amp;b</text></epos-print>", &style);

        assert!(env.contains("<devid>local_printer</devid>"));
        assert!(env.contains("<timeout>30000</timeout>"));
        assert!(env.contains("&lt;epos-print&gt;&lt;text&gt;a&amp;amp;b&lt;/text&gt;"));
        assert!(!env.contains("<epos-print>"));
    }

    #[test]
    fn test_parse_success_response() {
        let body = r#"<?xml version="1.0"?><s:Envelope><s:Body><response success="true" code="" status="251658262" battery="0" xmlns="http://www.epson-pos.com/schemas/2011/03/epos-print"/></s:Body></s:Envelope>"#;
        let resp = EposResponse::parse(body);
        assert!(resp.success);
        assert_eq!(resp.code, None);
        assert_eq!(resp.status.as_deref(), Some("251658262"));
    }

    #[test]
    fn test_parse_failure_response() {
        let body = r#"<response success="false" code="EPTR_COVER_OPEN" status="0"/>"#;
        let resp = EposResponse::parse(body);
        assert!(!resp.success);
        assert_eq!(resp.code.as_deref(), Some("EPTR_COVER_OPEN"));
    }

    #[test]
    fn test_parse_missing_marker() {
        assert!(!EposResponse::parse("<html>OK</html>").success);
        assert!(!EposResponse::parse("print success").success);
    }
}
