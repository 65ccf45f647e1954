// # Namecheap Update Validator
//
// Validates the XML acknowledgment returned by Namecheap's dynamic DNS
// endpoint after a GET update request.
//
// A successful acknowledgment looks like:
//
// ```xml
// <?xml version="1.0" encoding="utf-16"?>
// <interface-response>
//   <Command>SETDNSHOST</Command>
//   <Language>eng</Language>
//   <IP>1.2.3.4</IP>
//   <ErrCount>0</ErrCount>
//   <ResponseCount>0</ResponseCount>
//   <Done>true</Done>
//   <debug><![CDATA[]]></debug>
// </interface-response>
// ```
//
// ## Acceptance Rules
//
// Checked in this order; the first violation is reported:
//
// 1. The body is well-formed XML with exactly one root element
// 2. `Command` is exactly `SETDNSHOST`
// 3. `IP` parses as an address equal to the requested address
// 4. `ErrCount` parses as an integer equal to 0
// 5. `Done` parses as a boolean that is true
//
// Only direct children of the root are considered, and only the first child
// of a given name. The root element's own name is not checked. Namespace
// prefixes are kept as part of the element name.
//
// ## Architectural Constraints
//
// - Pure: no I/O, no clock, no state between calls
// - Never panics on provider input; every failure is a rejection

use dnsmon_core::ValidatorRegistry;
use dnsmon_core::traits::{UpdateValidator, UpdateValidatorFactory, Validation};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::net::IpAddr;

/// Command echoed by Namecheap for a dynamic DNS host update
pub const EXPECTED_COMMAND: &str = "SETDNSHOST";

/// Validator for Namecheap `interface-response` acknowledgments
#[derive(Debug, Clone, Copy, Default)]
pub struct NamecheapValidator;

impl NamecheapValidator {
    pub fn new() -> Self {
        Self
    }

    fn check(requested_ip: IpAddr, body: &str) -> Result<(), String> {
        let response = InterfaceResponse::parse(body)?;

        let command = response.field("Command").unwrap_or_default();
        if command != EXPECTED_COMMAND {
            return Err(format!("Command={command}"));
        }

        let ip = response.field("IP").unwrap_or_default();
        let response_ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| format!("Invalid IP: IP={ip} is not an address"))?;
        if response_ip != requested_ip {
            return Err(format!(
                "Invalid IP: responseIP={response_ip} requestedIP={requested_ip}"
            ));
        }

        let err_count = response.field("ErrCount").unwrap_or_default();
        let count: i64 = err_count
            .trim()
            .parse()
            .map_err(|_| format!("ErrCount={err_count} is not an integer"))?;
        if count != 0 {
            return Err(match response.field("errors").map(str::trim) {
                Some(errors) if !errors.is_empty() => format!("ErrCount={count} ({errors})"),
                _ => format!("ErrCount={count}"),
            });
        }

        let done = response.field("Done").unwrap_or_default();
        match parse_bool(done) {
            Some(true) => Ok(()),
            Some(false) => Err(format!("Done={done}")),
            None => Err(format!("Done={done} is not a boolean")),
        }
    }
}

impl UpdateValidator for NamecheapValidator {
    fn validate(&self, requested_ip: IpAddr, body: &str) -> Validation {
        match Self::check(requested_ip, body) {
            Ok(()) => Validation::Accepted,
            Err(reason) => {
                tracing::debug!(%requested_ip, %reason, "Namecheap acknowledgment rejected");
                Validation::rejected(reason)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "namecheap"
    }
}

/// Text of the direct children of an acknowledgment's root element
///
/// A child's text includes the text of its descendants, so
/// `<errors><Err1>Passwords do not match</Err1></errors>` reads as
/// `Passwords do not match`.
#[derive(Debug, Default)]
struct InterfaceResponse {
    fields: Vec<(String, String)>,
}

impl InterfaceResponse {
    fn parse(body: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut fields = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;
        // Direct child currently open, with the text gathered so far
        let mut open_child: Option<(String, String)> = None;

        loop {
            match reader.read_event() {
                Err(e) => return Err(format!("Malformed XML: {e}")),
                Ok(Event::Start(element)) => {
                    if depth == 0 {
                        if seen_root {
                            return Err("Malformed XML: multiple root elements".to_string());
                        }
                        seen_root = true;
                    } else if depth == 1 {
                        open_child = Some((element_name(element.name().as_ref()), String::new()));
                    }
                    depth += 1;
                }
                Ok(Event::Empty(element)) => {
                    if depth == 0 {
                        if seen_root {
                            return Err("Malformed XML: multiple root elements".to_string());
                        }
                        seen_root = true;
                    } else if depth == 1 {
                        fields.push((element_name(element.name().as_ref()), String::new()));
                    }
                }
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    if depth == 1 {
                        if let Some(child) = open_child.take() {
                            fields.push(child);
                        }
                    }
                }
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|e| format!("Malformed XML: {e}"))?;
                    match open_child.as_mut() {
                        Some((_, value)) => value.push_str(&text),
                        None if depth == 0 => {
                            return Err("Malformed XML: text outside the root element".to_string());
                        }
                        None => {}
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some((_, value)) = open_child.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Ok(Event::Eof) => break,
                // Declaration, comments, processing instructions, doctype
                Ok(_) => {}
            }
        }

        if !seen_root {
            return Err("Malformed XML: no root element".to_string());
        }
        if depth != 0 {
            return Err("Malformed XML: unexpected end of document".to_string());
        }

        Ok(Self { fields })
    }

    /// Text of the first direct child named `name`
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Case-insensitive `true`/`false`, surrounding whitespace ignored
fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Factory for creating Namecheap validators
pub struct NamecheapFactory;

impl UpdateValidatorFactory for NamecheapFactory {
    fn create(&self) -> Box<dyn UpdateValidator> {
        Box::new(NamecheapValidator::new())
    }
}

/// Register the Namecheap validator with a registry
///
/// This function should be called during initialization to make the
/// Namecheap acknowledgment format available.
///
/// # Example
///
/// ```rust
/// use dnsmon_core::ValidatorRegistry;
///
/// let registry = ValidatorRegistry::new();
/// dnsmon_provider_namecheap::register(&registry);
/// assert!(registry.has_validator("namecheap"));
/// ```
pub fn register(registry: &ValidatorRegistry) {
    registry.register_validator("namecheap", Box::new(NamecheapFactory));
}
