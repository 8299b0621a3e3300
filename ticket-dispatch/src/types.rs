//! Order and printer configuration types

use chrono::{DateTime, Utc};
use pos_printer::{EPOS_PORT, RAW_PORT, TlsPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Wire protocol spoken by a printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Raw ESC/POS byte stream over TCP
    RawEscpos,
    /// ePOS-Print SOAP envelope over HTTPS
    EposSoap,
}

impl Protocol {
    /// Conventional port for the protocol
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::RawEscpos => RAW_PORT,
            Protocol::EposSoap => EPOS_PORT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::RawEscpos => "raw-escpos",
            Protocol::EposSoap => "epos-soap",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalise a routing category ("Food " and "food" route the same way)
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// A physical printer reachable on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterTarget {
    /// Routing category; filled from the registry key when loaded from JSON
    #[serde(default)]
    pub category: String,
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Certificate handling for `epos-soap` targets, ignored for raw TCP
    #[serde(default)]
    pub tls: TlsPolicy,
}

impl PrinterTarget {
    pub fn new(
        category: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        protocol: Protocol,
    ) -> Self {
        Self {
            category: normalize_category(&category.into()),
            address: address.into(),
            port,
            protocol,
            tls: TlsPolicy::default(),
        }
    }

    /// Opt this target out of certificate validation
    pub fn accept_invalid_certs(mut self) -> Self {
        self.tls = TlsPolicy::AcceptInvalidCerts;
        self
    }

    /// Identity of the physical device, used to serialise dispatches
    pub fn device_key(&self) -> (String, u16) {
        (self.address.trim().to_lowercase(), self.port)
    }
}

impl fmt::Display for PrinterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Category → printer mapping, configured outside this crate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, PrinterTarget>", into = "BTreeMap<String, PrinterTarget>")]
pub struct PrinterRegistry {
    targets: BTreeMap<String, PrinterTarget>,
}

impl PrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from its JSON form
    ///
    /// `{"food": {"address": "10.0.0.5", "port": 9100, "protocol": "raw-escpos"}}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Register a target under its own category
    pub fn insert(&mut self, target: PrinterTarget) -> Option<PrinterTarget> {
        let key = normalize_category(&target.category);
        self.targets.insert(key, target)
    }

    pub fn with(mut self, target: PrinterTarget) -> Self {
        self.insert(target);
        self
    }

    pub fn get(&self, category: &str) -> Option<&PrinterTarget> {
        self.targets.get(&normalize_category(category))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrinterTarget> {
        self.targets.values()
    }
}

impl From<BTreeMap<String, PrinterTarget>> for PrinterRegistry {
    fn from(map: BTreeMap<String, PrinterTarget>) -> Self {
        let targets = map
            .into_iter()
            .map(|(key, mut target)| {
                let key = normalize_category(&key);
                target.category = key.clone();
                (key, target)
            })
            .collect();
        Self { targets }
    }
}

impl From<PrinterRegistry> for BTreeMap<String, PrinterTarget> {
    fn from(registry: PrinterRegistry) -> Self {
        registry.targets
    }
}

/// Explicit printer chosen by the caller instead of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOverride {
    pub address: String,
    /// Defaults to the protocol's conventional port
    #[serde(default)]
    pub port: Option<u16>,
    /// Defaults to the protocol registered for the line's category, else raw ESC/POS
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub tls: TlsPolicy,
}

impl TargetOverride {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
            protocol: None,
            tls: TlsPolicy::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }
}

/// One ordered item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Routing key, e.g. `food` or `drink`
    pub category: String,
    /// Chosen attributes ("Extra Spicy", "Less Ice")
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub printer_override: Option<TargetOverride>,
}

impl OrderLine {
    pub fn new(
        item_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
        category: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            name: name.into(),
            unit_price,
            quantity,
            category: category.into(),
            attributes: Vec::new(),
            notes: None,
            printer_override: None,
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_override(mut self, target: TargetOverride) -> Self {
        self.printer_override = Some(target);
        self
    }

    /// Line amount (unit price × quantity)
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Upfront order validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Order {0} has no line items")]
    NoLines(String),

    #[error("Line item {item_id} has quantity 0")]
    ZeroQuantity { item_id: String },

    #[error("Line item {item_id} has a negative price")]
    NegativePrice { item_id: String },
}

/// A submitted order, handed to the print coordinator by value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub table: String,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    /// Send every line of this order to one printer
    #[serde(default)]
    pub printer_override: Option<TargetOverride>,
}

impl Order {
    /// Create an order with a timestamp-derived id and computed total
    pub fn new(table: impl Into<String>, lines: Vec<OrderLine>) -> Self {
        let created_at = Utc::now();
        let total = lines
            .iter()
            .map(OrderLine::subtotal)
            .sum::<Decimal>()
            .round_dp(2);

        Self {
            id: timestamp_id(created_at),
            table: table.into(),
            lines,
            total,
            created_at,
            printer_override: None,
        }
    }

    /// Create an order with caller-supplied id, total and timestamp
    pub fn with_id(
        id: impl Into<String>,
        table: impl Into<String>,
        lines: Vec<OrderLine>,
        total: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            table: table.into(),
            lines,
            total,
            created_at,
            printer_override: None,
        }
    }

    pub fn with_override(mut self, target: TargetOverride) -> Self {
        self.printer_override = Some(target);
        self
    }

    /// Number of tickets this order produces
    pub fn ticket_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |count, line| count.saturating_add(line.quantity))
    }

    /// Reject orders that cannot be printed at all
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::NoLines(self.id.clone()));
        }
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(OrderError::ZeroQuantity {
                    item_id: line.item_id.clone(),
                });
            }
            if line.unit_price.is_sign_negative() && !line.unit_price.is_zero() {
                return Err(OrderError::NegativePrice {
                    item_id: line.item_id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Base-36 millisecond timestamp, e.g. `lz3k9w0a`
fn timestamp_id(at: DateTime<Utc>) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = at.timestamp_millis().max(0) as u64;
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Rendered printer payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketPayload {
    /// ESC/POS byte stream
    RawBytes(Vec<u8>),
    /// SOAP envelope for an ePOS device
    SoapXml(String),
}

impl TicketPayload {
    pub fn protocol(&self) -> Protocol {
        match self {
            TicketPayload::RawBytes(_) => Protocol::RawEscpos,
            TicketPayload::SoapXml(_) => Protocol::EposSoap,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TicketPayload::RawBytes(b) => b,
            TicketPayload::SoapXml(s) => s.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}
