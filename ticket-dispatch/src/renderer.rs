//! Kitchen ticket renderer
//!
//! Renders one ticket per (order line, copy) for either printer protocol.
//! Rendering is pure: the same inputs always give the same bytes, since the
//! only timestamp printed is the order's own `created_at`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pos_printer::{Align, EnvelopeStyle, EposBuilder, EscPosBuilder, soap_envelope};

use crate::types::{Order, OrderLine, Protocol, TicketPayload};

const UNNAMED_ITEM: &str = "(unnamed item)";
const NO_TABLE: &str = "-";

/// Kitchen ticket renderer
pub struct TicketRenderer {
    width: usize,
    timezone: Tz,
    envelope: EnvelopeStyle,
}

impl TicketRenderer {
    /// Create a new renderer with specified paper width and timezone
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize, timezone: Tz) -> Self {
        Self {
            width: width.max(8),
            timezone,
            envelope: EnvelopeStyle::Direct,
        }
    }

    /// Choose how ePOS documents are wrapped in the SOAP body
    pub fn with_envelope(mut self, envelope: EnvelopeStyle) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Render the ticket for copy `copy` of `copies` of `line`
    ///
    /// Out-of-range copy numbers are clamped into `1..=copies`.
    pub fn render(
        &self,
        order: &Order,
        line: &OrderLine,
        copy: u32,
        copies: u32,
        protocol: Protocol,
    ) -> TicketPayload {
        let copies = copies.max(1);
        let copy = copy.clamp(1, copies);

        match protocol {
            Protocol::RawEscpos => {
                TicketPayload::RawBytes(self.render_escpos(order, line, copy, copies))
            }
            Protocol::EposSoap => {
                TicketPayload::SoapXml(self.render_epos(order, line, copy, copies))
            }
        }
    }

    fn render_escpos(&self, order: &Order, line: &OrderLine, copy: u32, copies: u32) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);

        // Header: table + timestamp
        b.center();
        b.bold();
        b.line(&format!("Table: {}", table_label(order)));
        b.bold_off();
        b.line(&self.format_timestamp(order.created_at));
        b.sep_single();
        b.left();

        // Item
        b.line_lr(
            &format!("{} x{}", item_name(line), line.quantity),
            &format!("{:.2}", line.unit_price),
        );
        for attr in &line.attributes {
            b.line(&format!("   - {}", printable(attr)));
        }
        if let Some(notes) = line.notes.as_deref()
            && !notes.trim().is_empty()
        {
            b.bold();
            b.line(&format!("   * {}", printable(notes)));
            b.bold_off();
        }
        if copies > 1 {
            b.line(&format!("Copy {}/{}", copy, copies));
        }

        // Footer
        b.sep_single();
        b.line_lr("Total:", &format!("{:.2}", order.total));
        b.blank_lines(2);
        b.cut();

        b.build()
    }

    fn render_epos(&self, order: &Order, line: &OrderLine, copy: u32, copies: u32) -> String {
        let mut b = EposBuilder::new();

        b.align(Align::Center);
        b.size(2, 2);
        b.line(&format!("TABLE {}", table_label(order)));
        b.size(1, 1);
        b.line(&format!("Order: {}", printable(&order.id)));
        b.line(&format!("Time: {}", self.format_timestamp(order.created_at)));
        b.line(&"=".repeat(self.width));

        b.align(Align::Left);
        b.size(2, 2);
        b.line(&item_name(line));
        b.size(1, 1);
        for attr in &line.attributes {
            b.line(&format!("  - {}", printable(attr)));
        }
        if let Some(notes) = line.notes.as_deref()
            && !notes.trim().is_empty()
        {
            b.emphasis(true);
            b.line(&format!("Notes: {}", printable(notes)));
            b.emphasis(false);
        }
        b.feed(1);

        b.align(Align::Center);
        b.line(&format!("Copy {} of {}", copy, copies));
        b.line(&format!(
            "{} PRINTER",
            printable(line.category.trim()).to_uppercase()
        ));
        b.feed(3);
        b.cut();

        soap_envelope(&b.build(), &self.envelope)
    }

    /// Fixed test ticket used by the admin "test print" action
    pub fn render_test_page(&self, protocol: Protocol) -> TicketPayload {
        match protocol {
            Protocol::RawEscpos => {
                let mut b = EscPosBuilder::new(self.width);
                b.center();
                b.line("TEST PRINT");
                b.sep_double();
                b.newline();
                b.line("Hello World!");
                b.left();
                b.blank_lines(4);
                b.cut();
                TicketPayload::RawBytes(b.build())
            }
            Protocol::EposSoap => {
                let mut b = EposBuilder::new();
                b.align(Align::Center);
                b.line("TEST PRINT");
                b.line("==========================");
                b.line("Hello World!");
                b.feed(3);
                b.cut();
                TicketPayload::SoapXml(soap_envelope(&b.build(), &self.envelope))
            }
        }
    }

    /// Format a timestamp (YYYY-MM-DD HH:MM:SS) in the configured timezone
    fn format_timestamp(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

impl Default for TicketRenderer {
    fn default() -> Self {
        Self::new(48, chrono_tz::UTC)
    }
}

/// Replace control characters so free text cannot inject printer commands
fn printable(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn item_name(line: &OrderLine) -> String {
    let name = printable(line.name.trim());
    if name.trim().is_empty() {
        UNNAMED_ITEM.to_string()
    } else {
        name
    }
}

fn table_label(order: &Order) -> String {
    let table = printable(order.table.trim());
    if table.trim().is_empty() {
        NO_TABLE.to_string()
    } else {
        table
    }
}
