//! # pos-printer
//!
//! Thermal receipt printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Single-byte (Windows-1252) text encoding
//! - ePOS-Print markup and SOAP envelopes
//! - Network printing (raw TCP port 9100, ePOS over HTTPS port 8043)
//!
//! Business logic (WHAT to print, and where) stays in `ticket-dispatch`.
//!
//! ## Example
//!
//! ```ignore
//! use pos_printer::{EscPosBuilder, NetworkPrinter, Printer};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.bold();
//! builder.line("Table: 5");
//! builder.bold_off();
//! builder.left();
//! builder.line_lr("Chicken Rice x1", "3.50");
//! builder.cut();
//!
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build()).await?;
//! ```

mod encoding;
mod epos;
mod error;
mod escpos;
mod printer;

// Re-exports
pub use encoding::{convert_to_single_byte, text_width};
pub use epos::{
    Align, EPOS_PRINT_NS, EPOS_SERVICE_PATH, EnvelopeStyle, EposBuilder, EposResponse,
    SOAP_ENVELOPE_NS, escape_xml, soap_envelope,
};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use printer::{
    EPOS_PORT, EposPrinter, HttpClient, NetworkPrinter, Printer, RAW_PORT, Scheme, TlsPolicy,
    epos_client,
};
