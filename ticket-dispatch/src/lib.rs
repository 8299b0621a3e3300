//! # ticket-dispatch
//!
//! Kitchen ticket printing for a restaurant point of sale.
//!
//! An [`Order`] expands into one ticket per (line, copy). Each line is routed
//! by its category to a [`PrinterTarget`], rendered as raw ESC/POS bytes or an
//! ePOS SOAP envelope, and delivered over TCP or HTTPS. The outcome of every
//! ticket lands in a [`PrintReport`]; a failing printer never stops the rest
//! of the order.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_dispatch::{Config, Order, OrderLine, PrinterRegistry};
//!
//! let registry = PrinterRegistry::from_json(
//!     r#"{"food": {"address": "10.0.0.5", "port": 9100, "protocol": "raw-escpos"}}"#,
//! )?;
//! let coordinator = Config::from_env()?.build_coordinator()?;
//!
//! let order = Order::new("5", vec![OrderLine::new("1", "Chicken Rice", price, 2, "food")]);
//! let report = coordinator.print_order(&order, &registry).await?;
//! for result in report.results() {
//!     println!("{} {}", result.item_name, result.status_label());
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod emulator;
pub mod logger;
pub mod renderer;
pub mod report;
pub mod routing;
pub mod types;

pub use config::{Config, ConfigError};
pub use coordinator::{CoordinatorConfig, OrderPrintCoordinator, RetryPolicy};
pub use dispatcher::{DispatchConfig, DispatchError, DispatchResult, PrinterDispatcher};
pub use emulator::{PrinterEmulator, ReceivedJob};
pub use renderer::TicketRenderer;
pub use report::{FailureKind, PrintAttemptResult, PrintOutcome, PrintReport};
pub use routing::{RoutingError, TransportSelector};
pub use types::{
    Order, OrderError, OrderLine, PrinterRegistry, PrinterTarget, Protocol, TargetOverride,
    TicketPayload,
};

pub use pos_printer::{EnvelopeStyle, Scheme, TlsPolicy};
