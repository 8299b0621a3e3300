//! Printer routing
//!
//! The item's category is the only routing key. An explicit override on the
//! line, or on the whole order, wins over the registry.

use thiserror::Error;

use crate::types::{
    Order, OrderLine, PrinterRegistry, PrinterTarget, Protocol, TargetOverride,
    normalize_category,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("No printer configured for category '{0}'")]
    NoTargetConfigured(String),
}

/// Resolves the physical printer for each order line
#[derive(Debug, Clone, Copy)]
pub struct TransportSelector<'a> {
    registry: &'a PrinterRegistry,
}

impl<'a> TransportSelector<'a> {
    pub fn new(registry: &'a PrinterRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the target for `line` of `order`
    ///
    /// Precedence: line override, order override, registry entry.
    pub fn resolve(&self, order: &Order, line: &OrderLine) -> Result<PrinterTarget, RoutingError> {
        if let Some(ov) = line
            .printer_override
            .as_ref()
            .or(order.printer_override.as_ref())
        {
            return Ok(self.override_target(ov, &line.category));
        }

        self.registry
            .get(&line.category)
            .cloned()
            .ok_or_else(|| RoutingError::NoTargetConfigured(normalize_category(&line.category)))
    }

    fn override_target(&self, ov: &TargetOverride, category: &str) -> PrinterTarget {
        let protocol = ov
            .protocol
            .or_else(|| self.registry.get(category).map(|t| t.protocol))
            .unwrap_or(Protocol::RawEscpos);

        PrinterTarget {
            category: normalize_category(category),
            address: ov.address.clone(),
            port: ov.port.unwrap_or_else(|| protocol.default_port()),
            protocol,
            tls: ov.tls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn registry() -> PrinterRegistry {
        PrinterRegistry::new()
            .with(PrinterTarget::new("food", "10.0.0.5", 9100, Protocol::RawEscpos))
            .with(PrinterTarget::new("drink", "10.0.0.6", 8043, Protocol::EposSoap))
    }

    fn order(lines: Vec<OrderLine>) -> Order {
        Order::with_id("o1", "5", lines, Decimal::ZERO, Utc::now())
    }

    #[test]
    fn test_resolve_by_category() {
        let registry = registry();
        let selector = TransportSelector::new(&registry);
        let line = OrderLine::new("6", "Iced Lemon Tea", Decimal::new(150, 2), 1, "Drink");
        let order = order(vec![line.clone()]);

        let target = selector.resolve(&order, &line).unwrap();
        assert_eq!(target.address, "10.0.0.6");
        assert_eq!(target.protocol, Protocol::EposSoap);
    }

    #[test]
    fn test_missing_category() {
        let registry = registry();
        let selector = TransportSelector::new(&registry);
        let line = OrderLine::new("9", "Cake", Decimal::ONE, 1, "Dessert");
        let order = order(vec![line.clone()]);

        assert_eq!(
            selector.resolve(&order, &line),
            Err(RoutingError::NoTargetConfigured("dessert".to_string()))
        );
    }

    #[test]
    fn test_line_override_beats_order_override() {
        let registry = registry();
        let selector = TransportSelector::new(&registry);
        let line = OrderLine::new("1", "Chicken Rice", Decimal::ONE, 1, "food")
            .with_override(TargetOverride::new("192.168.1.50").port(9101));
        let order = order(vec![line.clone()]).with_override(TargetOverride::new("192.168.1.99"));

        let target = selector.resolve(&order, &line).unwrap();
        assert_eq!(target.address, "192.168.1.50");
        assert_eq!(target.port, 9101);
        assert_eq!(target.protocol, Protocol::RawEscpos);
    }

    #[test]
    fn test_order_override_applies_to_unregistered_category() {
        let registry = registry();
        let selector = TransportSelector::new(&registry);
        let line = OrderLine::new("9", "Cake", Decimal::ONE, 1, "dessert");
        let order = order(vec![line.clone()]).with_override(TargetOverride::new("192.168.1.99"));

        let target = selector.resolve(&order, &line).unwrap();
        assert_eq!(target.address, "192.168.1.99");
        assert_eq!(target.port, 9100);
        assert_eq!(target.category, "dessert");
    }

    #[test]
    fn test_override_inherits_registered_protocol() {
        let registry = registry();
        let selector = TransportSelector::new(&registry);
        let line = OrderLine::new("6", "Tea", Decimal::ONE, 1, "drink")
            .with_override(TargetOverride::new("192.168.1.60"));
        let order = order(vec![line.clone()]);

        let target = selector.resolve(&order, &line).unwrap();
        assert_eq!(target.protocol, Protocol::EposSoap);
        assert_eq!(target.port, 8043);
    }
}
