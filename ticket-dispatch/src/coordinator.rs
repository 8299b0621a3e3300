//! Order print coordinator
//!
//! Expands an order into one job per (line, copy), routes each line, and
//! drives the jobs through the renderer and dispatcher. Jobs for the same
//! physical printer run one at a time with a short pause between them;
//! different printers are served concurrently. Every job ends up as exactly
//! one [`PrintAttemptResult`] in the report.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::dispatcher::{DispatchError, PrinterDispatcher};
use crate::renderer::TicketRenderer;
use crate::report::{FailureKind, PrintAttemptResult, PrintOutcome, PrintReport};
use crate::routing::{RoutingError, TransportSelector};
use crate::types::{
    Order, OrderError, OrderLine, PrinterRegistry, PrinterTarget, TicketPayload, normalize_category,
};

/// Caller-side retry policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per ticket, including the first (1 = no retry)
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Pause between consecutive dispatches to the same printer
    pub inter_dispatch_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            inter_dispatch_delay: Duration::from_millis(150),
            retry: RetryPolicy::default(),
        }
    }
}

/// One copy of one line
struct Job<'a> {
    line_index: usize,
    line: &'a OrderLine,
    copy: u32,
}

/// Prints whole orders
pub struct OrderPrintCoordinator {
    renderer: TicketRenderer,
    dispatcher: PrinterDispatcher,
    config: CoordinatorConfig,
}

impl OrderPrintCoordinator {
    pub fn new(
        renderer: TicketRenderer,
        dispatcher: PrinterDispatcher,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            renderer,
            dispatcher,
            config,
        }
    }

    pub fn renderer(&self) -> &TicketRenderer {
        &self.renderer
    }

    pub fn dispatcher(&self) -> &PrinterDispatcher {
        &self.dispatcher
    }

    /// Print every ticket of `order`
    ///
    /// Only an invalid order is an error; delivery failures are reported
    /// per ticket.
    pub async fn print_order(
        &self,
        order: &Order,
        registry: &PrinterRegistry,
    ) -> Result<PrintReport, OrderError> {
        self.print_order_with_cancel(order, registry, &CancellationToken::new())
            .await
    }

    /// Like [`Self::print_order`], stopping early when `cancel` fires
    ///
    /// In-flight dispatches are aborted and every ticket not yet delivered is
    /// reported as [`FailureKind::Canceled`].
    #[instrument(skip_all, fields(order_id = %order.id, table = %order.table, tickets = order.ticket_count()))]
    pub async fn print_order_with_cancel(
        &self,
        order: &Order,
        registry: &PrinterRegistry,
        cancel: &CancellationToken,
    ) -> Result<PrintReport, OrderError> {
        order.validate()?;

        let selector = TransportSelector::new(registry);
        let mut results = Vec::new();
        // Keyed by physical device; each job keeps the target its line resolved to
        let mut queues: BTreeMap<(String, u16), Vec<(PrinterTarget, Job<'_>)>> = BTreeMap::new();

        for (line_index, line) in order.lines.iter().enumerate() {
            match selector.resolve(order, line) {
                Ok(target) => {
                    queues
                        .entry(target.device_key())
                        .or_default()
                        .extend((1..=line.quantity).map(|copy| {
                            let job = Job {
                                line_index,
                                line,
                                copy,
                            };
                            (target.clone(), job)
                        }));
                }
                Err(RoutingError::NoTargetConfigured(category)) => {
                    warn!(item = %line.name, category = %category, "No printer configured");
                    let message = format!("No printer configured for category '{}'", category);
                    results.extend((1..=line.quantity).map(|copy| {
                        self.record(
                            order,
                            &Job {
                                line_index,
                                line,
                                copy,
                            },
                            None,
                            PrintOutcome::error(FailureKind::NoTargetConfigured, message.clone()),
                            0,
                        )
                    }));
                }
            }
        }

        let per_target = join_all(
            queues
                .into_values()
                .map(|jobs| self.run_queue(order, jobs, cancel)),
        )
        .await;
        results.extend(per_target.into_iter().flatten());

        let report = PrintReport::new(order.id.clone(), results);
        info!(
            printed = report.ok_count(),
            failed = report.len() - report.ok_count(),
            "Order print finished"
        );
        Ok(report)
    }

    /// Dispatch the jobs for one physical printer, one at a time
    async fn run_queue(
        &self,
        order: &Order,
        jobs: Vec<(PrinterTarget, Job<'_>)>,
        cancel: &CancellationToken,
    ) -> Vec<PrintAttemptResult> {
        let mut results = Vec::with_capacity(jobs.len());

        for (position, (target, job)) in jobs.iter().enumerate() {
            if position > 0 && !self.config.inter_dispatch_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.inter_dispatch_delay) => {}
                }
            }

            if cancel.is_cancelled() {
                results.push(self.record(
                    order,
                    job,
                    Some(target.clone()),
                    PrintOutcome::error(FailureKind::Canceled, "Canceled before dispatch"),
                    0,
                ));
                continue;
            }

            let payload =
                self.renderer
                    .render(order, job.line, job.copy, job.line.quantity, target.protocol);
            let (outcome, attempts) = self.dispatch_with_retry(target, &payload, cancel).await;
            results.push(self.record(order, job, Some(target.clone()), outcome, attempts));
        }

        results
    }

    async fn dispatch_with_retry(
        &self,
        target: &PrinterTarget,
        payload: &TicketPayload,
        cancel: &CancellationToken,
    ) -> (PrintOutcome, u32) {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result: Result<(), DispatchError> = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return (
                        PrintOutcome::error(FailureKind::Canceled, "Canceled during dispatch"),
                        attempt,
                    );
                }
                r = self.dispatcher.dispatch(target, payload) => r,
            };

            match result {
                Ok(()) => return (PrintOutcome::Ok, attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(target = %target, attempt, error = %e, "Retrying ticket");
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return (PrintOutcome::from(e), attempt);
                        }
                        _ = tokio::time::sleep(self.config.retry.backoff) => {}
                    }
                }
                Err(e) => return (PrintOutcome::from(e), attempt),
            }
        }
    }

    fn record(
        &self,
        order: &Order,
        job: &Job<'_>,
        target: Option<PrinterTarget>,
        outcome: PrintOutcome,
        attempts: u32,
    ) -> PrintAttemptResult {
        PrintAttemptResult {
            order_id: order.id.clone(),
            line_index: job.line_index,
            item_id: job.line.item_id.clone(),
            item_name: job.line.name.clone(),
            category: normalize_category(&job.line.category),
            copy_index: job.copy,
            copy_count: job.line.quantity,
            target,
            outcome,
            attempts,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchConfig;
    use crate::types::Protocol;
    use rust_decimal::Decimal;

    fn coordinator() -> OrderPrintCoordinator {
        let dispatch = DispatchConfig {
            connect_timeout: Duration::from_millis(200),
            ..DispatchConfig::default()
        };
        OrderPrintCoordinator::new(
            TicketRenderer::default(),
            PrinterDispatcher::new(dispatch).unwrap(),
            CoordinatorConfig {
                inter_dispatch_delay: Duration::ZERO,
                retry: RetryPolicy::default(),
            },
        )
    }

    fn order() -> Order {
        Order::with_id(
            "o1",
            "5",
            vec![
                OrderLine::new("1", "Chicken Rice", Decimal::new(350, 2), 2, "food"),
                OrderLine::new("6", "Iced Lemon Tea", Decimal::new(150, 2), 1, "drink"),
            ],
            Decimal::new(850, 2),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let mut order = order();
        order.lines.clear();
        let err = coordinator()
            .print_order(&order, &PrinterRegistry::new())
            .await
            .unwrap_err();
        assert_eq!(err, OrderError::NoLines("o1".to_string()));
    }

    #[tokio::test]
    async fn test_no_targets_reports_every_copy() {
        let report = coordinator()
            .print_order(&order(), &PrinterRegistry::new())
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.count_by_kind().get(&FailureKind::NoTargetConfigured), Some(&3));
        let keys: Vec<_> = report
            .results()
            .iter()
            .map(|r| (r.line_index, r.copy_index, r.copy_count, r.attempts))
            .collect();
        assert_eq!(keys, vec![(0, 1, 2, 0), (0, 2, 2, 0), (1, 1, 1, 0)]);
    }

    #[tokio::test]
    async fn test_precanceled_order_records_canceled() {
        let registry = PrinterRegistry::new()
            .with(PrinterTarget::new("food", "127.0.0.1", 9, Protocol::RawEscpos))
            .with(PrinterTarget::new("drink", "127.0.0.1", 9, Protocol::RawEscpos));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = coordinator()
            .print_order_with_cancel(&order(), &registry, &cancel)
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert!(
            report
                .results()
                .iter()
                .all(|r| r.outcome.failure_kind() == Some(FailureKind::Canceled))
        );
    }
}
