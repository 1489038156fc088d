//! Batch evaluation: catalog → units → candles → signal → store → dispatch
//!
//! A failure in one unit is logged and counted; the batch always runs to
//! completion unless cancelled.

use futures_util::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use sg_gateway::market::CandleSource;
use sg_gateway::{DispatchReport, Dispatcher};
use sg_storage::{OrderCatalog, OrderRef, Position, PositionRecord, PositionStore};

use crate::config::EngineConfig;
use crate::error::{SignalError, SignalResult};
use crate::grouper::{group_units, partition_by_key};
use crate::transition::{decide, Transition};
use crate::types::{EvaluationUnit, Signal};

/// What happened to one unit
#[derive(Debug)]
pub enum UnitOutcome {
    /// Signal matched the stored position, or was neutral
    Held { signal: Signal },
    /// First position recorded
    Opened { to: Position, dispatch: DispatchReport },
    /// Position flipped
    Reversed {
        from: Position,
        to: Position,
        dispatch: DispatchReport,
    },
    /// Not evaluated this tick; store untouched
    Skipped(SignalError),
    /// Store read or write failed
    Failed(SignalError),
}

/// Summary of one batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub timeframe: String,
    pub units: usize,
    pub held: usize,
    pub opened: usize,
    pub reversed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dispatch_failures: usize,
    pub cancelled: bool,
}

impl BatchReport {
    fn new(batch_id: Uuid, timeframe: &str) -> Self {
        Self {
            batch_id,
            timeframe: timeframe.to_string(),
            units: 0,
            held: 0,
            opened: 0,
            reversed: 0,
            skipped: 0,
            failed: 0,
            dispatch_failures: 0,
            cancelled: false,
        }
    }

    fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Held { .. } => self.held += 1,
            UnitOutcome::Opened { dispatch, .. } => {
                self.opened += 1;
                self.dispatch_failures += dispatch.failures.len();
            }
            UnitOutcome::Reversed { dispatch, .. } => {
                self.reversed += 1;
                self.dispatch_failures += dispatch.failures.len();
            }
            UnitOutcome::Skipped(_) => self.skipped += 1,
            UnitOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Units that finished, in any outcome
    pub fn completed(&self) -> usize {
        self.held + self.opened + self.reversed + self.skipped + self.failed
    }

    /// Transitions recorded
    pub fn transitions(&self) -> usize {
        self.opened + self.reversed
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} [{}]: {} units, {} opened, {} reversed, {} held, {} skipped, {} failed, {} dispatch failures{}",
            self.batch_id,
            self.timeframe,
            self.units,
            self.opened,
            self.reversed,
            self.held,
            self.skipped,
            self.failed,
            self.dispatch_failures,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

/// Evaluates every active unit of a timeframe
pub struct SignalEngine {
    catalog: Arc<dyn OrderCatalog>,
    candles: Arc<dyn CandleSource>,
    positions: PositionStore,
    dispatcher: Arc<Dispatcher>,
    config: EngineConfig,
}

impl SignalEngine {
    pub fn new(
        catalog: Arc<dyn OrderCatalog>,
        candles: Arc<dyn CandleSource>,
        positions: PositionStore,
        dispatcher: Arc<Dispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            candles,
            positions,
            dispatcher,
            config,
        }
    }

    /// Run one batch for `timeframe`
    ///
    /// Returns early, with `cancelled` set, once `cancel` fires; units still
    /// in flight are dropped.
    pub async fn run_batch(&self, timeframe: &str, cancel: &CancellationToken) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", timeframe = %timeframe, batch_id = %batch_id);

        self.run_batch_inner(batch_id, timeframe, cancel)
            .instrument(span)
            .await
    }

    async fn run_batch_inner(&self, batch_id: Uuid, timeframe: &str, cancel: &CancellationToken) -> BatchReport {
        let mut report = BatchReport::new(batch_id, timeframe);

        let rules = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return report;
            }
            rules = self.catalog.list_active_rules(timeframe) => match rules {
                Ok(rules) => rules,
                Err(e) => {
                    error!("Failed to list active rules, nothing to do this tick: {}", e);
                    return report;
                }
            },
        };

        let units = group_units(rules);
        report.units = units.len();
        debug!("Evaluating {} units", units.len());

        // Units sharing a record stay in one stream item so that parallelism
        // never reorders their reads and writes.
        let concurrency = self.config.max_concurrent_units.max(1);
        let mut outcomes = stream::iter(partition_by_key(units))
            .map(|run| self.evaluate_run(run))
            .buffer_unordered(concurrency);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Batch cancelled with {} of {} units done", report.completed(), report.units);
                    report.cancelled = true;
                    break;
                }
                next = outcomes.next() => match next {
                    Some(run) => run.iter().for_each(|outcome| report.record(outcome)),
                    None => break,
                },
            }
        }

        info!("{}", report);
        report
    }

    async fn evaluate_run(&self, run: Vec<EvaluationUnit>) -> Vec<UnitOutcome> {
        let mut outcomes = Vec::with_capacity(run.len());
        for unit in run {
            outcomes.push(self.evaluate_unit(unit).await);
        }
        outcomes
    }

    /// Evaluate one unit end to end
    pub async fn evaluate_unit(&self, unit: EvaluationUnit) -> UnitOutcome {
        let span = info_span!("unit", key = %unit.key(), rule = %unit.rule);

        async {
            match self.evaluate(&unit).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_skip() => {
                    warn!("Skipping {}: {}", unit, e);
                    UnitOutcome::Skipped(e)
                }
                Err(e) => {
                    warn!("Evaluation of {} failed: {}", unit, e);
                    UnitOutcome::Failed(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn evaluate(&self, unit: &EvaluationUnit) -> SignalResult<UnitOutcome> {
        let series = self
            .candles
            .fetch(&unit.symbol, &unit.timeframe, unit.rule.lookback())
            .await?;
        let signal = unit.rule.classify(series.closes())?;

        let record = self
            .positions
            .load_or_init(&unit.key(), unit.rule.ema_period())
            .await?;

        let transition = decide(record.position, signal);
        self.apply(unit, &record, transition, signal).await
    }

    /// Persist a transition, then dispatch it
    ///
    /// Dispatch runs only after the new position is stored, and its failures
    /// never undo that write.
    pub async fn apply(
        &self,
        unit: &EvaluationUnit,
        record: &PositionRecord,
        transition: Transition,
        signal: Signal,
    ) -> SignalResult<UnitOutcome> {
        let Some(to) = transition.target() else {
            debug!("Holding {:?} on {} signal", record.position, signal);
            return Ok(UnitOutcome::Held { signal });
        };

        let mut updated = record.with_position(to);
        updated.rule_type = Some(unit.rule_type());
        if updated.ema_period.is_none() {
            updated.ema_period = unit.rule.ema_period();
        }
        self.positions.save(&unit.key(), &updated).await?;

        let orders = self.orders_for(unit).await;
        let mut dispatch = DispatchReport::default();

        let outcome = match transition {
            Transition::Reverse { from, to } => {
                info!("{} reversed {} -> {}, {} orders", unit, from, to, orders.len());
                dispatch.merge(self.dispatcher.close_positions(from, &orders).await);
                dispatch.merge(self.dispatcher.open_positions(&unit.headline(to), to, &orders).await);
                UnitOutcome::Reversed { from, to, dispatch }
            }
            _ => {
                info!("{} opened {}, {} orders", unit, to, orders.len());
                dispatch.merge(self.dispatcher.open_positions(&unit.headline(to), to, &orders).await);
                UnitOutcome::Opened { to, dispatch }
            }
        };

        Ok(outcome)
    }

    async fn orders_for(&self, unit: &EvaluationUnit) -> Vec<OrderRef> {
        match self
            .catalog
            .list_orders_for(&unit.symbol, unit.rule_type(), unit.rule.ema_period())
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                warn!("Order lookup for {} failed, notifying without queue messages: {}", unit, e);
                Vec::new()
            }
        }
    }
}
