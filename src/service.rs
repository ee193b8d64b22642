//! Polling service
//!
//! Wraps an [`Acquisition`] with connection management and a fixed-interval
//! loop. Failed cycles are logged and the next tick is attempted; when the
//! transport reports the session as lost it is re-established before the next
//! cycle.

use crate::acquisition::{Acquisition, DecodedRecord};
use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::transport::{ModbusTcpTransport, RegisterTransport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

/// Counters of a service run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub reconnects: u64,
}

/// Polls one device through a transport at a fixed interval
pub struct MeterService<T> {
    acquisition: Acquisition<T>,
    interval: Duration,
    stats: PollStats,
    logger: StructuredLogger,
}

impl MeterService<ModbusTcpTransport> {
    /// Build a Modbus TCP service from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let descriptor = Arc::new(config.descriptor()?);
        let transport = ModbusTcpTransport::new(&config.modbus);
        let acquisition =
            Acquisition::new(descriptor, config.endianness()?, config.planner(), transport)?;
        Ok(Self::new(acquisition, config.poll_interval()))
    }
}

impl<T: RegisterTransport> MeterService<T> {
    pub fn new(acquisition: Acquisition<T>, interval: Duration) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("service").with_device(acquisition.descriptor().name()),
        );
        let plan = acquisition.plan();
        logger.debug(&format!(
            "Planned {} fields into {} requests ({} words)",
            acquisition.descriptor().len(),
            plan.chunks().len(),
            plan.total_words()
        ));
        Self {
            acquisition,
            interval,
            stats: PollStats::default(),
            logger,
        }
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    pub fn acquisition(&self) -> &Acquisition<T> {
        &self.acquisition
    }

    /// Establish the connection to the device
    pub async fn connect(&mut self) -> Result<()> {
        self.acquisition.transport_mut().connect().await
    }

    /// Close the connection to the device
    pub async fn disconnect(&mut self) -> Result<()> {
        self.acquisition.transport_mut().disconnect().await
    }

    /// Run a single cycle, reconnecting first if the session was lost
    pub async fn poll_once(&mut self) -> Result<DecodedRecord> {
        if !self.acquisition.transport().is_connected() {
            self.logger.warn("Connection lost, reconnecting");
            self.connect().await?;
            self.stats.reconnects += 1;
        }

        self.stats.cycles += 1;
        match self.acquisition.run_cycle().await {
            Ok(record) => {
                self.logger.trace(&format!(
                    "Cycle complete: {} values from {} requests",
                    record.len(),
                    self.acquisition.plan().chunks().len()
                ));
                self.stats.succeeded += 1;
                Ok(record)
            }
            Err(e) => {
                self.stats.failed += 1;
                Err(e)
            }
        }
    }

    /// Poll until `shutdown` resolves, handing every record to `on_record`
    ///
    /// The initial connection failure is returned to the caller. Afterwards
    /// failures only skip the current tick. The device is always disconnected
    /// before returning.
    pub async fn run<F, S>(&mut self, shutdown: S, mut on_record: F) -> Result<PollStats>
    where
        F: FnMut(&DecodedRecord) + Send,
        S: Future<Output = ()> + Send,
    {
        self.connect().await?;
        self.logger.info(&format!(
            "Polling every {} ms ({} requests per cycle)",
            self.interval.as_millis(),
            self.acquisition.plan().chunks().len()
        ));

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    self.logger.info("Polling stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.logger.debug("Polling data");
                    // A cycle abandoned mid-way publishes nothing
                    let outcome = tokio::select! {
                        () = &mut shutdown => None,
                        result = self.poll_once() => Some(result),
                    };
                    match outcome {
                        None => {
                            self.logger.info("Polling stopped during a cycle");
                            break;
                        }
                        Some(Ok(record)) => on_record(&record),
                        Some(Err(e)) => self.logger.warn(&format!("Polling cycle failed: {}", e)),
                    }
                }
            }
        }

        self.disconnect().await?;
        Ok(self.stats)
    }
}

/// Log a record as one JSON line
///
/// NaN and infinite values appear as `null` in the JSON, so they are named in
/// a separate warning.
pub fn log_record(logger: &StructuredLogger, record: &DecodedRecord) {
    let non_finite = record.non_finite_fields();
    if !non_finite.is_empty() {
        logger.warn(&format!(
            "Non-finite values serialized as null: {}",
            non_finite.join(", ")
        ));
    }
    match record.to_json() {
        Ok(json) => logger.info(&json),
        Err(e) => logger.warn(&format!("Cannot serialize record: {}", e)),
    }
}
