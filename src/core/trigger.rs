use crate::adapters::roster::RosterStore;
use crate::adapters::run_lock::RunLock;
use crate::core::composer::MessageComposer;
use crate::core::dispatch::Dispatcher;
use crate::core::matcher::match_roster;
use crate::domain::model::{RecipientId, RunReport, RunSummary};
use crate::domain::ports::{Clock, Storage};
use crate::utils::error::Result;
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    Scheduled,
    Manual,
}

impl fmt::Display for RunSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TriggerState {
    Idle = 0,
    Running = 1,
    /// Registration failed; the daily firing will never happen.
    Disabled = 2,
}

impl TriggerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Disabled,
            _ => Self::Idle,
        }
    }
}

/// One load → match → compose → dispatch pass. Every caller, scheduled or
/// manual, goes through the same guard, so runs never overlap. With a
/// [`RunLock`] attached, runs from other processes on the same roster are
/// excluded as well.
pub struct NotificationJob<S: Storage> {
    roster: RosterStore<S>,
    composer: MessageComposer,
    dispatcher: Dispatcher,
    recipients: Vec<RecipientId>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    guard: Mutex<()>,
    run_lock: Option<RunLock>,
    state: AtomicU8,
}

impl<S: Storage> NotificationJob<S> {
    pub fn new(
        roster: RosterStore<S>,
        composer: MessageComposer,
        dispatcher: Dispatcher,
        recipients: Vec<RecipientId>,
        offset: FixedOffset,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            roster,
            composer,
            dispatcher,
            recipients,
            offset,
            clock,
            guard: Mutex::new(()),
            run_lock: None,
            state: AtomicU8::new(TriggerState::Idle as u8),
        }
    }

    pub fn with_run_lock(mut self, lock: RunLock) -> Self {
        self.run_lock = Some(lock);
        self
    }

    pub fn state(&self) -> TriggerState {
        TriggerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn disable(&self) {
        self.state.store(TriggerState::Disabled as u8, Ordering::SeqCst);
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn roster_store(&self) -> &RosterStore<S> {
        &self.roster
    }

    pub fn recipients(&self) -> &[RecipientId] {
        &self.recipients
    }

    /// Same checks a run performs before sending, without running.
    pub fn check_preconditions(&self) -> Result<()> {
        self.dispatcher.check_preconditions(&self.recipients)
    }

    /// Waits for the run in flight, if any, and holds off new runs while the
    /// returned guard lives.
    pub async fn quiesce(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().await
    }

    /// Runs one pass, waiting for any pass already in flight to finish first.
    /// Errors abort only this pass.
    pub async fn run_once(&self, source: RunSource) -> Result<RunReport> {
        let _permit = match self.guard.try_lock() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::info!("⏳ {} run queued behind the run in progress", source);
                self.guard.lock().await
            }
        };

        let _file_lock = match &self.run_lock {
            None => None,
            Some(lock) => match lock.try_acquire()? {
                Some(held) => Some(held),
                None => {
                    tracing::info!(
                        "⏳ {} run waiting for another process holding {}",
                        source,
                        lock.path().display()
                    );
                    Some(lock.acquire().await?)
                }
            },
        };

        // Disabled is terminal; a manual run does not revive it.
        let _ = self.state.compare_exchange(
            TriggerState::Idle as u8,
            TriggerState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        tracing::info!("🚀 Starting {} notification run", source);
        let started = Instant::now();
        let result = self.execute().await;

        let _ = self.state.compare_exchange(
            TriggerState::Running as u8,
            TriggerState::Idle as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        match &result {
            Ok(RunReport::NothingToSend { .. }) => {
                tracing::info!("📭 Run finished in {:?}: no birthdays today or tomorrow", started.elapsed());
            }
            Ok(report) => {
                let RunSummary { sent, failed } = report.summary();
                tracing::info!(
                    "🏁 Run finished in {:?}: {} sent, {} failed",
                    started.elapsed(),
                    sent,
                    failed
                );
            }
            Err(e) => {
                tracing::error!(
                    "❌ {} run aborted [{:?}]: {}",
                    source,
                    e.category(),
                    e.user_friendly_message()
                );
            }
        }

        result
    }

    async fn execute(&self) -> Result<RunReport> {
        let roster = self.roster.load().await?;
        let matches = match_roster(self.clock.now(), &roster, self.offset);

        tracing::info!(
            "🔎 {} records checked: {} today, {} tomorrow",
            roster.len(),
            matches.today.len(),
            matches.tomorrow.len()
        );

        let Some(message) = self.composer.compose(&matches) else {
            return Ok(RunReport::NothingToSend { matches });
        };

        let outcomes = self.dispatcher.dispatch(&message, &self.recipients).await?;
        let summary = RunSummary::from_outcomes(&outcomes);

        Ok(RunReport::Dispatched {
            matches,
            message,
            outcomes,
            summary,
        })
    }
}
