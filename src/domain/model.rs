use crate::core::date_code::DateCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayRecord {
    pub name: String,
    pub birthday: DateCode,
}

impl BirthdayRecord {
    pub fn new(name: impl Into<String>, birthday: DateCode) -> Self {
        Self {
            name: name.into(),
            birthday,
        }
    }
}

/// Ordered roster. Duplicates are kept; order drives output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    records: Vec<BirthdayRecord>,
}

impl Roster {
    pub fn new(records: Vec<BirthdayRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: BirthdayRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, other: Roster) {
        self.records.extend(other.records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BirthdayRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[BirthdayRecord] {
        &self.records
    }
}

impl FromIterator<BirthdayRecord> for Roster {
    fn from_iter<I: IntoIterator<Item = BirthdayRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a BirthdayRecord;
    type IntoIter = std::slice::Iter<'a, BirthdayRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    pub today: Vec<String>,
    pub tomorrow: Vec<String>,
}

impl MatchSet {
    pub fn is_empty(&self) -> bool {
        self.today.is_empty() && self.tomorrow.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingBirthday {
    pub name: String,
    pub birthday: DateCode,
    pub day_offset: u32,
    pub label: String,
}

/// Telegram chat id of one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub i64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why one delivery failed. Absorbed per recipient, never fatal for a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("network failure: {0}")]
    Network(String),

    #[error("bot token rejected: {0}")]
    Unauthorized(String),

    #[error("recipient blocked the bot: {0}")]
    RecipientBlocked(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("API error {status}: {description}")]
    Api { status: u16, description: String },
}

impl DeliveryFailure {
    /// Short machine-friendly tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::Unauthorized(_) => "unauthorized",
            Self::RecipientBlocked(_) => "blocked",
            Self::InvalidRecipient(_) => "invalid_recipient",
            Self::RateLimited { .. } => "rate_limited",
            Self::Api { .. } => "api",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed(DeliveryFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub recipient: RecipientId,
    pub status: DeliveryStatus,
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[DispatchOutcome]) -> Self {
        let sent = outcomes.iter().filter(|o| o.is_sent()).count();
        Self {
            sent,
            failed: outcomes.len() - sent,
        }
    }
}

/// How a run ended when it was not aborted by an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    NothingToSend { matches: MatchSet },
    Dispatched {
        matches: MatchSet,
        message: String,
        outcomes: Vec<DispatchOutcome>,
        summary: RunSummary,
    },
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        match self {
            Self::NothingToSend { .. } => RunSummary::default(),
            Self::Dispatched { summary, .. } => *summary,
        }
    }

    pub fn matches(&self) -> &MatchSet {
        match self {
            Self::NothingToSend { matches } | Self::Dispatched { matches, .. } => matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_counts() {
        let outcomes = vec![
            DispatchOutcome {
                recipient: RecipientId(1),
                status: DeliveryStatus::Sent,
            },
            DispatchOutcome {
                recipient: RecipientId(2),
                status: DeliveryStatus::Failed(DeliveryFailure::RecipientBlocked(
                    "Forbidden".to_string(),
                )),
            },
            DispatchOutcome {
                recipient: RecipientId(3),
                status: DeliveryStatus::Sent,
            },
        ];

        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary, RunSummary { sent: 2, failed: 1 });
    }
}
