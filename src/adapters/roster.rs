//! JSON roster persistence.
//!
//! The file is a JSON array of `{ "name": ..., "birthday": "DD.MM" }` objects,
//! read and written as a whole. Extra fields are ignored on read.

use crate::core::date_code::DateCode;
use crate::domain::model::{BirthdayRecord, Roster};
use crate::domain::ports::Storage;
use crate::utils::error::{NotifierError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRoster {
    pub roster: Roster,
    pub skipped: Vec<SkippedRecord>,
}

pub struct RosterStore<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> RosterStore<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn load(&self) -> Result<Roster> {
        Ok(self.load_with_report().await?.roster)
    }

    /// Loads the roster, skipping records whose name or date is unusable.
    ///
    /// A missing file is an empty roster. Unreadable or malformed content
    /// at the top level is a [`NotifierError::DataError`].
    pub async fn load_with_report(&self) -> Result<LoadedRoster> {
        let bytes = match self.storage.read_file(&self.path).await {
            Ok(bytes) => bytes,
            Err(NotifierError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("📭 Roster file {} not found, treating as empty", self.path);
                return Ok(LoadedRoster::default());
            }
            Err(e) => {
                return Err(NotifierError::data(format!("cannot read {}: {}", self.path, e)));
            }
        };

        let document: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| NotifierError::data(format!("malformed roster {}: {}", self.path, e)))?;

        let serde_json::Value::Array(items) = document else {
            return Err(NotifierError::data(format!(
                "roster {} must be a JSON array of records",
                self.path
            )));
        };

        let mut loaded = LoadedRoster::default();
        for (index, item) in items.iter().enumerate() {
            match parse_record(item) {
                Ok(record) => loaded.roster.push(record),
                Err(reason) => {
                    tracing::warn!("⚠️ Skipping roster record #{}: {}", index, reason);
                    loaded.skipped.push(SkippedRecord { index, reason });
                }
            }
        }

        tracing::debug!(
            "Loaded {} records from {} ({} skipped)",
            loaded.roster.len(),
            self.path,
            loaded.skipped.len()
        );
        Ok(loaded)
    }

    pub async fn save(&self, roster: &Roster) -> Result<()> {
        let json = serde_json::to_vec_pretty(roster.records())?;
        self.storage.write_file(&self.path, &json).await?;
        tracing::info!("💾 Saved {} records to {}", roster.len(), self.path);
        Ok(())
    }
}

fn parse_record(item: &serde_json::Value) -> std::result::Result<BirthdayRecord, String> {
    let serde_json::Value::Object(fields) = item else {
        return Err(format!("not an object: {}", item));
    };

    let name = fields
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "missing or empty name".to_string())?;

    let raw_birthday = fields
        .get("birthday")
        .ok_or_else(|| format!("{}: missing birthday", name))?;

    let birthday = DateCode::parse_value(raw_birthday).map_err(|e| format!("{}: {}", name, e))?;

    Ok(BirthdayRecord::new(name, birthday))
}
