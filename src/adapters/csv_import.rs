//! CSV ingestion: turns a spreadsheet export into roster records.

use crate::core::date_code::DateCode;
use crate::domain::model::{BirthdayRecord, Roster};
use crate::utils::error::{NotifierError, Result};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Accepted header names for the name column, matched case-insensitively.
    pub name_columns: Vec<String>,
    pub birthday_columns: Vec<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            name_columns: vec!["name".into(), "full name".into(), "фио".into(), "имя".into()],
            birthday_columns: vec![
                "birthday".into(),
                "date of birth".into(),
                "date".into(),
                "день рождения".into(),
            ],
        }
    }
}

impl ImportOptions {
    pub fn with_columns(name_column: Option<String>, birthday_column: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            name_columns: name_column.map(|c| vec![c]).unwrap_or(defaults.name_columns),
            birthday_columns: birthday_column
                .map(|c| vec![c])
                .unwrap_or(defaults.birthday_columns),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line in the source file, header included.
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub roster: Roster,
    pub skipped: Vec<SkippedRow>,
}

pub fn import_csv_file<P: AsRef<Path>>(path: P, options: &ImportOptions) -> Result<ImportReport> {
    let file = std::fs::File::open(path.as_ref())?;
    import_csv(file, options)
}

pub fn import_csv<R: std::io::Read>(reader: R, options: &ImportOptions) -> Result<ImportReport> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let name_idx = find_column(&headers, &options.name_columns, "name_column")?;
    let birthday_idx = find_column(&headers, &options.birthday_columns, "birthday_column")?;

    let mut report = ImportReport::default();

    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let name = row.get(name_idx).unwrap_or_default();
        let raw_birthday = row.get(birthday_idx).unwrap_or_default();

        if name.is_empty() {
            if !raw_birthday.is_empty() {
                tracing::warn!("⚠️ Line {}: empty name, row skipped", line);
                report.skipped.push(SkippedRow {
                    line,
                    reason: "empty name".to_string(),
                });
            }
            continue;
        }

        match DateCode::parse(raw_birthday) {
            Ok(birthday) => report.roster.push(BirthdayRecord::new(name, birthday)),
            Err(e) => {
                tracing::warn!("⚠️ Line {}: {} skipped: {}", line, name, e);
                report.skipped.push(SkippedRow {
                    line,
                    reason: format!("{}: {}", name, e),
                });
            }
        }
    }

    tracing::info!(
        "📥 Imported {} records ({} skipped)",
        report.roster.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn find_column(headers: &csv::StringRecord, candidates: &[String], field: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| {
            candidates
                .iter()
                .any(|c| c.trim().to_lowercase() == h.trim().to_lowercase())
        })
        .ok_or_else(|| NotifierError::InvalidConfigValueError {
            field: field.to_string(),
            value: candidates.join(" | "),
            reason: format!(
                "no matching column; file has: {}",
                headers.iter().collect::<Vec<_>>().join(", ")
            ),
        })
}
