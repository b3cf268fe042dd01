use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::csv_codec::{parse_import, ImportGroup, ParsedImport};
use crate::error::Result;
use crate::models::NewInterview;
use crate::store::InterviewStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Success,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub groups: usize,
    pub imported: usize,
    pub skipped: usize,
    pub created: Vec<Uuid>,
    pub errors: Vec<String>,
    /// Rows dropped while parsing.
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn status(&self) -> ImportStatus {
        if self.errors.is_empty() {
            ImportStatus::Success
        } else if self.imported > 0 {
            ImportStatus::PartialSuccess
        } else {
            ImportStatus::Failed
        }
    }
}

/// Parses `text` and creates one interview per respondent group.
/// A malformed file is refused before anything is written.
pub async fn import_csv<S: InterviewStore>(store: &S, text: &str) -> Result<ImportReport> {
    let parsed = parse_import(text)?;
    Ok(import_into(store, parsed).await)
}

/// Creates interviews one group at a time. Groups whose respondent name and
/// timestamp already exist in the store are skipped; a failing group is
/// recorded and the next one is attempted.
pub async fn import_into<S: InterviewStore>(store: &S, parsed: ParsedImport) -> ImportReport {
    let mut report = ImportReport {
        groups: parsed.groups.len(),
        warnings: parsed.warnings,
        ..ImportReport::default()
    };

    for group in parsed.groups {
        let label = format!("{} @ {}", group.respondent_name, group.timestamp);
        match import_group(store, group).await {
            Ok(Some(id)) => {
                info!("imported interview {id} for {label}");
                report.imported += 1;
                report.created.push(id);
            }
            Ok(None) => {
                info!("skipping {label}: already imported");
                report.skipped += 1;
            }
            Err(err) => {
                warn!("failed to import {label}: {err}");
                report.errors.push(format!("{label}: {err}"));
            }
        }
    }

    report
}

async fn import_group<S: InterviewStore>(store: &S, group: ImportGroup) -> Result<Option<Uuid>> {
    let created_at = parse_timestamp(&group.timestamp)?;

    if store
        .find_by_respondent(&group.respondent_name, created_at)
        .await?
        .is_some()
    {
        return Ok(None);
    }

    let interview = NewInterview {
        is_interviewer: group.interviewer_name.is_some(),
        interviewer_name: group.interviewer_name,
        respondent_name: Some(group.respondent_name).filter(|name| !name.is_empty()),
        respondent_department: group.respondent_department,
        answers: group.answers,
        is_completed: group.is_completed,
        completed_at: group.is_completed.then_some(created_at),
        created_at,
    };
    let created = store.create_interview(interview).await?;
    Ok(Some(created.id))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| crate::error::Error::InvalidInput(format!("invalid timestamp {raw:?}: {err}")))
}
