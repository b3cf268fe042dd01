use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AnswerSet, Interview, InterviewAnswers, NewInterview};
use crate::store::InterviewStore;

const INTERVIEW_COLUMNS: &str = "id, is_interviewer, interviewer_name, respondent_name, \
     respondent_department, f1_answers, f2_answers, f3_answers, is_completed, \
     completed_at, config_snapshot, created_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Interviews in `ppm_survey.interviews`, one JSON text blob per form.
#[derive(Debug, Clone)]
pub struct PgInterviewStore {
    pool: PgPool,
}

impl PgInterviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn encode_answers(answers: &AnswerSet) -> Result<String> {
    Ok(serde_json::to_string(answers)?)
}

fn decode_answers(raw: Option<String>) -> Result<AnswerSet> {
    match raw {
        Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(AnswerSet::new()),
    }
}

fn interview_from_row(row: &PgRow) -> Result<Interview> {
    let config_snapshot: Option<String> = row.try_get("config_snapshot")?;
    Ok(Interview {
        id: row.try_get("id")?,
        is_interviewer: row.try_get("is_interviewer")?,
        interviewer_name: row.try_get("interviewer_name")?,
        respondent_name: row.try_get("respondent_name")?,
        respondent_department: row.try_get("respondent_department")?,
        answers: InterviewAnswers {
            f1: decode_answers(row.try_get("f1_answers")?)?,
            f2: decode_answers(row.try_get("f2_answers")?)?,
            f3: decode_answers(row.try_get("f3_answers")?)?,
        },
        is_completed: row.try_get("is_completed")?,
        completed_at: row.try_get("completed_at")?,
        config_snapshot: config_snapshot
            .map(|text| serde_json::from_str(&text))
            .transpose()?,
        created_at: row.try_get("created_at")?,
    })
}

impl InterviewStore for PgInterviewStore {
    async fn list_interviews(&self) -> Result<Vec<Interview>> {
        let query = format!(
            "SELECT {INTERVIEW_COLUMNS} FROM ppm_survey.interviews ORDER BY created_at"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(interview_from_row).collect()
    }

    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>> {
        let query = format!("SELECT {INTERVIEW_COLUMNS} FROM ppm_survey.interviews WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(interview_from_row).transpose()
    }

    async fn find_by_respondent(
        &self,
        respondent_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Interview>> {
        let query = format!(
            "SELECT {INTERVIEW_COLUMNS} FROM ppm_survey.interviews \
             WHERE COALESCE(respondent_name, '') = $1 AND created_at = $2 \
             LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(respondent_name)
            .bind(created_at)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(interview_from_row).transpose()
    }

    async fn create_interview(&self, interview: NewInterview) -> Result<Interview> {
        let created = interview.into_interview(Uuid::new_v4());
        sqlx::query(
            r#"
            INSERT INTO ppm_survey.interviews
            (id, is_interviewer, interviewer_name, respondent_name, respondent_department,
             f1_answers, f2_answers, f3_answers, is_completed, completed_at,
             config_snapshot, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(created.id)
        .bind(created.is_interviewer)
        .bind(&created.interviewer_name)
        .bind(&created.respondent_name)
        .bind(&created.respondent_department)
        .bind(encode_answers(&created.answers.f1)?)
        .bind(encode_answers(&created.answers.f2)?)
        .bind(encode_answers(&created.answers.f3)?)
        .bind(created.is_completed)
        .bind(created.completed_at)
        .bind(snapshot_text(&created)?)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_interview(&self, interview: &Interview) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE ppm_survey.interviews
            SET is_interviewer = $2, interviewer_name = $3, respondent_name = $4,
                respondent_department = $5, f1_answers = $6, f2_answers = $7,
                f3_answers = $8, is_completed = $9, completed_at = $10,
                config_snapshot = $11
            WHERE id = $1
            "#,
        )
        .bind(interview.id)
        .bind(interview.is_interviewer)
        .bind(&interview.interviewer_name)
        .bind(&interview.respondent_name)
        .bind(&interview.respondent_department)
        .bind(encode_answers(&interview.answers.f1)?)
        .bind(encode_answers(&interview.answers.f2)?)
        .bind(encode_answers(&interview.answers.f3)?)
        .bind(interview.is_completed)
        .bind(interview.completed_at)
        .bind(snapshot_text(interview)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::error::Error::NotFound(format!(
                "interview {}",
                interview.id
            )));
        }
        Ok(())
    }

    async fn delete_interview(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ppm_survey.interviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn snapshot_text(interview: &Interview) -> Result<Option<String>> {
    interview
        .config_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}
