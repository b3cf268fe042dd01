use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator used for multi-select answers flattened into a single string.
pub const LIST_DELIMITER: char = ';';

/// The three fixed forms of an interview.
pub const FORM_IDS: [&str; 3] = ["f1", "f2", "f3"];

/// One answer as submitted by a respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multiple(Vec<String>),
}

impl Answer {
    /// True when the respondent left the question unanswered.
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Single(value) => value.trim().is_empty(),
            Answer::Multiple(values) => values.iter().all(|v| v.trim().is_empty()),
        }
    }

    /// The flat text form used by exports, list items joined by `;`.
    pub fn to_flat_string(&self) -> String {
        match self {
            Answer::Single(value) => value.clone(),
            Answer::Multiple(values) => values.join(&LIST_DELIMITER.to_string()),
        }
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Answer::Single(value.to_string())
    }
}

impl From<Vec<&str>> for Answer {
    fn from(values: Vec<&str>) -> Self {
        Answer::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

/// Answers of one form, keyed by question id.
pub type AnswerSet = BTreeMap<String, Answer>;

/// The answers of one interview across its three forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewAnswers {
    pub f1: AnswerSet,
    pub f2: AnswerSet,
    pub f3: AnswerSet,
}

impl InterviewAnswers {
    pub fn form(&self, form_id: &str) -> Option<&AnswerSet> {
        match form_id {
            "f1" => Some(&self.f1),
            "f2" => Some(&self.f2),
            "f3" => Some(&self.f3),
            _ => None,
        }
    }

    pub fn form_mut(&mut self, form_id: &str) -> Option<&mut AnswerSet> {
        match form_id {
            "f1" => Some(&mut self.f1),
            "f2" => Some(&mut self.f2),
            "f3" => Some(&mut self.f3),
            _ => None,
        }
    }

    /// Looks an answer up in the form named by the question id prefix
    /// (`f1_*` lives in form `f1`).
    pub fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.form(form_of(question_id)?)?.get(question_id)
    }

    /// Stores an answer in the form named by the question id prefix.
    /// Returns false when the prefix names no known form.
    pub fn insert(&mut self, question_id: &str, answer: Answer) -> bool {
        let Some(form) = form_of(question_id).and_then(|id| self.form_mut(id)) else {
            return false;
        };
        form.insert(question_id.to_string(), answer);
        true
    }

}

/// The form id a question belongs to: its first two characters.
pub fn form_of(question_id: &str) -> Option<&str> {
    question_id.get(..2)
}

/// An interview record as held by the interview store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub is_interviewer: bool,
    pub interviewer_name: Option<String>,
    pub respondent_name: Option<String>,
    pub respondent_department: Option<String>,
    pub answers: InterviewAnswers,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub config_snapshot: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to create an interview.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInterview {
    pub is_interviewer: bool,
    pub interviewer_name: Option<String>,
    pub respondent_name: Option<String>,
    pub respondent_department: Option<String>,
    pub answers: InterviewAnswers,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewInterview {
    pub fn into_interview(self, id: Uuid) -> Interview {
        Interview {
            id,
            is_interviewer: self.is_interviewer,
            interviewer_name: self.interviewer_name,
            respondent_name: self.respondent_name,
            respondent_department: self.respondent_department,
            answers: self.answers,
            is_completed: self.is_completed,
            completed_at: self.completed_at,
            config_snapshot: None,
            created_at: self.created_at,
        }
    }
}

/// Cross-cutting axis a question contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Satisfaction,
    Usage,
    Functionality,
    Integration,
    Demographic,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Satisfaction => "satisfaction",
            AnalysisType::Usage => "usage",
            AnalysisType::Functionality => "functionality",
            AnalysisType::Integration => "integration",
            AnalysisType::Demographic => "demographic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisType::Satisfaction => "Satisfação",
            AnalysisType::Usage => "Uso",
            AnalysisType::Functionality => "Funcionalidade",
            AnalysisType::Integration => "Integração",
            AnalysisType::Demographic => "Perfil",
        }
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "satisfaction" => Ok(AnalysisType::Satisfaction),
            "usage" => Ok(AnalysisType::Usage),
            "functionality" => Ok(AnalysisType::Functionality),
            "integration" => Ok(AnalysisType::Integration),
            "demographic" => Ok(AnalysisType::Demographic),
            other => Err(format!("unknown analysis type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightEntry {
    pub question_id: String,
    pub weight: u8,
    pub category: String,
    pub analysis_type: AnalysisType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWeightEntry {
    pub category: String,
    pub weight: u8,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub label: String,
}

impl ScoreResult {
    pub fn new(score: f64, max_score: f64, label: impl Into<String>) -> Self {
        Self {
            score,
            max_score,
            percentage: percentage(score, max_score),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub label: String,
    pub question_count: usize,
    pub weight: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_score: ScoreResult,
    pub category_scores: Vec<CategoryScore>,
    pub satisfaction_score: ScoreResult,
    pub functionality_score: ScoreResult,
    pub integration_score: ScoreResult,
    pub usage_score: ScoreResult,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// `100 * score / max_score`, or 0 when there is nothing to score against.
pub fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        0.0
    } else {
        (100.0 * score / max_score).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_zero_without_max_score() {
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(3.0, 0.0), 0.0);
        assert!((percentage(3.0, 5.0) - 60.0).abs() < 0.001);
    }

    #[test]
    fn answers_route_to_form_by_prefix() {
        let mut answers = InterviewAnswers::default();
        assert!(answers.insert("f2_satisfacao_geral", Answer::from("8")));
        assert!(!answers.insert("x", Answer::from("8")));
        assert!(!answers.insert("zz_unknown", Answer::from("8")));

        assert_eq!(answers.f2.len(), 1);
        assert_eq!(
            answers.answer_for("f2_satisfacao_geral"),
            Some(&Answer::from("8"))
        );
        assert_eq!(answers.answer_for("f1_satisfacao_geral"), None);
    }

    #[test]
    fn whitespace_and_empty_lists_are_blank() {
        assert!(Answer::from("   ").is_blank());
        assert!(Answer::Multiple(vec![]).is_blank());
        assert!(Answer::from(vec!["", " "]).is_blank());
        assert!(!Answer::from("Mais relatórios").is_blank());
        assert!(!Answer::from(vec!["", "ERP"]).is_blank());
    }

    #[test]
    fn answers_deserialize_from_scalars_and_lists() {
        let set: AnswerSet =
            serde_json::from_str(r#"{"f1_a": "sim", "f1_b": ["A", "B"]}"#).unwrap();
        assert_eq!(set["f1_a"], Answer::from("sim"));
        assert_eq!(set["f1_b"], Answer::from(vec!["A", "B"]));
        assert_eq!(set["f1_b"].to_flat_string(), "A;B");
    }
}
