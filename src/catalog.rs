use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

const BUILTIN_CATALOG: &str = include_str!("../config/questionnaire.json");

/// Marker shared by every yes/no type tag (`sim_nao`, `sim_nao_parcial`, ...).
const YES_NO_MARKER: &str = "sim_nao";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    Scale1To5,
    Scale0To10,
    /// Any yes/no variant; the original tag is kept for exports.
    YesNo(String),
    MultiSelect,
    SingleSelect(String),
    Text(String),
    Other(String),
}

impl QuestionType {
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_lowercase();
        match normalized.as_str() {
            "escala_1_5" => QuestionType::Scale1To5,
            "escala_0_10" => QuestionType::Scale0To10,
            "multipla" => QuestionType::MultiSelect,
            t if t.contains(YES_NO_MARKER) => QuestionType::YesNo(normalized.clone()),
            "texto" | "textarea" => QuestionType::Text(normalized.clone()),
            "selecao" | "select" => QuestionType::SingleSelect(normalized.clone()),
            _ => QuestionType::Other(tag.trim().to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            QuestionType::Scale1To5 => "escala_1_5",
            QuestionType::Scale0To10 => "escala_0_10",
            QuestionType::MultiSelect => "multipla",
            QuestionType::YesNo(tag)
            | QuestionType::SingleSelect(tag)
            | QuestionType::Text(tag)
            | QuestionType::Other(tag) => tag,
        }
    }
}

impl From<String> for QuestionType {
    fn from(tag: String) -> Self {
        QuestionType::from_tag(&tag)
    }
}

impl From<QuestionType> for String {
    fn from(question_type: QuestionType) -> Self {
        question_type.tag().to_string()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub category: Option<String>,
    pub label: String,
    #[serde(default)]
    pub active: Option<bool>,
}

impl Question {
    /// Questions are active unless explicitly switched off.
    pub fn is_active(&self) -> bool {
        self.active != Some(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub forms: Vec<Form>,
    #[serde(default)]
    pub lookups: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    /// The questionnaire shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn form(&self, form_id: &str) -> Option<&Form> {
        self.forms.iter().find(|form| form.id == form_id)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions().find(|question| question.id == question_id)
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.forms.iter().flat_map(|form| form.questions.iter())
    }

    pub fn active_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions().filter(|question| question.is_active())
    }
}
