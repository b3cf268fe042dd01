use crate::catalog::QuestionType;
use crate::models::{Answer, LIST_DELIMITER};

/// Flat score awarded to any non-empty free-form answer.
const PRESENCE_SCORE: f64 = 3.0;
/// Ceiling for every non-numeric question type.
const DEFAULT_MAX: f64 = 5.0;

pub fn max_for(question_type: &QuestionType) -> f64 {
    match question_type {
        QuestionType::Scale1To5 => 5.0,
        QuestionType::Scale0To10 => 10.0,
        QuestionType::YesNo(_)
        | QuestionType::MultiSelect
        | QuestionType::SingleSelect(_)
        | QuestionType::Text(_)
        | QuestionType::Other(_) => DEFAULT_MAX,
    }
}

/// Scores one answer against its question type. Unanswered questions score 0.
pub fn normalize(answer: Option<&Answer>, question_type: &QuestionType) -> f64 {
    let Some(answer) = answer.filter(|a| !a.is_blank()) else {
        return 0.0;
    };

    let score = match question_type {
        QuestionType::Scale1To5 | QuestionType::Scale0To10 => scale_value(first_text(answer)),
        QuestionType::YesNo(_) => yes_no_value(first_text(answer)),
        QuestionType::MultiSelect => match answer {
            Answer::Multiple(values) => values.len() as f64,
            Answer::Single(value) => value
                .split(LIST_DELIMITER)
                .filter(|segment| !segment.trim().is_empty())
                .count() as f64,
        },
        QuestionType::SingleSelect(_) | QuestionType::Text(_) | QuestionType::Other(_) => {
            PRESENCE_SCORE
        }
    };

    score.clamp(0.0, max_for(question_type))
}

fn first_text(answer: &Answer) -> &str {
    match answer {
        Answer::Single(value) => value,
        Answer::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
    }
}

fn scale_value(raw: &str) -> f64 {
    raw.trim().parse::<i64>().map(|v| v as f64).unwrap_or(0.0)
}

fn yes_no_value(raw: &str) -> f64 {
    let value = raw.to_lowercase();
    if value.contains("sim") {
        5.0
    } else if value.contains("parcialmente") {
        3.0
    } else if value.contains("não") {
        1.0
    } else {
        0.0
    }
}
