use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, WriterBuilder};
use tracing::debug;

use crate::catalog::{Catalog, QuestionType};
use crate::error::{Error, Result};
use crate::models::{form_of, Answer, Interview, InterviewAnswers, FORM_IDS, LIST_DELIMITER};
use crate::report::ConsolidatedReportData;

pub const CONSOLIDATED_HEADERS: [&str; 13] = [
    "form_id",
    "form_title",
    "question_id",
    "pergunta",
    "question_type",
    "category",
    "respondent_name",
    "respondent_department",
    "interviewer_name",
    "resposta",
    "timestamp",
    "interview_id",
    "is_completed",
];

pub const INTERVIEW_ANSWER_HEADERS: [&str; 6] = [
    "form_id",
    "form_title",
    "question_id",
    "pergunta",
    "question_type",
    "resposta",
];

pub const REPORT_HEADERS: [&str; 11] = [
    "form_id",
    "question_id",
    "pergunta",
    "question_type",
    "category",
    "weight",
    "analysis_type",
    "resposta",
    "score",
    "max_score",
    "percentage",
];

pub const REQUIRED_IMPORT_HEADERS: [&str; 3] = ["respondent_name", "question_id", "resposta"];

/// Writes a header line and one line per row, every field quoted.
pub fn write_csv(headers: &[&str], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows.iter() {
        writer.write_record(row.iter().map(|field| single_line(field)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))?;
    String::from_utf8(bytes).map_err(|err| Error::InvalidInput(err.to_string()))
}

fn single_line(field: &str) -> String {
    field.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn consolidated_rows(
    catalog: &Catalog,
    form_filter: Option<&str>,
    interviews: &[Interview],
) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for interview in interviews.iter() {
        for form_id in FORM_IDS {
            if form_filter.is_some_and(|f| f != form_id) {
                continue;
            }
            let Some(answers) = interview.answers.form(form_id) else {
                continue;
            };
            let form_title = catalog
                .form(form_id)
                .map(|f| f.title.clone())
                .unwrap_or_default();

            for (question_id, answer) in answers.iter() {
                if answer.is_blank() {
                    continue;
                }
                let question = catalog.question(question_id);
                rows.push(vec![
                    form_id.to_string(),
                    form_title.clone(),
                    question_id.clone(),
                    question.map(|q| q.label.clone()).unwrap_or_else(|| question_id.clone()),
                    question
                        .map(|q| q.question_type.tag().to_string())
                        .unwrap_or_default(),
                    question.and_then(|q| q.category.clone()).unwrap_or_default(),
                    interview.respondent_name.clone().unwrap_or_default(),
                    interview.respondent_department.clone().unwrap_or_default(),
                    interview.interviewer_name.clone().unwrap_or_default(),
                    answer.to_flat_string(),
                    format_timestamp(&interview.created_at),
                    interview.id.to_string(),
                    interview.is_completed.to_string(),
                ]);
            }
        }
    }
    rows
}

/// All answered questions of all forms, one row each.
pub fn export_consolidated(catalog: &Catalog, interviews: &[Interview]) -> Result<String> {
    let rows = consolidated_rows(catalog, None, interviews);
    write_csv(&CONSOLIDATED_HEADERS, &rows)
}

/// One form across many interviews, preceded by a five-line statistics block.
pub fn export_form_consolidated(
    catalog: &Catalog,
    form_id: &str,
    interviews: &[Interview],
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let form = catalog
        .form(form_id)
        .ok_or_else(|| Error::NotFound(format!("form {form_id}")))?;
    let rows = consolidated_rows(catalog, Some(form_id), interviews);
    let completed = interviews.iter().filter(|i| i.is_completed).count();

    let mut output = String::new();
    output.push_str(&format!("Formulário: {} - {}\n", form.id, form.title));
    output.push_str(&format!("Total de entrevistas: {}\n", interviews.len()));
    output.push_str(&format!("Entrevistas concluídas: {completed}\n"));
    output.push_str(&format!("Total de respostas: {}\n", rows.len()));
    output.push_str(&format!("Gerado em: {}\n", format_timestamp(&generated_at)));
    output.push('\n');
    output.push_str(&write_csv(&CONSOLIDATED_HEADERS, &rows)?);
    Ok(output)
}

/// Every active catalog question of one interview, answered or not.
pub fn export_interview_answers(catalog: &Catalog, interview: &Interview) -> Result<String> {
    let mut rows = Vec::new();
    for form in catalog.forms.iter() {
        for question in form.questions.iter().filter(|q| q.is_active()) {
            let answer = interview
                .answers
                .answer_for(&question.id)
                .map(Answer::to_flat_string)
                .unwrap_or_default();
            rows.push(vec![
                form.id.clone(),
                form.title.clone(),
                question.id.clone(),
                question.label.clone(),
                question.question_type.tag().to_string(),
                answer,
            ]);
        }
    }
    write_csv(&INTERVIEW_ANSWER_HEADERS, &rows)
}

pub fn export_report_csv(report: &ConsolidatedReportData) -> Result<String> {
    let rows: Vec<Vec<String>> = report
        .detailed_responses
        .iter()
        .map(|row| {
            vec![
                row.form_id.clone(),
                row.question_id.clone(),
                row.question_label.clone(),
                row.question_type.clone(),
                row.category.clone(),
                row.weight.to_string(),
                row.analysis_type
                    .map(|a| a.as_str().to_string())
                    .unwrap_or_default(),
                row.answer
                    .as_ref()
                    .map(Answer::to_flat_string)
                    .unwrap_or_default(),
                format!("{:.2}", row.score),
                format!("{:.2}", row.max_score),
                format!("{:.1}", row.percentage),
            ]
        })
        .collect();
    write_csv(&REPORT_HEADERS, &rows)
}

/// One respondent session reconstructed from imported rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportGroup {
    pub respondent_name: String,
    pub timestamp: String,
    pub respondent_department: Option<String>,
    pub interviewer_name: Option<String>,
    pub is_completed: bool,
    pub answers: InterviewAnswers,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedImport {
    pub groups: Vec<ImportGroup>,
    pub rows: usize,
    /// Rows that were dropped, with the reason.
    pub warnings: Vec<String>,
}

/// Comma split plus quote stripping. Not a CSV parser: free text holding
/// commas or quotes does not survive a re-import of a strict export.
pub fn split_naive(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| {
            let field = field.trim();
            let field = field.strip_prefix('"').unwrap_or(field);
            let field = field.strip_suffix('"').unwrap_or(field);
            field.to_string()
        })
        .collect()
}

/// Parses exported text and groups rows by (respondent_name, timestamp).
///
/// Lines before the header line (such as the statistics block of a per-form
/// export) are skipped. The header line is the first non-blank line that
/// names every required column.
pub fn parse_import(text: &str) -> Result<ParsedImport> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return Err(Error::InvalidImport {
            errors: vec!["arquivo vazio".to_string()],
        });
    }

    let header_at = lines.iter().position(|(_, line)| {
        let fields = split_naive(line);
        REQUIRED_IMPORT_HEADERS
            .iter()
            .all(|required| fields.iter().any(|f| f == required))
    });
    let Some(header_at) = header_at else {
        let first = split_naive(lines[0].1);
        let errors = REQUIRED_IMPORT_HEADERS
            .iter()
            .filter(|required| !first.iter().any(|f| f == *required))
            .map(|missing| format!("cabeçalho obrigatório ausente: {missing}"))
            .collect();
        return Err(Error::InvalidImport { errors });
    };
    if header_at > 0 {
        debug!("skipping {header_at} preamble lines before the header");
    }

    let headers = split_naive(lines[header_at].1);
    let column: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let mut groups: Vec<ImportGroup> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut warnings = Vec::new();
    let mut valid_rows = 0usize;

    for (line_idx, line) in lines.iter().skip(header_at + 1) {
        let lineno = line_idx + 1;
        let fields = split_naive(line);
        let field = |name: &str| -> String {
            column
                .get(name)
                .and_then(|idx| fields.get(*idx))
                .cloned()
                .unwrap_or_default()
        };

        let question_id = field("question_id");
        if question_id.is_empty() {
            warnings.push(format!("linha {lineno}: question_id vazio"));
            continue;
        }
        if !form_of(&question_id).is_some_and(|form| FORM_IDS.contains(&form)) {
            warnings.push(format!(
                "linha {lineno}: question_id {question_id} não pertence a nenhum formulário"
            ));
            continue;
        }
        valid_rows += 1;

        let key = (field("respondent_name"), field("timestamp"));
        let group_idx = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(ImportGroup {
                respondent_name: key.0.clone(),
                timestamp: key.1.clone(),
                respondent_department: None,
                interviewer_name: None,
                is_completed: false,
                answers: InterviewAnswers::default(),
                row_count: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[group_idx];
        group.row_count += 1;
        if group.respondent_department.is_none() {
            group.respondent_department = non_empty(field("respondent_department"));
        }
        if group.interviewer_name.is_none() {
            group.interviewer_name = non_empty(field("interviewer_name"));
        }
        if field("is_completed").eq_ignore_ascii_case("true") {
            group.is_completed = true;
        }

        let question_type = QuestionType::from_tag(&field("question_type"));
        if let Some(answer) = reconstruct_answer(&field("resposta"), &question_type) {
            group.answers.insert(&question_id, answer);
        }
    }

    if valid_rows == 0 {
        let mut errors = vec!["nenhuma linha de dados válida encontrada".to_string()];
        errors.extend(warnings);
        return Err(Error::InvalidImport { errors });
    }

    Ok(ParsedImport {
        groups,
        rows: valid_rows,
        warnings,
    })
}

/// Rebuilds an answer from its flat form. Multi-select questions always
/// come back as lists; other values become lists only when they contain
/// the delimiter.
fn reconstruct_answer(value: &str, question_type: &QuestionType) -> Option<Answer> {
    if value.trim().is_empty() {
        return None;
    }
    if *question_type == QuestionType::MultiSelect || value.contains(LIST_DELIMITER) {
        let items = value
            .split(LIST_DELIMITER)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        return Some(Answer::Multiple(items));
    }
    Some(Answer::Single(value.to_string()))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
