use std::collections::BTreeMap;
use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::insights::{critical_categories, recommendation_for_category_with_fallback};
use crate::kv_store::KeyValueStore;
use crate::models::{percentage, Answer, AnalysisResult, AnalysisType, CategoryScore, Interview};
use crate::normalize::{max_for, normalize};
use crate::scoring::ScoreAggregator;

/// Category assigned to questions without a weight entry.
pub const UNCATEGORIZED: &str = "Sem Categoria";

const MAX_HIGH_PRIORITY: usize = 3;
const MAX_MEDIUM_PRIORITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondentInfo {
    pub interview_id: Uuid,
    pub respondent_name: Option<String>,
    pub respondent_department: Option<String>,
    pub interviewer_name: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedResponse {
    pub form_id: String,
    pub form_title: String,
    pub question_id: String,
    pub question_label: String,
    pub question_type: String,
    pub category: String,
    pub weight: u8,
    pub analysis_type: Option<AnalysisType>,
    pub answer: Option<Answer>,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CategoryStatus {
    Excelente,
    Bom,
    Regular,
    Ruim,
    #[serde(rename = "Crítico")]
    Critico,
}

impl CategoryStatus {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            CategoryStatus::Excelente
        } else if percentage >= 70.0 {
            CategoryStatus::Bom
        } else if percentage >= 60.0 {
            CategoryStatus::Regular
        } else if percentage >= 40.0 {
            CategoryStatus::Ruim
        } else {
            CategoryStatus::Critico
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryStatus::Excelente => "Excelente",
            CategoryStatus::Bom => "Bom",
            CategoryStatus::Regular => "Regular",
            CategoryStatus::Ruim => "Ruim",
            CategoryStatus::Critico => "Crítico",
        }
    }
}

impl fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub score: CategoryScore,
    pub status: CategoryStatus,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    Alta,
    #[serde(rename = "Média")]
    Media,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Alta => "Alta",
            Priority::Media => "Média",
        }
    }

    pub fn impact(&self) -> &'static str {
        match self {
            Priority::Alta => "Alto",
            Priority::Media => "Médio",
        }
    }

    pub fn effort(&self) -> &'static str {
        match self {
            Priority::Alta => "Médio",
            Priority::Media => "Baixo",
        }
    }

    pub fn timeline(&self) -> &'static str {
        match self {
            Priority::Alta => "3-6 meses",
            Priority::Media => "6-12 meses",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedRecommendation {
    pub priority: Priority,
    pub category: String,
    pub recommendation: String,
    pub impact: String,
    pub effort: String,
    pub timeline: String,
}

impl PrioritizedRecommendation {
    fn new(priority: Priority, category: &str) -> Self {
        Self {
            priority,
            category: category.to_string(),
            recommendation: recommendation_for_category_with_fallback(category),
            impact: priority.impact().to_string(),
            effort: priority.effort().to_string(),
            timeline: priority.timeline().to_string(),
        }
    }
}

/// Everything derived from one interview at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedReportData {
    pub generated_at: DateTime<Utc>,
    pub respondent: RespondentInfo,
    pub total_questions: usize,
    pub answered_questions: usize,
    pub completion_rate: f64,
    pub analysis: AnalysisResult,
    pub detailed_responses: Vec<DetailedResponse>,
    pub category_summaries: Vec<CategorySummary>,
    pub prioritized_recommendations: Vec<PrioritizedRecommendation>,
}

pub fn build_report<S: KeyValueStore>(
    aggregator: &ScoreAggregator<'_, S>,
    interview: &Interview,
    generated_at: DateTime<Utc>,
) -> ConsolidatedReportData {
    let analysis = aggregator.overall(&interview.answers);
    let detailed_responses = detailed_responses(aggregator, interview);
    let answered_questions = detailed_responses
        .iter()
        .filter(|row| row.answer.is_some())
        .count();
    let total_questions = detailed_responses.len();

    let category_summaries = analysis
        .category_scores
        .iter()
        .map(summarize_category)
        .collect();
    let prioritized_recommendations = prioritized_recommendations(&analysis.category_scores);

    ConsolidatedReportData {
        generated_at,
        respondent: RespondentInfo {
            interview_id: interview.id,
            respondent_name: interview.respondent_name.clone(),
            respondent_department: interview.respondent_department.clone(),
            interviewer_name: interview.interviewer_name.clone(),
            is_completed: interview.is_completed,
            created_at: interview.created_at,
        },
        total_questions,
        answered_questions,
        completion_rate: percentage(answered_questions as f64, total_questions as f64),
        analysis,
        detailed_responses,
        category_summaries,
        prioritized_recommendations,
    }
}

fn detailed_responses<S: KeyValueStore>(
    aggregator: &ScoreAggregator<'_, S>,
    interview: &Interview,
) -> Vec<DetailedResponse> {
    let weights = aggregator.weights();
    let mut rows = Vec::new();

    for form in aggregator.catalog().forms.iter() {
        for question in form.questions.iter() {
            if !aggregator.includes_inactive() && !question.is_active() {
                continue;
            }
            let entry = weights.question_weight(&question.id);
            let answer = interview
                .answers
                .answer_for(&question.id)
                .filter(|a| !a.is_blank())
                .cloned();
            let score = normalize(answer.as_ref(), &question.question_type);
            let max_score = max_for(&question.question_type);

            rows.push(DetailedResponse {
                form_id: form.id.clone(),
                form_title: form.title.clone(),
                question_id: question.id.clone(),
                question_label: question.label.clone(),
                question_type: question.question_type.to_string(),
                category: entry
                    .map(|e| e.category.clone())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                weight: entry.map(|e| e.weight).unwrap_or(1),
                analysis_type: entry.map(|e| e.analysis_type),
                answer,
                score,
                max_score,
                percentage: percentage(score, max_score),
            });
        }
    }
    rows
}

fn summarize_category(score: &CategoryScore) -> CategorySummary {
    let status = CategoryStatus::from_percentage(score.percentage);
    let name = &score.label;
    let pct = score.percentage;
    let mut insights = Vec::new();

    if pct >= 80.0 {
        insights.push(format!("{name} é um ponto forte, com {pct:.1}% de aproveitamento"));
    } else if pct < 60.0 {
        insights.push(format!("{name} está abaixo do esperado, com {pct:.1}% de aproveitamento"));
    } else {
        insights.push(format!("{name} apresenta desempenho intermediário ({pct:.1}%)"));
    }

    if score.weight >= 4 && pct < 70.0 {
        insights.push(format!(
            "Categoria de alta relevância (peso {}) que deve ser priorizada",
            score.weight
        ));
    } else if score.question_count == 1 {
        insights.push("Avaliação baseada em uma única pergunta".to_string());
    }

    CategorySummary {
        category: name.clone(),
        score: score.clone(),
        status,
        insights,
    }
}

fn prioritized_recommendations(category_scores: &[CategoryScore]) -> Vec<PrioritizedRecommendation> {
    let mut out: Vec<PrioritizedRecommendation> = critical_categories(category_scores)
        .into_iter()
        .take(MAX_HIGH_PRIORITY)
        .map(|c| PrioritizedRecommendation::new(Priority::Alta, &c.label))
        .collect();

    let mut medium: Vec<&CategoryScore> = category_scores
        .iter()
        .filter(|c| (50.0..70.0).contains(&c.percentage))
        .collect();
    medium.sort_by(|a, b| {
        a.percentage
            .partial_cmp(&b.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out.extend(
        medium
            .into_iter()
            .take(MAX_MEDIUM_PRIORITY)
            .map(|c| PrioritizedRecommendation::new(Priority::Media, &c.label)),
    );
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    pub category: String,
    pub average_percentage: f64,
    pub interviews: usize,
}

/// Averages across many interview reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub interview_count: usize,
    pub average_overall: f64,
    pub average_satisfaction: f64,
    pub average_functionality: f64,
    pub average_integration: f64,
    pub average_usage: f64,
    pub average_completion_rate: f64,
    pub category_averages: Vec<CategoryAverage>,
}

pub fn summarize_reports(reports: &[ConsolidatedReportData]) -> PortfolioSummary {
    let mut by_category: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for report in reports.iter() {
        for score in report.analysis.category_scores.iter() {
            let entry = by_category.entry(score.label.as_str()).or_insert((0.0, 0));
            entry.0 += score.percentage;
            entry.1 += 1;
        }
    }
    let mut category_averages: Vec<CategoryAverage> = by_category
        .into_iter()
        .map(|(category, (total, count))| CategoryAverage {
            category: category.to_string(),
            average_percentage: total / count as f64,
            interviews: count,
        })
        .collect();
    category_averages.sort_by(|a, b| {
        b.average_percentage
            .partial_cmp(&a.average_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    PortfolioSummary {
        interview_count: reports.len(),
        average_overall: mean(reports, |r| r.analysis.overall_score.percentage),
        average_satisfaction: mean(reports, |r| r.analysis.satisfaction_score.percentage),
        average_functionality: mean(reports, |r| r.analysis.functionality_score.percentage),
        average_integration: mean(reports, |r| r.analysis.integration_score.percentage),
        average_usage: mean(reports, |r| r.analysis.usage_score.percentage),
        average_completion_rate: mean(reports, |r| r.completion_rate),
        category_averages,
    }
}

fn mean(
    reports: &[ConsolidatedReportData],
    value: impl Fn(&ConsolidatedReportData) -> f64,
) -> f64 {
    if reports.is_empty() {
        0.0
    } else {
        reports.iter().map(value).sum::<f64>() / reports.len() as f64
    }
}

pub fn render_markdown(report: &ConsolidatedReportData) -> String {
    let mut output = String::new();
    let respondent = report
        .respondent
        .respondent_name
        .as_deref()
        .unwrap_or("respondente anônimo");
    let analysis = &report.analysis;

    let _ = writeln!(output, "# Relatório Consolidado de Avaliação PPM");
    let _ = writeln!(
        output,
        "Gerado em {} para {} (entrevista {})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        respondent,
        report.respondent.interview_id
    );
    if let Some(department) = report.respondent.respondent_department.as_deref() {
        let _ = writeln!(output, "Departamento: {department}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Visão Geral");
    let _ = writeln!(
        output,
        "- Pontuação geral: {:.1}% ({:.1} de {:.1})",
        analysis.overall_score.percentage,
        analysis.overall_score.score,
        analysis.overall_score.max_score
    );
    for dimension in [
        &analysis.satisfaction_score,
        &analysis.functionality_score,
        &analysis.integration_score,
        &analysis.usage_score,
    ] {
        let _ = writeln!(output, "- {}: {:.1}%", dimension.label, dimension.percentage);
    }
    let _ = writeln!(
        output,
        "- Respostas: {} de {} perguntas ({:.1}%)",
        report.answered_questions, report.total_questions, report.completion_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Categorias");

    if report.category_summaries.is_empty() {
        let _ = writeln!(output, "Nenhuma categoria pontuada.");
    } else {
        for summary in report.category_summaries.iter() {
            let _ = writeln!(
                output,
                "- {} [{}]: {:.1}% (peso {}, {} perguntas)",
                summary.category,
                summary.status,
                summary.score.percentage,
                summary.score.weight,
                summary.score.question_count
            );
            for insight in summary.insights.iter() {
                let _ = writeln!(output, "  - {insight}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    for insight in analysis.insights.iter() {
        let _ = writeln!(output, "- {insight}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recomendações");
    if analysis.recommendations.is_empty() {
        let _ = writeln!(output, "Nenhuma recomendação no momento.");
    } else {
        for recommendation in analysis.recommendations.iter() {
            let _ = writeln!(output, "- {recommendation}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Plano de Ação Priorizado");
    if report.prioritized_recommendations.is_empty() {
        let _ = writeln!(output, "Nenhuma ação prioritária identificada.");
    } else {
        for action in report.prioritized_recommendations.iter() {
            let _ = writeln!(
                output,
                "- [{}] {}: {} (impacto {}, esforço {}, prazo {})",
                action.priority.as_str(),
                action.category,
                action.recommendation,
                action.impact,
                action.effort,
                action.timeline
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::kv_store::MemoryKeyValueStore;
    use crate::models::InterviewAnswers;
    use crate::weights::WeightRegistry;

    fn interview(answers: InterviewAnswers) -> Interview {
        Interview {
            id: Uuid::new_v4(),
            is_interviewer: true,
            interviewer_name: Some("Carla Souza".to_string()),
            respondent_name: Some("Bruno Lima".to_string()),
            respondent_department: Some("PMO".to_string()),
            answers,
            is_completed: true,
            completed_at: None,
            config_snapshot: None,
            created_at: Utc::now(),
        }
    }

    fn category(label: &str, percentage: f64, weight: u8) -> CategoryScore {
        CategoryScore {
            score: percentage,
            max_score: 100.0,
            percentage,
            label: label.to_string(),
            question_count: 2,
            weight,
        }
    }

    #[test]
    fn status_follows_breakpoints() {
        assert_eq!(CategoryStatus::from_percentage(80.0), CategoryStatus::Excelente);
        assert_eq!(CategoryStatus::from_percentage(79.9), CategoryStatus::Bom);
        assert_eq!(CategoryStatus::from_percentage(70.0), CategoryStatus::Bom);
        assert_eq!(CategoryStatus::from_percentage(60.0), CategoryStatus::Regular);
        assert_eq!(CategoryStatus::from_percentage(40.0), CategoryStatus::Ruim);
        assert_eq!(CategoryStatus::from_percentage(39.9), CategoryStatus::Critico);
    }

    #[test]
    fn prioritized_recommendations_use_two_tiers() {
        let scores = vec![
            category("Integração", 30.0, 4),
            category("Perfil", 20.0, 5),
            category("Desempenho", 45.0, 3),
            category("Usabilidade", 65.0, 5),
            category("Suporte e Treinamento", 55.0, 3),
            category("Uso da Ferramenta", 60.0, 3),
        ];
        let actions = prioritized_recommendations(&scores);

        let high: Vec<&str> = actions
            .iter()
            .filter(|a| a.priority == Priority::Alta)
            .map(|a| a.category.as_str())
            .collect();
        assert_eq!(high, vec!["Perfil", "Integração"]);

        let medium: Vec<&str> = actions
            .iter()
            .filter(|a| a.priority == Priority::Media)
            .map(|a| a.category.as_str())
            .collect();
        assert_eq!(medium, vec!["Suporte e Treinamento", "Uso da Ferramenta"]);

        let perfil = &actions[0];
        assert!(perfil.recommendation.contains("conforme a análise detalhada"));
        assert_eq!(perfil.timeline, "3-6 meses");
        assert_eq!(perfil.impact, "Alto");
        assert_eq!(actions[2].timeline, "6-12 meses");
        assert_eq!(actions[2].effort, "Baixo");
    }

    #[test]
    fn report_lists_every_active_question() {
        let catalog = Catalog::builtin().unwrap();
        let weights = WeightRegistry::open(MemoryKeyValueStore::new());
        let aggregator = ScoreAggregator::new(&catalog, &weights);

        let mut answers = InterviewAnswers::default();
        answers.insert("f2_satisfacao_geral", Answer::from("4"));
        answers.insert("f2_interface_intuitiva", Answer::from("Parcialmente"));
        answers.insert("f1_cargo", Answer::from(""));
        let report = build_report(&aggregator, &interview(answers), Utc::now());

        let active = catalog.active_questions().count();
        assert_eq!(report.total_questions, active);
        assert_eq!(report.answered_questions, 2);
        let expected_rate = 200.0 / active as f64;
        assert!((report.completion_rate - expected_rate).abs() < 0.001);

        let row = report
            .detailed_responses
            .iter()
            .find(|r| r.question_id == "f2_interface_intuitiva")
            .unwrap();
        assert_eq!(row.category, "Usabilidade");
        assert_eq!(row.score, 3.0);
        assert!((row.percentage - 60.0).abs() < 0.001);

        let unanswered = report
            .detailed_responses
            .iter()
            .find(|r| r.question_id == "f3_sugestoes")
            .unwrap();
        assert_eq!(unanswered.answer, None);
        assert_eq!(unanswered.score, 0.0);

        assert_eq!(
            report.category_summaries.len(),
            report.analysis.category_scores.len()
        );
        assert!(report.category_summaries.iter().all(|s| !s.insights.is_empty()
            && s.insights.len() <= 2));
    }

    #[test]
    fn unregistered_questions_fall_back_to_default_category() {
        let catalog = Catalog::builtin().unwrap();
        let mut weights = WeightRegistry::open(MemoryKeyValueStore::new());
        weights.remove("f3_sugestoes").unwrap();
        let aggregator = ScoreAggregator::new(&catalog, &weights);

        let report = build_report(&aggregator, &interview(InterviewAnswers::default()), Utc::now());
        let row = report
            .detailed_responses
            .iter()
            .find(|r| r.question_id == "f3_sugestoes")
            .unwrap();
        assert_eq!(row.category, UNCATEGORIZED);
        assert_eq!(row.weight, 1);
        assert_eq!(report.answered_questions, 0);
        assert_eq!(report.completion_rate, 0.0);
    }

    #[test]
    fn markdown_report_has_all_sections() {
        let catalog = Catalog::builtin().unwrap();
        let weights = WeightRegistry::open(MemoryKeyValueStore::new());
        let aggregator = ScoreAggregator::new(&catalog, &weights);
        let mut answers = InterviewAnswers::default();
        answers.insert("f2_facilidade_uso", Answer::from("2"));
        let report = build_report(&aggregator, &interview(answers), Utc::now());

        let markdown = render_markdown(&report);
        for heading in [
            "# Relatório Consolidado de Avaliação PPM",
            "## Visão Geral",
            "## Categorias",
            "## Insights",
            "## Recomendações",
            "## Plano de Ação Priorizado",
        ] {
            assert!(markdown.contains(heading), "missing {heading}");
        }
        assert!(markdown.contains("Bruno Lima"));
        assert!(markdown.contains("Departamento: PMO"));
    }

    #[test]
    fn summary_averages_across_reports() {
        let catalog = Catalog::builtin().unwrap();
        let weights = WeightRegistry::open(MemoryKeyValueStore::new());
        let aggregator = ScoreAggregator::new(&catalog, &weights);

        let mut high = InterviewAnswers::default();
        high.insert("f2_facilidade_uso", Answer::from("5"));
        let mut low = InterviewAnswers::default();
        low.insert("f2_facilidade_uso", Answer::from("1"));

        let reports = vec![
            build_report(&aggregator, &interview(high), Utc::now()),
            build_report(&aggregator, &interview(low), Utc::now()),
        ];
        let summary = summarize_reports(&reports);
        assert_eq!(summary.interview_count, 2);

        let expected = (reports[0].analysis.overall_score.percentage
            + reports[1].analysis.overall_score.percentage)
            / 2.0;
        assert!((summary.average_overall - expected).abs() < 0.001);

        let usability = summary
            .category_averages
            .iter()
            .find(|c| c.category == "Usabilidade")
            .unwrap();
        assert_eq!(usability.interviews, 2);

        assert_eq!(summarize_reports(&[]).average_overall, 0.0);
    }
}
