use tracing::debug;

use crate::catalog::Catalog;
use crate::insights;
use crate::kv_store::KeyValueStore;
use crate::models::{
    AnalysisResult, AnalysisType, CategoryScore, InterviewAnswers, ScoreResult, WeightEntry,
};
use crate::normalize::{max_for, normalize};
use crate::weights::WeightRegistry;

/// Category weight used when a category has no registered entry.
pub const DEFAULT_CATEGORY_WEIGHT: u8 = 1;

/// Folds normalized answers into category, dimension and overall scores.
pub struct ScoreAggregator<'a, S: KeyValueStore> {
    catalog: &'a Catalog,
    weights: &'a WeightRegistry<S>,
    include_inactive: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    score: f64,
    max_score: f64,
    question_count: usize,
}

impl<'a, S: KeyValueStore> ScoreAggregator<'a, S> {
    pub fn new(catalog: &'a Catalog, weights: &'a WeightRegistry<S>) -> Self {
        Self {
            catalog,
            weights,
            include_inactive: false,
        }
    }

    /// Also score questions the catalog marks inactive.
    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn weights(&self) -> &'a WeightRegistry<S> {
        self.weights
    }

    pub fn includes_inactive(&self) -> bool {
        self.include_inactive
    }

    pub fn category_score(&self, category: &str, answers: &InterviewAnswers) -> CategoryScore {
        let tally = self.tally(self.weights.question_weights_for_category(category), answers);
        let weight = self
            .weights
            .category_weight(category)
            .map(|c| c.weight)
            .unwrap_or(DEFAULT_CATEGORY_WEIGHT);
        let result = ScoreResult::new(tally.score, tally.max_score, category);

        CategoryScore {
            score: result.score,
            max_score: result.max_score,
            percentage: result.percentage,
            label: result.label,
            question_count: tally.question_count,
            weight,
        }
    }

    /// Unweighted sum across every question tagged with `analysis_type`.
    pub fn dimension_score(
        &self,
        analysis_type: AnalysisType,
        answers: &InterviewAnswers,
    ) -> ScoreResult {
        let tally = self.tally(
            self.weights.question_weights_for_analysis(analysis_type),
            answers,
        );
        ScoreResult::new(tally.score, tally.max_score, analysis_type.label())
    }

    /// Category scores that resolved at least one question, best first.
    pub fn category_scores(&self, answers: &InterviewAnswers) -> Vec<CategoryScore> {
        let mut scores: Vec<CategoryScore> = self
            .weights
            .categories()
            .iter()
            .map(|category| self.category_score(category, answers))
            .filter(|score| score.question_count > 0)
            .collect();
        scores.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores
    }

    pub fn overall(&self, answers: &InterviewAnswers) -> AnalysisResult {
        let category_scores = self.category_scores(answers);
        let overall_score = overall_from_categories(&category_scores);

        let satisfaction_score = self.dimension_score(AnalysisType::Satisfaction, answers);
        let functionality_score = self.dimension_score(AnalysisType::Functionality, answers);
        let integration_score = self.dimension_score(AnalysisType::Integration, answers);
        let usage_score = self.dimension_score(AnalysisType::Usage, answers);

        let insights = insights::insights(
            &category_scores,
            &satisfaction_score,
            &functionality_score,
            &integration_score,
        );
        let recommendations = insights::recommendations(
            &category_scores,
            &satisfaction_score,
            &functionality_score,
            &integration_score,
        );

        AnalysisResult {
            overall_score,
            category_scores,
            satisfaction_score,
            functionality_score,
            integration_score,
            usage_score,
            insights,
            recommendations,
        }
    }

    fn tally<'e>(
        &self,
        entries: impl Iterator<Item = &'e WeightEntry>,
        answers: &InterviewAnswers,
    ) -> Tally {
        let mut tally = Tally::default();
        for entry in entries {
            let Some(question) = self.catalog.question(&entry.question_id) else {
                debug!("weight entry {} has no catalog question", entry.question_id);
                continue;
            };
            if !self.include_inactive && !question.is_active() {
                continue;
            }

            let weight = f64::from(entry.weight);
            let value = normalize(answers.answer_for(&question.id), &question.question_type);
            tally.score += value * weight;
            tally.max_score += max_for(&question.question_type) * weight;
            tally.question_count += 1;
        }
        tally
    }
}

/// Weight-of-weights: each category's raw score and maximum are multiplied
/// by its category weight before summing.
pub fn overall_from_categories(category_scores: &[CategoryScore]) -> ScoreResult {
    let (score, max_score) = category_scores.iter().fold((0.0, 0.0), |(s, m), c| {
        let weight = f64::from(c.weight);
        (s + c.score * weight, m + c.max_score * weight)
    });
    ScoreResult::new(score, max_score, "Pontuação Geral")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Form, Question, QuestionType};
    use crate::kv_store::MemoryKeyValueStore;
    use crate::models::{Answer, CategoryWeightEntry};
    use crate::weights::WeightSnapshot;

    fn question(id: &str, tag: &str, active: Option<bool>) -> Question {
        Question {
            id: id.to_string(),
            question_type: QuestionType::from_tag(tag),
            category: None,
            label: id.to_string(),
            active,
        }
    }

    fn weight(id: &str, weight: u8, category: &str, analysis_type: AnalysisType) -> WeightEntry {
        WeightEntry {
            question_id: id.to_string(),
            weight,
            category: category.to_string(),
            analysis_type,
        }
    }

    fn category(name: &str, weight: u8) -> CategoryWeightEntry {
        CategoryWeightEntry {
            category: name.to_string(),
            weight,
            description: String::new(),
        }
    }

    fn catalog(questions: Vec<Question>) -> Catalog {
        Catalog {
            forms: vec![Form {
                id: "f1".to_string(),
                title: "Form".to_string(),
                questions,
            }],
            lookups: Default::default(),
        }
    }

    fn registry(
        questions: Vec<WeightEntry>,
        categories: Vec<CategoryWeightEntry>,
    ) -> WeightRegistry<MemoryKeyValueStore> {
        WeightRegistry::from_snapshot(
            MemoryKeyValueStore::new(),
            WeightSnapshot {
                question_weights: questions,
                category_weights: categories,
            },
        )
    }

    #[test]
    fn scale_answer_contributes_weighted_score() {
        let catalog = catalog(vec![question("f1_facilidade", "escala_1_5", None)]);
        let weights = registry(
            vec![weight("f1_facilidade", 2, "Usabilidade", AnalysisType::Satisfaction)],
            vec![category("Usabilidade", 5)],
        );
        let mut answers = InterviewAnswers::default();
        answers.insert("f1_facilidade", Answer::from("4"));

        let score = ScoreAggregator::new(&catalog, &weights).category_score("Usabilidade", &answers);
        assert_eq!(score.score, 8.0);
        assert_eq!(score.max_score, 10.0);
        assert_eq!(score.question_count, 1);
        assert_eq!(score.weight, 5);
        assert!((score.percentage - 80.0).abs() < 0.001);
    }

    #[test]
    fn multi_select_of_three_is_sixty_percent() {
        let catalog = catalog(vec![question("f1_ferramentas", "multipla", None)]);
        let weights = registry(
            vec![weight("f1_ferramentas", 1, "Uso", AnalysisType::Usage)],
            vec![],
        );
        let mut answers = InterviewAnswers::default();
        answers.insert("f1_ferramentas", Answer::from(vec!["A", "B", "C"]));

        let score = ScoreAggregator::new(&catalog, &weights).category_score("Uso", &answers);
        assert_eq!(score.score, 3.0);
        assert_eq!(score.max_score, 5.0);
        assert!((score.percentage - 60.0).abs() < 0.001);
        assert_eq!(score.weight, DEFAULT_CATEGORY_WEIGHT);
    }

    #[test]
    fn unknown_questions_are_skipped() {
        let catalog = catalog(vec![]);
        let weights = registry(
            vec![weight("f1_removida", 3, "Fantasma", AnalysisType::Usage)],
            vec![category("Fantasma", 4)],
        );
        let aggregator = ScoreAggregator::new(&catalog, &weights);
        let answers = InterviewAnswers::default();

        let score = aggregator.category_score("Fantasma", &answers);
        assert_eq!(score.question_count, 0);
        assert_eq!(score.max_score, 0.0);
        assert_eq!(score.percentage, 0.0);

        let result = aggregator.overall(&answers);
        assert!(result.category_scores.is_empty());
        assert_eq!(result.overall_score.percentage, 0.0);
    }

    #[test]
    fn overall_weights_categories_by_category_weight() {
        let catalog = catalog(vec![
            question("f1_a", "escala_1_5", None),
            question("f1_b", "escala_1_5", None),
        ]);
        let weights = registry(
            vec![
                weight("f1_a", 1, "A", AnalysisType::Satisfaction),
                weight("f1_b", 1, "B", AnalysisType::Satisfaction),
            ],
            vec![category("A", 5), category("B", 1)],
        );
        let mut answers = InterviewAnswers::default();
        answers.insert("f1_a", Answer::from("5"));
        answers.insert("f1_b", Answer::from("0"));

        let result = ScoreAggregator::new(&catalog, &weights).overall(&answers);
        let expected = 500.0 / 600.0 * 100.0;
        assert!((result.overall_score.percentage - expected).abs() < 0.001);

        assert_eq!(result.category_scores[0].label, "A");
        assert_eq!(result.category_scores[1].label, "B");

        // Dimension scores ignore category weights.
        assert!((result.satisfaction_score.percentage - 50.0).abs() < 0.001);
    }

    #[test]
    fn dimension_scores_filter_by_analysis_type() {
        let catalog = catalog(vec![
            question("f1_sat", "escala_0_10", None),
            question("f1_int", "sim_nao", None),
        ]);
        let weights = registry(
            vec![
                weight("f1_sat", 5, "A", AnalysisType::Satisfaction),
                weight("f1_int", 2, "A", AnalysisType::Integration),
            ],
            vec![],
        );
        let mut answers = InterviewAnswers::default();
        answers.insert("f1_sat", Answer::from("7"));
        answers.insert("f1_int", Answer::from("Não"));

        let aggregator = ScoreAggregator::new(&catalog, &weights);
        let satisfaction = aggregator.dimension_score(AnalysisType::Satisfaction, &answers);
        assert_eq!(satisfaction.score, 35.0);
        assert_eq!(satisfaction.max_score, 50.0);

        let integration = aggregator.dimension_score(AnalysisType::Integration, &answers);
        assert_eq!(integration.score, 2.0);
        assert_eq!(integration.max_score, 10.0);

        let usage = aggregator.dimension_score(AnalysisType::Usage, &answers);
        assert_eq!(usage.max_score, 0.0);
        assert_eq!(usage.percentage, 0.0);
    }

    #[test]
    fn inactive_questions_are_excluded_unless_requested() {
        let catalog = catalog(vec![
            question("f1_ativa", "escala_1_5", None),
            question("f1_inativa", "escala_1_5", Some(false)),
        ]);
        let weights = registry(
            vec![
                weight("f1_ativa", 1, "A", AnalysisType::Usage),
                weight("f1_inativa", 1, "A", AnalysisType::Usage),
            ],
            vec![],
        );
        let mut answers = InterviewAnswers::default();
        answers.insert("f1_ativa", Answer::from("5"));

        let default = ScoreAggregator::new(&catalog, &weights).category_score("A", &answers);
        assert_eq!(default.question_count, 1);
        assert!((default.percentage - 100.0).abs() < 0.001);

        let all = ScoreAggregator::new(&catalog, &weights)
            .include_inactive(true)
            .category_score("A", &answers);
        assert_eq!(all.question_count, 2);
        assert!((all.percentage - 50.0).abs() < 0.001);
    }

    #[test]
    fn builtin_catalog_and_defaults_score_a_full_interview() {
        let catalog = Catalog::builtin().unwrap();
        let weights = WeightRegistry::open(MemoryKeyValueStore::new());
        let mut answers = InterviewAnswers::default();
        answers.insert("f2_satisfacao_geral", Answer::from("9"));
        answers.insert("f2_facilidade_uso", Answer::from("5"));
        answers.insert("f3_integracao_atual", Answer::from("Sim"));

        let result = ScoreAggregator::new(&catalog, &weights).overall(&answers);
        assert!(result.overall_score.percentage > 0.0);
        assert!(result.overall_score.percentage <= 100.0);
        for category in result.category_scores.iter() {
            assert!((0.0..=100.0).contains(&category.percentage));
        }
        let percentages: Vec<f64> = result.category_scores.iter().map(|c| c.percentage).collect();
        let mut sorted = percentages.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(percentages, sorted);
    }
}
