use crate::models::{CategoryScore, ScoreResult};

const SATISFACTION_HIGH: f64 = 80.0;
const SATISFACTION_MODERATE: f64 = 60.0;
const SATISFACTION_ACTION: f64 = 70.0;
const FUNCTIONALITY_GAP: f64 = 60.0;
const INTEGRATION_GAP: f64 = 50.0;
const WEAK_CATEGORY: f64 = 60.0;
const STRONG_CATEGORY: f64 = 80.0;
const CRITICAL_CATEGORY: f64 = 50.0;
const HIGH_PRIORITY_WEIGHT: u8 = 4;

const MAX_WEAK_NAMED: usize = 3;
const MAX_STRONG_NAMED: usize = 2;
const MAX_CATEGORY_RECOMMENDATIONS: usize = 3;

const SATISFACTION_ACTIONS: [&str; 2] = [
    "Realizar sessões de feedback com os usuários para identificar as principais causas de insatisfação",
    "Elaborar um plano de ação para melhorar a experiência geral com a ferramenta",
];
const FUNCTIONALITY_ACTIONS: [&str; 2] = [
    "Mapear as lacunas funcionais em relação aos processos de gestão de portfólio",
    "Avaliar módulos adicionais ou ferramentas complementares que cubram as funcionalidades ausentes",
];
const INTEGRATION_ACTIONS: [&str; 2] = [
    "Priorizar integrações com os sistemas corporativos críticos (ERP, financeiro, BI)",
    "Definir uma arquitetura de integração baseada em APIs para reduzir o trabalho manual",
];

pub fn insights(
    category_scores: &[CategoryScore],
    satisfaction: &ScoreResult,
    functionality: &ScoreResult,
    integration: &ScoreResult,
) -> Vec<String> {
    let mut insights = Vec::new();

    let pct = satisfaction.percentage;
    if pct >= SATISFACTION_HIGH {
        insights.push(format!(
            "Alta satisfação dos usuários com a ferramenta atual ({pct:.1}%)"
        ));
    } else if pct >= SATISFACTION_MODERATE {
        insights.push(format!(
            "Satisfação moderada ({pct:.1}%): há espaço para melhorias"
        ));
    } else {
        insights.push(format!(
            "Baixa satisfação ({pct:.1}%): a ferramenta precisa de revisão urgente"
        ));
    }

    if functionality.percentage < FUNCTIONALITY_GAP {
        insights.push(format!(
            "Lacunas funcionais identificadas ({:.1}%): a ferramenta não atende plenamente às necessidades",
            functionality.percentage
        ));
    }

    if integration.percentage < INTEGRATION_GAP {
        insights.push(format!(
            "Necessidade de melhores integrações com outros sistemas ({:.1}%)",
            integration.percentage
        ));
    }

    let weak = weak_categories(category_scores);
    if !weak.is_empty() {
        insights.push(format!(
            "Categorias que precisam de atenção: {}",
            name_with_percentages(&weak)
        ));
    }

    let strong = strong_categories(category_scores);
    if !strong.is_empty() {
        insights.push(format!("Pontos fortes: {}", name_with_percentages(&strong)));
    }

    insights
}

pub fn recommendations(
    category_scores: &[CategoryScore],
    satisfaction: &ScoreResult,
    functionality: &ScoreResult,
    integration: &ScoreResult,
) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();

    if satisfaction.percentage < SATISFACTION_ACTION {
        recommendations.extend(SATISFACTION_ACTIONS.iter().map(|s| s.to_string()));
    }
    if functionality.percentage < FUNCTIONALITY_GAP {
        recommendations.extend(FUNCTIONALITY_ACTIONS.iter().map(|s| s.to_string()));
    }
    if integration.percentage < INTEGRATION_GAP {
        recommendations.extend(INTEGRATION_ACTIONS.iter().map(|s| s.to_string()));
    }

    recommendations.extend(
        critical_categories(category_scores)
            .into_iter()
            .take(MAX_CATEGORY_RECOMMENDATIONS)
            .filter_map(|c| recommendation_for_category_strict(&c.label))
            .map(str::to_string),
    );

    recommendations
}

/// Categories below 50% that carry a category weight of at least 4,
/// worst first.
pub fn critical_categories(category_scores: &[CategoryScore]) -> Vec<&CategoryScore> {
    let mut critical: Vec<&CategoryScore> = category_scores
        .iter()
        .filter(|c| c.percentage < CRITICAL_CATEGORY && c.weight >= HIGH_PRIORITY_WEIGHT)
        .collect();
    sort_ascending(&mut critical);
    critical
}

/// The fixed recommendation for a category, or `None` if it has no entry.
pub fn recommendation_for_category_strict(category: &str) -> Option<&'static str> {
    let text = match category {
        "Usabilidade" => {
            "Investir em treinamento e na simplificação da interface para melhorar a usabilidade"
        }
        "Funcionalidades" => {
            "Revisar o backlog de funcionalidades priorizando as necessidades dos gestores de portfólio"
        }
        "Integração" => "Desenvolver integrações automatizadas com os sistemas que mais geram retrabalho",
        "Relatórios e Dashboards" => {
            "Reformular relatórios e dashboards com foco nos indicadores executivos"
        }
        "Desempenho" => "Otimizar o desempenho da ferramenta e monitorar os tempos de resposta",
        "Suporte e Treinamento" => {
            "Estruturar um programa contínuo de suporte e capacitação dos usuários"
        }
        "Satisfação Geral" => {
            "Criar um comitê de usuários para acompanhar a evolução da satisfação"
        }
        _ => return None,
    };
    Some(text)
}

/// Like [`recommendation_for_category_strict`], with a generic text for
/// unmapped categories.
pub fn recommendation_for_category_with_fallback(category: &str) -> String {
    recommendation_for_category_strict(category)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Melhorar os aspectos de {category} conforme a análise detalhada"))
}

fn weak_categories(category_scores: &[CategoryScore]) -> Vec<&CategoryScore> {
    let mut weak: Vec<&CategoryScore> = category_scores
        .iter()
        .filter(|c| c.percentage < WEAK_CATEGORY)
        .collect();
    sort_ascending(&mut weak);
    weak.truncate(MAX_WEAK_NAMED);
    weak
}

fn strong_categories(category_scores: &[CategoryScore]) -> Vec<&CategoryScore> {
    let mut strong: Vec<&CategoryScore> = category_scores
        .iter()
        .filter(|c| c.percentage >= STRONG_CATEGORY)
        .collect();
    sort_ascending(&mut strong);
    strong.reverse();
    strong.truncate(MAX_STRONG_NAMED);
    strong
}

fn sort_ascending(scores: &mut [&CategoryScore]) {
    scores.sort_by(|a, b| {
        a.percentage
            .partial_cmp(&b.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn name_with_percentages(scores: &[&CategoryScore]) -> String {
    scores
        .iter()
        .map(|c| format!("{} ({:.1}%)", c.label, c.percentage))
        .collect::<Vec<_>>()
        .join(", ")
}
