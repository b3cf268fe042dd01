use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, LoadError, Result};
use crate::kv_store::KeyValueStore;
use crate::models::{AnalysisType, CategoryWeightEntry, WeightEntry};

/// Namespace key of the persisted snapshot.
pub const WEIGHTS_KEY: &str = "ppm-weights-config";

pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 5;

/// Full content of a registry, as exported and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightSnapshot {
    pub question_weights: Vec<WeightEntry>,
    pub category_weights: Vec<CategoryWeightEntry>,
}

impl WeightSnapshot {
    pub fn defaults() -> Self {
        use AnalysisType::*;

        let question = |id: &str, weight: u8, category: &str, analysis_type: AnalysisType| {
            WeightEntry {
                question_id: id.to_string(),
                weight,
                category: category.to_string(),
                analysis_type,
            }
        };
        let category = |name: &str, weight: u8, description: &str| CategoryWeightEntry {
            category: name.to_string(),
            weight,
            description: description.to_string(),
        };

        let mut snapshot = Self {
            question_weights: vec![
                question("f1_cargo", 1, "Perfil", Demographic),
                question("f1_departamento", 1, "Perfil", Demographic),
                question("f1_experiencia_ppm", 2, "Perfil", Demographic),
                question("f1_ferramentas_atuais", 2, "Uso da Ferramenta", Usage),
                question("f1_frequencia_uso", 3, "Uso da Ferramenta", Usage),
                question("f1_ferramenta_legada", 1, "Uso da Ferramenta", Usage),
                question("f1_usa_relatorios", 3, "Relatórios e Dashboards", Usage),
                question("f2_satisfacao_geral", 5, "Satisfação Geral", Satisfaction),
                question("f2_recomendaria", 4, "Satisfação Geral", Satisfaction),
                question("f2_comentarios", 1, "Satisfação Geral", Satisfaction),
                question("f2_facilidade_uso", 4, "Usabilidade", Satisfaction),
                question("f2_interface_intuitiva", 3, "Usabilidade", Satisfaction),
                question("f2_funcionalidades_atendem", 5, "Funcionalidades", Functionality),
                question("f2_gestao_recursos", 4, "Funcionalidades", Functionality),
                question("f2_relatorios_qualidade", 4, "Relatórios e Dashboards", Functionality),
                question("f2_desempenho", 3, "Desempenho", Satisfaction),
                question("f3_integracao_atual", 5, "Integração", Integration),
                question("f3_sistemas_integrar", 3, "Integração", Integration),
                question("f3_qualidade_integracao", 4, "Integração", Integration),
                question("f3_funcionalidades_desejadas", 2, "Funcionalidades", Functionality),
                question("f3_suporte_treinamento", 3, "Suporte e Treinamento", Usage),
                question("f3_prioridade_melhoria", 2, "Suporte e Treinamento", Usage),
                question("f3_sugestoes", 1, "Suporte e Treinamento", Usage),
            ],
            category_weights: vec![
                category("Satisfação Geral", 5, "Percepção geral e disposição para recomendar"),
                category("Usabilidade", 5, "Facilidade de uso e clareza da interface"),
                category("Funcionalidades", 5, "Aderência das funcionalidades às necessidades"),
                category("Integração", 4, "Integração com os demais sistemas corporativos"),
                category("Relatórios e Dashboards", 4, "Qualidade e uso dos relatórios"),
                category("Desempenho", 3, "Velocidade e estabilidade da ferramenta"),
                category("Uso da Ferramenta", 3, "Frequência e abrangência de uso"),
                category("Suporte e Treinamento", 3, "Suporte, treinamento e prioridades"),
                category("Perfil", 1, "Perfil do respondente"),
            ],
        };
        snapshot.sort_entries();
        snapshot
    }

    /// Orders entries by question id and category name, the order the
    /// registry exports them in.
    fn sort_entries(&mut self) {
        self.question_weights
            .sort_by(|a, b| a.question_id.cmp(&b.question_id));
        self.category_weights.sort_by(|a, b| a.category.cmp(&b.category));
    }

    /// Checks weight ranges and key uniqueness.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut questions = BTreeSet::new();
        for entry in self.question_weights.iter() {
            check_weight(entry.weight, &entry.question_id)?;
            if !questions.insert(entry.question_id.as_str()) {
                return Err(format!("duplicate question weight {}", entry.question_id));
            }
        }
        let mut categories = BTreeSet::new();
        for entry in self.category_weights.iter() {
            check_weight(entry.weight, &entry.category)?;
            if !categories.insert(entry.category.as_str()) {
                return Err(format!("duplicate category weight {}", entry.category));
            }
        }
        Ok(())
    }
}

fn check_weight(weight: u8, key: &str) -> std::result::Result<(), String> {
    if (MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
        Ok(())
    } else {
        Err(format!(
            "weight {weight} for {key} is outside {MIN_WEIGHT}..={MAX_WEIGHT}"
        ))
    }
}

/// Reads the persisted snapshot from a store.
pub fn load_snapshot<S: KeyValueStore>(store: &S) -> std::result::Result<WeightSnapshot, LoadError> {
    let raw = match store.get(WEIGHTS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Err(LoadError::Missing(WEIGHTS_KEY.to_string())),
        Err(Error::Io(err)) => return Err(LoadError::Io(err)),
        Err(err) => return Err(LoadError::Invalid(err.to_string())),
    };
    let snapshot: WeightSnapshot = serde_json::from_str(&raw)?;
    snapshot.validate().map_err(LoadError::Invalid)?;
    Ok(snapshot)
}

/// Question and category weights. Every mutation persists the full snapshot
/// under [`WEIGHTS_KEY`].
pub struct WeightRegistry<S: KeyValueStore> {
    store: S,
    questions: BTreeMap<String, WeightEntry>,
    categories: BTreeMap<String, CategoryWeightEntry>,
}

impl<S: KeyValueStore> WeightRegistry<S> {
    /// Loads the persisted snapshot, or the defaults when there is none or it
    /// cannot be used.
    pub fn open(store: S) -> Self {
        let snapshot = match load_snapshot(&store) {
            Ok(snapshot) => {
                info!(
                    "loaded {} question weights and {} category weights",
                    snapshot.question_weights.len(),
                    snapshot.category_weights.len()
                );
                snapshot
            }
            Err(LoadError::Missing(key)) => {
                info!("no persisted weights under {key}, using defaults");
                WeightSnapshot::defaults()
            }
            Err(err) => {
                warn!("ignoring persisted weights: {err}; using defaults");
                WeightSnapshot::defaults()
            }
        };
        Self::from_snapshot(store, snapshot)
    }

    /// Builds a registry from an explicit snapshot without touching the store.
    pub fn from_snapshot(store: S, snapshot: WeightSnapshot) -> Self {
        let mut registry = Self {
            store,
            questions: BTreeMap::new(),
            categories: BTreeMap::new(),
        };
        registry.replace(snapshot);
        registry
    }

    pub fn question_weight(&self, question_id: &str) -> Option<&WeightEntry> {
        self.questions.get(question_id)
    }

    pub fn category_weight(&self, category: &str) -> Option<&CategoryWeightEntry> {
        self.categories.get(category)
    }

    pub fn question_weights(&self) -> impl Iterator<Item = &WeightEntry> {
        self.questions.values()
    }

    pub fn category_weights(&self) -> impl Iterator<Item = &CategoryWeightEntry> {
        self.categories.values()
    }

    pub fn question_weights_for_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a WeightEntry> + 'a {
        self.questions.values().filter(move |e| e.category == category)
    }

    pub fn question_weights_for_analysis(
        &self,
        analysis_type: AnalysisType,
    ) -> impl Iterator<Item = &WeightEntry> + '_ {
        self.questions
            .values()
            .filter(move |e| e.analysis_type == analysis_type)
    }

    /// Distinct categories referenced by at least one question weight.
    pub fn categories(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.questions.values().map(|e| e.category.as_str()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn upsert_question_weight(&mut self, entry: WeightEntry) -> Result<()> {
        check_weight(entry.weight, &entry.question_id).map_err(Error::InvalidInput)?;
        debug!("upsert question weight {} = {}", entry.question_id, entry.weight);
        self.questions.insert(entry.question_id.clone(), entry);
        self.persist()
    }

    pub fn upsert_category_weight(&mut self, entry: CategoryWeightEntry) -> Result<()> {
        check_weight(entry.weight, &entry.category).map_err(Error::InvalidInput)?;
        debug!("upsert category weight {} = {}", entry.category, entry.weight);
        self.categories.insert(entry.category.clone(), entry);
        self.persist()
    }

    /// Removes a question weight; returns the removed entry, if any.
    pub fn remove(&mut self, question_id: &str) -> Result<Option<WeightEntry>> {
        let removed = self.questions.remove(question_id);
        self.persist()?;
        Ok(removed)
    }

    pub fn export_all(&self) -> WeightSnapshot {
        WeightSnapshot {
            question_weights: self.questions.values().cloned().collect(),
            category_weights: self.categories.values().cloned().collect(),
        }
    }

    /// Replaces the whole registry. An invalid snapshot leaves it untouched.
    pub fn import_all(&mut self, snapshot: WeightSnapshot) -> Result<()> {
        snapshot.validate().map_err(Error::InvalidInput)?;
        self.replace(snapshot);
        self.persist()
    }

    pub fn reset_to_defaults(&mut self) -> Result<()> {
        info!("resetting weights to defaults");
        self.replace(WeightSnapshot::defaults());
        self.persist()
    }

    fn replace(&mut self, snapshot: WeightSnapshot) {
        self.questions = snapshot
            .question_weights
            .into_iter()
            .map(|e| (e.question_id.clone(), e))
            .collect();
        self.categories = snapshot
            .category_weights
            .into_iter()
            .map(|e| (e.category.clone(), e))
            .collect();
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string(&self.export_all())?;
        self.store.set(WEIGHTS_KEY, &json)
    }
}
