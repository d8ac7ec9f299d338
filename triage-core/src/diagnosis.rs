//! # Mapeamento Sintoma → Doença
//!
//! Cada sintoma extraído vota nas doenças da base de conhecimento. O casamento
//! é por substring nos dois sentidos ("pain in chest" não casa, mas "chest
//! pain" casa com "severe chest pain" e vice-versa). As regras de reserva só
//! são consultadas para sintomas sem nenhuma entrada principal.

use serde::{Deserialize, Serialize, Serializer};

use crate::knowledge::{care, FALLBACK_RULES, SYMPTOM_TO_DISEASE};

/// Placeholder devolvido quando nenhum sintoma casa com a base.
pub const GENERAL_CHECKUP: &str = "General check-up recommended";

/// Máximo de dicas de cuidado por resposta
const MAX_CARE_TIPS: usize = 5;

/// Uma doença candidata e sua pontuação acumulada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseScore {
    pub name: String,
    /// Contagem de votos dos sintomas; a análise combinada soma também as
    /// probabilidades da imagem. Valores inteiros saem como inteiros no JSON.
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
}

fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if score.fract() == 0.0 && *score >= 0.0 && *score <= u32::MAX as f64 {
        serializer.serialize_u32(*score as u32)
    } else {
        serializer.serialize_f64(*score)
    }
}

/// Acumulador que preserva a ordem de primeira inserção (usada no desempate).
#[derive(Debug, Default)]
pub struct DiseaseTally {
    entries: Vec<DiseaseScore>,
}

impl DiseaseTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, amount: f64) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.score += amount,
            None => self.entries.push(DiseaseScore {
                name: name.to_string(),
                score: amount,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordena por pontuação decrescente; empates mantêm a ordem de inserção.
    pub fn into_ranked(mut self) -> Vec<DiseaseScore> {
        self.entries
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        self.entries
    }
}

fn overlaps(symptom: &str, key: &str) -> bool {
    key.contains(symptom) || symptom.contains(key)
}

/// Pontua as doenças candidatas para a lista de sintomas.
pub fn score_diseases(symptoms: &[String]) -> Vec<DiseaseScore> {
    let mut tally = DiseaseTally::new();

    for symptom in symptoms {
        let lower = symptom.to_lowercase();
        let mut matched = false;

        for (key, diseases) in SYMPTOM_TO_DISEASE {
            if overlaps(&lower, key) {
                for disease in *diseases {
                    tally.add(disease, 1.0);
                }
                matched = true;
            }
        }

        if !matched {
            for (key, diseases) in FALLBACK_RULES {
                if overlaps(&lower, key) {
                    for disease in *diseases {
                        tally.add(disease, 1.0);
                    }
                }
            }
        }
    }

    if tally.is_empty() {
        tally.add(GENERAL_CHECKUP, 1.0);
    }

    tally.into_ranked()
}

/// Gera até cinco dicas de cuidado a partir dos sintomas.
pub fn care_tips(symptoms: &[String]) -> Vec<String> {
    let has_any = |group: &[&str]| symptoms.iter().any(|s| group.contains(&s.as_str()));
    let mut tips: Vec<&str> = Vec::new();

    if has_any(&["fever", "cough", "sore throat"]) {
        tips.push(care::HYDRATION);
        tips.push(care::REST);
    }
    if has_any(&["stomach pain", "nausea", "vomiting"]) {
        tips.push("Eat bland foods (BRAT diet: bananas, rice, applesauce, toast)");
        tips.push("Avoid spicy, fatty, or heavy foods");
    }
    if has_any(&["headache", "migraine"]) {
        tips.push("Rest in a quiet, dark room");
        tips.push("Apply cold or warm compress to head or neck");
    }
    if has_any(&["cough", "congestion"]) {
        tips.push("Use a humidifier to add moisture to the air");
    }
    tips.push(care::MONITORING);

    tips.into_iter().take(MAX_CARE_TIPS).map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vote_counts_serialize_as_integers() {
        let votes = DiseaseScore { name: "flu".into(), score: 2.0 };
        assert_eq!(serde_json::to_value(&votes).unwrap(), json!({"name": "flu", "score": 2}));

        let weighted = DiseaseScore { name: "Acne".into(), score: 1.8 };
        assert_eq!(serde_json::to_value(&weighted).unwrap()["score"], json!(1.8));

        let back: DiseaseScore = serde_json::from_value(json!({"name": "flu", "score": 2})).unwrap();
        assert_eq!(back, votes);
    }

    #[test]
    fn test_shared_diseases_rank_first() {
        let diseases = score_diseases(&strings(&["fever", "headache"]));
        // "flu" aparece nas duas entradas
        assert_eq!(diseases[0].name, "flu");
        assert_eq!(diseases[0].score, 2.0);
        // empates mantêm a ordem de inserção
        assert_eq!(diseases[1].name, "dengue");
        assert_eq!(diseases[2].name, "malaria");
    }

    #[test]
    fn test_substring_match_both_directions() {
        // "pain" está contido em várias chaves
        let diseases = score_diseases(&strings(&["pain"]));
        assert!(diseases.iter().any(|d| d.name == "angina"));
        assert!(diseases.iter().any(|d| d.name == "sciatica"));

        // "severe chest pain" contém a chave "chest pain"
        let diseases = score_diseases(&strings(&["Severe Chest Pain"]));
        assert_eq!(diseases[0].name, "angina");
    }

    #[test]
    fn test_fallback_only_when_no_primary_match() {
        let diseases = score_diseases(&strings(&["night sweats"]));
        assert_eq!(diseases[0].name, "tuberculosis");
        assert_eq!(diseases.len(), 4);

        // "ear pain" não casa com nenhuma chave principal
        let diseases = score_diseases(&strings(&["ear pain"]));
        assert_eq!(diseases[0].name, "ear infection");
    }

    #[test]
    fn test_no_match_yields_checkup() {
        let diseases = score_diseases(&strings(&["xyzzy"]));
        assert_eq!(diseases, vec![DiseaseScore { name: GENERAL_CHECKUP.into(), score: 1.0 }]);
        assert_eq!(score_diseases(&[])[0].name, GENERAL_CHECKUP);
    }

    #[test]
    fn test_care_tips_capped_at_five() {
        let tips = care_tips(&strings(&["fever", "nausea", "headache", "cough"]));
        assert_eq!(tips.len(), 5);
        assert_eq!(tips[0], care::HYDRATION);
        assert!(!tips.contains(&care::MONITORING.to_string()));
    }

    #[test]
    fn test_care_tips_always_monitoring() {
        let tips = care_tips(&[]);
        assert_eq!(tips, vec![care::MONITORING.to_string()]);

        let tips = care_tips(&strings(&["congestion"]));
        assert_eq!(tips.len(), 2);
        assert_eq!(tips[1], care::MONITORING);
    }
}
