//! # Motor de Regras — Normalização e Padrões Regex
//!
//! Complementa o classificador de tokens com conhecimento explícito:
//!
//! - **Normalização**: o modelo junta peças sem espaço ("chestpain"); uma
//!   tabela fixa devolve a forma canônica ("chest pain").
//! - **Aumento por regras**: expressões regulares sobre o texto em minúsculas
//!   recuperam sintomas que o modelo deixou passar ("can't breathe" →
//!   "difficulty breathing").
//!
//! O modelo aprende padrões estatísticos, mas erra em frases raras ou
//! coloquiais; as regras garantem cobertura dos sintomas críticos.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::tagger::{Source, SymptomMention};

/// Confiança padrão atribuída a sintomas encontrados por regra.
pub const DEFAULT_RULE_CONFIDENCE: f64 = 0.75;

/// Formas coladas ou coloquiais → forma canônica.
const NORMALIZATIONS: &[(&str, &str)] = &[
    ("chestpain", "chest pain"),
    ("stomachpain", "stomach pain"),
    ("stomachache", "stomach pain"),
    ("backpain", "back pain"),
    ("throathurts", "sore throat"),
    ("throatpain", "sore throat"),
    ("earache", "ear pain"),
    ("heartattack", "heart attack"),
    ("difficultybreathing", "difficulty breathing"),
    ("coughing", "cough"),
    ("vomiting", "vomiting"),
    ("bleeding", "bleeding"),
    ("fainting", "fainting"),
    ("fainted", "fainting"),
    ("dizzy", "dizziness"),
    ("nausea", "nausea"),
    ("tired", "fatigue"),
    ("weak", "weakness"),
    ("itching", "itching"),
];

/// Padrões de aumento, avaliados nesta ordem.
const ENHANCEMENT_PATTERNS: &[(&str, &str)] = &[
    (r"\bsevere\s+chest\s+pain\b", "chest pain"),
    (r"\bchest\s+pain\b", "chest pain"),
    (r"\bdifficulty\s+breathing\b", "difficulty breathing"),
    (r"\bcan'?t\s+breathe\b", "difficulty breathing"),
    (r"\bshortness\s+of\s+breath\b", "difficulty breathing"),
    (r"\bsore\s+throat\b", "sore throat"),
    (r"\bthroat\s+hurts?\b", "sore throat"),
    (r"\bhigh\s+fever\b", "fever"),
    (r"\bfever\s+of\s+\d+", "fever"),
    (r"\bsevere\s+bleeding\b", "bleeding"),
    (r"\bheart\s+attack\b", "heart attack"),
    (r"\bpassed\s+out\b", "fainting"),
    (r"\bconfus(ed|ion)\b", "confusion"),
    (r"\bstomach\s+pain\b", "stomach pain"),
    (r"\bback\s+pain\b", "back pain"),
    (r"\bfever\b", "fever"),
    (r"\bcough\b", "cough"),
    (r"\bbleeding\b", "bleeding"),
    (r"\bfaint(ed|ing)?\b", "fainting"),
    (r"\bdizz(y|iness)\b", "dizziness"),
    (r"\bnausea\b", "nausea"),
    (r"\bvomit(ing)?\b", "vomiting"),
    (r"\bdiarr?h?oea\b", "diarrhea"),
    (r"\brash\b", "rash"),
    (r"\bswell(ing)?\b", "swelling"),
    (r"\bfatigue\b", "fatigue"),
    (r"\bweak(ness)?\b", "weakness"),
];

/// Palavras que nunca são aceitas como sintoma.
const NON_MEDICAL: &[&str] = &[
    "cricket", "football", "basketball", "ice cream", "pizza", "food",
    "ate", "playing", "game", "working",
];

/// Normaliza um sintoma para sua forma canônica.
///
/// A busca é feita em minúsculas; sintomas fora da tabela voltam inalterados.
pub fn normalize_symptom(symptom: &str) -> String {
    let key = symptom.trim().to_lowercase();
    NORMALIZATIONS
        .iter()
        .find(|(raw, _)| *raw == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| symptom.to_string())
}

/// Um padrão compilado e o sintoma canônico que ele produz
struct EnhancementRule {
    pattern: Regex,
    symptom: &'static str,
}

/// Motor de regras com os padrões de aumento já compilados.
pub struct RuleEngine {
    rules: Vec<EnhancementRule>,
    non_medical: HashSet<&'static str>,
    rule_confidence: f64,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::with_confidence(DEFAULT_RULE_CONFIDENCE)
    }

    /// Cria o motor atribuindo `rule_confidence` a cada sintoma encontrado.
    pub fn with_confidence(rule_confidence: f64) -> Self {
        let rules = ENHANCEMENT_PATTERNS
            .iter()
            .map(|(pattern, symptom)| EnhancementRule {
                pattern: Regex::new(pattern).expect("invalid enhancement pattern"),
                symptom: *symptom,
            })
            .collect();

        Self {
            rules,
            non_medical: NON_MEDICAL.iter().copied().collect(),
            rule_confidence,
        }
    }

    /// Número de padrões de aumento
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Acrescenta aos sintomas do modelo os que as regras encontram no texto.
    ///
    /// Um padrão é ignorado se seu sintoma canônico já foi encontrado (pelo
    /// modelo ou por um padrão anterior). O resultado mantém os sintomas do
    /// modelo primeiro, seguidos dos adicionados por regra.
    pub fn enhance(&self, text: &str, model_mentions: &[SymptomMention]) -> Vec<SymptomMention> {
        let text_lower = text.to_lowercase();
        let mut found: HashSet<String> = model_mentions
            .iter()
            .map(|m| normalize_symptom(&m.symptom).to_lowercase())
            .collect();

        let mut all = model_mentions.to_vec();
        for rule in &self.rules {
            if found.contains(rule.symptom) || self.non_medical.contains(rule.symptom) {
                continue;
            }
            if rule.pattern.is_match(&text_lower) {
                debug!(pattern = rule.pattern.as_str(), symptom = rule.symptom, "regra aplicada");
                all.push(SymptomMention::new(rule.symptom, self.rule_confidence, Source::Rule));
                found.insert(rule.symptom.to_string());
            }
        }
        all
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove sintomas repetidos (sem diferenciar maiúsculas), mantendo a primeira ocorrência.
pub fn dedupe(mentions: Vec<SymptomMention>) -> Vec<SymptomMention> {
    let mut seen = HashSet::new();
    mentions
        .into_iter()
        .filter(|m| seen.insert(m.symptom.to_lowercase()))
        .collect()
}
