//! # Triagem Rápida por Padrões
//!
//! Analisador leve que não usa modelo algum: uma tabela de expressões
//! regulares em três níveis (`high`, `medium`, `low`). Serve como pré-triagem
//! barata e como resposta quando o cliente só precisa de um nível grosseiro.
//!
//! Os níveis são avaliados do mais grave para o mais leve e **cada** padrão
//! que casa sobrescreve o nível, então o último nível com casamento vence;
//! a urgência, por outro lado, fica marcada por qualquer casamento `high`.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Nível grosseiro da triagem rápida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningLevel {
    Low,
    Medium,
    High,
}

/// Tipo de entrada aceito pelo endpoint de triagem rápida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Voice,
    Image,
}

impl std::str::FromStr for InputKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(InputKind::Text),
            "voice" => Ok(InputKind::Voice),
            "image" => Ok(InputKind::Image),
            other => Err(TriageError::UnsupportedInput(other.to_string())),
        }
    }
}

/// Resultado da triagem rápida.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screening {
    pub symptoms: Vec<String>,
    pub severity: ScreeningLevel,
    pub recommendations: Vec<String>,
    pub urgency: bool,
}

const HIGH_PATTERNS: &[(&str, &[&str])] = &[
    (
        r"(chest pain|heart attack|cardiac|stroke|seizure|unconscious|breathing|difficulty breathing)",
        &["Chest Pain", "Cardiac Issues", "Breathing Difficulty"],
    ),
    (r"(severe bleeding|hemorrhage|blood loss|trauma)", &["Severe Bleeding", "Trauma"]),
    (r"(high fever|temperature above|104|40 celsius)", &["High Fever"]),
];

const MEDIUM_PATTERNS: &[(&str, &[&str])] = &[
    (r"(fever|temperature|chills|flu|infection)", &["Fever", "Possible Infection"]),
    (r"(headache|migraine|head pain)", &["Headache"]),
    (r"(nausea|vomiting|stomach|abdominal pain)", &["Digestive Issues", "Nausea"]),
    (r"(dizziness|lightheaded|vertigo)", &["Dizziness"]),
    (r"(rash|skin|itching|allergic)", &["Skin Issues", "Possible Allergic Reaction"]),
];

const LOW_PATTERNS: &[(&str, &[&str])] = &[
    (r"(tired|fatigue|exhausted|sleepy)", &["Fatigue"]),
    (r"(cough|throat|cold|runny nose)", &["Cold Symptoms", "Respiratory Issues"]),
    (r"(muscle pain|ache|soreness)", &["Muscle Pain"]),
    (r"(joint pain|arthritis|stiff)", &["Joint Pain"]),
];

struct ScreeningRule {
    level: ScreeningLevel,
    pattern: Regex,
    symptoms: &'static [&'static str],
}

/// Triagem rápida com a tabela de padrões compilada.
pub struct Screener {
    rules: Vec<ScreeningRule>,
}

impl Screener {
    pub fn new() -> Self {
        let levels = [
            (ScreeningLevel::High, HIGH_PATTERNS),
            (ScreeningLevel::Medium, MEDIUM_PATTERNS),
            (ScreeningLevel::Low, LOW_PATTERNS),
        ];
        let rules = levels
            .iter()
            .flat_map(|(level, patterns)| {
                patterns.iter().map(move |(pattern, symptoms)| ScreeningRule {
                    level: *level,
                    pattern: RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .expect("invalid screening pattern"),
                    symptoms: *symptoms,
                })
            })
            .collect();
        Self { rules }
    }

    /// Triagem de uma entrada tipada.
    ///
    /// Só texto é analisado: voz e imagem exigiriam transcrição ou visão
    /// computacional, que este serviço não oferece nesta rota.
    pub fn screen_input(&self, kind: InputKind, input: &str) -> Result<Screening> {
        match kind {
            InputKind::Text => Ok(self.screen(input)),
            InputKind::Voice => Err(TriageError::UnsupportedInput("voice".to_string())),
            InputKind::Image => Err(TriageError::UnsupportedInput("image".to_string())),
        }
    }

    /// Aplica a tabela de padrões a um texto livre.
    pub fn screen(&self, input: &str) -> Screening {
        let text = input.to_lowercase();
        let mut symptoms: Vec<String> = Vec::new();
        let mut severity = ScreeningLevel::Low;
        let mut urgency = false;

        for rule in &self.rules {
            if rule.pattern.is_match(&text) {
                symptoms.extend(rule.symptoms.iter().map(|s| s.to_string()));
                severity = rule.level;
                if rule.level == ScreeningLevel::High {
                    urgency = true;
                }
            }
        }

        let mut recommendations: Vec<String> = if urgency {
            vec![
                "Seek immediate medical attention",
                "Call emergency services if symptoms worsen",
                "Do not drive yourself to the hospital",
            ]
        } else if severity == ScreeningLevel::Medium {
            vec![
                "Schedule an appointment with your healthcare provider",
                "Monitor symptoms and seek immediate care if they worsen",
                "Stay hydrated and get adequate rest",
            ]
        } else {
            vec![
                "Monitor symptoms for changes",
                "Ensure adequate rest and hydration",
                "Consider over-the-counter remedies if appropriate",
                "Consult healthcare provider if symptoms persist beyond a few days",
            ]
        }
        .into_iter()
        .map(String::from)
        .collect();

        if symptoms.is_empty() {
            symptoms.push("General symptoms requiring evaluation".to_string());
            recommendations.push("Provide more specific symptom details for better analysis".to_string());
        }

        let mut seen = HashSet::new();
        symptoms.retain(|s| seen.insert(s.clone()));

        Screening {
            symptoms,
            severity,
            recommendations,
            urgency,
        }
    }
}

impl Default for Screener {
    fn default() -> Self {
        Self::new()
    }
}
