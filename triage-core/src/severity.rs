//! # Avaliação de Gravidade
//!
//! Classifica o caso em quatro níveis. As verificações são feitas em ordem de
//! prioridade e a primeira que casar decide o nível:
//!
//! 1. palavras-chave de emergência no texto;
//! 2. sintomas extraídos que contêm um sintoma de emergência;
//! 3. palavras-chave urgentes no texto;
//! 4. doenças candidatas (emergência ou urgência, na ordem do ranking);
//! 5. palavras-chave moderadas no texto;
//! 6. qualquer sintoma → moderado; nenhum → leve.

use serde::{Deserialize, Serialize};

use crate::diagnosis::DiseaseScore;

/// Nível de gravidade da triagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Risco de vida: atendimento de emergência imediato
    Emergency,
    /// Atendimento médico em até 24 horas
    Urgent,
    /// Avaliação médica em breve
    Moderate,
    /// Pode ser acompanhado em casa
    Mild,
}

impl Severity {
    /// Todos os níveis, do mais grave ao mais leve
    pub const ALL: [Severity; 4] = [
        Severity::Emergency,
        Severity::Urgent,
        Severity::Moderate,
        Severity::Mild,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Emergency => "emergency",
            Severity::Urgent => "urgent",
            Severity::Moderate => "moderate",
            Severity::Mild => "mild",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Severity::Emergency => "Life-threatening conditions requiring immediate emergency care",
            Severity::Urgent => "Serious conditions requiring medical attention within 24 hours",
            Severity::Moderate => "Conditions that should be evaluated by a healthcare provider soon",
            Severity::Mild => "Minor conditions that can be monitored at home",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const EMERGENCY_KEYWORDS: &[&str] = &[
    "heart attack", "heartattack", "cardiac arrest",
    "chest pain", "severe chest pain",
    "can't breathe", "difficulty breathing", "can't speak",
    "stroke", "seizure", "unconscious", "passed out",
    "severe bleeding", "loss of consciousness",
];

const EMERGENCY_SYMPTOMS: &[&str] = &[
    "heart attack", "stroke", "difficulty breathing", "severe bleeding", "fainting", "seizure",
];

const URGENT_KEYWORDS: &[&str] = &[
    "high fever", "fever 103", "fever 104",
    "severe pain", "blood in urine", "blood in stool",
    "severe vomiting", "severe headache",
];

const EMERGENCY_DISEASES: &[&str] = &["heart attack", "stroke", "sepsis", "anaphylaxis"];

const URGENT_DISEASES: &[&str] = &["appendicitis", "pneumonia", "kidney stone"];

const MODERATE_KEYWORDS: &[&str] = &[
    "fever", "cough", "sore throat", "headache",
    "stomach pain", "nausea", "vomiting", "diarrhea",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Avalia a gravidade de uma triagem por texto.
pub fn assess(text: &str, symptoms: &[String], diseases: &[DiseaseScore]) -> Severity {
    let text_lower = text.to_lowercase();

    if contains_any(&text_lower, EMERGENCY_KEYWORDS) {
        return Severity::Emergency;
    }

    if symptoms
        .iter()
        .any(|s| contains_any(&s.to_lowercase(), EMERGENCY_SYMPTOMS))
    {
        return Severity::Emergency;
    }

    if contains_any(&text_lower, URGENT_KEYWORDS) {
        return Severity::Urgent;
    }

    for disease in diseases {
        let name = disease.name.to_lowercase();
        if contains_any(&name, EMERGENCY_DISEASES) {
            return Severity::Emergency;
        }
        if contains_any(&name, URGENT_DISEASES) {
            return Severity::Urgent;
        }
    }

    if contains_any(&text_lower, MODERATE_KEYWORDS) || !symptoms.is_empty() {
        return Severity::Moderate;
    }

    Severity::Mild
}

/// Gravidade de uma lesão de pele a partir da classe mais provável.
///
/// Só produz `Urgent`, `Moderate` ou `Mild`.
pub fn assess_skin(top_disease: &str) -> Severity {
    let name = top_disease.to_lowercase();
    if contains_any(&name, &["melanoma", "carcinoma", "cancer"]) {
        Severity::Urgent
    } else if contains_any(&name, &["eczema", "dermatitis", "psoriasis", "fungal"]) {
        Severity::Moderate
    } else {
        Severity::Mild
    }
}

/// Recomendações da triagem por imagem (dermatologia).
pub fn skin_recommendations(severity: Severity) -> &'static [&'static str] {
    match severity {
        Severity::Emergency | Severity::Urgent => &[
            "⚠️ Consult a dermatologist immediately",
            "This condition requires professional medical evaluation",
            "Do not delay seeking medical care",
            "Bring this image to your appointment",
        ],
        Severity::Moderate => &[
            "📅 Schedule an appointment with a dermatologist",
            "Monitor the affected area for changes",
            "Avoid scratching or irritating the area",
            "Take photos to track progression",
        ],
        Severity::Mild => &[
            "👀 Monitor the condition",
            "Consult a dermatologist if symptoms worsen",
            "Keep the area clean and moisturized",
            "Document any changes with photos",
        ],
    }
}

/// Dicas de cuidado para a lesão mais provável.
pub fn skin_care_tips(top_disease: &str) -> &'static [&'static str] {
    let name = top_disease.to_lowercase();
    if name.contains("eczema") || name.contains("dermatitis") {
        &[
            "Keep skin moisturized with fragrance-free lotions",
            "Avoid known triggers (soaps, detergents, allergens)",
            "Use lukewarm water for bathing",
            "Wear soft, breathable fabrics",
        ]
    } else if name.contains("psoriasis") {
        &[
            "Moisturize regularly to prevent dryness",
            "Avoid stress which can trigger flare-ups",
            "Limit alcohol consumption",
            "Get adequate sunlight (but avoid sunburn)",
        ]
    } else if name.contains("fungal") || name.contains("ringworm") {
        &[
            "Keep affected area clean and dry",
            "Use antifungal cream as directed",
            "Wash clothing and bedding in hot water",
            "Avoid sharing personal items",
        ]
    } else {
        &[
            "Keep the area clean",
            "Avoid excessive sun exposure",
            "Monitor for changes in size, color, or texture",
            "Consult a dermatologist for proper diagnosis",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disease(name: &str) -> DiseaseScore {
        DiseaseScore {
            name: name.to_string(),
            score: 1.0,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_emergency_keyword_in_text() {
        assert_eq!(
            assess("I have severe CHEST PAIN since morning", &[], &[]),
            Severity::Emergency
        );
        assert_eq!(assess("my dad passed out", &[], &[]), Severity::Emergency);
    }

    #[test]
    fn test_emergency_symptom_substring() {
        let symptoms = strings(&["fainting"]);
        assert_eq!(assess("felt weird", &symptoms, &[]), Severity::Emergency);
    }

    #[test]
    fn test_urgent_keyword_before_diseases() {
        let diseases = vec![disease("heart attack")];
        // palavra-chave urgente no texto vence a doença de emergência
        assert_eq!(
            assess("high fever all night", &strings(&["fever"]), &diseases),
            Severity::Urgent
        );
    }

    #[test]
    fn test_disease_order_decides() {
        let diseases = vec![disease("pneumonia"), disease("sepsis")];
        assert_eq!(assess("feeling unwell", &[], &diseases), Severity::Urgent);

        let diseases = vec![disease("sepsis"), disease("pneumonia")];
        assert_eq!(assess("feeling unwell", &[], &diseases), Severity::Emergency);
    }

    #[test]
    fn test_moderate_and_mild() {
        assert_eq!(assess("a bit of nausea", &[], &[]), Severity::Moderate);
        assert_eq!(assess("something", &strings(&["rash"]), &[]), Severity::Moderate);
        assert_eq!(assess("just checking in", &[], &[]), Severity::Mild);
    }

    #[test]
    fn test_skin_severity() {
        assert_eq!(assess_skin("Melanoma Skin Cancer Nevi and Moles"), Severity::Urgent);
        assert_eq!(assess_skin("Atopic Dermatitis"), Severity::Moderate);
        assert_eq!(assess_skin("Warts Molluscum"), Severity::Mild);
        assert_eq!(assess_skin(""), Severity::Mild);
    }

    #[test]
    fn test_skin_tips_by_condition() {
        assert_eq!(skin_care_tips("Tinea Ringworm")[1], "Use antifungal cream as directed");
        assert_eq!(skin_care_tips("Psoriasis")[2], "Limit alcohol consumption");
        assert_eq!(skin_care_tips("Acne")[0], "Keep the area clean");
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Urgent).unwrap(), "\"urgent\"");
        assert_eq!(Severity::Mild.to_string(), "mild");
    }
}
