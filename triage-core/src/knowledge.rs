//! # Base de Conhecimento Médico
//!
//! Tabelas estáticas escritas à mão: sintoma → doenças candidatas, regras de
//! reserva, palavras-chave por nível de gravidade, recomendações e dicas de
//! cuidado. A ordem das tabelas é observável (desempates e listagens), por isso
//! elas são slices e não mapas.

use std::collections::BTreeSet;

use crate::severity::Severity;

/// Sintomas principais e as doenças associadas a cada um.
pub const SYMPTOM_TO_DISEASE: &[(&str, &[&str])] = &[
    ("skin rash", &["eczema", "allergic reaction", "psoriasis", "dermatitis"]),
    ("itching", &["allergic reaction", "scabies", "eczema", "fungal infection"]),
    ("burning sensation", &["infection", "dermatitis", "neuropathy", "UTI"]),
    ("fever", &["flu", "dengue", "malaria", "COVID-19", "bacterial infection"]),
    ("headache", &["migraine", "flu", "sinusitis", "tension headache", "cluster headache"]),
    ("cough", &["common cold", "bronchitis", "pneumonia", "asthma", "COVID-19"]),
    ("chest pain", &["angina", "heart attack", "acid reflux", "pneumonia", "anxiety"]),
    ("bloated", &["indigestion", "IBS", "gastric issue", "food intolerance"]),
    ("stomach pain", &["ulcer", "food poisoning", "gastritis", "appendicitis", "IBS"]),
    ("dizziness", &["low blood pressure", "vertigo", "dehydration", "anemia", "inner ear problem"]),
    ("fatigue", &["anemia", "thyroid issue", "chronic fatigue syndrome", "depression", "sleep apnea"]),
    ("sore throat", &["pharyngitis", "tonsillitis", "common cold", "strep throat"]),
    ("back pain", &["muscle strain", "sciatica", "kidney stone", "herniated disc"]),
    ("joint pain", &["arthritis", "gout", "injury", "lupus", "fibromyalgia"]),
    ("difficulty breathing", &["asthma", "pneumonia", "anxiety", "COPD", "heart failure"]),
    ("nausea", &["food poisoning", "pregnancy", "migraine", "gastritis", "motion sickness"]),
    ("vomiting", &["food poisoning", "gastroenteritis", "migraine", "appendicitis"]),
    ("diarrhea", &["food poisoning", "gastroenteritis", "IBS", "infection"]),
    ("constipation", &["IBS", "dehydration", "medication side effect", "thyroid disorder"]),
    ("runny nose", &["common cold", "allergic rhinitis", "sinusitis", "flu"]),
    ("congestion", &["sinusitis", "common cold", "allergies", "deviated septum"]),
    ("muscle pain", &["flu", "fibromyalgia", "overexertion", "vitamin D deficiency"]),
    ("weakness", &["anemia", "thyroid disorder", "vitamin deficiency", "chronic illness"]),
    ("chills", &["fever", "infection", "hypothermia", "sepsis"]),
    ("sweating", &["fever", "hyperthyroidism", "menopause", "anxiety"]),
    ("weight loss", &["diabetes", "hyperthyroidism", "cancer", "depression", "malabsorption"]),
    ("weight gain", &["hypothyroidism", "PCOS", "cushing syndrome", "medication side effect"]),
    ("loss of appetite", &["liver disease", "stomach infection", "stress", "depression", "cancer"]),
    ("heart attack", &["coronary artery disease", "cardiac arrest", "myocardial infarction"]),
    ("fainting", &["low blood pressure", "dehydration", "heart condition", "vasovagal syncope"]),
    ("confusion", &["dementia", "delirium", "infection", "stroke", "medication side effect"]),
    ("bleeding", &["injury", "hemorrhoids", "ulcer", "clotting disorder"]),
    ("swelling", &["injury", "infection", "heart failure", "kidney disease", "allergic reaction"]),
];

/// Regras consultadas só quando nenhum sintoma principal casou.
pub const FALLBACK_RULES: &[(&str, &[&str])] = &[
    ("night sweats", &["tuberculosis", "lymphoma", "infection", "menopause"]),
    ("rapid heartbeat", &["anxiety", "hyperthyroidism", "arrhythmia", "anemia"]),
    ("pale skin", &["anemia", "shock", "poor circulation"]),
    ("ear pain", &["ear infection", "sinus infection", "TMJ disorder"]),
    ("eye pain", &["glaucoma", "eye infection", "migraine", "eye strain"]),
];

/// Palavras-chave de referência por nível (publicadas em `/severity_levels`).
pub const SEVERITY_RULES: &[(Severity, &[&str])] = &[
    (
        Severity::Emergency,
        &[
            "chest pain", "heart attack", "stroke", "seizure", "unconscious",
            "difficulty breathing", "severe bleeding", "severe allergic reaction",
            "sudden severe headache", "loss of consciousness", "confusion with fever",
            "inability to speak", "sudden vision loss", "severe abdominal pain",
        ],
    ),
    (
        Severity::Urgent,
        &[
            "high fever", "persistent vomiting", "severe dehydration", "severe pain",
            "blood in urine", "blood in stool", "severe diarrhea",
            "fainting", "suspected appendicitis", "infected wound",
        ],
    ),
    (
        Severity::Moderate,
        &[
            "fever", "headache", "stomach pain", "nausea",
            "vomiting", "dizziness", "rash", "persistent cough",
            "sore throat", "ear pain", "back pain",
        ],
    ),
    (
        Severity::Mild,
        &[
            "cold", "cough", "tired", "fatigue", "mild joint pain",
            "runny nose", "congestion", "mild headache",
        ],
    ),
];

/// Dicas gerais de cuidado, por chave.
pub mod care {
    pub const HYDRATION: &str = "Drink plenty of fluids (water, clear broths, herbal tea)";
    pub const REST: &str = "Get adequate sleep and rest to help your body recover";
    pub const MONITORING: &str = "Keep a symptom diary to track changes and patterns";
}

/// Recomendações para um nível de gravidade da triagem por texto.
pub fn recommendations(severity: Severity) -> &'static [&'static str] {
    match severity {
        Severity::Emergency => &[
            "🚨 SEEK IMMEDIATE EMERGENCY CARE",
            "Call 911 or go to the nearest emergency room",
            "Do NOT drive yourself - call an ambulance",
            "Do not delay - this could be life-threatening",
            "Have someone stay with you until help arrives",
        ],
        Severity::Urgent => &[
            "⚠️ Seek medical attention within 24 hours",
            "Contact your healthcare provider immediately",
            "Consider going to urgent care if doctor unavailable",
            "Monitor symptoms closely and seek emergency care if they worsen",
            "Do not ignore these symptoms",
        ],
        Severity::Moderate => &[
            "📅 Schedule an appointment with your healthcare provider",
            "Monitor symptoms and seek immediate care if they worsen",
            "Stay hydrated and get adequate rest",
            "Keep track of symptom progression",
            "Consider over-the-counter remedies if appropriate",
        ],
        Severity::Mild => &[
            "👀 Monitor symptoms for changes",
            "Ensure adequate rest and hydration",
            "Consider over-the-counter remedies if appropriate",
            "Consult healthcare provider if symptoms persist beyond 7-10 days",
            "Practice good self-care and hygiene",
        ],
    }
}

/// Sintomas reconhecidos (principais + reserva), em ordem alfabética.
pub fn known_symptoms() -> Vec<&'static str> {
    let mut all: Vec<&'static str> = SYMPTOM_TO_DISEASE
        .iter()
        .chain(FALLBACK_RULES)
        .map(|(symptom, _)| *symptom)
        .collect();
    all.sort_unstable();
    all
}

/// Doenças presentes na base, sem repetição e em ordem alfabética.
pub fn known_diseases() -> Vec<&'static str> {
    SYMPTOM_TO_DISEASE
        .iter()
        .chain(FALLBACK_RULES)
        .flat_map(|(_, diseases)| diseases.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Total de pares sintoma→doença na tabela principal.
pub fn total_disease_mappings() -> usize {
    SYMPTOM_TO_DISEASE.iter().map(|(_, diseases)| diseases.len()).sum()
}
