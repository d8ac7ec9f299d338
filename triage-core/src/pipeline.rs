//! # Pipeline de Triagem — Orquestrador com Eventos Observáveis
//!
//! O pipeline coordena todos os módulos (classificador de tokens, decodificação
//! BIO, regras, base de conhecimento, gravidade) e, no modo streaming, emite um
//! evento por etapa via canal Rust (`mpsc`), permitindo que o servidor
//! WebSocket mostre o progresso da análise ao cliente.
//!
//! ## Fluxo da triagem por texto
//!
//! 1. **Modelo**: classificação BIO de cada token e decodificação dos spans.
//! 2. **Normalização**: "chestpain" → "chest pain".
//! 3. **Regras**: padrões regex recuperam sintomas que o modelo perdeu.
//! 4. **Deduplicação**: primeira ocorrência de cada sintoma (sem caixa).
//! 5. **Diagnóstico**: votação nas doenças da base de conhecimento.
//! 6. **Gravidade**, recomendações e dicas de cuidado.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::diagnosis::{care_tips, score_diseases, DiseaseScore, DiseaseTally};
use crate::error::{Result, TriageError};
use crate::image_model::{self, ImageClassifier, ImagePrediction};
use crate::knowledge;
use crate::rule_based::{dedupe, normalize_symptom, RuleEngine};
use crate::severity::{self, Severity};
use crate::tagger::{decode_spans, SymptomMention};
use crate::text_model::TokenClassifier;

pub const TEXT_DISCLAIMER: &str = "This is an AI-based assessment and not a substitute for professional medical advice. Always consult with a healthcare provider for proper diagnosis and treatment.";
pub const IMAGE_DISCLAIMER: &str = "This is an AI-based screening tool. Always consult a qualified dermatologist for accurate diagnosis and treatment.";
pub const COMBINED_DISCLAIMER: &str = "This combined analysis uses both text and image inputs. Always consult with a healthcare provider.";

/// Peso das probabilidades do classificador de imagens na análise combinada.
const IMAGE_WEIGHT: f64 = 2.0;

/// Contagens da extração híbrida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_symptoms: usize,
    pub model_extracted: usize,
    pub rule_enhanced: usize,
}

/// Resultado da triagem por texto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextReport {
    pub symptoms: Vec<String>,
    pub symptoms_with_confidence: Vec<SymptomMention>,
    pub diseases: Vec<DiseaseScore>,
    pub severity: Severity,
    pub recommendations: Vec<String>,
    pub care_tips: Vec<String>,
    pub extraction_stats: ExtractionStats,
    pub disclaimer: String,
}

/// Resultado da triagem por imagem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    /// Imagens mostram condições, não sintomas: sempre vazio
    pub symptoms: Vec<String>,
    pub diseases: Vec<ImagePrediction>,
    pub severity: Severity,
    pub recommendations: Vec<String>,
    pub care_tips: Vec<String>,
    pub analysis_type: String,
    pub disclaimer: String,
}

/// Quais análises contribuíram para o resultado combinado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSources {
    pub text_analysis: bool,
    pub image_analysis: bool,
}

/// Resultado da triagem combinada (texto + imagem).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedReport {
    pub symptoms: Vec<String>,
    pub diseases: Vec<DiseaseScore>,
    pub severity: Severity,
    pub recommendations: Vec<String>,
    pub care_tips: Vec<String>,
    pub analysis_sources: AnalysisSources,
    pub disclaimer: String,
}

/// Eventos emitidos durante a triagem por texto.
///
/// Cada variante carrega os dados de uma etapa, para que o cliente possa
/// acompanhar o raciocínio passo a passo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: sintomas reconhecidos pelo modelo (já normalizados).
    ModelExtracted {
        symptoms: Vec<SymptomMention>,
        total_tokens: usize,
    },
    /// **Passo 2**: sintomas acrescentados pelas regras.
    RulesApplied { added: Vec<String> },
    /// **Passo 3**: lista final de sintomas após a deduplicação.
    SymptomsFinalized { symptoms: Vec<String> },
    /// **Passo 4**: doenças candidatas pontuadas.
    DiseasesScored { diseases: Vec<DiseaseScore> },
    /// **Passo 5**: nível de gravidade decidido.
    SeverityAssessed { severity: Severity },
    /// **Conclusão**: relatório completo e tempo de processamento.
    Done {
        report: TextReport,
        processing_ms: u64,
    },
    /// **Falha**: a análise não pôde ser concluída.
    Error { message: String },
}

/// Limiares usados pelo pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub min_model_confidence: f64,
    pub image_top_k: usize,
    pub combined_top_k: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        ExtractionConfig::default().into()
    }
}

impl From<ExtractionConfig> for PipelineSettings {
    fn from(config: ExtractionConfig) -> Self {
        Self {
            min_model_confidence: config.min_model_confidence,
            image_top_k: config.image_top_k,
            combined_top_k: config.combined_top_k,
        }
    }
}

/// O pipeline de triagem principal.
///
/// O classificador de texto é obrigatório; o de imagens é opcional e, sem
/// ele, as análises por imagem respondem [`TriageError::ImageModelUnavailable`].
///
/// # Modos de Uso
/// - **Sync**: `analyze_text`, `analyze_image`, `analyze_combined`.
/// - **Streaming**: `analyze_text_streaming` para o WebSocket.
pub struct TriagePipeline {
    text_model: Arc<dyn TokenClassifier>,
    image_model: Option<Arc<dyn ImageClassifier>>,
    rules: RuleEngine,
    settings: PipelineSettings,
}

impl TriagePipeline {
    pub fn new(
        text_model: Arc<dyn TokenClassifier>,
        image_model: Option<Arc<dyn ImageClassifier>>,
        rules: RuleEngine,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            text_model,
            image_model,
            rules,
            settings,
        }
    }

    pub fn text_model(&self) -> &dyn TokenClassifier {
        self.text_model.as_ref()
    }

    pub fn image_model(&self) -> Option<&dyn ImageClassifier> {
        self.image_model.as_deref()
    }

    /// Triagem síncrona de um texto livre.
    pub fn analyze_text(&self, text: &str) -> Result<TextReport> {
        self.run_text(text, &mut |_| {})
    }

    /// Executa a triagem por texto enviando eventos de progresso pelo canal.
    ///
    /// # Fluxo de Eventos
    /// `ModelExtracted` → `RulesApplied` → `SymptomsFinalized` →
    /// `DiseasesScored` → `SeverityAssessed` → `Done` (ou `Error`).
    pub fn analyze_text_streaming(&self, text: &str, tx: mpsc::Sender<PipelineEvent>) {
        let start = Instant::now();
        let result = self.run_text(text, &mut |event| {
            let _ = tx.send(event);
        });
        let final_event = match result {
            Ok(report) => PipelineEvent::Done {
                report,
                processing_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => PipelineEvent::Error {
                message: e.to_string(),
            },
        };
        let _ = tx.send(final_event);
    }

    fn run_text(&self, text: &str, emit: &mut dyn FnMut(PipelineEvent)) -> Result<TextReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TriageError::EmptyText);
        }
        info!(chars = text.len(), "triagem por texto iniciada");

        // === Passo 1: Modelo + normalização ===
        let tagged = self.text_model.classify(text)?;
        let mut model_mentions = decode_spans(&tagged, self.settings.min_model_confidence);
        for mention in &mut model_mentions {
            mention.symptom = normalize_symptom(&mention.symptom);
        }
        let model_symptoms: Vec<String> =
            model_mentions.iter().map(|m| m.symptom.clone()).collect();

        debug!(
            symptoms = ?model_mentions
                .iter()
                .map(|m| format!("{}={:.2}", m.symptom, m.confidence))
                .collect::<Vec<_>>(),
            "modelo extraiu"
        );
        emit(PipelineEvent::ModelExtracted {
            symptoms: model_mentions.clone(),
            total_tokens: tagged.len(),
        });

        // === Passo 2: Regras ===
        let all = self.rules.enhance(text, &model_mentions);
        let rule_added: Vec<String> = all
            .iter()
            .filter(|m| !model_symptoms.contains(&m.symptom))
            .map(|m| m.symptom.clone())
            .collect();
        if !rule_added.is_empty() {
            debug!(added = ?rule_added, "regras adicionaram sintomas");
        }
        emit(PipelineEvent::RulesApplied {
            added: rule_added.clone(),
        });

        // === Passo 3: Deduplicação ===
        let mentions = dedupe(all);
        let symptoms: Vec<String> = mentions.iter().map(|m| m.symptom.clone()).collect();
        info!(symptoms = ?symptoms, "sintomas finais");
        emit(PipelineEvent::SymptomsFinalized {
            symptoms: symptoms.clone(),
        });

        // === Passo 4: Diagnóstico ===
        let diseases = score_diseases(&symptoms);
        emit(PipelineEvent::DiseasesScored {
            diseases: diseases.clone(),
        });

        // === Passo 5: Gravidade ===
        let severity = severity::assess(text, &symptoms, &diseases);
        emit(PipelineEvent::SeverityAssessed { severity });

        Ok(TextReport {
            extraction_stats: ExtractionStats {
                total_symptoms: symptoms.len(),
                model_extracted: model_symptoms.len(),
                rule_enhanced: rule_added.len(),
            },
            care_tips: care_tips(&symptoms),
            recommendations: to_strings(knowledge::recommendations(severity)),
            symptoms,
            symptoms_with_confidence: mentions,
            diseases,
            severity,
            disclaimer: TEXT_DISCLAIMER.to_string(),
        })
    }

    /// Triagem de uma foto de lesão de pele.
    pub fn analyze_image(&self, bytes: &[u8]) -> Result<ImageReport> {
        let model = self
            .image_model
            .as_ref()
            .ok_or(TriageError::ImageModelUnavailable)?;

        let image =
            image_model::decode(bytes).map_err(|e| TriageError::InvalidImage(e.to_string()))?;
        info!(
            width = image.width(),
            height = image.height(),
            "triagem por imagem iniciada"
        );

        let diseases = model.classify(&image, self.settings.image_top_k)?;
        let top_disease = diseases.first().map(|d| d.name.as_str()).unwrap_or("");
        let severity = severity::assess_skin(top_disease);
        info!(top = top_disease, severity = %severity, "imagem classificada");

        Ok(ImageReport {
            symptoms: vec![],
            severity,
            recommendations: to_strings(severity::skin_recommendations(severity)),
            care_tips: to_strings(severity::skin_care_tips(top_disease)),
            diseases,
            analysis_type: "image_based".to_string(),
            disclaimer: IMAGE_DISCLAIMER.to_string(),
        })
    }

    /// Triagem combinando texto e imagem.
    ///
    /// Falhas em qualquer uma das análises são registradas e a análise é
    /// tratada como ausente. Sem modelo de imagem, a imagem é ignorada.
    pub fn analyze_combined(&self, text: Option<&str>, image: Option<&[u8]>) -> Result<CombinedReport> {
        let text = text.filter(|t| !t.is_empty());
        if text.is_none() && image.is_none() {
            return Err(TriageError::MissingInput);
        }

        let text_report = text
            .filter(|t| !t.trim().is_empty())
            .and_then(|t| match self.analyze_text(t) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "falha na análise de texto combinada");
                    None
                }
            });

        let image_report = image
            .filter(|_| self.image_model.is_some())
            .and_then(|bytes| match self.analyze_image(bytes) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "falha na análise de imagem combinada");
                    None
                }
            });

        let mut tally = DiseaseTally::new();
        if let Some(report) = &text_report {
            for disease in &report.diseases {
                tally.add(&disease.name, disease.score);
            }
        }
        if let Some(report) = &image_report {
            for prediction in &report.diseases {
                tally.add(&prediction.name, prediction.confidence * IMAGE_WEIGHT);
            }
        }
        let mut diseases = tally.into_ranked();
        diseases.truncate(self.settings.combined_top_k);

        let analysis_sources = AnalysisSources {
            text_analysis: text_report.is_some(),
            image_analysis: image_report.is_some(),
        };

        let report = match text_report {
            Some(text) => CombinedReport {
                symptoms: text.symptoms,
                diseases,
                severity: text.severity,
                recommendations: text.recommendations,
                care_tips: text.care_tips,
                analysis_sources,
                disclaimer: COMBINED_DISCLAIMER.to_string(),
            },
            None => CombinedReport {
                symptoms: vec![],
                diseases,
                severity: Severity::Moderate,
                recommendations: to_strings(knowledge::recommendations(Severity::Moderate)),
                care_tips: vec![],
                analysis_sources,
                disclaimer: COMBINED_DISCLAIMER.to_string(),
            },
        };
        Ok(report)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
