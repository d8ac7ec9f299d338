//! # Esquema de Tags BIO e Decodificação de Sintomas
//!
//! O classificador de tokens rotula cada peça sub-palavra no esquema **BIO**
//! (Beginning-Inside-Outside). Este módulo reconstrói os sintomas completos a
//! partir dessa sequência de rótulos.
//!
//! ## Esquema BIO
//!
//! - `B-TAG`: Begin — primeira peça de um sintoma
//! - `I-TAG`: Inside — peças seguintes do mesmo sintoma
//! - `O`: Outside — não faz parte de nenhum sintoma
//!
//! O nome da categoria (`SYMPTOM`, `SIGN`, ...) vem do `config.json` do modelo
//! e não é interpretado aqui: qualquer `I-*` continua o span aberto.

use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// Limiar padrão de confiança média para aceitar um span do modelo.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;

/// Tag BIO aplicada a um token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    /// **Begin**: início de um sintoma. Ex: **chest** (B-SYMPTOM) pain.
    Begin(String),
    /// **Inside**: continuação. Ex: chest **pain** (I-SYMPTOM).
    Inside(String),
    /// **Outside**: fora de qualquer sintoma.
    Outside,
}

impl Tag {
    /// Representação textual da tag (ex: "B-SYMPTOM", "O")
    pub fn label(&self) -> String {
        match self {
            Tag::Begin(cat) => format!("B-{cat}"),
            Tag::Inside(cat) => format!("I-{cat}"),
            Tag::Outside => "O".to_string(),
        }
    }

    /// Parseia um rótulo do modelo. Rótulos fora do esquema BIO viram `Outside`.
    pub fn from_label(s: &str) -> Self {
        if let Some(cat) = s.strip_prefix("B-") {
            Tag::Begin(cat.to_string())
        } else if let Some(cat) = s.strip_prefix("I-") {
            Tag::Inside(cat.to_string())
        } else {
            Tag::Outside
        }
    }

    /// Categoria desta tag (se for B- ou I-)
    pub fn category(&self) -> Option<&str> {
        match self {
            Tag::Begin(c) | Tag::Inside(c) => Some(c),
            Tag::Outside => None,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Um token com sua tag BIO e a probabilidade softmax da tag escolhida
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedToken {
    pub token: Token,
    pub tag: Tag,
    /// Probabilidade da tag (0.0 a 1.0)
    pub confidence: f64,
}

/// Origem de um sintoma extraído.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Reconhecido pelo classificador de tokens
    Model,
    /// Adicionado pelo motor de regras
    Rule,
}

/// Um sintoma extraído do texto, com confiança e origem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomMention {
    pub symptom: String,
    pub confidence: f64,
    pub source: Source,
}

impl SymptomMention {
    pub fn new(symptom: impl Into<String>, confidence: f64, source: Source) -> Self {
        Self {
            symptom: symptom.into(),
            confidence,
            source,
        }
    }
}

/// Acumulador do span aberto durante a varredura.
#[derive(Default)]
struct OpenSpan {
    pieces: Vec<String>,
    confidences: Vec<f64>,
}

impl OpenSpan {
    fn is_open(&self) -> bool {
        !self.pieces.is_empty()
    }

    fn push(&mut self, piece: &str, confidence: f64) {
        self.pieces.push(piece.to_string());
        self.confidences.push(confidence);
    }

    /// Fecha o span: junta as peças, remove `##` e calcula a confiança média.
    ///
    /// Retorna `None` se o texto ficar vazio ou a média não superar o limiar.
    fn close(&mut self, min_confidence: f64) -> Option<SymptomMention> {
        if !self.is_open() {
            return None;
        }
        let pieces = std::mem::take(&mut self.pieces);
        let confidences = std::mem::take(&mut self.confidences);

        let text = pieces.concat().replace("##", "");
        let text = text.trim();
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;

        if text.is_empty() || mean <= min_confidence {
            return None;
        }
        Some(SymptomMention::new(text, mean, Source::Model))
    }
}

/// Converte uma sequência de tokens classificados (BIO) em sintomas.
///
/// Máquina de estados do esquema BIO:
/// - `B-*` fecha o span aberto (se houver) e inicia um novo.
/// - `I-*` estende o span aberto; sem span aberto é ignorado.
/// - `O` (ou token especial) fecha o span aberto.
///
/// As peças são concatenadas sem espaço, então "chest" + "pain" vira
/// "chestpain"; a forma canônica é recuperada depois por
/// [`crate::rule_based::normalize_symptom`].
///
/// # Exemplo
/// `[B, I, O, B]` -> dois sintomas, o último fechado no fim da entrada.
pub fn decode_spans(tagged: &[TaggedToken], min_confidence: f64) -> Vec<SymptomMention> {
    let mut mentions = Vec::new();
    let mut open = OpenSpan::default();

    for tt in tagged {
        let tag = if tt.token.special { &Tag::Outside } else { &tt.tag };
        match tag {
            Tag::Begin(_) => {
                mentions.extend(open.close(min_confidence));
                open.push(&tt.token.text, tt.confidence);
            }
            Tag::Inside(_) if open.is_open() => {
                open.push(&tt.token.text, tt.confidence);
            }
            _ => {
                mentions.extend(open.close(min_confidence));
            }
        }
    }
    mentions.extend(open.close(min_confidence));

    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(items: &[(&str, &str, f64)]) -> Vec<TaggedToken> {
        items
            .iter()
            .enumerate()
            .map(|(i, (text, label, conf))| TaggedToken {
                token: Token::new(*text, 0, 0, i),
                tag: Tag::from_label(label),
                confidence: *conf,
            })
            .collect()
    }

    #[test]
    fn test_tag_labels() {
        assert_eq!(Tag::Outside.label(), "O");
        assert_eq!(Tag::Begin("SYMPTOM".into()).label(), "B-SYMPTOM");
        assert_eq!(Tag::from_label("I-SYMPTOM"), Tag::Inside("SYMPTOM".into()));
        assert_eq!(Tag::from_label("LABEL_3"), Tag::Outside);
        assert_eq!(Tag::from_label("B-SIGN").category(), Some("SIGN"));
    }

    #[test]
    fn test_decode_joins_word_pieces() {
        let tokens = tagged(&[
            ("i", "O", 0.99),
            ("feel", "O", 0.99),
            ("dizz", "B-SYMPTOM", 0.9),
            ("##iness", "I-SYMPTOM", 0.7),
        ]);
        let spans = decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].symptom, "dizziness");
        assert!((spans[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(spans[0].source, Source::Model);
    }

    #[test]
    fn test_decode_concatenates_words_without_space() {
        let tokens = tagged(&[("chest", "B-SYMPTOM", 0.9), ("pain", "I-SYMPTOM", 0.9)]);
        let spans = decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(spans[0].symptom, "chestpain");
    }

    #[test]
    fn test_begin_closes_previous_span() {
        let tokens = tagged(&[
            ("fever", "B-SYMPTOM", 0.8),
            ("cough", "B-SYMPTOM", 0.6),
            ("and", "O", 0.9),
            ("rash", "B-SYMPTOM", 0.7),
        ]);
        let spans = decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE);
        let names: Vec<&str> = spans.iter().map(|s| s.symptom.as_str()).collect();
        assert_eq!(names, vec!["fever", "cough", "rash"]);
    }

    #[test]
    fn test_inside_without_open_span_is_ignored() {
        let tokens = tagged(&[("pain", "I-SYMPTOM", 0.9), ("now", "O", 0.9)]);
        assert!(decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE).is_empty());
    }

    #[test]
    fn test_inside_continues_any_category() {
        let tokens = tagged(&[("sore", "B-SYMPTOM", 0.9), ("throat", "I-BODY", 0.9)]);
        let spans = decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(spans[0].symptom, "sorethroat");
    }

    #[test]
    fn test_low_confidence_span_is_dropped() {
        let tokens = tagged(&[
            ("itching", "B-SYMPTOM", 0.3),
            ("rash", "B-SYMPTOM", 0.1),
            ("##es", "I-SYMPTOM", 0.2),
            ("fever", "B-SYMPTOM", 0.31),
        ]);
        let spans = decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE);
        // confiança 0.3 não supera o limiar estrito
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].symptom, "fever");
    }

    #[test]
    fn test_special_tokens_close_span() {
        let mut tokens = tagged(&[
            ("[CLS]", "O", 0.99),
            ("cough", "B-SYMPTOM", 0.9),
            ("[SEP]", "I-SYMPTOM", 0.9),
        ]);
        tokens[0].token.special = true;
        tokens[2].token.special = true;
        let spans = decode_spans(&tokens, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].symptom, "cough");
    }

    #[test]
    fn test_empty_input() {
        assert!(decode_spans(&[], DEFAULT_MIN_CONFIDENCE).is_empty());
    }
}
