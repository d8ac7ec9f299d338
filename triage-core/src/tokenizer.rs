//! # Tokenização Sub-palavra do Modelo NER
//!
//! O classificador de tokens foi treinado com um tokenizer WordPiece, então o
//! texto precisa ser segmentado exatamente como no treino. Este módulo apenas
//! envolve o `tokenizer.json` exportado junto com o modelo (crate `tokenizers`)
//! e converte o resultado em [`Token`]s com offsets no texto original.
//!
//! Peças de continuação chegam com o prefixo `##` (ex: "dizz", "##iness");
//! a junção dessas peças em sintomas é feita em [`crate::tagger`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenizers::{Tokenizer, TruncationParams};

use crate::error::{ModelError, ModelResult};

/// Um token sub-palavra produzido pelo tokenizer do modelo.
///
/// Mantém a posição exata no texto original (`start` e `end`, em bytes),
/// para que os spans reconhecidos possam ser destacados pelo cliente.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// Texto da peça, como o tokenizer a devolve (ex: "chest", "##ache", "[CLS]").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Posição sequencial do token na codificação.
    pub index: usize,
    /// Tokens especiais ([CLS], [SEP], [PAD]) nunca fazem parte de um sintoma.
    #[serde(default)]
    pub special: bool,
}

impl Token {
    pub fn new(text: impl Into<String>, start: usize, end: usize, index: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            index,
            special: false,
        }
    }
}

/// Resultado da codificação: tokens e os tensores de entrada do modelo.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub tokens: Vec<Token>,
    pub ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub type_ids: Vec<i64>,
}

impl Encoded {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Wrapper do tokenizer HuggingFace com truncamento configurado.
pub struct WordPieceTokenizer {
    inner: Tokenizer,
}

impl WordPieceTokenizer {
    /// Carrega um `tokenizer.json`; textos com mais de `max_length` tokens são truncados.
    pub fn from_file(path: &Path, max_length: usize) -> ModelResult<Self> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let mut inner = Tokenizer::from_file(path).map_err(|e| ModelError::Load {
            path: path.to_path_buf(),
            message: format!("Failed to load tokenizer: {e}"),
        })?;

        inner
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| ModelError::Load {
                path: path.to_path_buf(),
                message: format!("Failed to configure truncation: {e}"),
            })?;

        Ok(Self { inner })
    }

    /// Codifica um texto adicionando os tokens especiais do modelo.
    pub fn encode(&self, text: &str) -> ModelResult<Encoded> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| ModelError::Inference(format!("Tokenization failed: {e}")))?;

        let special_mask = encoding.get_special_tokens_mask();
        let tokens = encoding
            .get_tokens()
            .iter()
            .zip(encoding.get_offsets())
            .enumerate()
            .map(|(i, (text, &(start, end)))| Token {
                text: text.clone(),
                start,
                end,
                index: i,
                special: special_mask.get(i).copied().unwrap_or(0) == 1,
            })
            .collect();

        let widen = |values: &[u32]| values.iter().map(|&v| v as i64).collect::<Vec<i64>>();

        Ok(Encoded {
            tokens,
            ids: widen(encoding.get_ids()),
            attention_mask: widen(encoding.get_attention_mask()),
            type_ids: widen(encoding.get_type_ids()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// `tokenizer.json` mínimo no formato BERT: normalizador em minúsculas,
    /// pré-tokenização por espaço/pontuação, WordPiece e `[CLS] ... [SEP]`.
    const BERT_TOKENIZER_JSON: &str = r###"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "[PAD]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 1, "content": "[UNK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 2, "content": "[CLS]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 3, "content": "[SEP]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": {"type": "BertNormalizer", "clean_text": true, "handle_chinese_chars": true, "strip_accents": null, "lowercase": true},
        "pre_tokenizer": {"type": "BertPreTokenizer"},
        "post_processor": {"type": "BertProcessing", "sep": ["[SEP]", 3], "cls": ["[CLS]", 2]},
        "decoder": null,
        "model": {
            "type": "WordPiece",
            "unk_token": "[UNK]",
            "continuing_subword_prefix": "##",
            "max_input_chars_per_word": 100,
            "vocab": {
                "[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3,
                "i": 4, "feel": 5, "dizz": 6, "##iness": 7, "fever": 8
            }
        }
    }"###;

    fn bert_tokenizer(max_length: usize) -> (tempfile::NamedTempFile, WordPieceTokenizer) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BERT_TOKENIZER_JSON.as_bytes()).unwrap();
        let tokenizer = WordPieceTokenizer::from_file(file.path(), max_length).unwrap();
        (file, tokenizer)
    }

    fn texts(encoded: &Encoded) -> Vec<&str> {
        encoded.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_encode_marks_special_tokens() {
        let (_file, tokenizer) = bert_tokenizer(512);
        let encoded = tokenizer.encode("I feel dizziness").unwrap();

        assert_eq!(texts(&encoded), vec!["[CLS]", "i", "feel", "dizz", "##iness", "[SEP]"]);
        let special: Vec<bool> = encoded.tokens.iter().map(|t| t.special).collect();
        assert_eq!(special, vec![true, false, false, false, false, true]);
        assert_eq!(encoded.ids, vec![2, 4, 5, 6, 7, 3]);
        assert!(encoded.attention_mask.iter().all(|&m| m == 1));
        assert!(encoded.type_ids.iter().all(|&t| t == 0));
    }

    #[test]
    fn test_encode_word_piece_offsets() {
        let (_file, tokenizer) = bert_tokenizer(512);
        let text = "I feel dizziness";
        let encoded = tokenizer.encode(text).unwrap();

        let dizz = &encoded.tokens[3];
        let iness = &encoded.tokens[4];
        assert_eq!((dizz.start, dizz.end), (7, 11));
        assert_eq!((iness.start, iness.end), (11, 16));
        assert_eq!(&text[dizz.start..iness.end], "dizziness");
        assert_eq!(iness.index, 4);
    }

    #[test]
    fn test_encode_truncates_keeping_special_tokens() {
        let (_file, tokenizer) = bert_tokenizer(4);
        let encoded = tokenizer.encode("I feel dizziness").unwrap();

        assert_eq!(encoded.len(), 4);
        assert_eq!(texts(&encoded), vec!["[CLS]", "i", "feel", "[SEP]"]);
        assert!(encoded.tokens[0].special && encoded.tokens[3].special);
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let result = WordPieceTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"), 512);
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }

    #[test]
    fn test_token_new_is_not_special() {
        let token = Token::new("fever", 4, 9, 1);
        assert_eq!(token.text, "fever");
        assert!(!token.special);
    }
}
