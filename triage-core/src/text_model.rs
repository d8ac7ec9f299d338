//! # Classificador de Tokens (NER de Sintomas)
//!
//! Executa o modelo transformer exportado para ONNX. O diretório do modelo
//! contém:
//!
//! - `model.onnx`: grafo com entradas `input_ids`, `attention_mask` e,
//!   conforme a arquitetura, `token_type_ids`; saída `logits` `[1, seq, labels]`
//! - `tokenizer.json`: tokenizer WordPiece usado no treino
//! - `config.json`: mapa `id2label` (ex: `{"0": "O", "1": "B-SYMPTOM"}`)
//!
//! Para cada token a tag escolhida é o argmax dos logits e a confiança é a
//! probabilidade softmax dessa tag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::tagger::{Tag, TaggedToken};
use crate::tokenizer::WordPieceTokenizer;

/// Descrição de um modelo carregado (exposta em `/health`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub kind: String,
    pub path: PathBuf,
    /// Forma da entrada, quando fixa (ex: "256x256x3")
    pub input_shape: Option<String>,
    /// Número de rótulos ou classes de saída
    pub classes: usize,
}

/// Qualquer modelo capaz de rotular os tokens de um texto no esquema BIO.
///
/// O pipeline depende só deste trait; os testes usam implementações falsas.
pub trait TokenClassifier: Send + Sync {
    fn classify(&self, text: &str) -> ModelResult<Vec<TaggedToken>>;

    fn info(&self) -> ModelInfo;
}

#[derive(Deserialize)]
struct LabelConfig {
    id2label: HashMap<String, String>,
}

/// Lê o `id2label` do `config.json` e o converte em vetor indexado pelo id.
fn load_labels(path: &Path) -> ModelResult<Vec<String>> {
    let load_err = |message: String| ModelError::Load {
        path: path.to_path_buf(),
        message,
    };

    let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    let config: LabelConfig =
        serde_json::from_str(&content).map_err(|e| load_err(format!("Invalid config.json: {e}")))?;

    let mut labels = vec![String::new(); config.id2label.len()];
    for (id, label) in config.id2label {
        let idx: usize = id
            .parse()
            .map_err(|_| load_err(format!("Non-numeric label id {id:?}")))?;
        let slot = labels
            .get_mut(idx)
            .ok_or_else(|| load_err(format!("Label id {idx} out of range")))?;
        *slot = label;
    }
    Ok(labels)
}

/// Softmax numericamente estável de uma linha de logits.
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Índice e valor do maior elemento.
pub fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

/// Classificador de tokens executado pelo ONNX Runtime.
///
/// Usa `Mutex` porque `Session::run` exige `&mut self`.
pub struct OnnxTokenClassifier {
    session: Mutex<Session>,
    tokenizer: WordPieceTokenizer,
    labels: Vec<String>,
    uses_token_type_ids: bool,
    model_dir: PathBuf,
}

impl OnnxTokenClassifier {
    /// Carrega modelo, tokenizer e rótulos de `model_dir`.
    pub fn load(model_dir: &Path, max_length: usize) -> ModelResult<Self> {
        let model_path = model_dir.join("model.onnx");
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path));
        }

        let tokenizer = WordPieceTokenizer::from_file(&model_dir.join("tokenizer.json"), max_length)?;
        let labels = load_labels(&model_dir.join("config.json"))?;

        let session = Session::builder()
            .map_err(|e| ModelError::Load {
                path: model_path.clone(),
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|e| ModelError::Load {
                path: model_path.clone(),
                message: format!("Failed to load ONNX model: {e}"),
            })?;

        let uses_token_type_ids = session.inputs().iter().any(|i| i.name() == "token_type_ids");

        tracing::debug!(
            "Loaded token classifier from {:?} ({} labels, token_type_ids: {})",
            model_path,
            labels.len(),
            uses_token_type_ids
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            uses_token_type_ids,
            model_dir: model_dir.to_path_buf(),
        })
    }

    fn label(&self, idx: usize) -> &str {
        self.labels.get(idx).map(String::as_str).unwrap_or("O")
    }
}

impl TokenClassifier for OnnxTokenClassifier {
    fn classify(&self, text: &str) -> ModelResult<Vec<TaggedToken>> {
        let encoded = self.tokenizer.encode(text)?;
        if encoded.is_empty() {
            return Ok(vec![]);
        }

        let shape = vec![1i64, encoded.len() as i64];
        let tensor = |data: Vec<i64>| {
            Value::from_array((shape.clone(), data))
                .map_err(|e| ModelError::Inference(format!("Failed to create input tensor: {e}")))
        };
        let input_ids = tensor(encoded.ids.clone())?;
        let attention_mask = tensor(encoded.attention_mask.clone())?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ModelError::Inference(format!("Session lock poisoned: {e}")))?;

        let run = if self.uses_token_type_ids {
            let token_type_ids = tensor(encoded.type_ids.clone())?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
        };
        let outputs =
            run.map_err(|e| ModelError::Inference(format!("ONNX inference failed: {e}")))?;

        let logits = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| ModelError::Output("Model produced no outputs".to_string()))?;

        let (out_shape, data) = logits
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Output(format!("Failed to extract logits: {e}")))?;

        // logits: [1, seq, labels]
        if out_shape.len() != 3 || out_shape[1] as usize != encoded.len() {
            return Err(ModelError::Output(format!(
                "Unexpected logits shape {:?} for {} tokens",
                out_shape,
                encoded.len()
            )));
        }
        let num_labels = out_shape[2] as usize;
        if num_labels == 0 {
            return Err(ModelError::Output("Model has no output labels".to_string()));
        }

        let tagged = encoded
            .tokens
            .into_iter()
            .zip(data.chunks(num_labels))
            .map(|(token, row)| {
                let probs = softmax(row);
                let (best, confidence) = argmax(&probs);
                TaggedToken {
                    token,
                    tag: Tag::from_label(self.label(best)),
                    confidence,
                }
            })
            .collect();

        Ok(tagged)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            kind: "Token Classification (NER)".to_string(),
            path: self.model_dir.clone(),
            input_shape: None,
            classes: self.labels.len(),
        }
    }
}
