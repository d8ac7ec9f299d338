//! # triage-core — Triagem de Sintomas por Texto e Imagem
//!
//! Este crate implementa o núcleo de um serviço de triagem médica: a partir de
//! uma descrição livre dos sintomas (em inglês) e/ou de uma foto de lesão de
//! pele, produz sintomas reconhecidos, doenças candidatas, um nível de
//! gravidade e recomendações.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Entrada**: texto bruto e/ou bytes de imagem.
//! 2.  **Tokenização** ([`tokenizer`]): peças WordPiece com offsets.
//! 3.  **Classificação** ([`text_model`], [`image_model`]): modelos ONNX por
//!     trás dos traits [`TokenClassifier`] e [`ImageClassifier`].
//! 4.  **Decodificação BIO** ([`tagger`]): tags por token → sintomas.
//! 5.  **Regras** ([`rule_based`]): normalização e padrões regex.
//! 6.  **Conhecimento** ([`knowledge`], [`diagnosis`], [`severity`]):
//!     doenças candidatas, gravidade e recomendações.
//! 7.  **Saída**: [`TextReport`], [`ImageReport`] ou [`CombinedReport`].
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use triage_core::{OnnxTokenClassifier, PipelineSettings, RuleEngine, TriagePipeline};
//!
//! let model = OnnxTokenClassifier::load(Path::new("ml/text_model"), 512)?;
//! let pipeline = TriagePipeline::new(
//!     Arc::new(model),
//!     None,
//!     RuleEngine::new(),
//!     PipelineSettings::default(),
//! );
//!
//! let report = pipeline.analyze_text("I have a headache and a high fever")?;
//! println!("{} → {:?}", report.severity, report.symptoms);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: orquestrador que conecta todos os estágios.
//! - [`screening`]: triagem rápida por padrões, sem modelo.
//! - [`config`]: configuração TOML do serviço.

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod image_model;
pub mod knowledge;
pub mod pipeline;
pub mod rule_based;
pub mod screening;
pub mod severity;
pub mod tagger;
pub mod text_model;
pub mod tokenizer;

pub use config::Config;
pub use diagnosis::DiseaseScore;
pub use error::{ConfigError, ModelError, Result, TriageError};
pub use image_model::{ImageClassifier, ImagePrediction, OnnxImageClassifier};
pub use pipeline::{
    CombinedReport, ImageReport, PipelineEvent, PipelineSettings, TextReport, TriagePipeline,
};
pub use rule_based::RuleEngine;
pub use screening::{InputKind, Screener, Screening};
pub use severity::Severity;
pub use tagger::{Source, SymptomMention, Tag, TaggedToken};
pub use text_model::{ModelInfo, OnnxTokenClassifier, TokenClassifier};
pub use tokenizer::Token;
