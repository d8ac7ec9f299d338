//! # Tipos de Erro
//!
//! Erros organizados por etapa (configuração, modelos, análise), para que a
//! camada HTTP consiga traduzir cada falha no status adequado.

use std::path::PathBuf;
use thiserror::Error;

/// Erro de alto nível de uma análise de triagem.
#[derive(Error, Debug)]
pub enum TriageError {
    /// O texto de entrada estava vazio (ou só com espaços)
    #[error("Empty text")]
    EmptyText,

    /// Nem texto nem imagem foram enviados para a análise combinada
    #[error("Provide either text or image or both")]
    MissingInput,

    /// O classificador de imagens não foi carregado na inicialização
    #[error("Image model not available")]
    ImageModelUnavailable,

    /// Os bytes recebidos não formam uma imagem decodificável
    #[error("Cannot process image: {0}")]
    InvalidImage(String),

    /// Tipo de entrada da triagem rápida desconhecido ou sem suporte
    #[error("Invalid input type: {0}")]
    UnsupportedInput(String),

    /// Falha durante a inferência de um dos modelos
    #[error("Prediction error: {0}")]
    Model(#[from] ModelError),
}

/// Erros de carregamento e execução dos modelos ONNX.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Arquivo de modelo ausente no disco
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    /// Falha ao carregar modelo, tokenizer ou metadados
    #[error("Failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// Falha durante a execução da sessão ONNX
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Saída do modelo com formato inesperado
    #[error("Unexpected model output: {0}")]
    Output(String),
}

/// Erros de configuração.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Falha ao ler o arquivo de configuração
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// TOML inválido
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Valores fora do intervalo aceito
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Atalho para resultados de análise.
pub type Result<T> = std::result::Result<T, TriageError>;

/// Atalho para resultados dos wrappers de modelo.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
