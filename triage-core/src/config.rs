//! # Configuração do Serviço
//!
//! Carregada de um arquivo TOML opcional. Toda seção tem valores padrão, então
//! um arquivo parcial (ou nenhum arquivo) é suficiente para subir o servidor.
//!
//! ```toml
//! [server]
//! port = 8000
//!
//! [models]
//! text_model_dir = "ml/text_model"
//! image_model_path = "ml/image_model/skin_disease_model_rgb.onnx"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

/// Endereço de escuta do servidor HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Localização dos modelos exportados.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Diretório com `model.onnx`, `tokenizer.json` e `config.json`
    pub text_model_dir: PathBuf,
    /// Classificador de lesões de pele (opcional)
    pub image_model_path: PathBuf,
    /// Lista JSON com o nome de cada classe do classificador de imagens
    pub class_names_path: PathBuf,
    /// Lado (em pixels) da imagem quadrada esperada pelo modelo
    pub image_size: u32,
    /// Tokens máximos por texto; o excedente é truncado
    pub max_sequence_length: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            text_model_dir: PathBuf::from("ml/text_model"),
            image_model_path: PathBuf::from("ml/image_model/skin_disease_model_rgb.onnx"),
            class_names_path: PathBuf::from("ml/image_model/class_names_new.json"),
            image_size: 256,
            max_sequence_length: 512,
        }
    }
}

/// Limiares da extração híbrida.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Spans do modelo com confiança média menor ou igual a este valor são descartados
    pub min_model_confidence: f64,
    /// Confiança atribuída a sintomas encontrados pelas regras
    pub rule_confidence: f64,
    /// Quantas classes o classificador de imagens devolve
    pub image_top_k: usize,
    /// Quantas doenças a análise combinada devolve
    pub combined_top_k: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_model_confidence: 0.3,
            rule_confidence: 0.75,
            image_top_k: 5,
            combined_top_k: 10,
        }
    }
}

/// Nível e formato dos logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn" ou "error"
    pub level: String,
    /// "pretty" ou "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Lê e valida a configuração de um arquivo TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Lê o arquivo se ele existir; caso contrário usa os padrões.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let confidence_range = 0.0..=1.0;
        if !confidence_range.contains(&self.extraction.min_model_confidence) {
            return Err(ConfigError::ValidationError(format!(
                "extraction.min_model_confidence must be in [0, 1], got {}",
                self.extraction.min_model_confidence
            )));
        }
        if !confidence_range.contains(&self.extraction.rule_confidence) {
            return Err(ConfigError::ValidationError(format!(
                "extraction.rule_confidence must be in [0, 1], got {}",
                self.extraction.rule_confidence
            )));
        }
        if self.extraction.image_top_k == 0 || self.extraction.combined_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "extraction top_k values must be greater than zero".to_string(),
            ));
        }
        if self.models.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "models.image_size must be greater than zero".to_string(),
            ));
        }
        if self.models.max_sequence_length < 2 {
            return Err(ConfigError::ValidationError(format!(
                "models.max_sequence_length must leave room for special tokens, got {}",
                self.models.max_sequence_length
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}
