//! # Classificador de Lesões de Pele
//!
//! Executa a CNN (EfficientNet) exportada para ONNX.
//!
//! O modelo espera:
//! - Entrada: `image_size × image_size` pixels (256 por padrão)
//! - Canais: RGB
//! - Layout: NHWC `[batch, height, width, channels]`, herdado do Keras
//! - Valores: 0–255 em float; o pré-processamento da EfficientNet é a
//!   identidade porque o rescaling faz parte do grafo
//!
//! A saída já é uma distribuição de probabilidades sobre as classes.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::text_model::ModelInfo;

/// Número de canais de cor (RGB).
const CHANNELS: usize = 3;

/// Uma classe prevista e sua probabilidade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub name: String,
    pub confidence: f64,
    /// Ex: "87.34%"
    pub confidence_percentage: String,
}

impl ImagePrediction {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
            confidence_percentage: format_percentage(confidence),
        }
    }
}

/// Formata a probabilidade como porcentagem com até duas casas decimais.
///
/// Casas finais iguais a zero são removidas, como faz `round(x, 2)` ao ser
/// impresso: 0.5 → "50.0%", 0.87341 → "87.34%".
pub fn format_percentage(confidence: f64) -> String {
    let rounded = (confidence * 100.0 * 100.0).round() / 100.0;
    let mut text = format!("{rounded:.2}");
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    format!("{text}%")
}

/// Qualquer modelo capaz de classificar uma imagem.
pub trait ImageClassifier: Send + Sync {
    /// Devolve até `top_k` classes, da mais provável para a menos.
    fn classify(&self, image: &DynamicImage, top_k: usize) -> ModelResult<Vec<ImagePrediction>>;

    fn info(&self) -> ModelInfo;
}

/// Decodifica bytes enviados pelo cliente (formato detectado pelo conteúdo).
pub fn decode(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Pré-processa uma imagem para o classificador.
///
/// Converte para RGB, redimensiona (bilinear) para `image_size × image_size`
/// e devolve um tensor NHWC com valores brutos 0–255.
pub fn preprocess(image: &DynamicImage, image_size: u32) -> Array4<f32> {
    let resized = image.resize_exact(image_size, image_size, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let size = image_size as usize;
    Array4::from_shape_fn((1, size, size, CHANNELS), |(_, y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32
    })
}

/// Índices das `top_k` maiores probabilidades, em ordem decrescente.
pub fn top_k_indices(probs: &[f32], top_k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    indices.sort_by(|&a, &b| {
        probs[b]
            .partial_cmp(&probs[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices.truncate(top_k.min(probs.len()));
    indices
}

/// Lê a lista de classes; `_` vira espaço e as bordas são aparadas.
pub fn load_class_names(path: &Path) -> ModelResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let raw: Vec<String> = serde_json::from_str(&content).map_err(|e| ModelError::Load {
        path: path.to_path_buf(),
        message: format!("Class names must be a JSON array of strings: {e}"),
    })?;
    Ok(raw
        .into_iter()
        .map(|name| name.trim().replace('_', " "))
        .collect())
}

/// Classificador de imagens executado pelo ONNX Runtime.
pub struct OnnxImageClassifier {
    session: Mutex<Session>,
    input_name: String,
    class_names: Vec<String>,
    image_size: u32,
    model_path: PathBuf,
}

impl OnnxImageClassifier {
    /// Carrega o modelo e a lista de classes.
    pub fn load(model_path: &Path, class_names_path: &Path, image_size: u32) -> ModelResult<Self> {
        for path in [model_path, class_names_path] {
            if !path.exists() {
                return Err(ModelError::NotFound(path.to_path_buf()));
            }
        }

        let class_names = load_class_names(class_names_path)?;

        let session = Session::builder()
            .map_err(|e| ModelError::Load {
                path: model_path.to_path_buf(),
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| ModelError::Load {
                path: model_path.to_path_buf(),
                message: format!("Failed to load ONNX model: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input_1".to_string());

        tracing::debug!(
            "Loaded image classifier from {:?} (input: {:?}, {} classes)",
            model_path,
            input_name,
            class_names.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            class_names,
            image_size,
            model_path: model_path.to_path_buf(),
        })
    }

    /// Executa o modelo e devolve o vetor de probabilidades.
    fn predict(&self, tensor: &Array4<f32>) -> ModelResult<Vec<f32>> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = tensor.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data))
            .map_err(|e| ModelError::Inference(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ModelError::Inference(format!("Session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| ModelError::Inference(format!("ONNX inference failed: {e}")))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| ModelError::Output("Model produced no outputs".to_string()))?;

        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Output(format!("Failed to extract probabilities: {e}")))?;

        Ok(data.to_vec())
    }
}

impl ImageClassifier for OnnxImageClassifier {
    fn classify(&self, image: &DynamicImage, top_k: usize) -> ModelResult<Vec<ImagePrediction>> {
        let tensor = preprocess(image, self.image_size);
        let probs = self.predict(&tensor)?;

        let predictions = top_k_indices(&probs, top_k)
            .into_iter()
            .filter_map(|idx| {
                self.class_names
                    .get(idx)
                    .map(|name| ImagePrediction::new(name.clone(), probs[idx] as f64))
            })
            .collect();

        Ok(predictions)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            kind: "Image Classification (EfficientNet)".to_string(),
            path: self.model_path.clone(),
            input_shape: Some(format!(
                "{}x{}x{}",
                self.image_size, self.image_size, CHANNELS
            )),
            classes: self.class_names.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::io::Write;

    #[test]
    fn test_preprocess_shape_nhwc() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = preprocess(&img, 256);
        assert_eq!(tensor.shape(), &[1, 256, 256, 3]);
    }

    #[test]
    fn test_preprocess_keeps_raw_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, image::Rgb([255, 0, 128])));
        let tensor = preprocess(&img, 8);
        assert_eq!(tensor[[0, 3, 3, 0]], 255.0);
        assert_eq!(tensor[[0, 3, 3, 1]], 0.0);
        assert_eq!(tensor[[0, 3, 3, 2]], 128.0);
    }

    #[test]
    fn test_preprocess_layout_is_row_column_channel() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, image::Rgb([10, 20, 30]));
        img.put_pixel(0, 1, image::Rgb([40, 50, 60]));
        let tensor = preprocess(&DynamicImage::ImageRgb8(img), 2);

        // [batch, y, x, canal]
        assert_eq!(tensor[[0, 0, 1, 2]], 30.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 40.0);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_preprocess_converts_grayscale_to_rgb() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([200])));
        let tensor = preprocess(&img, 4);
        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        assert!(tensor.iter().all(|&v| v == 200.0));
    }

    #[test]
    fn test_top_k_descending() {
        let probs = [0.1, 0.5, 0.05, 0.3, 0.05];
        assert_eq!(top_k_indices(&probs, 3), vec![1, 3, 0]);
        // top_k maior que o número de classes
        assert_eq!(top_k_indices(&[0.2, 0.8], 5), vec![1, 0]);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.87341), "87.34%");
        assert_eq!(format_percentage(0.5), "50.0%");
        assert_eq!(format_percentage(0.1234), "12.34%");
        assert_eq!(format_percentage(0.123), "12.3%");
    }

    #[test]
    fn test_class_names_cleanup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[" Atopic_Dermatitis ", "Tinea_Ringworm_Candidiasis", "Acne"]"#).unwrap();

        let names = load_class_names(file.path()).unwrap();
        assert_eq!(names, vec!["Atopic Dermatitis", "Tinea Ringworm Candidiasis", "Acne"]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"definitely not an image").is_err());
    }

    #[test]
    fn test_missing_model_files() {
        let result = OnnxImageClassifier::load(
            Path::new("/nonexistent/model.onnx"),
            Path::new("/nonexistent/classes.json"),
            256,
        );
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }
}
