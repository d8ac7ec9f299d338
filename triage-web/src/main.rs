//! Servidor Axum (HTTP + WebSocket) para a triagem de sintomas por texto e imagem
//!
//! ```bash
//! triage-web --config triage.toml --port 8000
//! RUST_LOG=debug triage-web --json-logs
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use triage_core::{
    Config, ImageClassifier, OnnxImageClassifier, OnnxTokenClassifier, RuleEngine, Screener,
    TriagePipeline,
};

mod api;
mod logging;

/// Servidor de triagem de sintomas.
#[derive(Parser, Debug)]
#[command(name = "triage-web")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Arquivo de configuração TOML
    #[arg(short, long, env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Endereço de escuta (sobrescreve `[server] host`)
    #[arg(long, env = "TRIAGE_HOST")]
    host: Option<String>,

    /// Porta de escuta (sobrescreve `[server] port`)
    #[arg(short, long, env = "TRIAGE_PORT")]
    port: Option<u16>,

    /// Logs em nível DEBUG
    #[arg(short, long)]
    verbose: bool,

    /// Logs em formato JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);

    let state = Arc::new(api::AppState {
        pipeline: build_pipeline(&config)?,
        screener: Screener::new(),
    });

    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🚀 Servidor de triagem iniciado em http://{addr}");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Carrega os modelos. O de texto é obrigatório; sem o de imagem o serviço
/// sobe e as rotas de imagem respondem 503.
fn build_pipeline(config: &Config) -> anyhow::Result<TriagePipeline> {
    let models = &config.models;

    let text_model = OnnxTokenClassifier::load(&models.text_model_dir, models.max_sequence_length)
        .with_context(|| format!("Failed to load text model from {:?}", models.text_model_dir))?;
    info!(path = ?models.text_model_dir, "modelo de texto carregado");

    let image_model: Option<Arc<dyn ImageClassifier>> = match OnnxImageClassifier::load(
        &models.image_model_path,
        &models.class_names_path,
        models.image_size,
    ) {
        Ok(model) => {
            info!(path = ?models.image_model_path, "modelo de imagem carregado");
            Some(Arc::new(model))
        }
        Err(e) => {
            warn!(error = %e, "modelo de imagem indisponível; análise por imagem desativada");
            None
        }
    };

    Ok(TriagePipeline::new(
        Arc::new(text_model),
        image_model,
        RuleEngine::with_confidence(config.extraction.rule_confidence),
        config.extraction.clone().into(),
    ))
}
