use coach_chat_backend::{
    api::start_server,
    engine::ChatEngine,
    guardrails::GuardrailPipeline,
    metadata::ProductMetadata,
    openai::OpenAiClient,
    prompt::PromptAssembler,
    store::build_store,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!("⚠️  OPENAI_API_KEY not set in .env");
        String::new()
    });

    let metadata_path = std::env::var("METADATA_PATH")
        .unwrap_or_else(|_| "product_metadata.json".to_string());

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    // Metadata is mandatory: refuse to serve without it.
    let metadata = match ProductMetadata::load(&metadata_path) {
        Ok(metadata) => Arc::new(metadata),
        Err(e) => {
            eprintln!("Fatal: {}", e);
            std::process::exit(1);
        }
    };

    info!("🚀 Coach Chat Backend - API Server");
    info!("📍 Port: {}", api_port);
    info!("📦 Product: {}", metadata.product_name);

    // Create components
    let openai = Arc::new(OpenAiClient::new(api_key));
    let (store, profiles) = build_store();

    let variant = std::env::var("ASSISTANT_VARIANT").unwrap_or_else(|_| "marketing".to_string());
    let pipeline = match variant.as_str() {
        "financial-coach" | "coach" => {
            GuardrailPipeline::financial_coach(openai.clone(), openai.clone())
        }
        _ => GuardrailPipeline::marketing(metadata.clone(), openai.clone(), openai.clone()),
    };
    info!(variant = %variant, stages = ?pipeline.stage_names(), "Guardrail pipeline configured");

    let engine = Arc::new(ChatEngine::new(
        pipeline,
        PromptAssembler::new(metadata.clone()),
        openai,
        store.clone(),
        profiles,
    ));

    info!("✅ Chat engine initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(engine, metadata, store, api_port).await?;

    Ok(())
}
