use coach_chat_backend::{
    guardrails::{GuardrailPipeline, Verdict},
    metadata::ProductMetadata,
    models::Exchange,
    openai::{CompletionService, OpenAiClient},
    prompt::PromptAssembler,
};
use std::io::{BufRead, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (quiet by default for the REPL)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let metadata_path = std::env::var("METADATA_PATH")
        .unwrap_or_else(|_| "product_metadata.json".to_string());

    // Metadata is mandatory: refuse to run without it.
    let metadata = match ProductMetadata::load(&metadata_path) {
        Ok(metadata) => Arc::new(metadata),
        Err(e) => {
            eprintln!("Fatal: {}", e);
            std::process::exit(1);
        }
    };

    let openai = Arc::new(OpenAiClient::new(api_key));
    let pipeline = GuardrailPipeline::financial_coach(openai.clone(), openai.clone());
    let assembler = PromptAssembler::new(metadata.clone());

    println!(
        "Welcome to the {} CLI! Type 'exit' to quit.",
        metadata.product_name
    );

    let stdin = std::io::stdin();
    let mut history: Vec<Exchange> = Vec::new();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let user_text = line.trim();

        if user_text.is_empty() {
            continue;
        }
        if matches!(user_text.to_lowercase().as_str(), "exit" | "quit") {
            println!("Goodbye!");
            break;
        }

        match pipeline.validate(user_text).await {
            Ok(Verdict::Allowed) => {}
            Ok(Verdict::Rejected { reason }) => {
                println!("[Guardrail] {}", reason);
                continue;
            }
            Err(e) => {
                println!("[Classifier Error] {}", e);
                continue;
            }
        }

        let prompt = assembler.assemble(None, &history, user_text);
        let reply = match openai.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                println!("[OpenAI Error] {}", e);
                continue;
            }
        };

        println!("Agent: {}", reply);
        history.push(Exchange::new(user_text, reply));
    }

    Ok(())
}
