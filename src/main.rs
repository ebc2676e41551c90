use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use ehr_core::{CoreConfig, LlmConfig, NoteService, RecordStore, records_path_from_env_value};

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Main entry point for the EHR backend
///
/// Resolves configuration from the environment once, builds the note service and record store,
/// and serves the REST API.
///
/// # Environment Variables
/// - `EHR_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `EHR_RECORDS_FILE`: clinical records file (default: "data/FINAL_CLINICAL_NOTES.json")
/// - `OPENAI_API_KEY`: text generator credential; when unset every note is the fallback note
/// - `EHR_LLM_MODEL`, `EHR_LLM_BASE_URL`, `EHR_LLM_TIMEOUT_SECS`, `EHR_LLM_MAX_ATTEMPTS`:
///   text generator tuning
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ehr_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("ehr_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = env("EHR_REST_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into());

    let llm = LlmConfig::from_env_values(
        env("OPENAI_API_KEY"),
        env("EHR_LLM_MODEL"),
        env("EHR_LLM_BASE_URL"),
        env("EHR_LLM_TIMEOUT_SECS"),
        env("EHR_LLM_MAX_ATTEMPTS"),
    )?;
    let cfg = CoreConfig::new(records_path_from_env_value(env("EHR_RECORDS_FILE")), llm)?;

    let notes = NoteService::from_config(cfg.llm())?;
    if notes.is_degraded() {
        tracing::warn!("OPENAI_API_KEY not set; notes will use the demo-mode fallback");
    } else {
        tracing::info!("Text generator: {} at {}", cfg.llm().model(), cfg.llm().base_url());
    }

    let records = RecordStore::new(cfg.records_path());
    tracing::info!("Records file: {}", records.path().display());

    let app = api_rest::router(AppState::new(notes, records));

    tracing::info!("++ Starting EHR REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
