use clap::{Parser, Subcommand};
use ehr_core::{
    records_path_from_env_value, CoreConfig, LlmConfig, NoteService, NoteSource, PatientContext,
    RecordStore,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ehr")]
#[command(about = "AI-assisted EHR command line")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the demo patients to the records file
    Seed {
        /// Records file (defaults to EHR_RECORDS_FILE)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List stored records
    Records {
        /// Records file (defaults to EHR_RECORDS_FILE)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Generate a clinical note
    Note {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        symptoms: Option<String>,
        /// MRI findings
        #[arg(long)]
        findings: Option<String>,
        /// Provisional diagnosis
        #[arg(long)]
        diagnosis: Option<String>,
    },
    /// Enhance an image and write it as PNG
    Enhance {
        /// Input image (PNG or JPEG)
        input: PathBuf,
        /// Output PNG path
        output: PathBuf,
    },
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn core_config() -> anyhow::Result<CoreConfig> {
    let llm = LlmConfig::from_env_values(
        env("OPENAI_API_KEY"),
        env("EHR_LLM_MODEL"),
        env("EHR_LLM_BASE_URL"),
        env("EHR_LLM_TIMEOUT_SECS"),
        env("EHR_LLM_MAX_ATTEMPTS"),
    )?;
    let records_path = records_path_from_env_value(env("EHR_RECORDS_FILE"));
    Ok(CoreConfig::new(records_path, llm)?)
}

fn record_store(cfg: &CoreConfig, file: Option<PathBuf>) -> RecordStore {
    RecordStore::new(file.unwrap_or_else(|| cfg.records_path().to_path_buf()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ehr_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = core_config()?;

    match cli.command {
        Some(Commands::Seed { file }) => {
            let store = record_store(&cfg, file);
            match store.seed() {
                Ok(added) => println!(
                    "Added {} record(s) to {}",
                    added,
                    store.path().display()
                ),
                Err(e) => eprintln!("Error seeding records: {}", e),
            }
        }
        Some(Commands::Records { file }) => {
            let store = record_store(&cfg, file);
            match store.list() {
                Ok(records) if records.is_empty() => println!("No records found."),
                Ok(records) => {
                    for record in records {
                        println!(
                            "ID: {}, Name: {}, Age: {}, Diagnosis: {}, ICD-10: {}",
                            record.patient_id,
                            record.patient_name,
                            record.age,
                            record.provisional_diagnosis,
                            record.icd10_code
                        );
                    }
                }
                Err(e) => eprintln!("Error listing records: {}", e),
            }
        }
        Some(Commands::Note {
            name,
            age,
            gender,
            symptoms,
            findings,
            diagnosis,
        }) => {
            let mut ctx = PatientContext::new();
            if let Some(name) = name {
                ctx = ctx.with_name(name);
            }
            if let Some(age) = age {
                ctx = ctx.with_age(age);
            }
            if let Some(gender) = gender {
                ctx = ctx.with_gender(gender);
            }
            if let Some(symptoms) = symptoms {
                ctx = ctx.with_symptoms(symptoms);
            }
            if let Some(findings) = findings {
                ctx = ctx.with_findings(findings);
            }
            if let Some(diagnosis) = diagnosis {
                ctx = ctx.with_provisional_diagnosis(diagnosis);
            }

            let service = NoteService::from_config(cfg.llm())?;
            let outcome = service.generate_note(&ctx).await;

            let source = match &outcome.source {
                NoteSource::Generated => "generated".to_string(),
                NoteSource::Repaired => "generated (repaired)".to_string(),
                NoteSource::Fallback(reason) => format!("fallback ({})", reason),
            };
            println!("{}\n", outcome.result.note());
            for code in outcome.result.codes() {
                println!("ICD-10: {} - {}", code.code, code.description);
            }
            println!("Source: {}", source);
        }
        Some(Commands::Enhance { input, output }) => {
            let bytes = std::fs::read(&input)?;
            match ehr_imaging::try_enhance_image(&bytes) {
                Ok(png) => {
                    std::fs::write(&output, png)?;
                    println!("Wrote enhanced image to {}", output.display());
                }
                Err(e) => eprintln!("Error enhancing {}: {}", input.display(), e),
            }
        }
        None => {
            println!("Use 'ehr --help' for commands");
        }
    }

    Ok(())
}
