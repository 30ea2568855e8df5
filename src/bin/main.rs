use clap::Parser;
use scheme_finder::{
    agent::SchemeAssistant, config::AppConfig, logging::init_tracing, models::UserProfile,
    profile::WELCOME, ChatAction,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

/// Chat with the scheme finder in the terminal
#[derive(Parser, Debug)]
#[command(name = "scheme-finder", version)]
struct Args {
    /// Skip the intake conversation and search with a saved profile (user_details.json)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Directory for the saved profile and ranked list
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn,scheme_finder=info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _guard = init_tracing(&args.log)?;

    let mut config = AppConfig::from_env()?;
    if let Some(dir) = args.artifact_dir {
        config.artifact_dir = dir;
    }

    let assistant = Arc::new(SchemeAssistant::new(
        config.build_model()?,
        config.build_embedder()?,
        config.build_index().await?,
        config.build_store().await?,
        config.assistant_settings(),
    ));
    let session_id = "console";
    info!("Scheme finder console started");

    let mut stdout = tokio::io::stdout();

    match args.profile {
        Some(path) => {
            let profile: UserProfile = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
            let outcome = assistant.submit_profile(Some(session_id), profile).await?;
            stdout.write_all(format!("{}\n\n", outcome.message).as_bytes()).await?;
            if outcome.schemes.is_empty() {
                return Ok(());
            }
            let listed = assistant.chat(Some(session_id), "show schemes").await?;
            stdout.write_all(format!("{}\n", listed.reply.response).as_bytes()).await?;
        }
        None => {
            stdout.write_all(format!("{}\n", WELCOME).as_bytes()).await?;
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let outcome = assistant.chat(Some(session_id), &line).await?;
        stdout
            .write_all(format!("\nBot: {}\n", outcome.reply.response).as_bytes())
            .await?;

        if outcome.reply.action == ChatAction::Exit {
            break;
        }
    }

    stdout.flush().await?;
    Ok(())
}
