use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use visit_asr::{AudioFile, Config, RequestSigner, Transcriber};

#[derive(Parser)]
#[command(name = "visit-asr", about = "Realtime speech recognition client for visit recordings")]
struct Cli {
    /// Config file (without extension)
    #[arg(long, default_value = "config/visit-asr")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe a recording in batch mode (paced at real-time rate)
    Transcribe {
        /// 16-bit PCM WAV file, or raw PCM
        input: PathBuf,

        /// Override the recognition language
        #[arg(long)]
        lang: Option<String>,
    },

    /// Feed a recording through an incremental session, chunk by chunk
    Stream {
        input: PathBuf,

        /// Chunk length in milliseconds of audio
        #[arg(long, default_value_t = 200)]
        chunk_ms: u64,
    },

    /// Print a freshly signed connection URL
    SignUrl,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("ASR endpoint: {}", cfg.asr.endpoint);

    let transcriber = Transcriber::from_config(&cfg).context("Invalid ASR configuration")?;

    match cli.command {
        Command::Transcribe { input, lang } => {
            let mut params = cfg.audio.clone();
            if let Some(lang) = lang {
                params.lang = lang;
            }

            let audio = AudioFile::open(&input, params.sample_rate)?;
            audio.ensure_format(params.sample_rate, 1)?;

            let outcome = transcriber
                .transcribe_with(&audio.pcm, &params, |fragment| {
                    if fragment.is_final {
                        println!("{}", fragment.text);
                    } else {
                        info!("… {}", fragment.text);
                    }
                })
                .await?;

            if !outcome.is_success() {
                warn!("Transcription did not complete cleanly: {:?}", outcome.status);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
        }

        Command::Stream { input, chunk_ms } => {
            let params = cfg.audio.clone();
            let audio = AudioFile::open(&input, params.sample_rate)?;
            audio.ensure_format(params.sample_rate, 1)?;

            let chunk_bytes = usize::try_from(params.bytes_per_second() * chunk_ms / 1000)
                .context("Chunk size out of range")?
                .max(2);

            let handle = transcriber.open(&params).await?;
            info!("Streaming {} bytes in {}ms chunks", audio.pcm.len(), chunk_ms);

            for chunk in audio.pcm.chunks(chunk_bytes) {
                if let Err(e) = transcriber.send_chunk(&handle, chunk).await {
                    warn!("Stopped streaming: {}", e);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(chunk_ms)).await;
            }

            match transcriber.end(&handle).await {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome.summary())?),
                Err(e) => warn!("Session ended early: {}", e),
            }
        }

        Command::SignUrl => {
            let signer = RequestSigner::new(cfg.asr.endpoint.clone(), cfg.asr.credentials())?;
            println!("{}", signer.signed_url(&cfg.audio)?);
        }
    }

    Ok(())
}
