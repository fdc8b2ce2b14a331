//! Command-line front end: resolves the API key, runs the pipeline, and
//! writes the transcript next to the input file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mp3scribe::credentials::{resolve_credential, SecretStore};
use mp3scribe::pipeline::{self, AudioFile, PipelineConfig, Progress};
use mp3scribe::transcriber::WhisperClient;

#[derive(Parser)]
#[command(
    name = "mp3scribe",
    about = "Transcribe MP3 files with the OpenAI audio API, splitting oversized files into chunks"
)]
struct Cli {
    /// MP3 file to transcribe
    input: PathBuf,

    /// Secrets file (defaults to secrets.toml in the per-user config dir)
    #[arg(short, long)]
    secrets: Option<PathBuf>,

    /// API key to use when the secrets file provides none
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Where to write the transcript (defaults to <input-stem>_transcription.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let store = match &cli.secrets {
        Some(path) => SecretStore::load(path)?,
        None => {
            let path = SecretStore::default_path()
                .context("could not determine the user config directory")?;
            if path.exists() {
                SecretStore::load(&path)?
            } else {
                SecretStore::empty()
            }
        }
    };

    let credential = resolve_credential(&store, cli.api_key.as_deref())?;
    let client = WhisperClient::new(credential)?;

    let bytes = fs::read(&cli.input)
        .with_context(|| format!("could not read {}", cli.input.display()))?;
    let name = cli
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio.mp3")
        .to_string();

    let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
    println!("🎤 Transcribing {} ({size_mb:.2} MB)...", cli.input.display());

    let file = AudioFile::new(name, bytes);
    let transcript = pipeline::run(
        file,
        &client,
        &PipelineConfig::default(),
        |progress| match progress {
            Progress::Direct => {
                println!("File is within the size limit, transcribing directly...");
            }
            Progress::Split { chunks } => println!("Splitting into {chunks} chunks..."),
            Progress::ChunkDone { index, total, ok } => {
                if ok {
                    println!("Chunk {}/{total} transcribed.", index + 1);
                } else {
                    println!("⚠️ Chunk {}/{total} failed.", index + 1);
                }
            }
        },
    )?;

    for placeholder in transcript.results.iter().filter_map(|r| r.placeholder()) {
        eprintln!("⚠️ {placeholder}");
    }

    let output = cli.output.unwrap_or_else(|| default_output(&cli.input));
    fs::write(&output, &transcript.text)
        .with_context(|| format!("could not write {}", output.display()))?;

    println!("\n{}\n", transcript.text);
    println!("💾 Transcript written to {}", output.display());

    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
    input.with_file_name(format!("{stem}_transcription.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_lands_next_to_the_input() {
        let out = default_output(Path::new("/tmp/interview.mp3"));
        assert_eq!(out, Path::new("/tmp/interview_transcription.txt"));
    }
}
