//! CLI tool for narrating PowerPoint presentations.

use anyhow::{Context, Result};
use clap::Parser;
use narrator_core::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use narrator_core::{
    Error, Language, NarratedSlide, NarratorConfig, Notice, Pipeline, RunObserver, RunOutcome,
    RunRequest, RunState, UploadedDocument, VOICE_SELECTION,
};
use narrator_pptx::PptxParser;
use narrator_remote::{anthropic, google_tts, AnthropicConnector, GoogleTts};
use std::fs;
use std::path::{Path, PathBuf};

/// Generate a spoken narration script and audio for every slide of a presentation.
#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PowerPoint file(s) (.pptx)
    #[arg(required_unless_present = "list_languages")]
    input: Vec<PathBuf>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Narration language, by name or code
    #[arg(short, long, default_value = "English (US)")]
    language: Language,

    /// Model used to write the scripts
    #[arg(short, long, env = "NARRATOR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens per generated script
    #[arg(long, env = "NARRATOR_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Directory for temporary files (default: system temp directory)
    #[arg(long, env = "NARRATOR_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Anthropic API base URL
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = anthropic::DEFAULT_BASE_URL)]
    anthropic_url: String,

    /// Text-to-speech base URL
    #[arg(long, env = "NARRATOR_TTS_URL", default_value = google_tts::DEFAULT_BASE_URL)]
    tts_url: String,

    /// Directory to keep a copy of the generated audio in
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the available narration languages and exit
    #[arg(long)]
    list_languages: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if args.list_languages {
        for (name, code) in VOICE_SELECTION.entries() {
            println!("{:<14} {}", name, code);
        }
        return Ok(());
    }

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let mut config = NarratorConfig::new()
        .with_model(args.model.as_str())
        .with_max_tokens(args.max_tokens);
    if let Some(dir) = &args.temp_dir {
        config = config.with_temp_dir(dir);
    }

    let tts = GoogleTts::new()
        .context("Failed to set up the text-to-speech client")?
        .with_base_url(args.tts_url.as_str());
    let pipeline = Pipeline::new(
        PptxParser::new(),
        AnthropicConnector::new(args.anthropic_url.as_str()),
        tts,
        config,
    );

    let mut failures = 0;
    for input_path in &args.input {
        if args.verbose {
            eprintln!("Processing: {}", input_path.display());
        }

        match process_file(input_path, &args, &pipeline) {
            Ok(true) => {}
            Ok(false) => failures += 1,
            Err(e) => {
                eprintln!("Error processing {}: {:#}", input_path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} presentations failed", failures, args.input.len());
    }
    Ok(())
}

/// Narrate a single file. Returns whether the run completed.
fn process_file(
    input_path: &Path,
    args: &Args,
    pipeline: &Pipeline<PptxParser, AnthropicConnector, GoogleTts>,
) -> Result<bool> {
    let bytes = fs::read(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;

    let filename = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("presentation");

    let request = RunRequest::new(
        args.api_key.clone(),
        Some(UploadedDocument::new(filename, bytes)),
        args.language,
    );
    let mut renderer = TerminalRenderer {
        stem: stem.to_string(),
        output: args.output.clone(),
        verbose: args.verbose,
    };

    match pipeline.run(request, &mut renderer) {
        RunOutcome::Idle => {
            eprintln!("No API key given. Pass --api-key or set ANTHROPIC_API_KEY.");
            Ok(true)
        }
        RunOutcome::Completed(report) => {
            if args.verbose {
                eprintln!(
                    "  Narrated {} slides ({} with fallback scripts)",
                    report.scripts.len(),
                    report.notices.len()
                );
            }
            Ok(true)
        }
        RunOutcome::Aborted { error, .. } => {
            eprintln!("An error occurred in {}: {}", input_path.display(), error);
            Ok(false)
        }
    }
}

/// Prints scripts and optionally keeps the audio files.
struct TerminalRenderer {
    stem: String,
    output: Option<PathBuf>,
    verbose: bool,
}

impl RunObserver for TerminalRenderer {
    fn on_state(&mut self, state: RunState) {
        if let RunState::Scripting { slide, total } = state {
            eprintln!("  Writing script for slide {}/{}", slide, total);
        } else if self.verbose {
            eprintln!("  [{}]", state);
        }
    }

    fn on_notice(&mut self, notice: &Notice) {
        eprintln!("  Warning (slide {}): {}", notice.slide, notice.message);
    }

    fn on_error(&mut self, error: &Error) {
        log::debug!("Run error: {:?}", error);
    }

    fn render(&mut self, slides: &[NarratedSlide<'_>]) {
        println!("Generated Presentation Scripts");
        for slide in slides {
            println!();
            println!("Slide {}", slide.number);
            println!("{}", slide.script.text);

            if let Some(dir) = &self.output {
                let target = dir.join(format!("{}_slide_{}.mp3", self.stem, slide.number));
                match fs::copy(slide.audio_path, &target) {
                    Ok(_) => println!("Audio: {}", target.display()),
                    Err(e) => log::warn!(
                        "Failed to copy audio for slide {} to {}: {}",
                        slide.number,
                        target.display(),
                        e
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_language_by_name_or_code() {
        let args = Args::try_parse_from(["narrate", "deck.pptx", "--language", "French"]).unwrap();
        assert_eq!(args.language, Language::French);
        assert_eq!(args.input, vec![PathBuf::from("deck.pptx")]);

        let args = Args::try_parse_from(["narrate", "deck.pptx", "-l", "pt"]).unwrap();
        assert_eq!(args.language, Language::Portuguese);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["narrate", "deck.pptx"]).unwrap();
        assert_eq!(args.language, Language::EnglishUs);
        assert!(!args.verbose);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_args_reject_unknown_language() {
        assert!(Args::try_parse_from(["narrate", "deck.pptx", "-l", "Klingon"]).is_err());
    }

    #[test]
    fn test_args_input_required_unless_listing() {
        assert!(Args::try_parse_from(["narrate"]).is_err());
        let args = Args::try_parse_from(["narrate", "--list-languages"]).unwrap();
        assert!(args.list_languages);
        assert!(args.input.is_empty());
    }
}
