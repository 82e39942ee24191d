//! # Intertext CLI (`itx`)
//!
//! The `itx` binary runs comparisons against an intertext search server
//! and prints the ranked matches with matched words highlighted.
//!
//! ## Usage
//!
//! ```bash
//! itx --config ./config/itx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `itx search` | Run a comparison and print highlighted matches |
//! | `itx normalize <token>...` | Show the comparison form of tokens |
//!
//! ## Examples
//!
//! ```bash
//! # Lemma comparison of Vergil and Lucan
//! itx search --source vergil.aeneid.tess --target lucan.bellum_civile.tess
//!
//! # Sound matching in Greek with machine-readable progress
//! itx search --source homer.iliad.tess --target apollonius.argonautica.tess \
//!     --language greek --match-type sound --progress json
//!
//! # Pass server settings through
//! itx search --source a.tess --target b.tess --set stoplist=10 --set use_bigrams=true
//!
//! # Normalize tokens
//! itx normalize Virumque uirumque --language latin
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use intertext::config;
use intertext::logging;
use intertext::models::{Language, MatchType, SearchRequest};
use intertext::normalize::{normalize, to_display_form};
use intertext::progress::ProgressMode;
use intertext::search;

/// Intertext CLI: streaming comparison search for classical texts.
///
/// Commands that talk to the server read a TOML configuration file given
/// by `--config`.
#[derive(Parser)]
#[command(
    name = "itx",
    about = "Intertext: streaming comparison search for classical texts",
    version,
    long_about = "Intertext sends a source/target comparison to a search server, follows its \
    streamed progress, and prints the ranked passage matches with matched words highlighted."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/itx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a comparison and print highlighted matches.
    ///
    /// Progress is reported on stderr while the server works. Ctrl-C
    /// cancels the search.
    Search {
        /// Source text identifier (e.g. `vergil.aeneid.tess`).
        #[arg(long)]
        source: String,

        /// Target text identifier (e.g. `lucan.bellum_civile.tess`).
        #[arg(long)]
        target: String,

        /// Language of both texts. Defaults to `search.default_language`.
        #[arg(long)]
        language: Option<Language>,

        /// Match type: lemma, exact, sound, edit, semantic, semantic_cross.
        #[arg(long, default_value = "lemma")]
        match_type: MatchType,

        /// Extra server setting as `key=value` (repeatable).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        settings: Vec<String>,

        /// Progress output: auto, human, json, or off.
        #[arg(long, default_value = "auto")]
        progress: ProgressMode,

        /// Print at most this many matches.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the normalized comparison form of tokens.
    Normalize {
        /// Tokens to normalize.
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Language rules to apply.
        #[arg(long, default_value = "latin")]
        language: Language,

        /// Also print the display form (final sigma restored).
        #[arg(long)]
        display: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Normalize {
        tokens,
        language,
        display,
    } = &cli.command
    {
        for token in tokens {
            let normalized = normalize(token, *language);
            if *display {
                println!("{}\t{}\t{}", token, normalized, to_display_form(&normalized));
            } else {
                println!("{}\t{}", token, normalized);
            }
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search {
            source,
            target,
            language,
            match_type,
            settings,
            progress,
            limit,
        } => {
            let language = language.unwrap_or(cfg.search.default_language);
            let mut request =
                SearchRequest::new(source, target, language).with_match_type(match_type);
            for raw in &settings {
                let (key, value) = search::parse_setting(raw)?;
                request = request.with_setting(key, value);
            }
            search::run_search(&cfg, request, progress, limit).await?;
        }
        Commands::Normalize { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}
