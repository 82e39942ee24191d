use anyhow::{bail, Result};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::Config;
use crate::highlight::{resolve, Side};
use crate::models::{Language, MatchEvidenceItem, SearchRequest, SearchResults};
use crate::normalize::to_display_form;
use crate::progress::{ProgressMode, SessionObserver};
use crate::session::{SearchSession, SessionState};
use crate::transport::HttpTransport;

const MARK_OPEN: &str = "«";
const MARK_CLOSE: &str = "»";

/// Run one search against the configured server and print the results.
///
/// Ctrl-C cancels the session; a cancelled search prints nothing on stdout.
pub async fn run_search(
    config: &Config,
    request: SearchRequest,
    progress: ProgressMode,
    limit: Option<usize>,
) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(config)?);
    let observer: Arc<dyn SessionObserver> = Arc::from(progress.observer());
    let session = SearchSession::new(transport, observer)
        .with_tick_interval(config.search.tick_interval());

    let language = request.language;
    let handle = session.start(request);
    let finished = handle.finished();
    tokio::pin!(finished);

    let state = tokio::select! {
        state = &mut finished => state,
        _ = tokio::signal::ctrl_c() => {
            session.cancel();
            finished.await
        }
    };

    match state {
        SessionState::Completed { results } => {
            print!("{}", format_results(&results, language, limit));
            Ok(())
        }
        SessionState::Failed { message } => bail!("{}", message),
        SessionState::Cancelled => {
            eprintln!("Search cancelled.");
            Ok(())
        }
        other => bail!("Search ended in unexpected state: {}", other.label()),
    }
}

/// Render results with highlighted tokens, one block per match.
pub fn format_results(results: &SearchResults, language: Language, limit: Option<usize>) -> String {
    let mut out = String::new();

    if results.results.is_empty() {
        out.push_str("No results.\n");
        return out;
    }

    let _ = write!(out, "{} matches", results.total_matches());
    if let (Some(s), Some(t)) = (results.source_lines, results.target_lines) {
        let _ = write!(out, " ({} source lines, {} target lines)", s, t);
    }
    if let Some(elapsed) = results.elapsed_time {
        let _ = write!(out, " in {:.1}s", elapsed);
    }
    out.push_str("\n\n");

    let shown = limit.unwrap_or(results.results.len());
    for (i, result) in results.results.iter().take(shown).enumerate() {
        let source = &result.passage;
        let target = result.target.as_ref();

        let score = result
            .score
            .map(|s| format!("[{:.2}] ", s))
            .unwrap_or_default();
        let locus = result.locus.as_deref().unwrap_or("(no locus)");
        let _ = writeln!(out, "{}. {}{}", i + 1, score, locus);

        let highlights = resolve(source, &result.matched_words, language, Side::Source, target);
        let _ = writeln!(
            out,
            "    source: {}",
            highlights.render(&source.text, MARK_OPEN, MARK_CLOSE)
        );

        if let Some(target) = target {
            let highlights = resolve(
                target,
                &result.matched_words,
                language,
                Side::Target,
                Some(source),
            );
            let _ = writeln!(
                out,
                "    target: {}",
                highlights.render(&target.text, MARK_OPEN, MARK_CLOSE)
            );
        }

        let evidence = describe_evidence(&result.matched_words, language);
        if !evidence.is_empty() {
            let _ = writeln!(out, "    matched: {}", evidence);
        }
        out.push('\n');
    }

    if shown < results.results.len() {
        let _ = writeln!(out, "... {} more", results.results.len() - shown);
    }

    out
}

fn describe_evidence(evidence: &[MatchEvidenceItem], language: Language) -> String {
    let display = |s: &str| {
        if language == Language::Greek {
            to_display_form(s)
        } else {
            s.to_string()
        }
    };

    evidence
        .iter()
        .filter_map(|item| {
            if let Some(similarity) = item.similarity {
                return Some(format!("similarity {:.3}", similarity));
            }
            item.display
                .as_deref()
                .or(item.lemma.as_deref())
                .or(item.source_word.as_deref())
                .map(display)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a `key=value` setting. The value is read as JSON when it parses,
/// otherwise kept as a string.
pub fn parse_setting(raw: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid setting '{}': expected key=value", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid setting '{}': key must not be empty", raw);
    }
    let value = serde_json::from_str(value.trim())
        .unwrap_or_else(|_| serde_json::Value::String(value.trim().to_string()));
    Ok((key.to_string(), value))
}
