//! `nx search` runs the full ranking pipeline over the document store or a
//! JSON fixture.

use crate::cmd::{load_config, open_adaptive_store, store_path};
use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_rule, pretty_section, render_error, render_mode,
};
use anyhow::{Context, bail};
use clap::Args;
use nexus_core::error::ErrorCode;
use nexus_core::model::{ProfileSelector, RankedResult, SearchRequest, SearchResponse, Signal};
use nexus_search::Pipeline;
use nexus_search::backend::{
    HashingEmbedder, HttpCoherenceJudge, HttpServiceConfig, MemoryIndex, SqliteStore,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_JUDGE_MODEL: &str = "gpt-4-1106-preview";

#[derive(Args, Debug)]
#[command(
    about = "Rank documents for a query",
    long_about = "Rank documents with lexical, semantic, coherence, graph, and feedback signals, \
                  then diversify the result list with MMR.\n\n\
                  Documents come from the project store (`nx index`) or a JSON fixture.",
    after_help = "EXAMPLES:\n    # Rank the indexed documents\n    nx search \"zero knowledge identity\"\n\n\
                  # Use the enhanced profile and a semantic threshold\n    nx search cryptography --profile enhanced --threshold 0.6\n\n\
                  # Expand the query with domain terms\n    nx search blockchain --expand\n\n\
                  # Rank a fixture file without an index\n    nx search neural --fixture patents.json --json"
)]
pub struct SearchArgs {
    /// Query text.
    pub query: String,

    /// Maximum number of results to return.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Weight profile name, or `adaptive`.
    #[arg(long)]
    pub profile: Option<String>,

    /// Drop candidates whose semantic score is below this value.
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Append domain keywords to the query before retrieval.
    #[arg(long)]
    pub expand: bool,

    /// Lexical matches only; skip scoring, weighting, and diversity.
    #[arg(long)]
    pub basic: bool,

    /// Rank documents from a JSON array instead of the project store.
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// OpenAI-compatible chat completions endpoint for coherence judgments.
    ///
    /// The API key is read from `NEXUS_API_KEY`. Without an endpoint an
    /// offline term-overlap judge is used.
    #[arg(long, value_name = "URL")]
    pub judge_url: Option<String>,

    /// Model name sent to the judge endpoint.
    #[arg(long, default_value = DEFAULT_JUDGE_MODEL)]
    pub judge_model: String,

    /// Show score breakdowns and the stage trace.
    #[arg(long)]
    pub explain: bool,
}

impl SearchArgs {
    fn request(&self) -> SearchRequest {
        let mut request = SearchRequest::new(self.query.clone()).with_expansion(self.expand);
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        if let Some(threshold) = self.threshold {
            request = request.with_semantic_threshold(threshold);
        }
        if let Some(profile) = &self.profile {
            request = request.with_profile(ProfileSelector::from(profile.clone()));
        }
        if self.basic {
            request = request.lexical_only();
        }
        request
    }
}

/// Execute `nx search <query>`.
///
/// # Errors
///
/// Returns an error if the store is missing, the request is rejected, or
/// output rendering fails.
pub fn run_search(
    args: &SearchArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let config = load_config(project_root)?;
    let request = args.request();

    let mut builder = Pipeline::builder(config.clone());
    builder = match &args.fixture {
        Some(path) => {
            let index = MemoryIndex::from_json_file(path)?.with_embeddings(&HashingEmbedder::default());
            builder.index(Arc::new(index))
        }
        None => {
            let path = store_path(project_root);
            if !path.exists() {
                let code = ErrorCode::StoreUnavailable;
                render_error(
                    output,
                    &CliError::with_details(
                        format!("document store not found at {}", path.display()),
                        code.hint().unwrap_or_default(),
                        code.code(),
                    ),
                )?;
                bail!("document store not found");
            }
            builder.index(Arc::new(SqliteStore::open(&path)?))
        }
    };

    if let Some(endpoint) = &args.judge_url {
        let mut service = HttpServiceConfig::new(endpoint.clone(), args.judge_model.clone());
        if let Ok(key) = std::env::var("NEXUS_API_KEY") {
            service = service.with_api_key(key);
        }
        builder = builder.judge(Arc::new(HttpCoherenceJudge::new(service)?));
    }

    let adaptive = config.feedback.adaptive || matches!(request.profile, Some(ProfileSelector::Adaptive));
    if adaptive {
        builder = builder.store(Arc::new(open_adaptive_store(project_root, &config)?));
    }

    let pipeline = match builder.build() {
        Ok(pipeline) => pipeline,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let response = match runtime.block_on(pipeline.run(&request)) {
        Ok(response) => response,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };

    let explain = args.explain;
    render_mode(
        output,
        &response,
        render_search_text,
        |response, w| render_search_pretty(response, explain, w),
    )
}

fn render_search_text(response: &SearchResponse, w: &mut dyn Write) -> io::Result<()> {
    for result in &response.results {
        writeln!(
            w,
            "{}\t{:.4}\t{}",
            result.id(),
            result.final_score(),
            result.candidate.title
        )?;
    }
    Ok(())
}

fn render_search_pretty(
    response: &SearchResponse,
    explain: bool,
    w: &mut dyn Write,
) -> io::Result<()> {
    pretty_section(w, &format!("Results for \"{}\"", response.query))?;
    if let Some(expanded) = &response.expanded_query {
        pretty_kv(w, "expanded", expanded)?;
    }
    pretty_kv(w, "profile", &response.profile)?;
    pretty_kv(w, "context", response.context.key())?;
    pretty_kv(w, "results", response.results.len().to_string())?;

    if response.results.is_empty() {
        writeln!(w)?;
        writeln!(w, "No matching documents.")?;
    }

    for (rank, result) in response.results.iter().enumerate() {
        writeln!(w)?;
        writeln!(
            w,
            "{:>2}. [{}] {}  ({:.3})",
            rank + 1,
            result.id(),
            result.candidate.title,
            result.final_score()
        )?;
        if !result.matched_terms.is_empty() {
            writeln!(w, "    matched: {}", result.matched_terms.join(", "))?;
        }
        if explain {
            render_breakdown(result, w)?;
        }
    }

    if explain {
        writeln!(w)?;
        pretty_section(w, "Stages")?;
        for timing in &response.trace.stages {
            write!(
                w,
                "{:<18} {:<9} {:>6} ms {:>4} results",
                timing.stage.as_str(),
                timing.status.as_str(),
                timing.elapsed.as_millis(),
                timing.results
            )?;
            match &timing.note {
                Some(note) => writeln!(w, "  {note}")?,
                None => writeln!(w)?,
            }
        }
        pretty_rule(w)?;
        writeln!(w, "total {} ms", response.trace.total.as_millis())?;
    }
    Ok(())
}

fn render_breakdown(result: &RankedResult, w: &mut dyn Write) -> io::Result<()> {
    let signals: Vec<String> = Signal::ALL
        .iter()
        .map(|signal| format!("{}={:.2}", signal.as_str(), result.scores.get(*signal)))
        .collect();
    writeln!(w, "    signals: {}", signals.join(" "))?;
    if result.scores.diversity_penalty > 0.0 {
        writeln!(w, "    diversity penalty: {:.3}", result.scores.diversity_penalty)?;
    }
    if let Some(debug) = &result.debug {
        writeln!(
            w,
            "    raw {:.3}  standard {:.3}  enhanced {:.3}",
            debug.raw_score, debug.original_score, debug.enhanced_score
        )?;
        for fallback in &debug.fallbacks {
            writeln!(
                w,
                "    fallback {} -> {:.2}: {}",
                fallback.signal.as_str(),
                fallback.value,
                fallback.reason
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(query: &str) -> SearchArgs {
        SearchArgs {
            query: query.to_string(),
            limit: None,
            profile: None,
            threshold: None,
            expand: false,
            basic: false,
            fixture: None,
            judge_url: None,
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            explain: false,
        }
    }

    #[test]
    fn unset_flags_leave_request_defaults() {
        let request = args("ledger").request();
        assert_eq!(request, SearchRequest::new("ledger"));
    }

    #[test]
    fn flags_map_onto_request() {
        let mut a = args("ledger");
        a.limit = Some(3);
        a.threshold = Some(0.4);
        a.profile = Some("Adaptive".to_string());
        a.expand = true;
        a.basic = true;

        let request = a.request();
        assert_eq!(request.limit, Some(3));
        assert_eq!(request.semantic_threshold, Some(0.4));
        assert_eq!(request.profile, Some(ProfileSelector::Adaptive));
        assert!(request.expand_query);
        assert!(!request.full_pipeline);
    }
}
