//! `nx feedback` records whether a ranked result was useful.

use crate::cmd::{load_config, open_adaptive_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use nexus_core::model::QueryContext;
use nexus_feedback::{Outcome, OutcomeAction, ProfileStore};
use nexus_search::QueryPreprocessor;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
#[command(
    about = "Record feedback on a result",
    long_about = "Record that a ranked document was accepted or rejected. Outcomes update the \
                  adaptive weights for the query's context and the document's historical score.",
    after_help = "EXAMPLES:\n    # Accept a result for a query\n    nx feedback 2 --query \"blockchain ledger\"\n\n\
                  # Reject a result within an explicit domain\n    nx feedback 4 --reject --domain Cryptography"
)]
pub struct FeedbackArgs {
    /// Document id.
    pub id: String,

    /// Mark the document as rejected instead of accepted.
    #[arg(long)]
    pub reject: bool,

    /// Query the result was ranked for; used to infer the context.
    #[arg(long, conflicts_with = "domain")]
    pub query: Option<String>,

    /// Explicit domain for the context.
    #[arg(long)]
    pub domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackOutput {
    pub id: String,
    pub action: OutcomeAction,
    pub context: String,
    pub context_outcomes: u64,
    pub historical_score: Option<f32>,
}

/// Execute `nx feedback <id>`.
///
/// # Errors
///
/// Returns an error if the config is invalid or the outcome cannot be persisted.
pub fn run_feedback(
    args: &FeedbackArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let config = load_config(project_root)?;
    let store = open_adaptive_store(project_root, &config)?;

    let context = match (&args.domain, &args.query) {
        (Some(domain), _) => QueryContext::for_domain(domain.clone()),
        (None, Some(query)) => {
            QueryPreprocessor::from_config(&config.expansion)
                .preprocess(query, false)
                .context
        }
        (None, None) => QueryContext::default(),
    };

    let action = if args.reject {
        OutcomeAction::Rejected
    } else {
        OutcomeAction::Accepted
    };
    let weights = store.profile_for(&context).weights;
    store.record(&context, &Outcome::new(args.id.clone(), action, weights))?;

    let key = context.key();
    let context_outcomes = store
        .snapshot()
        .contexts
        .get(&key)
        .map_or(0, |learned| learned.outcomes);
    let summary = FeedbackOutput {
        id: args.id.clone(),
        action,
        context: key,
        context_outcomes,
        historical_score: store.historical_score(&args.id),
    };
    render_mode(output, &summary, render_feedback_text, render_feedback_pretty)
}

const fn action_label(action: OutcomeAction) -> &'static str {
    match action {
        OutcomeAction::Accepted => "accepted",
        OutcomeAction::Rejected => "rejected",
    }
}

fn render_feedback_text(summary: &FeedbackOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}",
        summary.id,
        action_label(summary.action),
        summary.context
    )
}

fn render_feedback_pretty(summary: &FeedbackOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Feedback recorded")?;
    pretty_kv(w, "document", &summary.id)?;
    pretty_kv(w, "action", action_label(summary.action))?;
    pretty_kv(w, "context", &summary.context)?;
    pretty_kv(w, "outcomes", summary.context_outcomes.to_string())?;
    if let Some(score) = summary.historical_score {
        pretty_kv(w, "history", format!("{score:.3}"))?;
    }
    Ok(())
}
