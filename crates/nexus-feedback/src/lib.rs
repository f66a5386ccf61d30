#![forbid(unsafe_code)]
//! Adaptive weighting for nexus ranking.
//!
//! The ranking pipeline only sees the [`ProfileStore`] capability: give it a
//! query context, get back a [`WeightProfile`](nexus_core::model::WeightProfile).
//! How those weights were derived stays behind the trait.
//!
//! Two stores are provided:
//! - [`StaticProfileStore`] always answers with one fixed profile.
//! - [`ThompsonProfileStore`] keeps Beta posteriors per query context and per
//!   candidate, updated from recorded outcomes.

pub mod log;
pub mod outcome;
pub mod store;
pub mod thompson;

pub use log::{append_feedback_event, feedback_log_path, load_feedback_events};
pub use outcome::{FeedbackEvent, Outcome, OutcomeAction};
pub use store::{NEUTRAL_HISTORY, ProfileStore, StaticProfileStore};
pub use thompson::{
    CandidateHistory, ContextPosteriors, LearnedState, ThompsonProfileStore, WeightPosterior,
    sample_multipliers, update_from_outcome,
};
