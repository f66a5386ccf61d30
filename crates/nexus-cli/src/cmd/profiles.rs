//! `nx profiles` lists the registered weight profiles.

use crate::cmd::load_config;
use crate::output::{OutputMode, pretty_section, render_mode};
use clap::Args;
use nexus_core::model::{Signal, WeightProfile};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
#[command(
    about = "List weight profiles",
    long_about = "List the built-in and configured weight profiles with their signal weights.",
    after_help = "EXAMPLES:\n    # List profiles\n    nx profiles\n\n    # Emit machine-readable output\n    nx profiles --json"
)]
pub struct ProfilesArgs {}

#[derive(Debug, Serialize)]
pub struct ProfilesOutput {
    pub default_profile: String,
    pub adaptive: bool,
    pub profiles: Vec<WeightProfile>,
}

/// Execute `nx profiles`.
///
/// # Errors
///
/// Returns an error if the config is invalid or output rendering fails.
pub fn run_profiles(
    _args: &ProfilesArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let config = load_config(project_root)?;
    let registry = config.registry()?;
    let listing = ProfilesOutput {
        default_profile: config.search.default_profile.clone(),
        adaptive: config.feedback.adaptive,
        profiles: registry.iter().cloned().collect(),
    };
    render_mode(output, &listing, render_profiles_text, render_profiles_pretty)
}

fn weights_line(profile: &WeightProfile) -> String {
    Signal::ALL
        .iter()
        .map(|signal| format!("{}={:.2}", signal.as_str(), profile.weights.get(*signal)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_profiles_text(listing: &ProfilesOutput, w: &mut dyn Write) -> io::Result<()> {
    for profile in &listing.profiles {
        writeln!(w, "{}\t{}", profile.name, weights_line(profile))?;
    }
    Ok(())
}

fn render_profiles_pretty(listing: &ProfilesOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Weight profiles")?;
    for profile in &listing.profiles {
        let marker = if profile.name == listing.default_profile {
            "*"
        } else {
            " "
        };
        writeln!(w, "{marker} {:<14} {}", profile.name, weights_line(profile))?;
    }
    if listing.adaptive {
        writeln!(w)?;
        writeln!(
            w,
            "adaptive weighting is on; weights are sampled per query context from '{}'",
            listing.default_profile
        )?;
    }
    Ok(())
}
