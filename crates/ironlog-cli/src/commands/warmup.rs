use clap::Subcommand;
use ironlog_core::Config;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum WarmupAction {
    /// Print the warmup ramp for a working weight
    Calc {
        /// Working weight
        weight: f64,
    },
    /// Print the configured warmup scheme
    Scheme,
}

pub fn run(action: WarmupAction) -> CliResult {
    let config = Config::load()?;
    match action {
        WarmupAction::Calc { weight } => print_json(&config.warmup.calculate(weight)),
        WarmupAction::Scheme => print_json(&config.warmup),
    }
}
