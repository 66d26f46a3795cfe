use anyhow::Context;
use std::env;
use tracing_subscriber::EnvFilter;

use flowcurve::config::{read_config, Algorithm};
use flowcurve::driver::{evaluate, ReplayOptions};
use flowcurve::logger::{summarize, ReportLogger};
use flowcurve::sketch::Sketch;
use flowcurve::synthetic::{generate, TrafficProfile};

const KNOWN_FLAGS: [&str; 2] = ["--all", "--per-packet"];

fn unknown_flags<'a>(flags: &[&'a str]) -> Vec<&'a str> {
    flags
        .iter()
        .copied()
        .filter(|f| !KNOWN_FLAGS.contains(f))
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowcurve=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let flags: Vec<&str> = args[1..]
        .iter()
        .map(String::as_str)
        .filter(|a| a.starts_with("--"))
        .collect();
    let positional: Vec<&str> = args[1..]
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect();
    let unknown = unknown_flags(&flags);
    if !unknown.is_empty() {
        eprintln!("Unknown option(s): {}", unknown.join(", "));
    }
    if positional.is_empty() || !unknown.is_empty() {
        eprintln!(
            "Usage: {} <config.json> [output.csv] [--all] [--per-packet]",
            args[0]
        );
        std::process::exit(2);
    }

    let config_path = positional[0];
    let output = positional.get(1).copied().unwrap_or("results.csv");
    let run_all = flags.contains(&"--all");
    let options = ReplayOptions {
        per_packet: flags.contains(&"--per-packet"),
    };

    let config = read_config(config_path)
        .with_context(|| format!("loading config from {}", config_path))?;
    let profile = TrafficProfile {
        window_us: config.window_us,
        seed: config.seed,
        ..TrafficProfile::default()
    };
    let truth = generate(&profile);

    let algorithms: Vec<Algorithm> = if run_all {
        Algorithm::ALL.to_vec()
    } else {
        vec![config.algorithm]
    };

    let mut logger = ReportLogger::new(output)
        .with_context(|| format!("opening report file {}", output))?;
    for algorithm in algorithms {
        let mut sketch = Sketch::from_config(&config.clone().with_algorithm(algorithm))
            .with_context(|| format!("building {}", algorithm))?;
        let reports = evaluate(&mut sketch, &truth, options);
        logger.log_reports(&reports)?;
        print!("{}", summarize(&reports));
    }
    println!("Total packets replayed: {}", truth.total_packets());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_flags_pass() {
        assert!(unknown_flags(&["--all", "--per-packet"]).is_empty());
        assert_eq!(unknown_flags(&["--al", "--all", "--verbose"]), vec!["--al", "--verbose"]);
    }
}
