use crate::client::{GitHubTransport, RateLimitedClient, SystemClock, ThrottlePolicy};
use crate::config::{self, CollectorConfig};
use crate::pipeline;
use crate::snapshot::PublishOutcome;
use crate::AppError;
use std::path::Path;

pub struct CollectArgs<'a> {
    pub output: &'a Path,
    pub config: Option<&'a Path>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
}

pub fn collect_command(args: CollectArgs<'_>) -> Result<(), AppError> {
    let mut config = CollectorConfig::load(args.config)?;
    if let Some(min) = args.min_size {
        config.size_min = min;
    }
    if let Some(max) = args.max_size {
        config.size_max = max;
    }
    if config.size_min > config.size_max {
        return Err(AppError::InvalidRange {
            min: config.size_min,
            max: config.size_max,
        });
    }

    let token = config::token_from_env()?;
    let transport = GitHubTransport::new(token)?;
    let client = RateLimitedClient::new(
        transport,
        SystemClock,
        ThrottlePolicy::from_config(&config),
    );

    let report = pipeline::collect(&client, &config, args.output)?;

    println!("\n{}", "=".repeat(60));
    match report.outcome {
        PublishOutcome::Written => {
            println!("✓ Saved {} repositories to {}", report.retained, report.output.display());
            println!(
                "  discovered: {} | resolved: {} | kept: {}",
                report.discovered, report.enriched, report.retained
            );
        }
        PublishOutcome::Preserved => {
            println!("No repositories found; kept existing {}", report.output.display());
        }
    }
    println!("{}", "=".repeat(60));
    Ok(())
}
