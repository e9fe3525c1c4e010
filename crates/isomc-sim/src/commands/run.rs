use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use isomc_core::{IsoError, RngHandle};
use isomc_mcmc::{run_blocks, BlockSession, RunSummary, SamplerConfig, SyntheticBlockSpec};
use isomc_stats::BlockStatistics;
use log::{info, warn};
use serde::Serialize;

use crate::write_json;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Sampler configuration (YAML). Defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Synthetic block description (JSON); the default block when omitted.
    #[arg(long)]
    pub block_spec: Option<PathBuf>,
    /// Number of blocks to synthesise.
    #[arg(long, default_value_t = 4)]
    pub blocks: u32,
    /// Overrides the configured master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Serialize)]
struct BlockReport {
    block_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<BlockStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<IsoError>,
    log: Vec<String>,
}

#[derive(Serialize)]
struct RunReport {
    master_seed: u64,
    config: SamplerConfig,
    blocks: Vec<BlockReport>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => SamplerConfig::from_path(path)?,
        None => SamplerConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    let template: SyntheticBlockSpec = match &args.block_spec {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SyntheticBlockSpec::default(),
    };
    let method = template.analysis_method()?;

    let mut sessions = Vec::with_capacity(args.blocks as usize);
    for block_id in 1..=args.blocks {
        let spec = SyntheticBlockSpec {
            block_id,
            ..template.clone()
        };
        // Data noise is seeded separately from the sampler streams.
        let mut rng = RngHandle::for_block(config.seed_policy.master_seed ^ u64::MAX, block_id);
        sessions.push(BlockSession::new(spec.generate(&mut rng)?, config.clone())?);
    }
    info!(
        "sampling {} blocks with {} iterations each",
        sessions.len(),
        config.iterations
    );

    let results = run_blocks(&mut sessions);
    let blocks = sessions
        .iter()
        .zip(results)
        .map(|(session, result)| {
            let (summary, statistics, error) = match result {
                Ok(summary) => match session.statistics(&method) {
                    Ok(statistics) => (Some(summary), Some(statistics), None),
                    Err(err) => (Some(summary), None, Some(err)),
                },
                Err(err) => (None, None, Some(err)),
            };
            if let Some(err) = &error {
                warn!("block {}: {}", session.block_id(), err);
            }
            BlockReport {
                block_id: session.block_id(),
                summary,
                statistics,
                error,
                log: session.log_lines().to_vec(),
            }
        })
        .collect();

    let report = RunReport {
        master_seed: config.seed_policy.master_seed,
        config,
        blocks,
    };
    match &args.out {
        Some(path) => write_json(path, &report)?,
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
