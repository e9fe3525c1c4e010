use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use isomc_mcmc::SamplerConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write the YAML to this file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &ConfigArgs) -> Result<(), Box<dyn Error>> {
    let yaml = SamplerConfig::default().to_yaml()?;
    match &args.out {
        Some(path) => fs::write(path, yaml)?,
        None => print!("{yaml}"),
    }
    Ok(())
}
