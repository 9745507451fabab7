use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use flexi_logger::{Logger, LoggerHandle};
use log::{debug, info};

use crate::config::Config;
use crate::error::ParentScanError;
use crate::format::format_file;
use crate::index::HttpIndex;
use crate::pipeline::{self, RunOptions};
use crate::report::COLLECTIONS_FILE;
use crate::sampling::RandomSampler;
use crate::sort::NameCollator;
use crate::validate::validate_file;

#[derive(Parser)]
#[command(
    name = "parentscan",
    version,
    about = "parentscan: detect parent/child collections and verify them against the index"
)]
pub struct Cli {
    /// Config file to use instead of the one in the data directory
    #[arg(long = "config", short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect parent/child collections and write collections and mismatch files
    Detect {
        /// Directory holding collections.json and collections/
        #[arg(long = "legacy-dir")]
        legacy_dir: Option<PathBuf>,

        /// Directory the output files are written to
        #[arg(long = "output-dir", short = 'o')]
        output_dir: Option<PathBuf>,

        /// Index base URL (e.g. http://localhost:80)
        #[arg(long = "base-url")]
        base_url: Option<String>,

        /// Members probed per collection during detection
        #[arg(long = "sample-size", value_parser = clap::value_parser!(u64).range(1..))]
        sample_size: Option<u64>,

        /// Pause between index requests, in milliseconds
        #[arg(long = "delay-ms")]
        delay_ms: Option<u64>,

        /// Seed for member sampling, for reproducible runs
        #[arg(long = "seed")]
        seed: Option<u64>,
    },

    /// Check a collections file for schema, ordering and duplicate-slug errors
    Validate {
        /// File to check (default: collections.json in the output directory)
        #[arg(long = "file", short = 'f')]
        file: Option<PathBuf>,
    },

    /// Trim names and re-sort a collections file in place
    Format {
        /// File to rewrite (default: collections.json in the output directory)
        #[arg(long = "file", short = 'f')]
        file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn handle_command_line() -> Result<(), ParentScanError> {
        let args = Cli::parse();

        let mut config = Self::load_config(args.config.as_deref())?;
        args.command.apply_overrides(&mut config);

        let _logger = Self::start_logger(&config)?;
        debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());
        debug!("Effective config: {:?}", config);

        Self::dispatch(args.command, &config)
    }

    fn dispatch(command: Command, config: &Config) -> Result<(), ParentScanError> {
        match command {
            Command::Detect { seed, .. } => Self::detect(config, seed),
            Command::Validate { file } => {
                let collator = NameCollator::new()?;
                validate_file(&Self::collections_path(config, file), &collator)?;
                Ok(())
            }
            Command::Format { file } => {
                let collator = NameCollator::new()?;
                format_file(&Self::collections_path(config, file), &collator)?;
                Ok(())
            }
        }
    }

    fn load_config(explicit: Option<&Path>) -> Result<Config, ParentScanError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ParentScanError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Config::load_from(path);
        }

        match ProjectDirs::from("", "", "parentscan") {
            Some(project_dirs) => Config::load_config(&project_dirs),
            None => Config::load_from(Path::new("parentscan.toml")),
        }
    }

    fn start_logger(config: &Config) -> Result<LoggerHandle, ParentScanError> {
        let handle = Logger::try_with_str(config.logging.log_spec())?
            .format(flexi_logger::default_format)
            .start()?;
        Ok(handle)
    }

    fn collections_path(config: &Config, file: Option<PathBuf>) -> PathBuf {
        file.unwrap_or_else(|| config.paths.output_dir.join(COLLECTIONS_FILE))
    }

    fn detect(config: &Config, seed: Option<u64>) -> Result<(), ParentScanError> {
        let options = RunOptions {
            legacy_dir: config.paths.legacy_dir.clone(),
            output_dir: config.paths.output_dir.clone(),
            sample_size: config.detection.sample_size,
        };
        info!(
            "Checking {} against {} (sample size {}, delay {}ms)",
            options.legacy_dir.display(),
            config.index.base_url,
            options.sample_size,
            config.index.delay_ms
        );

        let collator = NameCollator::new()?;
        let mut index = HttpIndex::new(&config.index)?;
        let mut sampler = match seed {
            Some(seed) => RandomSampler::seeded(seed),
            None => RandomSampler::from_entropy(),
        };

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| ParentScanError::Error(format!("Failed to create runtime: {}", e)))?;

        let summary = rt.block_on(pipeline::run(&mut index, &mut sampler, &options, &collator))?;
        debug!("Run summary: {:?}", summary);
        Ok(())
    }
}

impl Command {
    /// Command-line flags win over the config file and environment.
    fn apply_overrides(&self, config: &mut Config) {
        if let Command::Detect {
            legacy_dir,
            output_dir,
            base_url,
            sample_size,
            delay_ms,
            ..
        } = self
        {
            if let Some(dir) = legacy_dir {
                config.paths.legacy_dir = dir.clone();
            }
            if let Some(dir) = output_dir {
                config.paths.output_dir = dir.clone();
            }
            if let Some(url) = base_url {
                config.index.base_url = url.clone();
            }
            if let Some(size) = sample_size {
                config.detection.sample_size = *size as usize;
            }
            if let Some(delay) = delay_ms {
                config.index.delay_ms = *delay;
            }
            config.ensure_valid();
        }
    }
}
