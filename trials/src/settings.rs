use crate::output::OutputTo;
use anyhow::{Context, Result};
use clap::Parser;
use decoder::{keys::Key, random::Seed};
use derive_builder::Builder;
use getset::{CopyGetters, Getters};
use std::num::NonZeroU64;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(short = 'r', long = "trials", help = "Number of trials (required)")]
    number: f64, // parsed as scientific notation to usize
    #[arg(
        short = 'i',
        long = "max-iter",
        default_value_t = decoder::parameters::NB_ITER as u64,
        help = "Per-trial iteration cap"
    )]
    max_iter: u64,
    #[arg(long, help = "Always use the specified key (in JSON format)")]
    fixed_key: Option<String>,
    #[arg(short, long, help = "Output file [default: stdout]")]
    output: Option<String>,
    #[arg(
        long,
        help = "If output file already exists, overwrite without creating backup"
    )]
    overwrite: bool,
    #[arg(short = 'T', long = "threads", default_value_t = 1,
        help = "Number of worker threads (0: automatically chosen)")]
    threads: usize,
    #[arg(
        long,
        default_value_t = 10000.0,
        help = "Max number of decoding failures recorded"
    )]
    recordmax: f64, // parsed as scientific notation to usize
    #[arg(short, long, help = "Save to disk frequency [default: only at end]")]
    savefreq: Option<f64>, // parsed as scientific notation to usize
    #[arg(
        long,
        help = "Specify PRNG seed as 256-bit hex string [default: random]"
    )]
    seed: Option<String>,
    #[arg(long, conflicts_with = "threads",
        help = "Initialize PRNG to match specified thread index (single-threaded only)")]
    seed_index: Option<u32>,
    #[arg(short = 'q', long, help = "Suppress progress output")]
    quiet: bool,
    #[arg(short, long, action = clap::ArgAction::Count,
        help = "Print statistics and/or decoding failures [repeat for more verbose, max 3]")]
    verbose: u8,
}

#[derive(Builder, Clone, CopyGetters, Debug, PartialEq, Eq)]
pub struct Settings {
    #[getset(get_copy = "pub")]
    num_trials: u64,
    #[builder(default)]
    #[getset(get = "pub")]
    trial_settings: TrialSettings,
    #[builder(default)]
    save_frequency: Option<NonZeroU64>,
    #[builder(default = "10000")]
    #[getset(get_copy = "pub")]
    record_max: usize,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    verbose: u8,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    seed: Option<Seed>,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    seed_index: Option<u32>,
    #[builder(default = "1")]
    #[getset(get_copy = "pub")]
    threads: usize,
    #[builder(default)]
    #[getset(get = "pub")]
    output: OutputTo,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    overwrite: bool,
}

impl Settings {
    const MIN_SAVE_FREQUENCY: u64 = 10000;
    const MAX_THREAD_COUNT: usize = 1024;

    pub fn from_args(args: Args) -> Result<Self> {
        let settings = Self {
            num_trials: args.number as u64,
            trial_settings: TrialSettings::new(
                args.fixed_key
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .context("--fixed-key should be valid JSON representing a key")?
                    .map(Key::sorted),
                args.max_iter as usize,
            )?,
            save_frequency: args
                .savefreq
                .map(|s| s as u64)
                .map(|s| s.max(Self::MIN_SAVE_FREQUENCY))
                .and_then(NonZeroU64::new),
            record_max: args.recordmax as usize,
            verbose: if args.quiet { 0 } else { args.verbose.max(1) },
            seed: args
                .seed
                .as_deref()
                .map(Seed::try_from)
                .transpose()
                .context("--seed should be 256-bit hex string")?,
            seed_index: args.seed_index.map(|seed_idx| {
                if seed_idx >= 1 << 24 {
                    eprintln!("Warning: very large PRNG seed index will be slow to initialize.");
                }
                seed_idx
            }),
            threads: args.threads.clamp(0, Self::MAX_THREAD_COUNT),
            output: args
                .output
                .map_or(OutputTo::Stdout, |path| OutputTo::File(path.into())),
            overwrite: args.overwrite,
        };
        Ok(settings)
    }

    #[inline]
    pub fn fixed_key(&self) -> Option<&Key> {
        self.trial_settings.fixed_key()
    }

    #[inline]
    pub fn max_iter(&self) -> usize {
        self.trial_settings.max_iter()
    }

    #[inline]
    pub fn save_frequency(&self) -> u64 {
        self.save_frequency.map_or(self.num_trials, u64::from)
    }

    /// `true` when more than one worker thread will run trials (either a
    /// fixed count > 1, or 0 meaning "let rayon choose").
    #[inline]
    pub fn parallel(&self) -> bool {
        self.threads != 1
    }
}

#[derive(Clone, CopyGetters, Debug, PartialEq, Eq)]
pub struct TrialSettings {
    fixed_key: Option<Key>,
    #[getset(get_copy = "pub")]
    max_iter: usize,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            fixed_key: None,
            max_iter: decoder::parameters::NB_ITER,
        }
    }
}

impl TrialSettings {
    pub fn new(fixed_key: Option<Key>, max_iter: usize) -> Result<Self> {
        if let Some(key) = fixed_key.as_ref() {
            key.validate()
                .context("--fixed-key must specify valid key support")?;
        }
        Ok(Self {
            fixed_key,
            max_iter,
        })
    }

    #[inline]
    pub fn fixed_key(&self) -> Option<&Key> {
        self.fixed_key.as_ref()
    }
}
