use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "FE-TD",
    about = "A time-discrete Formula E race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing (timings)
    #[clap(short, long)]
    pub debug: bool,

    /// Print race events (safety car, crashes, weather, overtakes) as they happen
    #[clap(long)]
    pub print_events: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (seeds increment from the base seed)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file (OPTIONAL: if not set, uses a default 10-car race)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 1.0]
    #[clap(short, long, default_value = "0.2")]
    pub timestep_size: f64,

    /// Set number of cars when running without a parameter file
    #[clap(long, default_value = "10")]
    pub no_cars: u32,

    /// Set race duration in minutes when running without a parameter file
    #[clap(long, default_value = "45.0")]
    pub duration_mins: f64,

    /// Set master random seed
    #[clap(short, long, default_value = "42")]
    pub seed: u64,
}
