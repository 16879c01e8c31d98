use std::collections::BTreeMap;
use std::time::Instant;

use clap::Parser;
use rayon::prelude::*;

use fesim::core::handle_race::handle_race;
use fesim::post::race_result::RaceResult;
use fesim::pre::read_sim_pars::{default_sim_pars, read_sim_pars, SimPars};
use fesim::pre::sim_opts::SimOpts;

fn main() -> anyhow::Result<()> {
    let opts = SimOpts::parse();

    let sim_pars = load_sim_pars(&opts)?;
    println!(
        "INFO: simulating {} race(s) on {} with {} cars, seed {}",
        opts.no_sim_runs,
        sim_pars.track_pars.name,
        sim_pars.race_pars.participants.len(),
        sim_pars.race_pars.seed
    );

    if opts.no_sim_runs <= 1 {
        run_single(&opts, &sim_pars)
    } else {
        run_sweep(&opts, &sim_pars)
    }
}

fn load_sim_pars(opts: &SimOpts) -> anyhow::Result<SimPars> {
    match &opts.parfile_path {
        Some(path) => {
            let mut sim_pars = read_sim_pars(path)?;
            sim_pars.race_pars.seed = opts.seed;
            Ok(sim_pars)
        }
        None => Ok(default_sim_pars(
            opts.no_cars,
            opts.seed,
            opts.duration_mins * 60.0,
        )),
    }
}

fn run_single(opts: &SimOpts, sim_pars: &SimPars) -> anyhow::Result<()> {
    let t_start = Instant::now();
    let result = handle_race(sim_pars, opts.timestep_size, opts.print_events)?;
    if opts.debug {
        println!(
            "INFO: simulation took {:.3} s",
            t_start.elapsed().as_secs_f64()
        );
    }

    result.print_classification();
    result.print_event_log();
    result.print_overtaking_stats();
    Ok(())
}

/// Simulates many races in parallel with incrementing seeds and prints
/// aggregate statistics over all of them.
fn run_sweep(opts: &SimOpts, sim_pars: &SimPars) -> anyhow::Result<()> {
    let t_start = Instant::now();

    let results: Vec<RaceResult> = (0..opts.no_sim_runs as u64)
        .into_par_iter()
        .map(|i| {
            let mut run_pars = sim_pars.clone();
            run_pars.race_pars.seed = sim_pars.race_pars.seed.wrapping_add(i);
            handle_race(&run_pars, opts.timestep_size, false)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if opts.debug {
        println!(
            "INFO: {} simulations took {:.3} s",
            results.len(),
            t_start.elapsed().as_secs_f64()
        );
    }

    let mut wins: BTreeMap<u32, u32> = BTreeMap::new();
    let mut total_safety_cars = 0;
    let mut total_crashes = 0;
    let mut total_dnfs = 0;
    let mut total_overtakes = 0;
    for result in &results {
        if let Some(winner) = result.winner() {
            *wins.entry(winner.car_no).or_insert(0) += 1;
        }
        total_safety_cars += result.summary.total_safety_cars;
        total_crashes += result.summary.total_crashes;
        total_dnfs += result.summary.dnfs;
        total_overtakes += result.overtaking_stats.successes;
    }

    let no_races = results.len() as f64;
    println!("RESULT: wins over {} races:", results.len());
    for (car_no, no_wins) in &wins {
        println!(
            "RESULT: car {:>3}: {:>4} ({:.0}%)",
            car_no,
            no_wins,
            *no_wins as f64 / no_races * 100.0
        );
    }
    println!(
        "RESULT: per race averages: {:.2} safety cars, {:.2} crashes, {:.2} DNFs, {:.2} overtakes",
        total_safety_cars as f64 / no_races,
        total_crashes as f64 / no_races,
        total_dnfs as f64 / no_races,
        total_overtakes as f64 / no_races
    );
    Ok(())
}
