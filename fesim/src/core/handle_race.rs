use crate::core::race::Race;
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use crate::pre::track::Track;

/// Runs one race from a parameter set to its result.
pub fn handle_race(
    sim_pars: &SimPars,
    timestep_size: f64,
    print_events: bool,
) -> anyhow::Result<RaceResult> {
    let track = Track::new(&sim_pars.track_pars)?;
    let car_pars_all = sim_pars.car_pars_all();

    let mut race = Race::new(
        &sim_pars.race_pars,
        track,
        &car_pars_all,
        timestep_size,
        print_events,
    )?;

    while !race.finished {
        race.simulate_timestep();
    }

    Ok(RaceResult::new(&race))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pre::read_sim_pars::default_sim_pars;

    #[test]
    fn default_race_runs_to_a_result() {
        let sim_pars = default_sim_pars(6, 42, 300.0);
        let result = handle_race(&sim_pars, 0.2, false).unwrap();
        assert_eq!(result.car_results.len(), 6);
        assert_eq!(
            result.summary.finishers + result.summary.dnfs,
            6
        );
        assert!(result.winner().is_some());
    }
}
