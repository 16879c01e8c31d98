use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::core::attack_mode::AttackModePars;
use crate::core::car::{CarPars, PerfPars};
use crate::core::events::EventPars;
use crate::core::overtaking::OvertakingPars;
use crate::core::pit::PitPars;
use crate::core::race::RacePars;
use crate::pre::track::TrackPars;

/// Complete parameter set of one race, as read from a parameter file.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    pub track_pars: TrackPars,
    pub car_pars: Vec<CarPars>,
}

impl SimPars {
    /// Car parameters keyed by car number for constant time lookup.
    pub fn car_pars_all(&self) -> HashMap<u32, CarPars> {
        self.car_pars
            .iter()
            .map(|cp| (cp.car_no, cp.clone()))
            .collect()
    }
}

/// Reads a JSON parameter file into SimPars.
pub fn read_sim_pars(parfile_path: &Path) -> anyhow::Result<SimPars> {
    let parfile = OpenOptions::new()
        .read(true)
        .open(parfile_path)
        .with_context(|| format!("could not open parameter file {:?}", parfile_path))?;

    let sim_pars: SimPars = serde_json::from_reader(parfile)
        .with_context(|| format!("could not parse parameter file {:?}", parfile_path))?;

    Ok(sim_pars)
}

/// Builds a default parameter set without a parameter file: a Berlin-like
/// 2.4 km track with identically parameterized cars numbered from 1. The
/// per-car performance spread still comes from the seeded random draws.
pub fn default_sim_pars(no_cars: u32, seed: u64, duration_s: f64) -> SimPars {
    let participants: Vec<u32> = (1..=no_cars).collect();
    let car_pars = participants
        .iter()
        .map(|&car_no| CarPars {
            car_no,
            m: 880.0,
            eta_motor: 0.9,
            initial_energy: 6.6e8,
        })
        .collect();

    SimPars {
        race_pars: RacePars {
            duration_s,
            participants,
            seed,
            event_pars: EventPars::default(),
            attack_pars: AttackModePars::default(),
            overtaking_pars: OvertakingPars::default(),
            pit_pars: PitPars::default(),
            perf_pars: PerfPars::default(),
            use_auto_attack: true,
            use_pit_stops: false,
            snapshot_interval_s: 5.0,
            overtake_window_s: 2.0,
            auto_attack_energy_frac: 0.3,
        },
        track_pars: TrackPars {
            name: "Berlin Tempelhof".to_string(),
            length: 2400.0,
            t_lap_ref: 48.0,
            raceline_file: None,
        },
        car_pars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pars_cover_all_cars() {
        let sim_pars = default_sim_pars(10, 42, 2700.0);
        assert_eq!(sim_pars.car_pars.len(), 10);
        assert_eq!(sim_pars.race_pars.participants.len(), 10);
        let car_pars_all = sim_pars.car_pars_all();
        for car_no in 1..=10 {
            assert!(car_pars_all.contains_key(&car_no));
        }
        assert_eq!(sim_pars.race_pars.seed, 42);
    }

    #[test]
    fn parfile_parses_with_minimal_race_block() {
        let raw = r#"{
            "race_pars": {"duration_s": 1800.0, "participants": [4, 7]},
            "track_pars": {"name": "Monaco", "length": 2200.0, "t_lap_ref": 50.0},
            "car_pars": [
                {"car_no": 4},
                {"car_no": 7, "initial_energy": 5.0e8}
            ]
        }"#;
        let sim_pars: SimPars = serde_json::from_str(raw).unwrap();
        assert_eq!(sim_pars.race_pars.seed, 42);
        assert!(sim_pars.race_pars.use_auto_attack);
        assert!(!sim_pars.race_pars.use_pit_stops);
        assert_eq!(sim_pars.car_pars[1].initial_energy, 5.0e8);
        assert_eq!(sim_pars.car_pars[0].m, 880.0);
    }
}
