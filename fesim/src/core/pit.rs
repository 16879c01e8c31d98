use serde::{Deserialize, Serialize};

use crate::core::rng::SimRng;

/// * `energy_pit_duration_s` - (s) Nominal standstill time of an energy stop
/// * `duration_jitter_s` - (s) Half-width of the uniform duration spread
/// * `energy_critical_frac` - (-) Energy fraction below which a stop is considered
/// * `energy_margin` - (-) Safety factor on the projected energy need
/// * `recharge_frac` - (-) Battery fraction restored by the stop
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PitPars {
    pub energy_pit_duration_s: f64,
    pub duration_jitter_s: f64,
    pub energy_critical_frac: f64,
    pub energy_margin: f64,
    pub recharge_frac: f64,
}

impl Default for PitPars {
    fn default() -> PitPars {
        PitPars {
            energy_pit_duration_s: 30.0,
            duration_jitter_s: 2.0,
            energy_critical_frac: 0.15,
            energy_margin: 1.1,
            recharge_frac: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitStop {
    pub car_no: u32,
    pub lap: u32,
    pub time_s: f64,
    pub duration_s: f64,
}

/// Energy-critical pit decision logic, evaluated at lap boundaries.
#[derive(Debug)]
pub struct PitStrategy {
    pars: PitPars,
    rng: SimRng,
    stops: Vec<PitStop>,
}

impl PitStrategy {
    pub fn new(pars: PitPars, rng: SimRng) -> PitStrategy {
        PitStrategy {
            pars,
            rng,
            stops: Vec::new(),
        }
    }

    /// Decides whether a car should stop for energy. The consumption rate so
    /// far is extrapolated over the remaining distance; a stop is taken only
    /// if the energy fraction is critical and the projected need (with margin)
    /// exceeds what is left.
    pub fn should_pit_energy(
        &self,
        energy: f64,
        initial_energy: f64,
        dist_remaining_m: f64,
        dist_done_m: f64,
    ) -> (bool, &'static str) {
        if initial_energy <= 0.0 || dist_done_m <= 0.0 {
            return (false, "no consumption history yet");
        }

        let frac = energy / initial_energy;
        if frac >= self.pars.energy_critical_frac {
            return (false, "energy level not critical");
        }

        let rate = (initial_energy - energy) / dist_done_m;
        let needed = rate * dist_remaining_m * self.pars.energy_margin;
        if energy < needed {
            (true, "energy critical, cannot reach the finish")
        } else {
            (false, "critical but sufficient to finish")
        }
    }

    /// Commits a stop and returns its record. The duration jitters uniformly
    /// around the nominal standstill time.
    pub fn execute_pit_stop(&mut self, car_no: u32, lap: u32, time_s: f64) -> PitStop {
        let jitter = self
            .rng
            .uniform(-self.pars.duration_jitter_s, self.pars.duration_jitter_s);
        let stop = PitStop {
            car_no,
            lap,
            time_s,
            duration_s: self.pars.energy_pit_duration_s + jitter,
        };
        self.stops.push(stop.clone());
        stop
    }

    pub fn recharge_frac(&self) -> f64 {
        self.pars.recharge_frac
    }

    pub fn stop_count(&self, car_no: u32) -> u32 {
        self.stops.iter().filter(|s| s.car_no == car_no).count() as u32
    }

    pub fn stops(&self) -> &[PitStop] {
        &self.stops
    }
}
