use crate::core::rng::SimRng;
use serde::{Deserialize, Serialize};

/// * `car_no` - Car number (unique per race)
/// * `m` - (kg) Car mass before the per-car variation draw
/// * `eta_motor` - (-) Drivetrain efficiency before the per-car variation draw
/// * `initial_energy` - (J) Usable battery energy at the start
#[derive(Debug, Deserialize, Clone)]
pub struct CarPars {
    pub car_no: u32,
    #[serde(default = "default_mass")]
    pub m: f64,
    #[serde(default = "default_eta_motor")]
    pub eta_motor: f64,
    #[serde(default = "default_initial_energy")]
    pub initial_energy: f64,
}

fn default_mass() -> f64 {
    880.0
}

fn default_eta_motor() -> f64 {
    0.9
}

fn default_initial_energy() -> f64 {
    6.6e8
}

/// Tunables of the simplified per-step performance model.
/// * `m_nominal` - (kg) Reference mass, heavier cars pace below 1.0
/// * `pace_mass_gain` - (-) Pace sensitivity to relative mass deviation
/// * `pace_lap_std` - (-) Std dev of the per-lap pace noise factor
/// * `tire_deg_per_lap` - (-) Speed factor lost per lap of tire wear
/// * `tire_factor_min` - (-) Floor of the tire speed factor
/// * `energy_frac_knee` - (-) Energy fraction below which lift-and-coast starts
/// * `energy_factor_low` - (-) Speed factor at zero remaining energy
/// * `attack_speed_mult` - (-) Speed multiplier while attack mode is active
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerfPars {
    pub m_nominal: f64,
    pub pace_mass_gain: f64,
    pub pace_lap_std: f64,
    pub tire_deg_per_lap: f64,
    pub tire_factor_min: f64,
    pub energy_frac_knee: f64,
    pub energy_factor_low: f64,
    pub attack_speed_mult: f64,
}

impl Default for PerfPars {
    fn default() -> PerfPars {
        PerfPars {
            m_nominal: 880.0,
            pace_mass_gain: 0.1,
            pace_lap_std: 0.002,
            tire_deg_per_lap: 0.0015,
            tire_factor_min: 0.9,
            energy_frac_knee: 0.15,
            energy_factor_low: 0.9,
            attack_speed_mult: 1.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetirementReason {
    None,
    OutOfEnergy,
    Crash,
}

impl Default for RetirementReason {
    fn default() -> Self {
        RetirementReason::None
    }
}

/// Mutable per-car record, updated once per simulation step by the race
/// orchestrator. Once `active` is false the car is frozen: no kinematic or
/// energy updates are applied anymore, only historical queries remain valid.
#[derive(Debug)]
pub struct Car {
    pub car_no: u32,
    /// Completed laps.
    pub lap: u32,
    /// (m) Distance along the track, wraps at the track length.
    pub s_track: f64,
    /// (m/s) Current speed.
    pub vel: f64,
    /// (J) Remaining energy, never negative.
    pub energy: f64,
    /// (s) Race clock at the last update of this car.
    pub racetime: f64,
    /// Current rank (1 = leader). Frozen at its last value after retirement.
    pub position: u32,
    pub gap_leader: f64,
    pub gap_ahead: f64,
    pub gap_behind: f64,
    /// Append-only lap time history.
    pub laptimes: Vec<f64>,
    pub active: bool,
    pub retirement: RetirementReason,
    pub initial_energy: f64,
    /// (laps) Accumulated tire wear, reset by a pit stop.
    pub tire_wear: f64,
    /// (s) Remaining standstill time of an ongoing pit stop.
    pub pit_hold_s: f64,
    pub pit_count: u32,
    eta_motor: f64,
    pace_factor: f64,
    lap_noise: f64,
    pace_lap_std: f64,
    lap_start_time: f64,
    new_lap: bool,
    rng: SimRng,
}

impl Car {
    /// Creates a car at the start line with full energy. The per-car
    /// variations (mass +/-2%, efficiency +/-3%, as in the reference vehicle
    /// data) are drawn once from the car's own random stream.
    pub fn new(car_pars: &CarPars, perf_pars: &PerfPars, mut rng: SimRng) -> Car {
        let m = car_pars.m * rng.uniform(0.98, 1.02);
        let eta_motor = car_pars.eta_motor * rng.uniform(0.97, 1.03);
        let pace_factor = 1.0 + (1.0 - m / perf_pars.m_nominal) * perf_pars.pace_mass_gain;

        Car {
            car_no: car_pars.car_no,
            lap: 0,
            s_track: 0.0,
            vel: 0.0,
            energy: car_pars.initial_energy,
            racetime: 0.0,
            position: 0,
            gap_leader: 0.0,
            gap_ahead: 0.0,
            gap_behind: 0.0,
            laptimes: Vec::new(),
            active: true,
            retirement: RetirementReason::None,
            initial_energy: car_pars.initial_energy,
            tire_wear: 0.0,
            pit_hold_s: 0.0,
            pit_count: 0,
            eta_motor,
            pace_factor,
            lap_noise: 1.0,
            pace_lap_std: perf_pars.pace_lap_std,
            lap_start_time: 0.0,
            new_lap: false,
            rng,
        }
    }

    /// Combined pace factor of the car itself (mass spread plus the per-lap
    /// noise redrawn at every lap start).
    pub fn pace_factor(&self) -> f64 {
        self.pace_factor * self.lap_noise
    }

    pub fn lap_frac(&self, track_length: f64) -> f64 {
        self.s_track / track_length
    }

    /// Race progress in laps, used for ranking: completed laps plus the
    /// fraction of the current one.
    pub fn race_prog(&self, track_length: f64) -> f64 {
        self.lap as f64 + self.s_track / track_length
    }

    pub fn energy_frac(&self) -> f64 {
        if self.initial_energy > 0.0 {
            self.energy / self.initial_energy
        } else {
            0.0
        }
    }

    /// Advances the car by one timestep at the given speed. Detects the lap
    /// wrap, records the lap time and bumps the tire wear on completion.
    /// Must only be called while the car is active.
    pub fn advance(&mut self, vel: f64, timestep_size: f64, track_length: f64, racetime: f64) {
        self.vel = vel;
        self.s_track += vel * timestep_size;
        self.racetime = racetime;

        if self.s_track >= track_length {
            self.s_track -= track_length;
            self.lap += 1;
            self.new_lap = true;
            self.laptimes.push(racetime - self.lap_start_time);
            self.lap_start_time = racetime;
            self.tire_wear += 1.0;
            self.lap_noise = 1.0 + self.rng.normal(0.0, self.pace_lap_std);
        }
    }

    /// Integrates energy consumption for one timestep. Returns true if the
    /// energy reached zero, in which case the car is retired on this very
    /// step with reason `OutOfEnergy`.
    pub fn consume_energy(&mut self, power_kw: f64, timestep_size: f64) -> bool {
        let consumed = power_kw * 1000.0 * timestep_size / self.eta_motor;
        self.energy -= consumed;

        if self.energy <= 0.0 {
            self.energy = 0.0;
            self.retire(RetirementReason::OutOfEnergy);
            return true;
        }
        false
    }

    pub fn retire(&mut self, reason: RetirementReason) {
        self.active = false;
        self.retirement = reason;
        self.vel = 0.0;
    }

    /// Drops the car back by the given time, e.g. the attack-mode activation
    /// penalty for leaving the racing line. The car never falls behind the
    /// start of its current lap.
    pub fn apply_time_penalty(&mut self, penalty_s: f64) {
        self.s_track = (self.s_track - self.vel * penalty_s).max(0.0);
    }

    /// Puts the car into a standing pit stop and recharges the battery.
    /// The recharge is the one sanctioned exception to the otherwise
    /// monotonically non-increasing energy level.
    pub fn begin_pit_stop(&mut self, duration_s: f64, recharge_frac: f64) {
        self.pit_hold_s = duration_s;
        self.pit_count += 1;
        self.energy = self.initial_energy * recharge_frac;
        self.tire_wear = 0.0;
        self.vel = 0.0;
    }

    /// Returns whether the car completed a lap since the last call and clears
    /// the flag.
    pub fn take_new_lap(&mut self) -> bool {
        let new_lap = self.new_lap;
        self.new_lap = false;
        new_lap
    }
}
