use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use helpers::general::{argsort, lin_interp, SortOrder};

use crate::core::attack_mode::{AttackMode, AttackModeManager, AttackModePars};
use crate::core::car::{Car, CarPars, PerfPars, RetirementReason};
use crate::core::events::{EventPars, RaceEventEngine};
use crate::core::overtaking::{OvertakingModel, OvertakingPars};
use crate::core::pit::{PitPars, PitStrategy};
use crate::core::rng::SimRng;
use crate::error::SimError;
use crate::interfaces::strategy_interface::StrategyView;
use crate::pre::track::Track;

pub const MAX_CARS: usize = 20;

/// Gap placeholder used when a gap cannot be computed because the trailing
/// car is (momentarily) at standstill. Finite so result files stay valid JSON.
pub const GAP_SENTINEL: f64 = 999.0;

/// * `duration_s` - (s) Scheduled race duration, the leader then gets one more lap
/// * `participants` - Car numbers taking part, each needs a `CarPars` entry
/// * `seed` - Master seed, all component streams fork from it
/// * `use_auto_attack` - Activate attack mode automatically in the zone
/// * `use_pit_stops` - Allow one recharging stop per car when energy critical
/// * `snapshot_interval_s` - (s) Spacing of the stored race snapshots
/// * `overtake_window_s` - (s) Gap below which an overtake is attempted
/// * `auto_attack_energy_frac` - (-) No automatic activation below this level
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    pub duration_s: f64,
    pub participants: Vec<u32>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub event_pars: EventPars,
    #[serde(default)]
    pub attack_pars: AttackModePars,
    #[serde(default)]
    pub overtaking_pars: OvertakingPars,
    #[serde(default)]
    pub pit_pars: PitPars,
    #[serde(default)]
    pub perf_pars: PerfPars,
    #[serde(default = "default_true")]
    pub use_auto_attack: bool,
    #[serde(default)]
    pub use_pit_stops: bool,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_s: f64,
    #[serde(default = "default_overtake_window")]
    pub overtake_window_s: f64,
    #[serde(default = "default_auto_attack_energy_frac")]
    pub auto_attack_energy_frac: f64,
}

fn default_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

fn default_snapshot_interval() -> f64 {
    5.0
}

fn default_overtake_window() -> f64 {
    2.0
}

fn default_auto_attack_energy_frac() -> f64 {
    0.3
}

/// Periodic snapshot of the running order, kept for post-processing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub time_s: f64,
    pub lap: u32,
    pub leader_no: u32,
    pub safety_car_active: bool,
    pub weather_dry: bool,
    pub mu_weather: f64,
    /// (car_no, position) pairs in car number order.
    pub positions: Vec<(u32, u32)>,
}

/// Race holds the complete state of one race simulation and advances it in
/// fixed timesteps.
///
/// The update order within a step is fixed: clock, lap events, car kinematics
/// and energy, ranking, gaps, overtaking, attack mode, lap transitions,
/// history. Cars are stored sorted by car number so that every loop consumes
/// randomness in the same order and a seed replays bit-for-bit.
#[derive(Debug)]
pub struct Race {
    pub timestep_size: f64,
    pub cur_racetime: f64,
    pub duration_s: f64,
    pub finished: bool,
    /// Lap after which the leader takes the flag, set once the scheduled
    /// duration has elapsed.
    pub chequered_lap: Option<u32>,
    /// Lap the leading car is currently on (completed laps + 1).
    pub cur_lap: u32,
    last_lap_checked: u32,
    pub leader_no: u32,
    pub track: Track,
    pub cars_list: Vec<Car>,
    pub events: RaceEventEngine,
    pub overtaking: OvertakingModel,
    pub attack_modes: AttackModeManager,
    pub pits: PitStrategy,
    attack_pars: AttackModePars,
    perf_pars: PerfPars,
    use_auto_attack: bool,
    use_pit_stops: bool,
    snapshot_interval_s: f64,
    overtake_window_s: f64,
    auto_attack_energy_frac: f64,
    pub history: Vec<RaceSnapshot>,
    next_snapshot_t: f64,
    print_events: bool,
}

impl Race {
    pub fn new(
        race_pars: &RacePars,
        track: Track,
        car_pars_all: &HashMap<u32, CarPars>,
        timestep_size: f64,
        print_events: bool,
    ) -> Result<Race, SimError> {
        Race::validate(race_pars, &track, car_pars_all, timestep_size)?;

        let mut master_rng = SimRng::new(race_pars.seed);
        let events_rng = master_rng.fork();
        let overtaking_rng = master_rng.fork();
        let pit_rng = master_rng.fork();

        // car number order fixes the rng consumption order
        let mut participants = race_pars.participants.clone();
        participants.sort_unstable();

        let mut cars_list = Vec::with_capacity(participants.len());
        let mut attack_modes = AttackModeManager::new();
        for car_no in participants {
            let mut car_rng = master_rng.fork();
            attack_modes.insert(AttackMode::new(
                car_no,
                &race_pars.attack_pars,
                track.length,
                &mut car_rng,
            ));
            // validated above, every participant has an entry
            let car_pars = &car_pars_all[&car_no];
            cars_list.push(Car::new(car_pars, &race_pars.perf_pars, car_rng));
        }
        let leader_no = cars_list[0].car_no;

        Ok(Race {
            timestep_size,
            cur_racetime: 0.0,
            duration_s: race_pars.duration_s,
            finished: false,
            chequered_lap: None,
            cur_lap: 1,
            last_lap_checked: 0,
            leader_no,
            track,
            cars_list,
            events: RaceEventEngine::new(race_pars.event_pars.clone(), events_rng),
            overtaking: OvertakingModel::new(race_pars.overtaking_pars.clone(), overtaking_rng),
            attack_modes,
            pits: PitStrategy::new(race_pars.pit_pars.clone(), pit_rng),
            attack_pars: race_pars.attack_pars.clone(),
            perf_pars: race_pars.perf_pars.clone(),
            use_auto_attack: race_pars.use_auto_attack,
            use_pit_stops: race_pars.use_pit_stops,
            snapshot_interval_s: race_pars.snapshot_interval_s,
            overtake_window_s: race_pars.overtake_window_s,
            auto_attack_energy_frac: race_pars.auto_attack_energy_frac,
            history: Vec::new(),
            next_snapshot_t: 0.0,
            print_events,
        })
    }

    fn validate(
        race_pars: &RacePars,
        track: &Track,
        car_pars_all: &HashMap<u32, CarPars>,
        timestep_size: f64,
    ) -> Result<(), SimError> {
        let no_cars = race_pars.participants.len();
        if no_cars < 1 || no_cars > MAX_CARS {
            return Err(SimError::CarCountOutOfRange {
                given: no_cars,
                max: MAX_CARS,
            });
        }
        let mut seen = Vec::with_capacity(no_cars);
        for &car_no in &race_pars.participants {
            if seen.contains(&car_no) {
                return Err(SimError::DuplicateCarNumber(car_no));
            }
            seen.push(car_no);
            if !car_pars_all.contains_key(&car_no) {
                return Err(SimError::MissingCarPars(car_no));
            }
        }
        if timestep_size <= 0.0 {
            return Err(SimError::NonPositiveTimestep(timestep_size));
        }
        if race_pars.duration_s <= 0.0 {
            return Err(SimError::NonPositiveDuration(race_pars.duration_s));
        }
        if track.length <= 0.0 {
            return Err(SimError::NonPositiveTrackLength(track.length));
        }
        if let Some([start, end]) = race_pars.attack_pars.zone {
            let in_track = |s: f64| (0.0..track.length).contains(&s);
            if !in_track(start) || !in_track(end) || (start - end).abs() < f64::EPSILON {
                return Err(SimError::MalformedActivationZone(start, end));
            }
        }

        let probabilities = [
            ("p_safety_car", race_pars.event_pars.p_safety_car),
            ("p_crash_per_car", race_pars.event_pars.p_crash_per_car),
            ("p_crash_causes_sc", race_pars.event_pars.p_crash_causes_sc),
            ("p_weather_change", race_pars.event_pars.p_weather_change),
            ("p_drying_per_lap", race_pars.event_pars.p_drying_per_lap),
            (
                "beyond_table_probability",
                race_pars.overtaking_pars.beyond_table_probability,
            ),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::ProbabilityOutOfRange { name, value });
            }
        }
        for bucket in &race_pars.overtaking_pars.success_table {
            if !(0.0..=1.0).contains(&bucket.probability) {
                return Err(SimError::ProbabilityOutOfRange {
                    name: "success_table probability",
                    value: bucket.probability,
                });
            }
        }

        let ep = &race_pars.event_pars;
        if ep.sc_laps_min < 1 || ep.sc_laps_min > ep.sc_laps_max {
            return Err(SimError::InvalidSafetyCarLaps(ep.sc_laps_min, ep.sc_laps_max));
        }

        Ok(())
    }

    /// Advances the race by one timestep. A no-op once the race is finished.
    pub fn simulate_timestep(&mut self) {
        if self.finished {
            return;
        }

        self.cur_racetime += self.timestep_size;
        self.check_lap_events();
        self.update_cars();
        self.update_positions();
        self.calc_gaps();
        self.check_overtaking();
        self.update_attack_modes();
        self.handle_lap_transitions();
        self.store_history();
    }

    /// Runs the per-lap event draws when the race lap counter has advanced
    /// since the last check, applies crashes and steps the safety car.
    fn check_lap_events(&mut self) {
        if self.cur_lap == self.last_lap_checked {
            return;
        }
        self.last_lap_checked = self.cur_lap;

        let active_cars: Vec<u32> = self
            .cars_list
            .iter()
            .filter(|c| c.active)
            .map(|c| c.car_no)
            .collect();
        let log_len = self.events.event_log().len();

        // the state machine steps before the draws, a deployment drawn this
        // lap keeps its full countdown
        self.events.update_safety_car(self.cur_lap, self.cur_racetime);
        let lap_events = self
            .events
            .check_lap_events(self.cur_lap, self.cur_racetime, &active_cars);
        for car_no in &lap_events.crashes {
            if let Some(car) = self.cars_list.iter_mut().find(|c| c.car_no == *car_no) {
                car.retire(RetirementReason::Crash);
            }
        }

        if self.print_events {
            for event in &self.events.event_log()[log_len..] {
                println!("INFO: lap {}: {}", event.lap, event.description);
            }
        }
    }

    /// Updates speed, distance and energy of every active car.
    fn update_cars(&mut self) {
        let sc_speed = self.events.safety_car_speed();
        let mu_weather = self.events.mu_weather;
        let timestep_size = self.timestep_size;
        let track_length = self.track.length;
        let cur_racetime = self.cur_racetime;

        for i in 0..self.cars_list.len() {
            if !self.cars_list[i].active {
                continue;
            }

            if self.cars_list[i].pit_hold_s > 0.0 {
                let car = &mut self.cars_list[i];
                car.pit_hold_s = (car.pit_hold_s - timestep_size).max(0.0);
                car.racetime = cur_racetime;
                continue;
            }

            let car = &self.cars_list[i];
            let (power_kw, attack_active) = match self.attack_modes.get(car.car_no) {
                Ok(mode) => (mode.power_kw(), mode.is_active()),
                Err(_) => (self.attack_pars.base_power_kw, false),
            };

            let tire_factor = (1.0 - self.perf_pars.tire_deg_per_lap * car.tire_wear)
                .max(self.perf_pars.tire_factor_min);
            let energy_factor = lin_interp(
                car.energy_frac(),
                &[0.0, self.perf_pars.energy_frac_knee],
                &[self.perf_pars.energy_factor_low, 1.0],
            );

            let mut vel = self.track.v_ref
                * self.track.speed_multiplier(car.s_track)
                * car.pace_factor()
                * tire_factor
                * energy_factor
                * mu_weather.sqrt();
            if attack_active {
                vel *= self.perf_pars.attack_speed_mult;
            }
            // drag scales with v^2, power with v^3
            if car.position > 1 && car.gap_ahead > 0.0 {
                let drag_factor = self.overtaking.slipstream_drag_factor(car.gap_ahead);
                vel *= (1.0 / drag_factor).cbrt();
            }
            vel = vel.min(sc_speed);

            let car = &mut self.cars_list[i];
            car.advance(vel, timestep_size, track_length, cur_racetime);
            let depleted = car.consume_energy(power_kw, timestep_size);
            if depleted && self.print_events {
                println!(
                    "INFO: lap {}: Car {} retired, battery empty",
                    car.lap + 1,
                    car.car_no
                );
            }
        }
    }

    /// Ranks the active cars by race progress. Ties keep car number order.
    fn update_positions(&mut self) {
        let track_length = self.track.length;
        let mut active_idx = Vec::with_capacity(self.cars_list.len());
        let mut progs = Vec::with_capacity(self.cars_list.len());
        for (i, car) in self.cars_list.iter().enumerate() {
            if car.active {
                active_idx.push(i);
                progs.push(car.race_prog(track_length));
            }
        }

        let order = argsort(&progs, SortOrder::Descending);
        for (rank, &k) in order.iter().enumerate() {
            self.cars_list[active_idx[k]].position = rank as u32 + 1;
        }
        if let Some(&leader_k) = order.first() {
            self.leader_no = self.cars_list[active_idx[leader_k]].car_no;
        }
    }

    /// Computes the time gaps to the leader and between adjacent cars from the
    /// progress difference and the trailing car's current speed.
    fn calc_gaps(&mut self) {
        let track_length = self.track.length;
        let ranked = self.ranked_active_indices();
        if ranked.is_empty() {
            return;
        }

        let leader_prog = self.cars_list[ranked[0]].race_prog(track_length);
        for r in 0..ranked.len() {
            let i = ranked[r];
            let prog = self.cars_list[i].race_prog(track_length);
            let vel = self.cars_list[i].vel;

            let gap_of = |prog_diff: f64| {
                if vel > 0.0 {
                    prog_diff * track_length / vel
                } else {
                    GAP_SENTINEL
                }
            };

            self.cars_list[i].gap_leader = if r == 0 { 0.0 } else { gap_of(leader_prog - prog) };
            self.cars_list[i].gap_ahead = if r == 0 {
                0.0
            } else {
                let prog_ahead = self.cars_list[ranked[r - 1]].race_prog(track_length);
                gap_of(prog_ahead - prog)
            };
        }
        for r in 0..ranked.len() {
            let gap_behind = if r + 1 < ranked.len() {
                self.cars_list[ranked[r + 1]].gap_ahead
            } else {
                0.0
            };
            self.cars_list[ranked[r]].gap_behind = gap_behind;
        }
    }

    /// Attempts an overtake for every car running close behind the one ahead.
    /// A successful pass swaps the track positions of the pair.
    fn check_overtaking(&mut self) {
        let ranked = self.ranked_active_indices();

        for r in 1..ranked.len() {
            let attacker = ranked[r];
            let defender = ranked[r - 1];

            let gap = self.cars_list[attacker].gap_ahead;
            if gap <= 0.0 || gap >= self.overtake_window_s {
                continue;
            }
            // only fights for position, not unlapping
            if self.cars_list[attacker].lap != self.cars_list[defender].lap {
                continue;
            }
            if self.cars_list[attacker].pit_hold_s > 0.0
                || self.cars_list[defender].pit_hold_s > 0.0
            {
                continue;
            }

            let attacker_no = self.cars_list[attacker].car_no;
            let defender_no = self.cars_list[defender].car_no;
            let attacker_vel = self.cars_list[attacker].vel;
            let defender_vel = self.cars_list[defender].vel;
            let attacker_boost = self.attack_modes.is_active(attacker_no).unwrap_or(false);
            let defender_boost = self.attack_modes.is_active(defender_no).unwrap_or(false);

            // skip attempts that cannot clear the minimum speed difference,
            // they would only bloat the attempt log
            if !self
                .overtaking
                .is_feasible(attacker_vel, defender_vel, attacker_boost, defender_boost)
            {
                continue;
            }

            let outcome = self.overtaking.attempt_overtake(
                attacker_no,
                defender_no,
                attacker_vel,
                defender_vel,
                gap,
                attacker_boost,
                defender_boost,
                self.cur_racetime,
            );

            if outcome.success {
                let s_attacker = self.cars_list[attacker].s_track;
                self.cars_list[attacker].s_track = self.cars_list[defender].s_track;
                self.cars_list[defender].s_track = s_attacker;

                let p_attacker = self.cars_list[attacker].position;
                self.cars_list[attacker].position = self.cars_list[defender].position;
                self.cars_list[defender].position = p_attacker;
                if self.cars_list[attacker].position == 1 {
                    self.leader_no = attacker_no;
                }

                if self.print_events {
                    println!(
                        "INFO: lap {}: Car {} overtook car {} (+{:.2} km/h)",
                        self.cur_lap, attacker_no, defender_no, outcome.speed_diff_kmh
                    );
                }
            }
        }
    }

    /// Automatic attack mode policy plus boost expiry. A car activates as soon
    /// as it passes through the zone with an activation left, unless its
    /// energy level is already too low to spend on the boost.
    fn update_attack_modes(&mut self) {
        if self.use_auto_attack {
            for i in 0..self.cars_list.len() {
                let car = &self.cars_list[i];
                if !car.active || car.pit_hold_s > 0.0 {
                    continue;
                }
                if car.energy_frac() <= self.auto_attack_energy_frac {
                    continue;
                }
                let car_no = car.car_no;
                let lap = car.lap + 1;
                let s_track = car.s_track;

                let can = matches!(
                    self.attack_modes.can_activate(car_no, s_track),
                    Ok((true, _))
                );
                if !can {
                    continue;
                }
                if let Ok(Some(penalty_s)) =
                    self.attack_modes
                        .activate(car_no, lap, self.cur_racetime, s_track)
                {
                    self.cars_list[i].apply_time_penalty(penalty_s);
                    if self.print_events {
                        println!(
                            "INFO: lap {}: Car {} activated attack mode (-{:.2} s)",
                            lap, car_no, penalty_s
                        );
                    }
                }
            }
        }

        self.attack_modes.update_all(self.cur_racetime);
    }

    /// Per-lap housekeeping: pit decisions for cars crossing the line, the
    /// race lap counter, the chequered flag and the finish condition.
    fn handle_lap_transitions(&mut self) {
        let track_length = self.track.length;

        for i in 0..self.cars_list.len() {
            if !self.cars_list[i].active || !self.cars_list[i].take_new_lap() {
                continue;
            }
            if !self.use_pit_stops || self.cars_list[i].pit_count > 0 {
                continue;
            }

            let car = &self.cars_list[i];
            let dist_done = car.lap as f64 * track_length;
            let dist_remaining = (self.duration_s - self.cur_racetime).max(0.0) * car.vel;
            let (pit, _) =
                self.pits
                    .should_pit_energy(car.energy, car.initial_energy, dist_remaining, dist_done);
            if pit {
                let stop = self
                    .pits
                    .execute_pit_stop(car.car_no, car.lap, self.cur_racetime);
                let recharge_frac = self.pits.recharge_frac();
                self.cars_list[i].begin_pit_stop(stop.duration_s, recharge_frac);
                if self.print_events {
                    println!(
                        "INFO: lap {}: Car {} pits for energy ({:.1} s)",
                        stop.lap, stop.car_no, stop.duration_s
                    );
                }
            }
        }

        let max_lap = self
            .cars_list
            .iter()
            .filter(|c| c.active)
            .map(|c| c.lap)
            .max();
        let max_lap = match max_lap {
            Some(lap) => lap,
            None => {
                // everyone retired
                self.finished = true;
                return;
            }
        };
        self.cur_lap = max_lap + 1;

        if self.chequered_lap.is_none() && self.cur_racetime >= self.duration_s {
            // scheduled time elapsed: the leader finishes the running lap
            // plus one more
            self.chequered_lap = Some(self.cur_lap + 1);
        }
        if let Some(chequered_lap) = self.chequered_lap {
            if self.cur_lap > chequered_lap {
                self.finished = true;
            }
        }
    }

    fn store_history(&mut self) {
        if self.cur_racetime + 1e-9 < self.next_snapshot_t && !self.finished {
            return;
        }
        self.next_snapshot_t += self.snapshot_interval_s;

        let positions = self
            .cars_list
            .iter()
            .map(|c| (c.car_no, c.position))
            .collect();
        self.history.push(RaceSnapshot {
            time_s: self.cur_racetime,
            lap: self.cur_lap,
            leader_no: self.leader_no,
            safety_car_active: self.events.safety_car_active,
            weather_dry: self.events.weather_dry,
            mu_weather: self.events.mu_weather,
            positions,
        });
    }

    /// Indices into `cars_list` of the active cars, ordered by rank.
    fn ranked_active_indices(&self) -> Vec<usize> {
        let mut ranked: Vec<usize> = (0..self.cars_list.len())
            .filter(|&i| self.cars_list[i].active)
            .collect();
        ranked.sort_by_key(|&i| self.cars_list[i].position);
        ranked
    }

    pub fn car(&self, car_no: u32) -> Result<&Car, SimError> {
        self.cars_list
            .iter()
            .find(|c| c.car_no == car_no)
            .ok_or(SimError::UnknownCar(car_no))
    }

    /// Manual activation hooks for external strategy code, bypassing the
    /// automatic policy.
    pub fn can_activate_attack(&self, car_no: u32) -> Result<(bool, &'static str), SimError> {
        let car = self.car(car_no)?;
        self.attack_modes.can_activate(car_no, car.s_track)
    }

    pub fn activate_attack(&mut self, car_no: u32) -> Result<bool, SimError> {
        let (lap, s_track) = {
            let car = self.car(car_no)?;
            (car.lap + 1, car.s_track)
        };
        let penalty = self
            .attack_modes
            .activate(car_no, lap, self.cur_racetime, s_track)?;
        if let Some(penalty_s) = penalty {
            if let Some(car) = self.cars_list.iter_mut().find(|c| c.car_no == car_no) {
                car.apply_time_penalty(penalty_s);
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Compact per-car view for strategy decisions during a running race.
    pub fn strategy_view(&self, car_no: u32) -> Result<StrategyView, SimError> {
        let car = self.car(car_no)?;
        let mode = self.attack_modes.get(car_no)?;
        Ok(StrategyView {
            car_no,
            lap: car.lap + 1,
            position: car.position,
            energy_remaining: car.energy,
            power_kw: mode.power_kw(),
            attack_active: mode.is_active(),
            activations_remaining: mode.activations_remaining(),
            gap_leader_s: car.gap_leader,
            gap_ahead_s: car.gap_ahead,
            gap_behind_s: car.gap_behind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pre::track::{Track, TrackPars};

    fn test_track() -> Track {
        Track::from_pars(TrackPars {
            name: "Testring".to_string(),
            length: 2400.0,
            t_lap_ref: 48.0,
            raceline_file: None,
        })
    }

    fn test_race_pars(no_cars: u32, duration_s: f64) -> (RacePars, HashMap<u32, CarPars>) {
        let participants: Vec<u32> = (1..=no_cars).collect();
        let mut car_pars_all = HashMap::new();
        for &car_no in &participants {
            car_pars_all.insert(
                car_no,
                CarPars {
                    car_no,
                    m: 880.0,
                    eta_motor: 0.9,
                    initial_energy: 6.6e8,
                },
            );
        }
        let race_pars = RacePars {
            duration_s,
            participants,
            seed: 42,
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
        };
        (race_pars, car_pars_all)
    }

    fn run_race(no_cars: u32, duration_s: f64, seed: u64) -> Race {
        let (mut race_pars, car_pars_all) = test_race_pars(no_cars, duration_s);
        race_pars.seed = seed;
        let mut race = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap();
        let mut steps = 0;
        while !race.finished {
            race.simulate_timestep();
            steps += 1;
            assert!(steps < 1_000_000, "race did not terminate");
        }
        race
    }

    #[test]
    fn rejects_too_many_cars() {
        let (race_pars, car_pars_all) = test_race_pars(21, 600.0);
        let err = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap_err();
        assert_eq!(err, SimError::CarCountOutOfRange { given: 21, max: 20 });
    }

    #[test]
    fn rejects_duplicate_car_numbers() {
        let (mut race_pars, car_pars_all) = test_race_pars(3, 600.0);
        race_pars.participants.push(2);
        let err = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap_err();
        assert_eq!(err, SimError::DuplicateCarNumber(2));
    }

    #[test]
    fn rejects_malformed_activation_zone() {
        let (mut race_pars, car_pars_all) = test_race_pars(3, 600.0);
        race_pars.attack_pars.zone = Some([2500.0, 100.0]);
        let err = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap_err();
        assert!(matches!(err, SimError::MalformedActivationZone(_, _)));
    }

    #[test]
    fn positions_are_a_permutation_of_ranks() {
        let (race_pars, car_pars_all) = test_race_pars(10, 300.0);
        let mut race = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap();
        for _ in 0..500 {
            race.simulate_timestep();
            let mut positions: Vec<u32> = race
                .cars_list
                .iter()
                .filter(|c| c.active)
                .map(|c| c.position)
                .collect();
            positions.sort_unstable();
            let expected: Vec<u32> = (1..=positions.len() as u32).collect();
            assert_eq!(positions, expected);
        }
    }

    #[test]
    fn safety_car_spans_the_drawn_laps_in_a_full_race() {
        let (mut race_pars, car_pars_all) = test_race_pars(4, 900.0);
        race_pars.event_pars.p_safety_car = 1.0;
        race_pars.event_pars.p_crash_per_car = 0.0;
        race_pars.event_pars.p_weather_change = 0.0;
        race_pars.event_pars.sc_laps_min = 3;
        race_pars.event_pars.sc_laps_max = 3;

        let mut race = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap();
        while !race.finished {
            race.simulate_timestep();
        }

        let deployed_laps: Vec<u32> = race
            .events
            .event_log()
            .iter()
            .filter(|e| e.description.starts_with("Safety car deployed"))
            .map(|e| e.lap)
            .collect();
        let resumed_laps: Vec<u32> = race
            .events
            .event_log()
            .iter()
            .filter(|e| e.description.contains("race resumed"))
            .map(|e| e.lap)
            .collect();

        assert!(!deployed_laps.is_empty());
        assert!(!resumed_laps.is_empty());
        // 3 deployed laps plus the single returning lap per deployment
        for (deployed, resumed) in deployed_laps.iter().zip(resumed_laps.iter()) {
            assert_eq!(resumed - deployed, 4);
        }
    }

    #[test]
    fn same_seed_replays_the_same_race() {
        let race_a = run_race(8, 300.0, 77);
        let race_b = run_race(8, 300.0, 77);

        assert_eq!(race_a.cur_racetime, race_b.cur_racetime);
        assert_eq!(race_a.leader_no, race_b.leader_no);
        assert_eq!(race_a.events.event_log(), race_b.events.event_log());
        assert_eq!(race_a.overtaking.history(), race_b.overtaking.history());
        for (car_a, car_b) in race_a.cars_list.iter().zip(race_b.cars_list.iter()) {
            assert_eq!(car_a.car_no, car_b.car_no);
            assert_eq!(car_a.position, car_b.position);
            assert_eq!(car_a.lap, car_b.lap);
            assert_eq!(car_a.energy.to_bits(), car_b.energy.to_bits());
        }
    }

    #[test]
    fn short_race_finishes_with_active_cars() {
        let race = run_race(2, 120.0, 5);
        assert!(race.finished);
        assert!(race.cur_racetime >= 120.0);
        // the leader completed the chequered lap
        if let Some(chequered_lap) = race.chequered_lap {
            assert!(race.cur_lap > chequered_lap || race.cars_list.iter().all(|c| !c.active));
        }
    }

    #[test]
    fn energy_never_increases_without_pit_stops() {
        let (race_pars, car_pars_all) = test_race_pars(4, 300.0);
        let mut race = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap();
        let mut prev: Vec<f64> = race.cars_list.iter().map(|c| c.energy).collect();
        for _ in 0..2000 {
            race.simulate_timestep();
            for (car, prev_energy) in race.cars_list.iter().zip(prev.iter()) {
                assert!(car.energy <= *prev_energy);
                assert!(car.energy >= 0.0);
            }
            prev = race.cars_list.iter().map(|c| c.energy).collect();
        }
    }

    #[test]
    fn strategy_view_reports_the_car_state() {
        let (race_pars, car_pars_all) = test_race_pars(3, 300.0);
        let mut race = Race::new(&race_pars, test_track(), &car_pars_all, 0.2, false).unwrap();
        for _ in 0..100 {
            race.simulate_timestep();
        }
        let view = race.strategy_view(2).unwrap();
        assert_eq!(view.car_no, 2);
        assert!(view.energy_remaining > 0.0);
        assert!(view.position >= 1 && view.position <= 3);
        assert_eq!(
            race.strategy_view(99).unwrap_err(),
            SimError::UnknownCar(99)
        );
    }
}
