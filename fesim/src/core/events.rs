use crate::core::rng::SimRng;
use serde::{Deserialize, Serialize};

pub const KMH_TO_MS: f64 = 1.0 / 3.6;

/// Safety car deployment phases.
///
/// CLEAR -> DEPLOYED (trigger, 3-8 laps) -> RETURNING (one lap) -> CLEAR.
/// The speed cap applies while DEPLOYED or RETURNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SafetyCarPhase {
    Clear,
    Deployed,
    Returning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    SafetyCar,
    Crash,
    WeatherChange,
}

/// Immutable entry of the append-only race event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceEvent {
    pub kind: EventKind,
    pub lap: u32,
    pub time_s: f64,
    pub car_no: Option<u32>,
    pub description: String,
}

/// * `p_safety_car` - Probability per lap of an independent safety car deployment
/// * `p_crash_per_car` - Probability per car per lap of a crash
/// * `p_crash_causes_sc` - Secondary probability that a crash deploys the safety car
/// * `p_weather_change` - Probability per lap of a weather transition draw
/// * `p_drying_per_lap` - Probability per wet lap that the track dries again
/// * `sc_laps_min`/`sc_laps_max` - Bounds of the deployed duration (laps, inclusive)
/// * `sc_speed` - (m/s) Speed cap while the safety car is out
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EventPars {
    pub p_safety_car: f64,
    pub p_crash_per_car: f64,
    pub p_crash_causes_sc: f64,
    pub p_weather_change: f64,
    pub p_drying_per_lap: f64,
    pub sc_laps_min: u32,
    pub sc_laps_max: u32,
    pub sc_speed: f64,
}

impl Default for EventPars {
    fn default() -> EventPars {
        EventPars {
            p_safety_car: 0.03,
            p_crash_per_car: 0.015,
            p_crash_causes_sc: 0.5,
            p_weather_change: 0.02,
            p_drying_per_lap: 0.3,
            sc_laps_min: 3,
            sc_laps_max: 8,
            sc_speed: 80.0 * KMH_TO_MS,
        }
    }
}

/// Outcome of the per-lap event draws, applied by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct LapEvents {
    pub safety_car_deployed: bool,
    pub crashes: Vec<u32>,
    pub weather_changed: bool,
    pub new_mu_weather: f64,
}

/// Stochastic generator for safety car, crash and weather events.
///
/// Evaluated once per lap boundary, never per fine timestep. The engine owns
/// the safety car state machine and the binary weather model; it mutates car
/// state only indirectly through the `LapEvents` it returns to the
/// orchestrator.
#[derive(Debug)]
pub struct RaceEventEngine {
    pars: EventPars,
    rng: SimRng,
    pub phase: SafetyCarPhase,
    pub safety_car_active: bool,
    sc_laps_remaining: u32,
    pub weather_dry: bool,
    /// Friction multiplier, clamped to [0.5, 1.0]. 1.0 = fully dry.
    pub mu_weather: f64,
    event_log: Vec<RaceEvent>,
    pub total_safety_cars: u32,
    pub total_crashes: u32,
    pub total_weather_changes: u32,
}

impl RaceEventEngine {
    pub fn new(pars: EventPars, rng: SimRng) -> RaceEventEngine {
        RaceEventEngine {
            pars,
            rng,
            phase: SafetyCarPhase::Clear,
            safety_car_active: false,
            sc_laps_remaining: 0,
            weather_dry: true,
            mu_weather: 1.0,
            event_log: Vec::new(),
            total_safety_cars: 0,
            total_crashes: 0,
            total_weather_changes: 0,
        }
    }

    /// Draws the independent per-lap Bernoulli trials: safety car deployment,
    /// one crash trial per active car (with the secondary safety car draw),
    /// and the weather transition.
    pub fn check_lap_events(
        &mut self,
        lap: u32,
        race_time: f64,
        active_cars: &[u32],
    ) -> LapEvents {
        let mut events = LapEvents {
            safety_car_deployed: false,
            crashes: Vec::new(),
            weather_changed: false,
            new_mu_weather: self.mu_weather,
        };

        if !self.safety_car_active && self.rng.trigger(self.pars.p_safety_car) {
            self.deploy_safety_car(lap, race_time);
            events.safety_car_deployed = true;
        }

        for &car_no in active_cars {
            if self.rng.trigger(self.pars.p_crash_per_car) {
                self.register_crash(car_no, lap, race_time);
                events.crashes.push(car_no);

                if !self.safety_car_active && self.rng.trigger(self.pars.p_crash_causes_sc) {
                    self.deploy_safety_car(lap, race_time);
                    events.safety_car_deployed = true;
                }
            }
        }

        if self.rng.trigger(self.pars.p_weather_change) && self.change_weather(lap, race_time) {
            events.weather_changed = true;
            events.new_mu_weather = self.mu_weather;
        }

        events
    }

    /// Advances the safety car state machine by one lap. Returns true if the
    /// phase changed.
    ///
    /// Must run before the same lap's `check_lap_events` draws, otherwise a
    /// deployment drawn on this lap would already lose its first countdown
    /// lap here.
    pub fn update_safety_car(&mut self, lap: u32, race_time: f64) -> bool {
        if !self.safety_car_active {
            return false;
        }

        self.sc_laps_remaining = self.sc_laps_remaining.saturating_sub(1);
        if self.sc_laps_remaining > 0 {
            return false;
        }

        match self.phase {
            SafetyCarPhase::Deployed => {
                self.phase = SafetyCarPhase::Returning;
                self.sc_laps_remaining = 1;
                true
            }
            SafetyCarPhase::Returning => {
                self.phase = SafetyCarPhase::Clear;
                self.safety_car_active = false;
                self.sc_laps_remaining = 0;
                self.push_event(
                    EventKind::SafetyCar,
                    lap,
                    race_time,
                    None,
                    "Safety car in, race resumed".to_string(),
                );
                true
            }
            SafetyCarPhase::Clear => false,
        }
    }

    /// (m/s) Speed cap while the safety car is out, unbounded otherwise.
    pub fn safety_car_speed(&self) -> f64 {
        if self.safety_car_active {
            self.pars.sc_speed
        } else {
            f64::INFINITY
        }
    }

    pub fn event_log(&self) -> &[RaceEvent] {
        &self.event_log
    }

    fn deploy_safety_car(&mut self, lap: u32, race_time: f64) {
        self.safety_car_active = true;
        self.phase = SafetyCarPhase::Deployed;
        self.sc_laps_remaining = self
            .rng
            .uniform_int(self.pars.sc_laps_min, self.pars.sc_laps_max);
        self.total_safety_cars += 1;

        let description = format!(
            "Safety car deployed on lap {} for {} laps",
            lap, self.sc_laps_remaining
        );
        self.push_event(EventKind::SafetyCar, lap, race_time, None, description);
    }

    fn register_crash(&mut self, car_no: u32, lap: u32, race_time: f64) {
        self.total_crashes += 1;
        let description = format!("Car {} crashed and retired", car_no);
        self.push_event(EventKind::Crash, lap, race_time, Some(car_no), description);
    }

    /// Dry -> wet always transitions; wet -> dry only with the drying
    /// probability. Returns whether the weather actually changed.
    fn change_weather(&mut self, lap: u32, race_time: f64) -> bool {
        if self.weather_dry {
            self.weather_dry = false;
            let grip_reduction = self.rng.uniform(0.15, 0.30);
            self.mu_weather = (1.0 - grip_reduction).clamp(0.5, 1.0);
            self.total_weather_changes += 1;
            let description = format!("Rain started, grip multiplier {:.2}", self.mu_weather);
            self.push_event(EventKind::WeatherChange, lap, race_time, None, description);
            true
        } else if self.rng.trigger(self.pars.p_drying_per_lap) {
            self.weather_dry = true;
            self.mu_weather = self.rng.uniform(0.85, 1.0).clamp(0.5, 1.0);
            self.total_weather_changes += 1;
            let description = format!("Track drying, grip multiplier {:.2}", self.mu_weather);
            self.push_event(EventKind::WeatherChange, lap, race_time, None, description);
            true
        } else {
            false
        }
    }

    fn push_event(
        &mut self,
        kind: EventKind,
        lap: u32,
        time_s: f64,
        car_no: Option<u32>,
        description: String,
    ) {
        self.event_log.push(RaceEvent {
            kind,
            lap,
            time_s,
            car_no,
            description,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_seed(seed: u64) -> RaceEventEngine {
        RaceEventEngine::new(EventPars::default(), SimRng::new(seed))
    }

    #[test]
    fn safety_car_duration_within_configured_bounds() {
        // force a deployment and count laps until the returning phase
        for seed in 0..50 {
            let mut engine = engine_with_seed(seed);
            engine.deploy_safety_car(1, 10.0);
            assert_eq!(engine.phase, SafetyCarPhase::Deployed);

            let mut deployed_laps = 0;
            let mut lap = 1;
            while engine.phase == SafetyCarPhase::Deployed {
                lap += 1;
                engine.update_safety_car(lap, lap as f64 * 60.0);
                deployed_laps += 1;
                assert!(deployed_laps <= 8, "seed {} exceeded the upper bound", seed);
            }
            assert!(deployed_laps >= 3);
            assert_eq!(engine.phase, SafetyCarPhase::Returning);
            assert!(engine.safety_car_active);

            lap += 1;
            engine.update_safety_car(lap, lap as f64 * 60.0);
            assert_eq!(engine.phase, SafetyCarPhase::Clear);
            assert!(!engine.safety_car_active);
        }
    }

    #[test]
    fn deployment_span_is_exact_under_the_race_loop_call_order() {
        // the race loop steps the state machine first, then draws the lap
        // events; a forced deployment must stay DEPLOYED for exactly the
        // drawn number of laps
        let pars = EventPars {
            p_safety_car: 1.0,
            p_crash_per_car: 0.0,
            p_weather_change: 0.0,
            sc_laps_min: 3,
            sc_laps_max: 3,
            ..EventPars::default()
        };
        let mut engine = RaceEventEngine::new(pars, SimRng::new(9));

        let mut spans = Vec::new();
        let mut deployed_laps = 0;
        for lap in 1..41 {
            engine.update_safety_car(lap, lap as f64 * 60.0);
            engine.check_lap_events(lap, lap as f64 * 60.0, &[1, 2]);
            if engine.phase == SafetyCarPhase::Deployed {
                deployed_laps += 1;
            } else if deployed_laps > 0 {
                spans.push(deployed_laps);
                deployed_laps = 0;
            }
        }

        assert!(spans.len() >= 3);
        for span in spans {
            assert_eq!(span, 3);
        }
    }

    #[test]
    fn safety_car_speed_is_unbounded_when_clear() {
        let mut engine = engine_with_seed(3);
        assert!(engine.safety_car_speed().is_infinite());
        engine.deploy_safety_car(2, 100.0);
        assert!(engine.safety_car_speed() < 25.0);
    }

    #[test]
    fn no_second_deployment_while_active() {
        let mut engine = engine_with_seed(4);
        engine.deploy_safety_car(1, 10.0);
        // many laps of draws while active never redeploy
        for lap in 2..20 {
            let events = engine.check_lap_events(lap, lap as f64 * 60.0, &[0, 1, 2]);
            if engine.safety_car_active {
                assert!(!events.safety_car_deployed || engine.total_safety_cars == 1);
            }
        }
    }

    #[test]
    fn mu_weather_always_clamped() {
        let mut engine = engine_with_seed(5);
        for lap in 1..500 {
            engine.check_lap_events(lap, lap as f64 * 60.0, &[]);
            assert!(engine.mu_weather >= 0.5 && engine.mu_weather <= 1.0);
        }
    }

    #[test]
    fn weather_change_log_matches_counter() {
        let mut engine = engine_with_seed(6);
        for lap in 1..300 {
            engine.check_lap_events(lap, lap as f64 * 60.0, &[]);
        }
        let logged = engine
            .event_log()
            .iter()
            .filter(|e| e.kind == EventKind::WeatherChange)
            .count() as u32;
        assert_eq!(logged, engine.total_weather_changes);
    }

    #[test]
    fn identical_seeds_produce_identical_event_logs() {
        let mut a = engine_with_seed(42);
        let mut b = engine_with_seed(42);
        let cars: Vec<u32> = (0..10).collect();
        for lap in 1..60 {
            a.check_lap_events(lap, lap as f64 * 50.0, &cars);
            b.check_lap_events(lap, lap as f64 * 50.0, &cars);
            a.update_safety_car(lap, lap as f64 * 50.0);
            b.update_safety_car(lap, lap as f64 * 50.0);
        }
        assert_eq!(a.event_log(), b.event_log());
        assert_eq!(a.total_crashes, b.total_crashes);
        assert_eq!(a.total_safety_cars, b.total_safety_cars);
    }
}
