use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::rng::SimRng;
use crate::error::SimError;

/// Per-car attack mode lifecycle.
///
/// AVAILABLE -> ACTIVATING (zone passage, penalty applied) -> ACTIVE
/// (boost power) -> AVAILABLE again or USED once no activations remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttackModeState {
    Available,
    Activating,
    Active,
    Used,
}

/// * `max_activations` - Number of activations per car and race
/// * `duration_s` - (s) Active boost duration per activation
/// * `base_power_kw` - (kW) Race power outside attack mode
/// * `boost_power_kw` - (kW) Power while the boost is active
/// * `penalty_min_s`/`penalty_max_s` - (s) Bounds of the per-car activation
///   time penalty, drawn once per car
/// * `zone` - (m) Activation zone `[start, end)` on the track, may wrap the
///   finish line. `None` resolves to 20-25% of the lap.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AttackModePars {
    pub max_activations: u32,
    pub duration_s: f64,
    pub base_power_kw: f64,
    pub boost_power_kw: f64,
    pub penalty_min_s: f64,
    pub penalty_max_s: f64,
    pub zone: Option<[f64; 2]>,
}

impl Default for AttackModePars {
    fn default() -> AttackModePars {
        AttackModePars {
            max_activations: 2,
            duration_s: 240.0,
            base_power_kw: 200.0,
            boost_power_kw: 250.0,
            penalty_min_s: 0.5,
            penalty_max_s: 1.0,
            zone: None,
        }
    }
}

impl AttackModePars {
    /// Resolves the activation zone against a concrete track length.
    pub fn resolve_zone(&self, track_length: f64) -> [f64; 2] {
        self.zone
            .unwrap_or([0.20 * track_length, 0.25 * track_length])
    }
}

/// Record of one completed activation, kept for the race report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackModeActivation {
    pub car_no: u32,
    pub lap: u32,
    pub time_s: f64,
    pub duration_s: f64,
    pub time_penalty_s: f64,
    pub power_boost_kw: f64,
}

/// Attack mode controller of a single car.
#[derive(Debug)]
pub struct AttackMode {
    car_no: u32,
    pars: AttackModePars,
    zone: [f64; 2],
    state: AttackModeState,
    activations_remaining: u32,
    /// (s) Activation penalty, drawn once per car from its own stream.
    time_penalty_s: f64,
    active_until: f64,
    history: Vec<AttackModeActivation>,
}

impl AttackMode {
    pub fn new(car_no: u32, pars: &AttackModePars, track_length: f64, rng: &mut SimRng) -> AttackMode {
        let time_penalty_s = rng.uniform(pars.penalty_min_s, pars.penalty_max_s);

        AttackMode {
            car_no,
            zone: pars.resolve_zone(track_length),
            state: AttackModeState::Available,
            activations_remaining: pars.max_activations,
            time_penalty_s,
            active_until: 0.0,
            history: Vec::new(),
            pars: pars.clone(),
        }
    }

    /// Checks every activation precondition. The reason string names the first
    /// one that fails, or confirms that activation is possible.
    pub fn can_activate(&self, s_track: f64) -> (bool, &'static str) {
        match self.state {
            AttackModeState::Used => return (false, "all activations used"),
            AttackModeState::Active => return (false, "already active"),
            AttackModeState::Activating => return (false, "currently activating"),
            AttackModeState::Available => {}
        }
        if self.activations_remaining == 0 {
            return (false, "all activations used");
        }
        if !self.in_zone(s_track) {
            return (false, "not in activation zone");
        }
        (true, "can activate")
    }

    /// Activates the boost if every precondition holds. The transition through
    /// ACTIVATING to ACTIVE happens atomically within this step; the caller
    /// applies the returned time penalty to the car.
    pub fn activate(&mut self, lap: u32, race_time: f64, s_track: f64) -> Option<f64> {
        let (ok, _) = self.can_activate(s_track);
        if !ok {
            return None;
        }

        self.state = AttackModeState::Activating;
        self.activations_remaining -= 1;
        self.active_until = race_time + self.pars.duration_s;
        self.state = AttackModeState::Active;

        self.history.push(AttackModeActivation {
            car_no: self.car_no,
            lap,
            time_s: race_time,
            duration_s: self.pars.duration_s,
            time_penalty_s: self.time_penalty_s,
            power_boost_kw: self.pars.boost_power_kw - self.pars.base_power_kw,
        });

        Some(self.time_penalty_s)
    }

    /// Expires the boost once its duration has elapsed. Returns true on the
    /// step the boost ends.
    pub fn update(&mut self, race_time: f64) -> bool {
        if self.state == AttackModeState::Active && race_time >= self.active_until {
            self.state = if self.activations_remaining > 0 {
                AttackModeState::Available
            } else {
                AttackModeState::Used
            };
            return true;
        }
        false
    }

    /// (kW) Current power target of this car.
    pub fn power_kw(&self) -> f64 {
        if self.state == AttackModeState::Active {
            self.pars.boost_power_kw
        } else {
            self.pars.base_power_kw
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AttackModeState::Active
    }

    pub fn state(&self) -> AttackModeState {
        self.state
    }

    pub fn activations_remaining(&self) -> u32 {
        self.activations_remaining
    }

    pub fn time_penalty_s(&self) -> f64 {
        self.time_penalty_s
    }

    pub fn history(&self) -> &[AttackModeActivation] {
        &self.history
    }

    /// Zone membership, aware of a zone wrapping the finish line.
    fn in_zone(&self, s_track: f64) -> bool {
        let [start, end] = self.zone;
        if start <= end {
            s_track >= start && s_track < end
        } else {
            s_track >= start || s_track < end
        }
    }
}

/// Owns the attack mode controllers of all cars in a race and routes
/// per-car queries by car number.
#[derive(Debug)]
pub struct AttackModeManager {
    modes: HashMap<u32, AttackMode>,
}

impl AttackModeManager {
    pub fn new() -> AttackModeManager {
        AttackModeManager {
            modes: HashMap::new(),
        }
    }

    pub fn insert(&mut self, mode: AttackMode) {
        self.modes.insert(mode.car_no, mode);
    }

    pub fn get(&self, car_no: u32) -> Result<&AttackMode, SimError> {
        self.modes.get(&car_no).ok_or(SimError::UnknownCar(car_no))
    }

    pub fn get_mut(&mut self, car_no: u32) -> Result<&mut AttackMode, SimError> {
        self.modes
            .get_mut(&car_no)
            .ok_or(SimError::UnknownCar(car_no))
    }

    pub fn can_activate(&self, car_no: u32, s_track: f64) -> Result<(bool, &'static str), SimError> {
        Ok(self.get(car_no)?.can_activate(s_track))
    }

    pub fn activate(
        &mut self,
        car_no: u32,
        lap: u32,
        race_time: f64,
        s_track: f64,
    ) -> Result<Option<f64>, SimError> {
        Ok(self.get_mut(car_no)?.activate(lap, race_time, s_track))
    }

    pub fn is_active(&self, car_no: u32) -> Result<bool, SimError> {
        Ok(self.get(car_no)?.is_active())
    }

    pub fn power_kw(&self, car_no: u32) -> Result<f64, SimError> {
        Ok(self.get(car_no)?.power_kw())
    }

    pub fn activations_remaining(&self, car_no: u32) -> Result<u32, SimError> {
        Ok(self.get(car_no)?.activations_remaining())
    }

    /// Expires all boosts whose duration has elapsed.
    pub fn update_all(&mut self, race_time: f64) {
        for mode in self.modes.values_mut() {
            mode.update(race_time);
        }
    }

    /// All activation records across cars, ordered by activation time.
    pub fn all_activations(&self) -> Vec<AttackModeActivation> {
        let mut activations: Vec<AttackModeActivation> = self
            .modes
            .values()
            .flat_map(|m| m.history().iter().cloned())
            .collect();
        activations.sort_by(|a, b| a.time_s.partial_cmp(&b.time_s).unwrap());
        activations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK_LENGTH: f64 = 2400.0;

    fn test_mode(pars: &AttackModePars) -> AttackMode {
        let mut rng = SimRng::new(11);
        AttackMode::new(5, pars, TRACK_LENGTH, &mut rng)
    }

    fn in_zone_pos(pars: &AttackModePars) -> f64 {
        let [start, end] = pars.resolve_zone(TRACK_LENGTH);
        (start + end) / 2.0
    }

    #[test]
    fn refuses_activation_outside_zone() {
        let pars = AttackModePars::default();
        let mode = test_mode(&pars);
        let (ok, reason) = mode.can_activate(0.0);
        assert!(!ok);
        assert_eq!(reason, "not in activation zone");
    }

    #[test]
    fn zone_wrapping_the_finish_line() {
        let pars = AttackModePars {
            zone: Some([2300.0, 100.0]),
            ..AttackModePars::default()
        };
        let mode = test_mode(&pars);
        assert!(mode.can_activate(2350.0).0);
        assert!(mode.can_activate(50.0).0);
        assert!(!mode.can_activate(1200.0).0);
    }

    #[test]
    fn fixed_penalty_configuration_is_valid() {
        let pars = AttackModePars {
            penalty_min_s: 0.7,
            penalty_max_s: 0.7,
            ..AttackModePars::default()
        };
        let mode = test_mode(&pars);
        assert_eq!(mode.time_penalty_s(), 0.7);
    }

    #[test]
    fn penalty_within_bounds_and_stable_per_car() {
        let pars = AttackModePars::default();
        let mode = test_mode(&pars);
        let penalty = mode.time_penalty_s();
        assert!(penalty >= 0.5 && penalty < 1.0);
        assert_eq!(mode.time_penalty_s(), penalty);
    }

    #[test]
    fn limited_to_two_activations() {
        let pars = AttackModePars::default();
        let mut mode = test_mode(&pars);
        let s = in_zone_pos(&pars);

        assert!(mode.activate(3, 100.0, s).is_some());
        // refused while the first boost still runs
        assert!(mode.activate(3, 110.0, s).is_none());
        mode.update(100.0 + pars.duration_s);
        assert_eq!(mode.state(), AttackModeState::Available);

        assert!(mode.activate(8, 400.0, s).is_some());
        mode.update(400.0 + pars.duration_s);
        assert_eq!(mode.state(), AttackModeState::Used);

        let (ok, reason) = mode.can_activate(s);
        assert!(!ok);
        assert_eq!(reason, "all activations used");
        assert_eq!(mode.history().len(), 2);
    }

    #[test]
    fn boost_power_and_expiry() {
        let pars = AttackModePars::default();
        let mut mode = test_mode(&pars);
        assert_eq!(mode.power_kw(), 200.0);

        mode.activate(2, 50.0, in_zone_pos(&pars)).unwrap();
        assert!(mode.is_active());
        assert_eq!(mode.power_kw(), 250.0);

        assert!(!mode.update(50.0 + pars.duration_s - 0.2));
        assert!(mode.update(50.0 + pars.duration_s));
        assert!(!mode.is_active());
        assert_eq!(mode.power_kw(), 200.0);
    }

    #[test]
    fn manager_rejects_unknown_car() {
        let manager = AttackModeManager::new();
        assert_eq!(
            manager.is_active(99).unwrap_err(),
            SimError::UnknownCar(99)
        );
    }
}
