use serde::{Deserialize, Serialize};

use crate::core::rng::SimRng;

pub const MS_TO_KMH: f64 = 3.6;

/// One row of the success probability table: an adjusted speed difference
/// interval in km/h and the success probability within it. `max_diff_kmh` of
/// `None` marks an open-ended top bucket.
#[derive(Debug, Deserialize, Clone)]
pub struct SuccessBucket {
    pub min_diff_kmh: f64,
    pub max_diff_kmh: Option<f64>,
    pub probability: f64,
}

/// * `min_speed_diff_kmh` - (km/h) Adjusted speed advantage below which an
///   overtake is impossible
/// * `slipstream_window_s` - (s) Gap below which the attacker gets slipstream
/// * `slipstream_drag_reduction` - (-) Maximum drag reduction at zero gap
/// * `attack_speed_advantage_kmh` - (km/h) Speed difference adjustment per
///   active attack mode (added for the attacker, subtracted for the defender)
/// * `overtake_distance_m` - (m) Distance assumed for the maneuver when
///   computing the time gain
/// * `beyond_table_probability` - (-) Success probability above a bounded
///   custom table
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OvertakingPars {
    pub min_speed_diff_kmh: f64,
    pub slipstream_window_s: f64,
    pub slipstream_drag_reduction: f64,
    pub attack_speed_advantage_kmh: f64,
    pub overtake_distance_m: f64,
    pub beyond_table_probability: f64,
    pub success_table: Vec<SuccessBucket>,
}

impl Default for OvertakingPars {
    fn default() -> OvertakingPars {
        OvertakingPars {
            min_speed_diff_kmh: 5.0,
            slipstream_window_s: 1.0,
            slipstream_drag_reduction: 0.05,
            attack_speed_advantage_kmh: 8.0,
            overtake_distance_m: 250.0,
            beyond_table_probability: 0.95,
            success_table: vec![
                SuccessBucket {
                    min_diff_kmh: 5.0,
                    max_diff_kmh: Some(10.0),
                    probability: 0.20,
                },
                SuccessBucket {
                    min_diff_kmh: 10.0,
                    max_diff_kmh: Some(15.0),
                    probability: 0.50,
                },
                SuccessBucket {
                    min_diff_kmh: 15.0,
                    max_diff_kmh: None,
                    probability: 0.80,
                },
            ],
        }
    }
}

/// Record of one overtake attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OvertakeAttempt {
    pub attacker_no: u32,
    pub defender_no: u32,
    pub success: bool,
    /// (km/h) Adjusted speed difference, attack mode included.
    pub speed_diff_kmh: f64,
    pub time_gain_s: f64,
    pub time_s: f64,
}

/// Result returned to the orchestrator for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OvertakeOutcome {
    pub success: bool,
    pub speed_diff_kmh: f64,
    pub time_gain_s: f64,
    pub slipstream_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OvertakingStats {
    pub attempts: u32,
    pub successes: u32,
    pub success_rate: f64,
    pub mean_speed_diff_kmh: f64,
}

/// Probabilistic overtaking resolver.
///
/// The attempt outcome depends on the adjusted speed difference between
/// attacker and defender: the raw difference in km/h, shifted by the attack
/// speed advantage for whichever of the two has the boost active. The
/// adjustment is applied before the minimum difference threshold, so an
/// attacker on boost can pass a car it could not match on raw speed.
#[derive(Debug)]
pub struct OvertakingModel {
    pars: OvertakingPars,
    rng: SimRng,
    history: Vec<OvertakeAttempt>,
}

impl OvertakingModel {
    pub fn new(pars: OvertakingPars, rng: SimRng) -> OvertakingModel {
        OvertakingModel {
            pars,
            rng,
            history: Vec::new(),
        }
    }

    /// Drag factor for a car running `gap_s` behind another. Inside the
    /// slipstream window the reduction scales linearly with proximity, full
    /// reduction at zero gap and none at the window edge.
    pub fn slipstream_drag_factor(&self, gap_s: f64) -> f64 {
        if gap_s < 0.0 || gap_s >= self.pars.slipstream_window_s {
            return 1.0;
        }
        let depth = 1.0 - gap_s / self.pars.slipstream_window_s;
        1.0 - self.pars.slipstream_drag_reduction * depth
    }

    /// Success probability for an adjusted speed difference, looked up in the
    /// bucket table. Differences above a bounded table fall back to the
    /// beyond-table probability.
    pub fn success_probability(&self, speed_diff_kmh: f64) -> f64 {
        if speed_diff_kmh < self.pars.min_speed_diff_kmh {
            return 0.0;
        }
        for bucket in &self.pars.success_table {
            let above_min = speed_diff_kmh >= bucket.min_diff_kmh;
            let below_max = match bucket.max_diff_kmh {
                Some(max) => speed_diff_kmh < max,
                None => true,
            };
            if above_min && below_max {
                return bucket.probability;
            }
        }
        self.pars.beyond_table_probability
    }

    /// Adjusted speed difference of an attacker/defender pair in km/h: the
    /// raw difference shifted by the attack speed advantage for whichever
    /// side has the boost active.
    pub fn adjusted_speed_diff_kmh(
        &self,
        attacker_vel: f64,
        defender_vel: f64,
        attacker_boost: bool,
        defender_boost: bool,
    ) -> f64 {
        let mut speed_diff_kmh = (attacker_vel - defender_vel) * MS_TO_KMH;
        if attacker_boost {
            speed_diff_kmh += self.pars.attack_speed_advantage_kmh;
        }
        if defender_boost {
            speed_diff_kmh -= self.pars.attack_speed_advantage_kmh;
        }
        speed_diff_kmh
    }

    /// Whether the pair clears the minimum speed difference at all. Unlike
    /// `attempt_overtake` this records nothing, so callers can pre-filter
    /// pairs without bloating the attempt log.
    pub fn is_feasible(
        &self,
        attacker_vel: f64,
        defender_vel: f64,
        attacker_boost: bool,
        defender_boost: bool,
    ) -> bool {
        self.adjusted_speed_diff_kmh(attacker_vel, defender_vel, attacker_boost, defender_boost)
            >= self.pars.min_speed_diff_kmh
    }

    /// Resolves one overtake attempt of `attacker` on `defender`.
    ///
    /// The time gain of a successful pass is the time the maneuver distance
    /// takes at the defender's speed minus the time at the attacker's mean
    /// maneuver speed, floored at zero.
    #[allow(clippy::too_many_arguments)]
    pub fn attempt_overtake(
        &mut self,
        attacker_no: u32,
        defender_no: u32,
        attacker_vel: f64,
        defender_vel: f64,
        gap_s: f64,
        attacker_boost: bool,
        defender_boost: bool,
        time_s: f64,
    ) -> OvertakeOutcome {
        let speed_diff_kmh =
            self.adjusted_speed_diff_kmh(attacker_vel, defender_vel, attacker_boost, defender_boost);

        let slipstream_active = gap_s >= 0.0 && gap_s < self.pars.slipstream_window_s;
        let probability = self.success_probability(speed_diff_kmh);
        let success = self.rng.trigger(probability);

        let time_gain_s = if success {
            self.time_gain(attacker_vel, defender_vel, speed_diff_kmh)
        } else {
            0.0
        };

        self.history.push(OvertakeAttempt {
            attacker_no,
            defender_no,
            success,
            speed_diff_kmh,
            time_gain_s,
            time_s,
        });

        OvertakeOutcome {
            success,
            speed_diff_kmh,
            time_gain_s,
            slipstream_active,
        }
    }

    fn time_gain(&self, attacker_vel: f64, defender_vel: f64, speed_diff_kmh: f64) -> f64 {
        if defender_vel <= 0.0 || attacker_vel <= 0.0 {
            return 0.0;
        }
        let d = self.pars.overtake_distance_m;
        // mean maneuver speed: attacker speed plus half the adjusted advantage
        let v_maneuver = attacker_vel + 0.5 * speed_diff_kmh / MS_TO_KMH;
        if v_maneuver <= 0.0 {
            return 0.0;
        }
        (d / defender_vel - d / v_maneuver).max(0.0)
    }

    pub fn history(&self) -> &[OvertakeAttempt] {
        &self.history
    }

    pub fn stats(&self) -> OvertakingStats {
        let attempts = self.history.len() as u32;
        let successes = self.history.iter().filter(|a| a.success).count() as u32;
        let mean_speed_diff_kmh = if attempts > 0 {
            self.history.iter().map(|a| a.speed_diff_kmh).sum::<f64>() / attempts as f64
        } else {
            0.0
        };
        OvertakingStats {
            attempts,
            successes,
            success_rate: if attempts > 0 {
                successes as f64 / attempts as f64
            } else {
                0.0
            },
            mean_speed_diff_kmh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_model() -> OvertakingModel {
        OvertakingModel::new(OvertakingPars::default(), SimRng::new(21))
    }

    #[test]
    fn below_threshold_never_succeeds() {
        let mut model = test_model();
        for _ in 0..200 {
            // 4 km/h raw difference, no boosts
            let outcome =
                model.attempt_overtake(1, 2, 51.1, 50.0, 0.8, false, false, 10.0);
            assert!(!outcome.success);
            assert_eq!(outcome.time_gain_s, 0.0);
        }
        assert_eq!(model.stats().successes, 0);
        assert_eq!(model.stats().attempts, 200);
    }

    #[test]
    fn success_probability_buckets() {
        let model = test_model();
        assert_eq!(model.success_probability(4.9), 0.0);
        assert_eq!(model.success_probability(5.0), 0.20);
        assert_eq!(model.success_probability(12.0), 0.50);
        assert_eq!(model.success_probability(15.0), 0.80);
        assert_eq!(model.success_probability(80.0), 0.80);
    }

    #[test]
    fn probability_is_monotone_in_speed_difference() {
        let model = test_model();
        let mut prev = 0.0;
        for diff in [2.0, 6.0, 11.0, 16.0, 40.0] {
            let p = model.success_probability(diff);
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn attack_boost_shifts_the_adjusted_difference() {
        let mut model = test_model();
        // 2 km/h raw deficit becomes a 6 km/h advantage with the boost
        let outcome = model.attempt_overtake(1, 2, 50.0, 50.556, 0.5, true, false, 5.0);
        assert_relative_eq!(outcome.speed_diff_kmh, 6.0, epsilon = 0.01);
        // same raw speeds with the defender boosting instead
        let outcome = model.attempt_overtake(1, 2, 50.0, 50.556, 0.5, false, true, 6.0);
        assert!(outcome.speed_diff_kmh < 0.0);
        assert!(!outcome.success);
    }

    #[test]
    fn successful_pass_gains_a_plausible_time() {
        let mut model = test_model();
        let mut successes = 0;
        for i in 0..500 {
            // 18 km/h raw advantage at top bucket probability
            let outcome =
                model.attempt_overtake(3, 4, 55.0, 50.0, 0.5, false, false, i as f64);
            if outcome.success {
                successes += 1;
                assert!(outcome.time_gain_s > 0.0);
                assert!(outcome.time_gain_s < 1.0);
            }
        }
        assert!(successes > 300);
    }

    #[test]
    fn feasibility_matches_the_attempt_threshold_without_logging() {
        let mut model = test_model();
        // 3.6 km/h raw difference, only feasible with the attacker boosted
        assert!(!model.is_feasible(51.0, 50.0, false, false));
        assert!(model.is_feasible(51.0, 50.0, true, false));
        assert!(model.is_feasible(55.0, 50.0, false, false));
        assert!(!model.is_feasible(50.0, 50.0, false, true));
        assert!(model.history().is_empty());

        // the attempt itself applies the identical adjustment
        let outcome = model.attempt_overtake(1, 2, 51.0, 50.0, 0.5, true, false, 1.0);
        assert_relative_eq!(
            outcome.speed_diff_kmh,
            model.adjusted_speed_diff_kmh(51.0, 50.0, true, false)
        );
    }

    #[test]
    fn two_car_duel_with_moderate_advantage() {
        // 12 km/h raw advantage, 0.8 s gap, no boosts
        let mut model = test_model();
        let attacker_vel = 50.0 + 12.0 / MS_TO_KMH;
        for i in 0..300 {
            let outcome =
                model.attempt_overtake(1, 2, attacker_vel, 50.0, 0.8, false, false, i as f64 * 0.5);
            assert!(outcome.slipstream_active);
            assert_relative_eq!(outcome.speed_diff_kmh, 12.0, epsilon = 1e-9);
            if outcome.success {
                assert!(outcome.time_gain_s > 0.0);
                assert!(outcome.time_gain_s < 1.0);
            }
        }
        // middle bucket probability 0.50
        let stats = model.stats();
        assert!(stats.success_rate > 0.35 && stats.success_rate < 0.65);
    }

    #[test]
    fn slipstream_factor_bounds() {
        let model = test_model();
        assert_relative_eq!(model.slipstream_drag_factor(0.0), 0.95);
        assert_relative_eq!(model.slipstream_drag_factor(0.5), 0.975);
        assert_eq!(model.slipstream_drag_factor(1.0), 1.0);
        assert_eq!(model.slipstream_drag_factor(5.0), 1.0);
        assert_eq!(model.slipstream_drag_factor(-0.1), 1.0);
    }

    #[test]
    fn zero_defender_speed_yields_zero_gain() {
        let mut model = test_model();
        loop {
            let outcome = model.attempt_overtake(1, 2, 30.0, 0.0, 0.5, false, false, 1.0);
            if outcome.success {
                assert_eq!(outcome.time_gain_s, 0.0);
                break;
            }
        }
    }
}
