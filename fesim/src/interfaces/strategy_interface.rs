use serde::Serialize;

/// Compact snapshot of one car handed to external strategy code. Everything a
/// race engineer needs for an attack mode or energy call, nothing that would
/// leak mutable simulation state.
///
/// * `lap` - Lap the car is currently on
/// * `position` - Current rank (1 = leader)
/// * `energy_remaining` - (J) Battery level
/// * `power_kw` - (kW) Current power target
/// * `gap_leader_s`/`gap_ahead_s`/`gap_behind_s` - (s) Time gaps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyView {
    pub car_no: u32,
    pub lap: u32,
    pub position: u32,
    pub energy_remaining: f64,
    pub power_kw: f64,
    pub attack_active: bool,
    pub activations_remaining: u32,
    pub gap_leader_s: f64,
    pub gap_ahead_s: f64,
    pub gap_behind_s: f64,
}
