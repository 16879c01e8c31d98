use serde::Serialize;

use helpers::general::{argsort, SortOrder};

use crate::core::car::RetirementReason;
use crate::core::events::RaceEvent;
use crate::core::overtaking::{OvertakeAttempt, OvertakingStats};
use crate::core::pit::PitStop;
use crate::core::race::Race;

/// Final standing of one car.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarResult {
    pub car_no: u32,
    /// Final classification, 1 = winner. DNFs rank behind all finishers.
    pub position: u32,
    pub racetime_s: f64,
    pub laps: u32,
    pub retirement: RetirementReason,
    pub energy_remaining: f64,
    pub laptimes: Vec<f64>,
    pub attack_activations: u32,
    pub pit_stops: u32,
    pub gap_leader_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub total_crashes: u32,
    pub total_safety_cars: u32,
    pub total_weather_changes: u32,
    pub finishers: u32,
    pub dnfs: u32,
}

/// Sampled position trace of one car over the race.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarPositionHistory {
    pub car_no: u32,
    /// (time_s, position) samples at the snapshot interval.
    pub samples: Vec<(f64, u32)>,
}

/// Everything the simulation produced for one race, serializable as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceResult {
    pub track_name: String,
    pub duration_s: f64,
    pub car_results: Vec<CarResult>,
    pub events: Vec<RaceEvent>,
    pub overtakes: Vec<OvertakeAttempt>,
    pub overtaking_stats: OvertakingStats,
    pub pit_stops: Vec<PitStop>,
    pub summary: RaceSummary,
    pub position_history: Vec<CarPositionHistory>,
}

impl RaceResult {
    /// Extracts the final classification and the logs from a finished race.
    /// Active cars rank by their last running order; retired cars follow,
    /// ordered by how far they got.
    pub fn new(race: &Race) -> RaceResult {
        let track_length = race.track.length;

        let mut active_idx: Vec<usize> = Vec::new();
        let mut dnf_idx: Vec<usize> = Vec::new();
        for (i, car) in race.cars_list.iter().enumerate() {
            if car.active {
                active_idx.push(i);
            } else {
                dnf_idx.push(i);
            }
        }
        active_idx.sort_by_key(|&i| race.cars_list[i].position);

        let dnf_progs: Vec<f64> = dnf_idx
            .iter()
            .map(|&i| race.cars_list[i].race_prog(track_length))
            .collect();
        let dnf_order = argsort(&dnf_progs, SortOrder::Descending);

        let final_order: Vec<usize> = active_idx
            .iter()
            .copied()
            .chain(dnf_order.iter().map(|&k| dnf_idx[k]))
            .collect();

        let car_results = final_order
            .iter()
            .enumerate()
            .map(|(rank, &i)| {
                let car = &race.cars_list[i];
                let attack_activations = race
                    .attack_modes
                    .get(car.car_no)
                    .map(|m| m.history().len() as u32)
                    .unwrap_or(0);
                CarResult {
                    car_no: car.car_no,
                    position: rank as u32 + 1,
                    racetime_s: car.racetime,
                    laps: car.lap,
                    retirement: car.retirement,
                    energy_remaining: car.energy,
                    laptimes: car.laptimes.clone(),
                    attack_activations,
                    pit_stops: car.pit_count,
                    gap_leader_s: car.gap_leader,
                }
            })
            .collect();

        let position_history = race
            .cars_list
            .iter()
            .map(|car| CarPositionHistory {
                car_no: car.car_no,
                samples: race
                    .history
                    .iter()
                    .filter_map(|snapshot| {
                        snapshot
                            .positions
                            .iter()
                            .find(|(car_no, _)| *car_no == car.car_no)
                            .map(|&(_, position)| (snapshot.time_s, position))
                    })
                    .collect(),
            })
            .collect();

        let finishers = active_idx.len() as u32;
        RaceResult {
            track_name: race.track.name.clone(),
            duration_s: race.duration_s,
            car_results,
            events: race.events.event_log().to_vec(),
            overtakes: race.overtaking.history().to_vec(),
            overtaking_stats: race.overtaking.stats(),
            pit_stops: race.pits.stops().to_vec(),
            summary: RaceSummary {
                total_crashes: race.events.total_crashes,
                total_safety_cars: race.events.total_safety_cars,
                total_weather_changes: race.events.total_weather_changes,
                finishers,
                dnfs: dnf_idx.len() as u32,
            },
            position_history,
        }
    }

    pub fn winner(&self) -> Option<&CarResult> {
        self.car_results.first()
    }

    /// Prints the final classification.
    pub fn print_classification(&self) {
        println!("RESULT: Final classification ({}):", self.track_name);
        println!("RESULT: pos | car | laps | racetime | energy left | status");
        for result in &self.car_results {
            let status = match result.retirement {
                RetirementReason::None => "finished",
                RetirementReason::OutOfEnergy => "DNF (energy)",
                RetirementReason::Crash => "DNF (crash)",
            };
            println!(
                "RESULT: {:>3} | {:>3} | {:>4} | {:>7.1}s | {:>9.1} MJ | {}",
                result.position,
                result.car_no,
                result.laps,
                result.racetime_s,
                result.energy_remaining / 1.0e6,
                status
            );
        }
    }

    /// Prints the chronological event log.
    pub fn print_event_log(&self) {
        println!("RESULT: Race events:");
        if self.events.is_empty() {
            println!("RESULT: (none)");
        }
        for event in &self.events {
            println!(
                "RESULT: lap {:>3} | {:>7.1}s | {}",
                event.lap, event.time_s, event.description
            );
        }
    }

    /// Prints the overtaking statistics.
    pub fn print_overtaking_stats(&self) {
        println!(
            "RESULT: Overtakes: {} of {} attempts successful ({:.0}%), mean adjusted diff {:.1} km/h",
            self.overtaking_stats.successes,
            self.overtaking_stats.attempts,
            self.overtaking_stats.success_rate * 100.0,
            self.overtaking_stats.mean_speed_diff_kmh
        );
    }
}
