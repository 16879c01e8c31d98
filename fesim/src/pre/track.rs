use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// * `name` - Track name used in reports
/// * `length` - (m) Lap length
/// * `t_lap_ref` - (s) Reference lap time, defines the reference speed
/// * `raceline_file` - Optional CSV with x/y raceline points for the local
///   speed profile. Without it the track is treated as uniform.
#[derive(Debug, Deserialize, Clone)]
pub struct TrackPars {
    pub name: String,
    pub length: f64,
    pub t_lap_ref: f64,
    #[serde(default)]
    pub raceline_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RacelinePoint {
    x: f64,
    y: f64,
}

/// Static track model: lap length, reference speed and a per-segment speed
/// multiplier profile derived from the raceline curvature.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub length: f64,
    pub t_lap_ref: f64,
    /// (m/s) Mean speed of a reference lap.
    pub v_ref: f64,
    /// Speed multipliers over equally spaced track segments, mean 1.0.
    multipliers: Vec<f64>,
}

impl Track {
    pub fn new(track_pars: &TrackPars) -> anyhow::Result<Track> {
        let multipliers = match &track_pars.raceline_file {
            Some(path) => calc_speed_multipliers(path)
                .with_context(|| format!("could not process raceline file {:?}", path))?,
            None => vec![1.0],
        };

        Ok(Track {
            name: track_pars.name.clone(),
            length: track_pars.length,
            t_lap_ref: track_pars.t_lap_ref,
            v_ref: track_pars.length / track_pars.t_lap_ref,
            multipliers,
        })
    }

    /// Uniform track without a raceline profile, cannot fail.
    pub fn from_pars(track_pars: TrackPars) -> Track {
        Track {
            v_ref: track_pars.length / track_pars.t_lap_ref,
            name: track_pars.name,
            length: track_pars.length,
            t_lap_ref: track_pars.t_lap_ref,
            multipliers: vec![1.0],
        }
    }

    /// Local speed multiplier at a track position.
    pub fn speed_multiplier(&self, s_track: f64) -> f64 {
        let frac = (s_track / self.length).rem_euclid(1.0);
        let idx = ((frac * self.multipliers.len() as f64) as usize).min(self.multipliers.len() - 1);
        self.multipliers[idx]
    }
}

/// Derives per-segment speed multipliers from the raceline curvature: the
/// heading change per meter between consecutive points. Tight corners push
/// the multiplier down, the floor keeps hairpins from stalling the model.
/// The profile is normalized to mean 1.0 so v_ref stays the lap average.
fn calc_speed_multipliers(path: &Path) -> anyhow::Result<Vec<f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not open raceline file {:?}", path))?;

    let mut points: Vec<RacelinePoint> = Vec::new();
    for record in reader.deserialize() {
        points.push(record.context("malformed raceline record")?);
    }
    if points.len() < 3 {
        anyhow::bail!("raceline needs at least 3 points, got {}", points.len());
    }

    let n = points.len();
    let mut multipliers = Vec::with_capacity(n);
    for i in 0..n {
        let prev = &points[(i + n - 1) % n];
        let cur = &points[i];
        let next = &points[(i + 1) % n];

        let heading_in = (cur.y - prev.y).atan2(cur.x - prev.x);
        let heading_out = (next.y - cur.y).atan2(next.x - cur.x);
        let ds = ((next.x - cur.x).powi(2) + (next.y - cur.y).powi(2)).sqrt();

        let mut dh = heading_out - heading_in;
        while dh > std::f64::consts::PI {
            dh -= 2.0 * std::f64::consts::PI;
        }
        while dh < -std::f64::consts::PI {
            dh += 2.0 * std::f64::consts::PI;
        }

        let kappa = if ds > 0.0 { dh.abs() / ds } else { 0.0 };
        multipliers.push((1.0 / (1.0 + kappa)).powi(3).max(0.5));
    }

    let mean = multipliers.iter().sum::<f64>() / n as f64;
    for m in &mut multipliers {
        *m /= mean;
    }

    Ok(multipliers)
}
