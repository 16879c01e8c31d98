use thiserror::Error;

/// SimError covers everything that can go wrong when constructing or querying
/// a race. Expected race outcomes (retirements, failed overtakes, refused
/// attack-mode activations) are modeled as ordinary state, not as errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("number of cars must be within 1..={max}, but is {given}")]
    CarCountOutOfRange { given: usize, max: usize },

    #[error("duplicate car number {0} in participants")]
    DuplicateCarNumber(u32),

    #[error("missing car parameters for car number {0}")]
    MissingCarPars(u32),

    #[error("timestep size must be positive, but is {0}")]
    NonPositiveTimestep(f64),

    #[error("race duration must be positive, but is {0}")]
    NonPositiveDuration(f64),

    #[error("track length must be positive, but is {0}")]
    NonPositiveTrackLength(f64),

    #[error("activation zone [{0:.1}, {1:.1}] must lie within the track and have nonzero length")]
    MalformedActivationZone(f64, f64),

    #[error("probability {name} must be within [0, 1], but is {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("safety car lap range {0}..={1} is invalid")]
    InvalidSafetyCarLaps(u32, u32),

    #[error("unknown car number {0}")]
    UnknownCar(u32),
}
