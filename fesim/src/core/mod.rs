pub mod attack_mode;
pub mod car;
pub mod events;
pub mod handle_race;
pub mod overtaking;
pub mod pit;
pub mod race;
pub mod rng;
