pub mod engine;
pub mod football_field;
pub mod models;
pub mod synergies;


pub use engine::model;
pub use football_field::build_football_field;
pub use models::*;
pub use synergies::{estimate_synergies, realization_fraction, synergy_npv};
