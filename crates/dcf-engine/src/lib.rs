pub mod engine;
pub mod models;
pub mod monte_carlo;
pub mod sensitivity;

pub use engine::{project, DcfEngine};
pub use models::*;
pub use monte_carlo::run_monte_carlo;
pub use sensitivity::build_sensitivity_grid;
