pub mod deal_score;
pub mod models;
pub mod piotroski;

#[cfg(test)]
mod tests;

pub use deal_score::deal_score;
pub use models::*;
pub use piotroski::piotroski_grade;
