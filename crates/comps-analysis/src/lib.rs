pub mod engine;
pub mod models;
pub mod multiples;
pub mod peers;

#[cfg(test)]
mod tests;

pub use engine::{compare, rule_of_40, CompsEngine};
pub use models::*;
pub use multiples::{build_row, compute_multiple};
pub use peers::select_peers;
