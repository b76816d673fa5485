//! Built-in difficulty calculators backed by rosu-pp.

mod rosu;

pub use rosu::RosuCalculator;
