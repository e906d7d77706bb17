//! Keplerian orbits.

pub mod orbits;
