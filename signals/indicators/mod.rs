//! Moving-average indicators

pub mod ema;

pub use ema::{compute_ema, EmaResult};
