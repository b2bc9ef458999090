//! The verification and benchmark harness proper.

pub mod bench;
pub mod precision;
pub mod seed;
pub mod slice;
