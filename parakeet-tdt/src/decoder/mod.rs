//! Greedy Token-and-Duration Transducer decoding.

mod core;

pub use core::decode_with_timings;
