//! Tripwire: BLAKE3 fingerprints of emitted deployments.

pub mod hasher;
