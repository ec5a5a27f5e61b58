//! Connection integration tests: raw frames in, recorded frames out

mod emission;
