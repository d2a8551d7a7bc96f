//! Shared fixtures for the workspace benchmarks and end-to-end tests.

pub mod bench_support;
