//! Queue test suites, grouped by concern

mod coalescing;
mod concurrent;
