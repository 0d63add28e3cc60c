//! Utility functions and helpers

pub mod certificates;
