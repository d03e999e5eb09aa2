//! This module provides a variety of different Queue implementations
//! that are useful for different use-cases

pub mod mpsc;
