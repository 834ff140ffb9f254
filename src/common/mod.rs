// Shared configuration and error types for Discover.

pub mod config;
pub mod error;
