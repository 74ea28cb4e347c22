/// Layered application configuration (defaults, TOML file, environment)
pub mod config;

/// Plain-text rendering of response bodies
pub mod formatter;

/// GitHub REST client and OAuth token sources
pub mod github;

/// Fetch-enrich-merge pipeline, token cache and metrics
pub mod services;

/// HTTP front end
pub mod transport;

/// Core type definitions and domain models used throughout the library
pub mod types;
