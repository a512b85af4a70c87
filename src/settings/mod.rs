//! Settings come from a TOML file (`--settings`, default per build profile)
//! with `ACCESS_TTL`/`REFRESH_TTL` environment overrides. Token secrets are
//! read from the environment only.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
