pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{
    http::{CurlTransport, ReqwestTransport},
    storage::S3ObjectStore,
};
pub use app::scenarios::{build_scenarios, ProbeContext};
pub use config::toml_config::ProbeConfig;
pub use core::{
    engine::{EngineOptions, ProbeEngine},
    presign::Presigner,
};
pub use utils::error::{ProbeError, Result};
