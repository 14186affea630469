pub mod s3;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::{ProbeError, Result};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use toml_config::{ProbeConfig, ScenarioKind, TargetConfig, TransportKind};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "presign-probe")]
#[command(about = "Exercise presigned POST and PUT uploads against an S3-compatible bucket")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub bucket: Option<String>,

    /// Scenario to run; repeat to run several (default: all)
    #[arg(long = "scenario", value_enum)]
    pub scenarios: Vec<ScenarioKind>,

    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Extra text placed in object keys so parallel runs do not collide
    #[arg(long)]
    pub run_name: Option<String>,

    #[arg(long)]
    pub payload_file: Option<String>,

    #[arg(long, help = "Leave uploaded objects in the bucket")]
    pub keep_objects: bool,

    #[arg(long, help = "Mint URLs and print curl commands without sending anything")]
    pub dry_run: bool,

    /// Write the JSON report to this path
    #[arg(long)]
    pub report: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 讀取設定檔（若有），再套用命令列覆蓋與環境變數憑證
    pub fn load(&self) -> Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)?,
            None => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    ProbeError::MissingConfigError {
                        field: "target.endpoint".to_string(),
                    }
                })?;
                let bucket =
                    self.bucket
                        .clone()
                        .ok_or_else(|| ProbeError::MissingConfigError {
                            field: "target.bucket".to_string(),
                        })?;
                ProbeConfig::for_target(TargetConfig {
                    endpoint,
                    region: self
                        .region
                        .clone()
                        .unwrap_or_else(|| "us-east-1".to_string()),
                    bucket,
                    access_key: None,
                    secret_key: None,
                    session_token: None,
                    force_path_style: None,
                })
            }
        };

        self.apply_overrides(&mut config);
        config.resolve_credentials();
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ProbeConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.target.endpoint = endpoint.clone();
        }
        if let Some(region) = &self.region {
            config.target.region = region.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.target.bucket = bucket.clone();
        }
        if !self.scenarios.is_empty() {
            config.run.scenarios = Some(self.scenarios.clone());
        }
        if let Some(transport) = self.transport {
            config.run.transport = Some(transport);
        }
        if let Some(run_name) = &self.run_name {
            config.run.run_name = Some(run_name.clone());
        }
        if let Some(file) = &self.payload_file {
            config.payload.file = Some(file.clone());
            config.payload.content = None;
        }
        if self.keep_objects {
            config.run.keep_objects = Some(true);
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_flags_without_config_file() {
        let cli = CliConfig::parse_from([
            "presign-probe",
            "--endpoint",
            "http://127.0.0.1:9000",
            "--bucket",
            "yyytest",
            "--scenario",
            "put",
            "--transport",
            "curl",
            "--keep-objects",
        ]);

        let config = cli.load().unwrap();
        assert_eq!(config.target.endpoint, "http://127.0.0.1:9000");
        assert_eq!(config.run.scenarios(), vec![ScenarioKind::Put]);
        assert_eq!(config.run.transport(), TransportKind::Curl);
        assert!(config.run.keep_objects());
    }

    #[test]
    fn test_missing_endpoint_without_config_file() {
        let cli = CliConfig::parse_from(["presign-probe", "--bucket", "yyytest"]);
        assert!(matches!(
            cli.load(),
            Err(ProbeError::MissingConfigError { .. })
        ));
    }
}
