use crate::domain::model::Payload;
use crate::domain::ports::TargetProvider;
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// 原始測試腳本所用的自訂表單欄位
pub const DEFAULT_CUSTOM_FIELDS: [&str; 16] = [
    "x:sid",
    "x:crypt",
    "x:checksum",
    "x:createtime",
    "x:fileSize",
    "x:tzoffset",
    "x:segid",
    "x:storagemode",
    "x:index",
    "x:begintime",
    "x:endtime",
    "x:eventtime",
    "x:slicelength",
    "x:psid",
    "x:segbegintime",
    "x:slicestype",
];

pub const DEFAULT_ACL: &str = "public-read-write";
pub const DEFAULT_FIELD_VALUE: &str = "123abc";
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
const MAX_EXPIRES_IN_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    PostEach,
    PostBatched,
    Put,
}

impl ScenarioKind {
    pub fn all() -> Vec<ScenarioKind> {
        vec![
            ScenarioKind::PostEach,
            ScenarioKind::PostBatched,
            ScenarioKind::Put,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Reqwest,
    Curl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub post: PostConfig,
    #[serde(default)]
    pub put: PutConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub bucket: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
    pub force_path_style: Option<bool>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostConfig {
    pub acl: Option<String>,
    pub field_value: Option<String>,
    pub fields: Option<Vec<String>>,
    pub key_prefix: Option<String>,
    pub batch_size: Option<usize>,
    pub batch_key: Option<String>,
    pub expires_in_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutConfig {
    pub key: Option<String>,
    pub expires_in_seconds: Option<u64>,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub file: Option<String>,
    pub content: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub scenarios: Option<Vec<ScenarioKind>>,
    pub transport: Option<TransportKind>,
    pub run_name: Option<String>,
    pub keep_objects: Option<bool>,
    pub print_curl: Option<bool>,
}

impl PostConfig {
    pub fn acl(&self) -> &str {
        self.acl.as_deref().unwrap_or(DEFAULT_ACL)
    }

    pub fn field_value(&self) -> &str {
        self.field_value.as_deref().unwrap_or(DEFAULT_FIELD_VALUE)
    }

    pub fn fields(&self) -> Vec<String> {
        match &self.fields {
            Some(fields) => fields.clone(),
            None => DEFAULT_CUSTOM_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        self.key_prefix.as_deref().unwrap_or("obj")
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(5)
    }

    pub fn batch_key(&self) -> &str {
        self.batch_key.as_deref().unwrap_or("testmore")
    }

    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_seconds.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
    }
}

impl PutConfig {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or("test.py")
    }

    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_seconds.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.metadata.clone().unwrap_or_default()
    }
}

impl PayloadConfig {
    /// 未指定時使用 10 個 'a' 的 test.txt
    pub fn load(&self) -> Result<Payload> {
        let mut payload = match (&self.file, &self.content) {
            (Some(file), None) => Payload::from_file(file)?,
            (None, Some(content)) => Payload::new("test.txt", content.as_bytes().to_vec()),
            (None, None) => Payload::default(),
            (Some(_), Some(_)) => {
                return Err(ProbeError::ConfigValidationError {
                    field: "payload".to_string(),
                    message: "Set either payload.file or payload.content, not both".to_string(),
                })
            }
        };
        if let Some(name) = &self.file_name {
            payload.file_name = name.clone();
        }
        Ok(payload)
    }
}

impl RunConfig {
    pub fn scenarios(&self) -> Vec<ScenarioKind> {
        self.scenarios.clone().unwrap_or_else(ScenarioKind::all)
    }

    pub fn transport(&self) -> TransportKind {
        self.transport.unwrap_or_default()
    }

    pub fn run_name(&self) -> &str {
        self.run_name.as_deref().unwrap_or("")
    }

    pub fn keep_objects(&self) -> bool {
        self.keep_objects.unwrap_or(false)
    }

    pub fn print_curl(&self) -> bool {
        self.print_curl.unwrap_or(true)
    }
}

impl ProbeConfig {
    /// 只有目標設定、其餘使用預設值
    pub fn for_target(target: TargetConfig) -> Self {
        Self {
            target,
            post: PostConfig::default(),
            put: PutConfig::default(),
            payload: PayloadConfig::default(),
            run: RunConfig::default(),
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProbeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProbeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${AWS_SECRET_ACCESS_KEY})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProbeError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 憑證未設定或仍是未替換的 ${...} 時，改用標準 AWS 環境變數
    pub fn resolve_credentials(&mut self) {
        fn unresolved(value: &Option<String>) -> bool {
            value
                .as_deref()
                .map(|v| v.trim().is_empty() || v.contains("${"))
                .unwrap_or(true)
        }

        let target = &mut self.target;
        if unresolved(&target.access_key) {
            target.access_key = std::env::var("AWS_ACCESS_KEY_ID").ok();
        }
        if unresolved(&target.secret_key) {
            target.secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        }
        if unresolved(&target.session_token) {
            target.session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("target.endpoint", &self.target.endpoint)?;
        validation::validate_s3_bucket_name("target.bucket", &self.target.bucket)?;
        validation::validate_aws_region("target.region", &self.target.region)?;
        validation::validate_required_field("target.access_key", &self.target.access_key)?;
        validation::validate_required_field("target.secret_key", &self.target.secret_key)?;

        validation::validate_positive_number("post.batch_size", self.post.batch_size(), 1)?;
        validation::validate_range(
            "post.expires_in_seconds",
            self.post.expires_in().as_secs(),
            1,
            MAX_EXPIRES_IN_SECS,
        )?;
        validation::validate_range(
            "put.expires_in_seconds",
            self.put.expires_in().as_secs(),
            1,
            MAX_EXPIRES_IN_SECS,
        )?;
        validation::validate_non_empty_string("put.key", self.put.key())?;
        validation::validate_non_empty_string("post.batch_key", self.post.batch_key())?;

        let fields = self.post.fields();
        for field in &fields {
            validation::validate_non_empty_string("post.fields", field)?;
        }
        let runs_post = self
            .run
            .scenarios()
            .iter()
            .any(|kind| matches!(kind, ScenarioKind::PostEach | ScenarioKind::PostBatched));
        if runs_post && fields.is_empty() {
            return Err(ProbeError::ConfigValidationError {
                field: "post.fields".to_string(),
                message: "POST scenarios need at least one custom field".to_string(),
            });
        }

        // x-amz-meta-* 標頭名稱只能用 token 字元
        for name in self.put.metadata().keys() {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
            {
                return Err(ProbeError::InvalidConfigValueError {
                    field: "put.metadata".to_string(),
                    value: name.clone(),
                    reason: "Metadata names may only contain letters, digits, '-', '_' and '.'"
                        .to_string(),
                });
            }
        }

        if let Some(file) = &self.payload.file {
            validation::validate_path("payload.file", file)?;
        }

        Ok(())
    }
}

impl Validate for ProbeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

impl TargetProvider for TargetConfig {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn access_key(&self) -> &str {
        self.access_key.as_deref().unwrap_or_default()
    }

    fn secret_key(&self) -> &str {
        self.secret_key.as_deref().unwrap_or_default()
    }

    fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    fn force_path_style(&self) -> bool {
        self.force_path_style.unwrap_or(true)
    }
}
