use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::utils::error::{ErrorSeverity, ProbeError, Result};

/// POST policy 的單一條件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `{"field": "value"}`
    Exact { field: String, value: String },
    /// `["starts-with", "$field", "prefix"]`
    StartsWith { field: String, prefix: String },
    /// `["eq", "$field", "value"]`
    Eq { field: String, value: String },
    /// `["content-length-range", min, max]`
    ContentLengthRange { min: u64, max: u64 },
}

impl Condition {
    pub fn exact(field: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Exact {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Condition::StartsWith {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    /// 條件所約束的表單欄位，content-length-range 沒有對應欄位
    pub fn field(&self) -> Option<&str> {
        match self {
            Condition::Exact { field, .. }
            | Condition::StartsWith { field, .. }
            | Condition::Eq { field, .. } => Some(field),
            Condition::ContentLengthRange { .. } => None,
        }
    }

    /// 欄位名稱不分大小寫；缺少欄位一律視為不符合
    pub fn is_satisfied_by(&self, fields: &BTreeMap<String, String>, content_length: u64) -> bool {
        let lookup = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };

        match self {
            Condition::Exact { field, value } | Condition::Eq { field, value } => {
                lookup(field) == Some(value.as_str())
            }
            Condition::StartsWith { field, prefix } => lookup(field)
                .map(|v| v.starts_with(prefix.as_str()))
                .unwrap_or(false),
            Condition::ContentLengthRange { min, max } => {
                content_length >= *min && content_length <= *max
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Condition::Exact { field, value } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(field, value)?;
                map.end()
            }
            Condition::StartsWith { field, prefix } => {
                ("starts-with", format!("${}", field), prefix).serialize(serializer)
            }
            Condition::Eq { field, value } => {
                ("eq", format!("${}", field), value).serialize(serializer)
            }
            Condition::ContentLengthRange { min, max } => {
                ("content-length-range", min, max).serialize(serializer)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPolicy {
    #[serde(serialize_with = "serialize_expiration")]
    pub expiration: DateTime<Utc>,
    pub conditions: Vec<Condition>,
}

fn serialize_expiration<S: Serializer>(
    expiration: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&expiration.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// 已簽名的 POST 上傳：目標 URL 與所有表單欄位（檔案另外附加在最後）
#[derive(Debug, Clone, Serialize)]
pub struct PresignedPost {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

/// 已簽名的 PUT 上傳；headers 為簽名時納入、送出時必須帶上的標頭
#[derive(Debug, Clone, Serialize)]
pub struct PresignedPut {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("payload.bin")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new("test.txt", vec![b'a'; 10])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    Post,
    Put,
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMethod::Post => f.write_str("POST"),
            UploadMethod::Put => f.write_str("PUT"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub scenario: String,
    pub key: String,
    pub method: UploadMethod,
    pub url: String,
    /// dry run 時為 None
    pub status: Option<u16>,
    pub transport: String,
}

impl UploadRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, Some(code) if (200..300).contains(&code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStep {
    Upload,
    Get,
    PresignedGet,
    List,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub step: CheckStep,
    pub key: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(step: CheckStep, key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            step,
            key: key.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(step: CheckStep, key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            step,
            key: key.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub uploads: Vec<UploadRecord>,
    pub checks: Vec<CheckOutcome>,
    pub error: Option<String>,
    pub error_severity: Option<ErrorSeverity>,
}

impl ScenarioReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uploads: Vec::new(),
            checks: Vec::new(),
            error: None,
            error_severity: None,
        }
    }

    /// 記錄錯誤；保留最嚴重的等級
    pub fn record_error(&mut self, error: &ProbeError) {
        self.error = Some(error.to_string());
        let severity = error.severity();
        self.error_severity = Some(self.error_severity.map_or(severity, |s| s.max(severity)));
    }

    pub fn failed_checks(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn passed(&self) -> bool {
        self.error.is_none() && self.failed_checks() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub scenarios: Vec<ScenarioReport>,
}

impl ProbeReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            dry_run,
            scenarios: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    /// 0 全部通過；有錯誤時依最嚴重等級；只有檢查失敗時為 1
    pub fn exit_code(&self) -> i32 {
        let worst = self
            .scenarios
            .iter()
            .filter_map(|s| s.error_severity)
            .max();
        match worst {
            Some(severity) => severity.exit_code(),
            None if self.passed() => 0,
            None => 1,
        }
    }

    pub fn total_uploads(&self) -> usize {
        self.scenarios.iter().map(|s| s.uploads.len()).sum()
    }

    pub fn total_checks(&self) -> usize {
        self.scenarios.iter().map(|s| s.checks.len()).sum()
    }

    pub fn failed_checks(&self) -> usize {
        self.scenarios.iter().map(ScenarioReport::failed_checks).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
}
