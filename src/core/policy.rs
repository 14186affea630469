use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::model::{Condition, PostPolicy};
use crate::utils::error::{ProbeError, Result};

pub const FILENAME_PLACEHOLDER: &str = "${filename}";

/// SigV4 簽名的最長有效期
pub const MAX_EXPIRES_IN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// 不需要 policy 條件覆蓋的表單欄位
const UNCONSTRAINED_FIELDS: [&str; 3] = ["policy", "x-amz-signature", "file"];

#[derive(Debug, Clone)]
pub struct PostPolicyBuilder {
    bucket: String,
    key: String,
    expires_in: Duration,
    fields: BTreeMap<String, String>,
    conditions: Vec<Condition>,
}

impl PostPolicyBuilder {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            expires_in,
            fields: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }

    /// 加入表單欄位以及對應的完全比對條件
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        self.conditions.push(Condition::exact(name.clone(), value.clone()));
        self.fields.insert(name, value);
        self
    }

    /// 只加入表單欄位，由呼叫端另外提供條件
    pub fn extra_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn build(self, now: DateTime<Utc>) -> Result<(PostPolicy, BTreeMap<String, String>)> {
        if self.expires_in.is_zero() || self.expires_in > MAX_EXPIRES_IN {
            return Err(ProbeError::InvalidConfigValueError {
                field: "expires_in".to_string(),
                value: format!("{}s", self.expires_in.as_secs()),
                reason: format!(
                    "Expiry must be between 1s and {}s",
                    MAX_EXPIRES_IN.as_secs()
                ),
            });
        }

        let ttl = chrono::Duration::from_std(self.expires_in).map_err(|e| {
            ProbeError::PresignError {
                message: format!("expiry out of range: {}", e),
            }
        })?;

        let mut conditions = self.conditions;
        let mut fields = self.fields;

        conditions.push(Condition::exact("bucket", self.bucket));
        match self.key.strip_suffix(FILENAME_PLACEHOLDER) {
            Some(prefix) => conditions.push(Condition::starts_with("key", prefix)),
            None => conditions.push(Condition::exact("key", self.key.clone())),
        }
        fields.insert("key".to_string(), self.key);

        let policy = PostPolicy {
            expiration: now + ttl,
            conditions,
        };
        Ok((policy, fields))
    }
}

impl PostPolicy {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_json()?))
    }

    /// 在送出前用本地規則檢查表單：每個條件都要滿足，每個欄位都要有條件覆蓋
    pub fn check(
        &self,
        bucket: &str,
        fields: &BTreeMap<String, String>,
        content_length: u64,
    ) -> Result<()> {
        let mut view = fields.clone();
        if !view.keys().any(|k| k.eq_ignore_ascii_case("bucket")) {
            view.insert("bucket".to_string(), bucket.to_string());
        }

        if let Some(failed) = self
            .conditions
            .iter()
            .find(|c| !c.is_satisfied_by(&view, content_length))
        {
            return Err(ProbeError::PolicyRejected {
                condition: failed.to_string(),
            });
        }

        for name in fields.keys() {
            let lowered = name.to_ascii_lowercase();
            if UNCONSTRAINED_FIELDS.contains(&lowered.as_str()) || lowered.starts_with("x-ignore-")
            {
                continue;
            }
            let covered = self
                .conditions
                .iter()
                .filter_map(Condition::field)
                .any(|f| f.eq_ignore_ascii_case(name));
            if !covered {
                return Err(ProbeError::PolicyRejected {
                    condition: format!("extra input field '{}' has no condition", name),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-19T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_build_adds_bucket_and_key() {
        let (policy, fields) = PostPolicyBuilder::new("yyytest", "objx:sid", Duration::from_secs(3600))
            .field("acl", "public-read-write")
            .extra_field("x:sid", "123abc")
            .condition(Condition::starts_with("x:sid", ""))
            .build(now())
            .unwrap();

        assert_eq!(
            policy.to_json().unwrap(),
            r#"{"expiration":"2026-10-19T09:00:00Z","conditions":[{"acl":"public-read-write"},["starts-with","$x:sid",""],{"bucket":"yyytest"},{"key":"objx:sid"}]}"#
        );
        assert_eq!(fields.get("key").unwrap(), "objx:sid");
        assert_eq!(fields.get("x:sid").unwrap(), "123abc");
        assert!(policy.check("yyytest", &fields, 10).is_ok());
    }

    #[test]
    fn test_filename_placeholder_becomes_prefix_condition() {
        let (policy, _) = PostPolicyBuilder::new("yyytest", "uploads/${filename}", Duration::from_secs(60))
            .build(now())
            .unwrap();
        assert_eq!(
            policy.conditions.last().unwrap(),
            &Condition::starts_with("key", "uploads/")
        );
    }

    #[test]
    fn test_expiry_bounds() {
        let builder = PostPolicyBuilder::new("yyytest", "k", Duration::ZERO);
        assert!(builder.build(now()).is_err());

        let builder = PostPolicyBuilder::new("yyytest", "k", MAX_EXPIRES_IN + Duration::from_secs(1));
        assert!(builder.build(now()).is_err());

        let builder = PostPolicyBuilder::new("yyytest", "k", MAX_EXPIRES_IN);
        assert!(builder.build(now()).is_ok());
    }

    #[test]
    fn test_check_rejects_unmatched_and_uncovered_fields() {
        let (policy, mut fields) = PostPolicyBuilder::new("yyytest", "obj", Duration::from_secs(60))
            .field("acl", "public-read-write")
            .build(now())
            .unwrap();

        let mut wrong_acl = fields.clone();
        wrong_acl.insert("acl".to_string(), "private".to_string());
        let err = policy.check("yyytest", &wrong_acl, 1).unwrap_err();
        assert!(err.to_string().contains("public-read-write"));

        fields.insert("x:segid".to_string(), "123abc".to_string());
        let err = policy.check("yyytest", &fields, 1).unwrap_err();
        assert!(err.to_string().contains("x:segid"));

        fields.remove("x:segid");
        fields.insert("policy".to_string(), "ignored".to_string());
        assert!(policy.check("yyytest", &fields, 1).is_ok());
    }

    #[test]
    fn test_base64_round_trips_to_json() {
        let (policy, _) = PostPolicyBuilder::new("yyytest", "obj", Duration::from_secs(60))
            .build(now())
            .unwrap();
        let decoded = STANDARD.decode(policy.to_base64().unwrap()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), policy.to_json().unwrap());
    }
}
