use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::core::policy::PostPolicyBuilder;
use crate::core::signer::{amz_date, sign_policy, SigningScope, ALGORITHM};
use crate::domain::model::{PresignedPost, PresignedPut};
use crate::domain::ports::TargetProvider;
use crate::utils::error::{ProbeError, Result};

/// 產生 presigned POST 表單與 presigned PUT/GET URL
#[derive(Debug, Clone)]
pub struct Presigner {
    endpoint: Url,
    region: String,
    bucket: String,
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    force_path_style: bool,
    client: S3Client,
}

impl Presigner {
    pub fn new<T: TargetProvider>(target: &T, client: S3Client) -> Result<Self> {
        let endpoint = Url::parse(target.endpoint()).map_err(|e| {
            ProbeError::InvalidConfigValueError {
                field: "target.endpoint".to_string(),
                value: target.endpoint().to_string(),
                reason: format!("Invalid URL format: {}", e),
            }
        })?;

        Ok(Self {
            endpoint,
            region: target.region().to_string(),
            bucket: target.bucket().to_string(),
            access_key: target.access_key().to_string(),
            secret_key: target.secret_key().to_string(),
            session_token: target.session_token().map(str::to_string),
            force_path_style: target.force_path_style(),
            client,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// 以本 bucket 為目標的 policy builder
    pub fn post_policy(&self, key: impl Into<String>, expires_in: Duration) -> PostPolicyBuilder {
        PostPolicyBuilder::new(self.bucket.clone(), key, expires_in)
    }

    /// 表單 POST 的目標：path-style 為 `endpoint/bucket`，否則為 `bucket.host`
    pub fn post_url(&self) -> Result<String> {
        let mut url = self.endpoint.clone();
        if self.force_path_style {
            let path = format!("{}/{}", url.path().trim_end_matches('/'), self.bucket);
            url.set_path(&path);
        } else {
            let host = url
                .host_str()
                .ok_or_else(|| ProbeError::PresignError {
                    message: format!("endpoint '{}' has no host", self.endpoint),
                })?
                .to_string();
            url.set_host(Some(&format!("{}.{}", self.bucket, host)))
                .map_err(|e| ProbeError::PresignError {
                    message: format!("cannot build virtual-host URL: {}", e),
                })?;
        }
        Ok(url.to_string())
    }

    /// 補上 SigV4 欄位、在本地檢查 policy 後簽名
    pub fn presign_post(
        &self,
        builder: PostPolicyBuilder,
        content_length: u64,
        now: DateTime<Utc>,
    ) -> Result<PresignedPost> {
        let scope = SigningScope::s3(now, self.region.clone());

        let mut builder = builder
            .field("x-amz-algorithm", ALGORITHM)
            .field("x-amz-credential", scope.credential(&self.access_key))
            .field("x-amz-date", amz_date(now));
        if let Some(token) = &self.session_token {
            builder = builder.field("x-amz-security-token", token.clone());
        }

        let (policy, mut fields) = builder.build(now)?;
        policy.check(&self.bucket, &fields, content_length)?;

        let policy_b64 = policy.to_base64()?;
        let signature = sign_policy(&policy_b64, &self.secret_key, &scope)?;
        tracing::debug!("Signed POST policy: {}", policy.to_json()?);

        fields.insert("policy".to_string(), policy_b64);
        fields.insert("x-amz-signature".to_string(), signature);

        Ok(PresignedPost {
            url: self.post_url()?,
            fields,
        })
    }

    pub async fn presign_put(
        &self,
        key: &str,
        metadata: &BTreeMap<String, String>,
        expires_in: Duration,
    ) -> Result<PresignedPut> {
        let config = presigning_config(expires_in)?;

        let mut request = self.client.put_object().bucket(&self.bucket).key(key);
        for (name, value) in metadata {
            request = request.metadata(name, value);
        }

        let presigned = request
            .presigned(config)
            .await
            .map_err(|e| ProbeError::PresignError {
                message: format!("presign PUT {}: {}", key, DisplayErrorContext(&e)),
            })?;

        let headers = presigned
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Ok(PresignedPut {
            url: presigned.uri().to_string(),
            headers,
        })
    }

    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String> {
        let config = presigning_config(expires_in)?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| ProbeError::PresignError {
                message: format!("presign GET {}: {}", key, DisplayErrorContext(&e)),
            })?;

        Ok(presigned.uri().to_string())
    }
}

fn presigning_config(expires_in: Duration) -> Result<PresigningConfig> {
    PresigningConfig::expires_in(expires_in).map_err(|e| ProbeError::PresignError {
        message: format!("invalid expiry {}s: {}", expires_in.as_secs(), e),
    })
}
