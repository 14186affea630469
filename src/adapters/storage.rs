use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client as S3Client;

use crate::domain::model::{ObjectSummary, StoredObject};
use crate::domain::ports::ObjectStore;
use crate::utils::error::{ProbeError, Result};

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

fn storage_error<E, R>(operation: &str, key: &str, err: SdkError<E, R>) -> ProbeError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = match err.code() {
        Some(code) => format!("{} ({})", code, err.message().unwrap_or("no message")),
        None => DisplayErrorContext(&err).to_string(),
    };
    ProbeError::StorageError {
        operation: operation.to_string(),
        key: key.to_string(),
        message,
    }
}

impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, key: &str) -> Result<StoredObject> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if matches!(err.as_service_error(), Some(GetObjectError::NoSuchKey(_))) {
                    ProbeError::ObjectNotFound {
                        key: key.to_string(),
                    }
                } else {
                    storage_error("get_object", key, err)
                }
            })?;

        let content_type = resp.content_type().map(str::to_string);
        let metadata = resp.metadata().cloned().unwrap_or_default();
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| ProbeError::StorageError {
                operation: "get_object".to_string(),
                key: key.to_string(),
                message: format!("failed to read body: {}", e),
            })?;

        Ok(StoredObject {
            key: key.to_string(),
            body: data.into_bytes().to_vec(),
            content_type,
            metadata,
        })
    }

    async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(prefix.map(str::to_string))
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|err| storage_error("list_objects", prefix.unwrap_or(""), err))?;

            objects.extend(resp.contents().iter().filter_map(|obj| {
                obj.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0),
                })
            }));

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| storage_error("delete_object", key, err))?;
        Ok(())
    }
}
