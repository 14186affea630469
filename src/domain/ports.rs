use crate::domain::model::{
    CheckOutcome, ObjectSummary, Payload, PresignedPost, PresignedPut, StoredObject, UploadRecord,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 驗證與清理上傳結果用的物件存取介面
pub trait ObjectStore: Send + Sync {
    fn get_object(&self, key: &str) -> impl std::future::Future<Output = Result<StoredObject>> + Send;
    fn list_objects(
        &self,
        prefix: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<ObjectSummary>>> + Send;
    fn delete_object(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 實際送出已簽名請求的方式；回傳 HTTP 狀態碼，非 2xx 不視為錯誤
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;
    fn submit_post(
        &self,
        post: &PresignedPost,
        payload: &Payload,
    ) -> impl std::future::Future<Output = Result<u16>> + Send;
    fn submit_put(
        &self,
        put: &PresignedPut,
        payload: &Payload,
    ) -> impl std::future::Future<Output = Result<u16>> + Send;
    fn fetch(&self, url: &str) -> impl std::future::Future<Output = Result<(u16, Vec<u8>)>> + Send;
}

pub trait TargetProvider: Send + Sync {
    fn endpoint(&self) -> &str;
    fn region(&self) -> &str;
    fn bucket(&self) -> &str;
    fn access_key(&self) -> &str;
    fn secret_key(&self) -> &str;
    fn session_token(&self) -> Option<&str>;
    fn force_path_style(&self) -> bool;
}

#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;
    /// 上傳→驗證→清理 的輪數
    fn rounds(&self) -> usize {
        1
    }
    async fn upload(&self, round: usize) -> Result<Vec<UploadRecord>>;
    async fn verify(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>>;
    async fn cleanup(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>>;
}
