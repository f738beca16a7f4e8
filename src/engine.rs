use crate::types::{ClassificationRequest, ClassificationResult};
use async_trait::async_trait;

#[async_trait]
pub trait Engine {
    async fn classify(&self, request: ClassificationRequest) -> ClassificationResult;
}
