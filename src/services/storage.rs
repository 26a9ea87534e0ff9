use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use sha2::{Digest, Sha256};

use crate::core::config::Settings;

#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    client: Client,
    bucket: String,
}

impl StorageService {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        if settings.s3().access_key.is_empty() || settings.s3().secret_key.is_empty() {
            return Ok(None);
        }

        let creds = Credentials::new(
            settings.s3().access_key.clone(),
            settings.s3().secret_key.clone(),
            None,
            None,
            "studyforge-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(settings.s3().endpoint.clone())
            .region(aws_config::Region::new(settings.s3().region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        let client = Client::new(&config);

        Ok(Some(Self { client, bucket: settings.s3().bucket.clone() }))
    }

    pub(crate) async fn upload_bytes(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<(i64, String)> {
        let size = bytes.len() as i64;
        let hash = Sha256::digest(&bytes);
        let hash_hex = hex::encode(hash);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        Ok((size, hash_hex))
    }

    pub(crate) async fn upload_file(
        &self,
        key: &str,
        content_type: &str,
        path: &Path,
    ) -> anyhow::Result<i64> {
        let size = tokio::fs::metadata(path).await?.len() as i64;
        let body = ByteStream::from_path(path).await?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await?;

        Ok(size)
    }

    pub(crate) async fn get_object(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let object = self.client.get_object().bucket(&self.bucket).key(key).send().await?;
        let bytes = object.body.collect().await?.into_bytes();
        Ok(bytes.to_vec())
    }

    pub(crate) async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client.delete_object().bucket(&self.bucket).key(key).send().await?;
        Ok(())
    }

    /// Delete every object under a prefix, paging through the listing.
    pub(crate) async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let mut deleted = 0u64;
        let mut continuation: Option<String> = None;

        loop {
            let mut request =
                self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let listing = request.send().await?;

            for object in listing.contents() {
                if let Some(key) = object.key() {
                    self.client.delete_object().bucket(&self.bucket).key(key).send().await?;
                    deleted += 1;
                }
            }

            match listing.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(deleted)
    }

    pub(crate) async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> anyhow::Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await?;

        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::StorageService;
    use crate::core::config::Settings;
    use crate::test_support;
    use std::time::Duration;

    #[tokio::test]
    async fn presign_get_embeds_key() {
        let _guard = test_support::env_lock().await;
        std::env::set_var("S3_ENDPOINT", "http://localhost:9000");
        std::env::set_var("S3_ACCESS_KEY", "test-access-key");
        std::env::set_var("S3_SECRET_KEY", "test-secret-key");
        std::env::set_var("S3_BUCKET", "studyforge-test-bucket");

        let settings = Settings::load().expect("settings");
        let storage = StorageService::from_settings(&settings)
            .await
            .expect("storage")
            .expect("storage enabled");

        let url = storage
            .presign_get("videos/v1/source.mp4", Duration::from_secs(300))
            .await
            .expect("presign get");
        assert!(url.contains("source.mp4"));

        std::env::remove_var("S3_ENDPOINT");
        std::env::remove_var("S3_ACCESS_KEY");
        std::env::remove_var("S3_SECRET_KEY");
        std::env::remove_var("S3_BUCKET");
    }

    #[tokio::test]
    async fn storage_disabled_without_credentials() {
        let _guard = test_support::env_lock().await;
        std::env::remove_var("S3_ACCESS_KEY");
        std::env::remove_var("S3_SECRET_KEY");

        let settings = Settings::load().expect("settings");
        let storage = StorageService::from_settings(&settings).await.expect("storage");
        assert!(storage.is_none());
    }
}
