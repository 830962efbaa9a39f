use aws_config::Region;
use aws_sdk_s3::{
    config::Credentials,
    primitives::ByteStream,
    types::{BucketCannedAcl, ObjectCannedAcl},
    Client, Config,
};
use bytes::Bytes;

use crate::{config::MinioConfig, error::AppResult};

#[derive(Clone)]
pub struct MinioClient {
    client: Client,
    config: MinioConfig,
}

impl MinioClient {
    pub async fn new(config: &MinioConfig) -> AppResult<Self> {
        let creds = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "minio",
        );

        let s3_config = Config::builder()
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(creds)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            config: config.clone(),
        })
    }

    pub async fn ensure_rooms_bucket(&self) -> AppResult<()> {
        let bucket = &self.config.rooms_bucket;
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create bucket: {}", e))?;
        tracing::info!(bucket = %bucket, "created bucket");
        Ok(())
    }

    /// Stores a room image or video and returns its public URL.
    pub async fn upload_room_media(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> AppResult<String> {
        self.client
            .put_object()
            .bucket(&self.config.rooms_bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to upload file: {}", e))?;

        Ok(self.public_url(key))
    }

    pub async fn delete_room_media(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.config.rooms_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete file: {}", e))?;
        Ok(())
    }

    pub fn public_url(&self, key: &str) -> String {
        media_url(&self.config, key)
    }

    /// Inverse of [`public_url`](Self::public_url): the object key of a URL
    /// this client produced, if any.
    pub fn key_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let base = media_url(&self.config, "");
        url.strip_prefix(base.as_str()).filter(|k| !k.is_empty())
    }
}

fn media_url(config: &MinioConfig, key: &str) -> String {
    let base = config.public_url.as_deref().unwrap_or(&config.endpoint);
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        config.rooms_bucket,
        key
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_url: Option<&str>) -> MinioConfig {
        MinioConfig {
            endpoint: "http://minio:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            rooms_bucket: "rooms".to_string(),
            public_url: public_url.map(str::to_string),
        }
    }

    #[test]
    fn urls_prefer_the_public_host() {
        assert_eq!(
            media_url(&config(Some("https://cdn.uniroom.app/")), "a/b.jpg"),
            "https://cdn.uniroom.app/rooms/a/b.jpg"
        );
        assert_eq!(
            media_url(&config(None), "a/b.jpg"),
            "http://minio:9000/rooms/a/b.jpg"
        );
    }
}
