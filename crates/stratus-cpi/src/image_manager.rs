//! Stemcell image lifecycle

use std::path::Path;
use std::sync::Arc;
use stratus_cloud::naming::{STEMCELL_PREFIX, unique_name};
use stratus_cloud::{
    Acl, Bucket, CloudError, CloudResource, ComputeApi, Image, ImageParams, ResourceWaiter,
    Result, StorageApi,
};

pub struct ImageManager {
    api: Arc<dyn ComputeApi>,
    storage: Arc<dyn StorageApi>,
    waiter: ResourceWaiter,
}

impl ImageManager {
    pub fn new(api: Arc<dyn ComputeApi>, storage: Arc<dyn StorageApi>, waiter: ResourceWaiter) -> Self {
        Self {
            api,
            storage,
            waiter,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Image> {
        self.api
            .get_image(id)
            .await?
            .ok_or_else(|| CloudError::ImageNotFound(id.to_string()))
    }

    /// Register an image from a raw disk tarball already hosted at `url`
    pub async fn create_from_url(&self, url: &str, description: &str) -> Result<Image> {
        let name = unique_name(STEMCELL_PREFIX);
        tracing::debug!("Using remote image located at `{}'", url);
        self.create(&name, description, url).await
    }

    /// Stage a local tarball in a temporary bucket and register it.
    ///
    /// The bucket and the uploaded object are removed whether or not
    /// registration succeeds. A failed upload may have left a partial
    /// object behind, so it is deleted by key.
    pub async fn create_from_tarball(&self, path: &Path, description: &str) -> Result<Image> {
        let name = unique_name(STEMCELL_PREFIX);

        tracing::debug!("Creating storage bucket `{}'", name);
        let bucket = self.storage.create_bucket(&name, Acl::Private).await?;

        let key = format!("{name}.tar.gz");
        let mut upload_started = false;
        let result: Result<Image> = async {
            tracing::debug!("Uploading image `{}' to bucket `{}'", key, name);
            upload_started = true;
            let object = self
                .storage
                .upload_object(&bucket, &key, path, Acl::PublicRead)
                .await?;

            self.create(&name, description, &object.public_url).await
        }
        .await;

        let staged_key = upload_started.then_some(key.as_str());
        self.cleanup_staging(&bucket, staged_key).await;
        result
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let image = self.get(id).await?;
        if !image.is_ready() {
            return Err(CloudError::cloud(format!(
                "Cannot delete image `{}', status is `{}'",
                id, image.status
            )));
        }

        let operation = self.api.delete_image(&image).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }

    async fn create(&self, name: &str, description: &str, source_url: &str) -> Result<Image> {
        let params = ImageParams {
            name: name.to_string(),
            description: description.to_string(),
            raw_disk: source_url.to_string(),
        };
        tracing::debug!("Using image params: {:?}", params);

        let image = self.api.insert_image(&params).await?;
        tracing::debug!("Creating new image `{}'...", image.name);
        self.waiter.wait_for(self.api.as_ref(), &image).await
    }

    async fn cleanup_staging(&self, bucket: &Bucket, key: Option<&str>) {
        if let Some(key) = key {
            if let Err(e) = self.storage.delete_object(bucket, key).await {
                tracing::warn!("Failed to delete staged object `{}': {}", key, e);
            }
        }
        if let Err(e) = self.storage.delete_bucket(bucket).await {
            tracing::warn!("Failed to delete staging bucket `{}': {}", bucket.name, e);
        }
    }
}
