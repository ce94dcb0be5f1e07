//! Public storage buckets.

use elvora_core::backend::{BackendError, BlobStorage};
use reqwest::Method;
use tracing::instrument;

use super::{SupabaseClient, check, transport};

impl BlobStorage for SupabaseClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("/storage/v1/object/{bucket}/{name}"))?;
        let response = self
            .request(Method::POST, url)
            .await
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        tracing::info!("Media uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        let mut url = self.inner.base.clone();
        url.set_path(&format!("/storage/v1/object/public/{bucket}/{name}"));
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        let client = crate::supabase::tests::client();
        assert_eq!(
            client.public_url("product-media", "main_1700000000000_tee.jpg"),
            "https://abcd.supabase.co/storage/v1/object/public/product-media/main_1700000000000_tee.jpg"
        );
    }
}
