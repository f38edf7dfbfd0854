//! Remote image hosting.
//!
//! Product images are pushed to a Cloudinary-compatible upload API with a
//! signed request. The [`AssetHost`] trait is the seam the write path
//! depends on, so tests can substitute a fake host.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;
use crate::errors::AppError;

/// An image received from a client, ready to be uploaded.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Public HTTPS URL of the stored image
    pub url: String,
    /// Host-side identifier, needed to manage the asset later
    pub public_id: String,
}

/// A remote service that stores images and hands back a URL.
#[async_trait]
pub trait AssetHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<UploadedAsset, AppError>;
}

/// Signed uploads against the Cloudinary upload API.
pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadErrorResponse {
    error: UploadErrorMessage,
}

#[derive(Debug, Deserialize)]
struct UploadErrorMessage {
    message: String,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }
}

#[async_trait]
impl AssetHost for CloudinaryHost {
    async fn upload(&self, image: ImageUpload) -> Result<UploadedAsset, AppError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut params: BTreeMap<&'static str, String> = BTreeMap::new();
        params.insert("folder", self.config.folder.clone());
        params.insert("overwrite", "false".to_string());
        params.insert("timestamp", timestamp);
        params.insert("unique_filename", "true".to_string());
        params.insert("use_filename", "true".to_string());
        let signature = sign_params(&params, &self.config.api_secret);

        let mut part = Part::bytes(image.bytes.to_vec()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part.mime_str(content_type)?;
        }

        let mut form = Form::new().part("file", part);
        for (key, value) in params {
            form = form.text(key, value);
        }
        let form = form
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<UploadErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "no error message".to_string());
            return Err(AppError::Upload(format!(
                "Asset host returned {}: {}",
                status, message
            )));
        }

        let body: UploadResponse = response.json().await?;
        tracing::info!(public_id = %body.public_id, "Uploaded product image");

        Ok(UploadedAsset {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }
}

/// Stand-in used when no image host credentials are configured.
pub struct UnconfiguredAssetHost;

#[async_trait]
impl AssetHost for UnconfiguredAssetHost {
    async fn upload(&self, _image: ImageUpload) -> Result<UploadedAsset, AppError> {
        Err(AppError::Upload(
            "No asset host configured (CLOUDINARY_* variables unset)".to_string(),
        ))
    }
}

/// Cloudinary request signature: SHA-256 over `k=v` pairs in key order,
/// joined by `&`, with the API secret appended.
pub fn sign_params<K, V>(params: &BTreeMap<K, V>, api_secret: &str) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{}={}", key.as_ref(), value.as_ref()))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{extract::Multipart, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    const SERVER_SECRET: &str = "server-secret";

    fn cloudinary_config(api_base: String, api_secret: &str) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key-123".to_string(),
            api_secret: api_secret.to_string(),
            folder: "electrostore/products".to_string(),
            api_base,
        }
    }

    fn image() -> ImageUpload {
        ImageUpload {
            file_name: "phone.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    /// Minimal stand-in for the upload API that verifies signatures.
    async fn fake_upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        let mut file_name = None;
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                file_name = field.file_name().map(str::to_string);
                assert!(!field.bytes().await.unwrap().is_empty());
            } else {
                fields.insert(name, field.text().await.unwrap());
            }
        }

        let provided = fields.remove("signature").unwrap_or_default();
        assert_eq!(fields.remove("api_key").as_deref(), Some("key-123"));
        assert_eq!(
            fields.remove("signature_algorithm").as_deref(),
            Some("sha256")
        );

        if sign_params(&fields, SERVER_SECRET) != provided {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Invalid Signature" } })),
            );
        }

        let stem = file_name.unwrap_or_default().replace(".png", "");
        (
            StatusCode::OK,
            Json(json!({
                "secure_url": format!("https://res.example.com/demo/{}_x1.png", stem),
                "public_id": format!("electrostore/products/{}_x1", stem),
            })),
        )
    }

    async fn spawn_fake_host() -> String {
        let app = Router::new().route("/v1_1/demo/image/upload", post(fake_upload));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_sign_params_known_vector() {
        let mut params = BTreeMap::new();
        params.insert("use_filename", "true".to_string());
        params.insert("timestamp", "1700000000".to_string());
        params.insert("folder", "electrostore/products".to_string());
        params.insert("unique_filename", "true".to_string());
        params.insert("overwrite", "false".to_string());

        assert_eq!(
            sign_params(&params, "abcd"),
            "7357860be1a2bc1376a4022a58706afcfbdef2826179e4b5bbbd70d87ae0e506"
        );
    }

    #[tokio::test]
    async fn test_cloudinary_upload_success() {
        let base = spawn_fake_host().await;
        let host = CloudinaryHost::new(cloudinary_config(base, SERVER_SECRET)).unwrap();

        let asset = host.upload(image()).await.unwrap();
        assert_eq!(asset.url, "https://res.example.com/demo/phone_x1.png");
        assert_eq!(asset.public_id, "electrostore/products/phone_x1");
    }

    #[tokio::test]
    async fn test_cloudinary_upload_rejected() {
        let base = spawn_fake_host().await;
        let host = CloudinaryHost::new(cloudinary_config(base, "wrong-secret")).unwrap();

        match host.upload(image()).await {
            Err(AppError::Upload(msg)) => assert!(msg.contains("Invalid Signature")),
            other => panic!("expected upload error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_host_fails() {
        let result = UnconfiguredAssetHost.upload(image()).await;
        assert!(matches!(result, Err(AppError::Upload(_))));
    }
}
