//! Product API endpoints.

use axum::extract::{
    multipart::MultipartRejection,
    rejection::{PathRejection, QueryRejection},
    Multipart, Path, Query, State,
};
use serde::Serialize;

use super::{created, success, ApiResult};
use crate::assets::ImageUpload;
use crate::db::timestamp_now;
use crate::errors::AppError;
use crate::models::{Product, ProductId, ProductSubmission};
use crate::query::{ListParams, ProductQuery};
use crate::AppState;

/// Multipart field carrying the product image.
const IMAGE_FIELD: &str = "image";

/// One page of products.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    /// Number of matching products across all pages
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// GET /api/products - Search, sort and paginate products.
pub async fn list_products(
    State(state): State<AppState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<ProductListResponse> {
    let Query(pairs) = pairs.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let query = ProductQuery::from_params(&ListParams::from_pairs(pairs));
    tracing::debug!(
        search = ?query.search,
        sort = query.sort.as_str(),
        page = query.page,
        limit = query.limit,
        "Listing products"
    );

    let (products, total) = state.repo.list_products(&query).await?;

    success(ProductListResponse {
        products,
        total,
        page: query.page,
        limit: query.limit,
    })
}

/// GET /api/products/:id - Get a single product.
pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Product> {
    let Path(id) = id.map_err(|e| {
        tracing::debug!("Rejected product id: {}", e.body_text());
        AppError::BadRequest("Invalid id".to_string())
    })?;
    let id: ProductId = id.parse()?;

    match state.repo.get_product(&id).await? {
        Some(product) => success(product),
        None => Err(AppError::NotFound("Product not found".to_string())),
    }
}

/// POST /api/products - Validate, upload the image, then store the product.
pub async fn create_product(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Product> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let submission = read_submission(multipart).await?;
    let (draft, image) = submission.validate()?;

    // Nothing is written unless the upload succeeds.
    let asset = state.assets.upload(image).await?;
    let product = draft.into_product(asset, timestamp_now());

    if let Err(e) = state.repo.insert_product(&product).await {
        tracing::error!(
            public_id = %product.image_public_id,
            "Product insert failed after image upload; remote asset is orphaned"
        );
        return Err(e);
    }

    tracing::info!(id = %product.id, name = %product.name, "Created product");
    created(product)
}

/// Collect the form into a submission. Unknown fields are skipped.
async fn read_submission(mut multipart: Multipart) -> Result<ProductSubmission, AppError> {
    let mut submission = ProductSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == IMAGE_FIELD {
            let file_name = field
                .file_name()
                .filter(|n| !n.is_empty())
                .unwrap_or("upload")
                .to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            submission.image = Some(ImageUpload {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await?;
            submission.set_field(&name, value);
        }
    }

    Ok(submission)
}
