//! Product document model and the validation of submitted product forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::{ImageUpload, UploadedAsset};
use crate::errors::AppError;
use crate::query::search_text;

/// Store-generated product identifier.
///
/// Always obtained through [`ProductId::new`] or a fallible parse, never by
/// trusting caller text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ProductId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| AppError::BadRequest("Invalid id".to_string()))
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A persisted product document.
///
/// Optional text fields serialize as `null` rather than being omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub stock: i64,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub tags: Vec<String>,
    pub features: Vec<String>,
    pub warranty: Option<String>,
    pub shipping_info: Option<String>,
    pub description: String,
    pub image_url: String,
    pub image_public_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Product {
    /// Lower-cased text the listing search matches against.
    pub fn search_text(&self) -> String {
        let optional = [&self.brand, &self.category, &self.sku]
            .into_iter()
            .flatten()
            .map(String::as_str);
        search_text(
            [self.name.as_str(), self.description.as_str()]
                .into_iter()
                .chain(optional)
                .chain(self.tags.iter().map(String::as_str)),
        )
    }
}

/// Raw text fields of an "add product" form, exactly as submitted.
#[derive(Debug, Default, Clone)]
pub struct ProductSubmission {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub discount_price: Option<String>,
    pub stock: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub tags: Option<String>,
    pub features: Option<String>,
    pub warranty: Option<String>,
    pub shipping_info: Option<String>,
    pub image: Option<ImageUpload>,
}

/// A submission that passed validation, waiting for its image upload.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub stock: i64,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub tags: Vec<String>,
    pub features: Vec<String>,
    pub warranty: Option<String>,
    pub shipping_info: Option<String>,
}

impl ProductSubmission {
    /// Assign a form field by its wire name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "name" => &mut self.name,
            "description" => &mut self.description,
            "price" => &mut self.price,
            "discountPrice" => &mut self.discount_price,
            "stock" => &mut self.stock,
            "brand" => &mut self.brand,
            "category" => &mut self.category,
            "sku" => &mut self.sku,
            "color" => &mut self.color,
            "size" => &mut self.size,
            "material" => &mut self.material,
            "tags" => &mut self.tags,
            "features" => &mut self.features,
            "warranty" => &mut self.warranty,
            "shippingInfo" => &mut self.shipping_info,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Validate the submission and split off the image to upload.
    ///
    /// Checks run in a fixed order and the first failure wins: name,
    /// description, image, price, discount price.
    pub fn validate(self) -> Result<(ProductDraft, ImageUpload), AppError> {
        let name = trimmed(self.name);
        let description = trimmed(self.description);

        if name.is_empty() {
            return Err(AppError::Validation("Missing product name".to_string()));
        }
        if description.is_empty() {
            return Err(AppError::Validation("Missing description".to_string()));
        }
        let image = match self.image {
            Some(image) if !image.bytes.is_empty() => image,
            _ => return Err(AppError::Validation("Missing image file".to_string())),
        };

        let price = self
            .price
            .as_deref()
            .and_then(parse_amount)
            .ok_or_else(|| AppError::Validation("Invalid price".to_string()))?;

        let discount_price = match self.discount_price.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                parse_amount(raw)
                    .ok_or_else(|| AppError::Validation("Invalid discountPrice".to_string()))?,
            ),
        };

        let draft = ProductDraft {
            name,
            description,
            price,
            discount_price,
            stock: parse_stock(self.stock.as_deref()),
            brand: optional(self.brand),
            category: optional(self.category),
            sku: optional(self.sku),
            color: optional(self.color),
            size: optional(self.size),
            material: optional(self.material),
            tags: split_tags(self.tags.as_deref().unwrap_or_default()),
            features: split_features(self.features.as_deref().unwrap_or_default()),
            warranty: optional(self.warranty),
            shipping_info: optional(self.shipping_info),
        };

        Ok((draft, image))
    }
}

impl ProductDraft {
    /// Compose the final document once the image is hosted.
    pub fn into_product(self, asset: UploadedAsset, now: String) -> Product {
        Product {
            id: ProductId::new(),
            name: self.name,
            brand: self.brand,
            category: self.category,
            sku: self.sku,
            stock: self.stock,
            price: self.price,
            discount_price: self.discount_price,
            color: self.color,
            size: self.size,
            material: self.material,
            tags: self.tags,
            features: self.features,
            warranty: self.warranty,
            shipping_info: self.shipping_info,
            description: self.description,
            image_url: asset.url,
            image_public_id: asset.public_id,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Split comma-separated tags, dropping blanks. Order and duplicates are kept.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split one feature per line, dropping blank lines.
pub fn split_features(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a money amount: must be a finite, non-negative number.
fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
}

/// Stock falls back to zero when blank or unusable; fractions truncate.
fn parse_stock(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n.trunc() as i64)
        .unwrap_or(0)
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn optional(value: Option<String>) -> Option<String> {
    Some(trimmed(value)).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn image() -> ImageUpload {
        ImageUpload {
            file_name: "phone.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'].into(),
        }
    }

    fn submission() -> ProductSubmission {
        ProductSubmission {
            name: Some("  Pixel 9 ".to_string()),
            description: Some("A phone".to_string()),
            price: Some("699.99".to_string()),
            image: Some(image()),
            ..Default::default()
        }
    }

    fn validation_message(submission: ProductSubmission) -> String {
        match submission.validate() {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other.map(|(d, _)| d)),
        }
    }

    #[test]
    fn test_product_id_parse() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        assert!(matches!(
            "not-an-id".parse::<ProductId>(),
            Err(AppError::BadRequest(_))
        ));
        assert!("".parse::<ProductId>().is_err());
    }

    #[test]
    fn test_validate_minimal_submission() {
        let (draft, image) = submission().validate().unwrap();
        assert_eq!(draft.name, "Pixel 9");
        assert_eq!(draft.price, 699.99);
        assert_eq!(draft.discount_price, None);
        assert_eq!(draft.stock, 0);
        assert_eq!(draft.brand, None);
        assert!(draft.tags.is_empty());
        assert_eq!(image.file_name, "phone.png");
    }

    #[test]
    fn test_validation_order() {
        let mut s = submission();
        s.name = None;
        s.description = Some("   ".to_string());
        s.price = Some("abc".to_string());
        assert_eq!(validation_message(s), "Missing product name");

        let mut s = submission();
        s.description = Some("   ".to_string());
        s.image = None;
        assert_eq!(validation_message(s), "Missing description");

        let mut s = submission();
        s.image = None;
        s.price = Some("abc".to_string());
        assert_eq!(validation_message(s), "Missing image file");

        let mut s = submission();
        s.price = Some("abc".to_string());
        s.discount_price = Some("xyz".to_string());
        assert_eq!(validation_message(s), "Invalid price");
    }

    #[test]
    fn test_empty_image_counts_as_missing() {
        let mut s = submission();
        s.image = Some(ImageUpload {
            bytes: Bytes::new(),
            ..image()
        });
        assert_eq!(validation_message(s), "Missing image file");
    }

    #[test]
    fn test_price_must_be_finite_and_non_negative() {
        for bad in ["", "  ", "12abc", "NaN", "inf", "-1"] {
            let mut s = submission();
            s.price = Some(bad.to_string());
            assert_eq!(validation_message(s), "Invalid price", "price {:?}", bad);
        }

        let mut s = submission();
        s.price = None;
        assert_eq!(validation_message(s), "Invalid price");

        let mut s = submission();
        s.price = Some(" 0 ".to_string());
        assert_eq!(s.validate().unwrap().0.price, 0.0);
    }

    #[test]
    fn test_discount_price() {
        let mut s = submission();
        s.discount_price = Some("".to_string());
        assert_eq!(s.validate().unwrap().0.discount_price, None);

        let mut s = submission();
        s.discount_price = Some("799".to_string());
        // Not checked against price.
        assert_eq!(s.validate().unwrap().0.discount_price, Some(799.0));

        let mut s = submission();
        s.discount_price = Some("cheap".to_string());
        assert_eq!(validation_message(s), "Invalid discountPrice");
    }

    #[test]
    fn test_stock_is_lenient() {
        assert_eq!(parse_stock(None), 0);
        assert_eq!(parse_stock(Some("")), 0);
        assert_eq!(parse_stock(Some("lots")), 0);
        assert_eq!(parse_stock(Some("-4")), 0);
        assert_eq!(parse_stock(Some("7.9")), 7);
        assert_eq!(parse_stock(Some(" 12 ")), 12);
    }

    #[test]
    fn test_split_tags_and_features() {
        assert_eq!(
            split_tags(" phone, , android,phone ,"),
            vec!["phone", "android", "phone"]
        );
        assert!(split_tags("").is_empty());

        assert_eq!(
            split_features("5G\r\n\r\n  OLED display \n128GB"),
            vec!["5G", "OLED display", "128GB"]
        );
    }

    #[test]
    fn test_optional_fields_normalize_to_none() {
        let mut s = submission();
        s.brand = Some("  ".to_string());
        s.sku = Some(" SKU-1 ".to_string());
        s.set_field("shippingInfo", "Ships in 2 days".to_string());
        s.set_field("unknown", "ignored".to_string());
        let (draft, _) = s.validate().unwrap();
        assert_eq!(draft.brand, None);
        assert_eq!(draft.sku.as_deref(), Some("SKU-1"));
        assert_eq!(draft.shipping_info.as_deref(), Some("Ships in 2 days"));
    }

    #[test]
    fn test_into_product_serializes_nulls() {
        let (draft, _) = submission().validate().unwrap();
        let product = draft.into_product(
            UploadedAsset {
                url: "https://res.example.com/p.png".to_string(),
                public_id: "electrostore/products/p".to_string(),
            },
            "2026-01-01T00:00:00.000000Z".to_string(),
        );
        assert_eq!(product.created_at, product.updated_at);

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["_id"], product.id.to_string());
        assert!(json["brand"].is_null());
        assert!(json["discountPrice"].is_null());
        assert_eq!(json["imagePublicId"], "electrostore/products/p");
    }
}
