use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A category reference embedded in a source product (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCategoryRef {
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// The embedded provider blob on a source product. Any field may be
/// missing or the whole blob absent — the provider reconciler (C3) is
/// built around that assumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceProviderBlob {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// One entry in a product's gallery blob (spec §4.8).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceGalleryEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub own_image: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

impl SourceGalleryEntry {
    /// The URL this entry would contribute, preferring `url`, then
    /// `ownImage`, `sourceUrl`, `originalUrl` (spec §4.8 step 1).
    pub fn usable_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.own_image.as_deref())
            .or(self.source_url.as_deref())
            .or(self.original_url.as_deref())
    }
}

/// A snapshot of a legacy product (spec §3, `SourceProduct`).
///
/// Both source backends (live store query and JSON snapshot) produce this
/// shape; nothing downstream of the Source Reader cares which backend a
/// record came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProduct {
    pub source_id: i64,
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    pub platform_name: String,
    pub country_code: String,

    pub sale_price: f64,
    pub suggested_price: f64,
    pub stock: i32,
    pub variations_amount: i32,
    pub score: f64,

    pub sold_units_last_7_days: i64,
    pub sold_units_last_30_days: i64,
    pub total_sold_units: i64,
    pub billing_last_7_days: f64,
    pub billing_last_30_days: f64,
    pub total_billing: f64,

    pub visible: bool,
    pub categories: Vec<SourceCategoryRef>,
    /// The raw embedded provider blob, kept unparsed: whether it's
    /// absent, malformed, or missing `externalId` is the Provider
    /// Reconciler's call to make (spec §4.5), not the reader's.
    pub provider: Option<serde_json::Value>,
    /// The raw gallery blob — either a JSON array or a JSON-encoded
    /// string containing one (spec §4.8 step 1). Parsed by the
    /// Multimedia Reconciler, not here.
    pub gallery: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceProduct {
    /// The first category name, if any — categories are an ordered list
    /// but only the first is consulted for base-category resolution
    /// (spec §4.6 delegates to C2 with the product's category, singular).
    pub fn primary_category(&self) -> Option<&SourceCategoryRef> {
        self.categories.first()
    }

    /// Best-effort parse of the embedded provider blob. `None` means
    /// "absent"; `Some(Err(_))` means "present but unparseable" — both
    /// trigger the fallback-provider path in C3, but are distinguished
    /// for logging.
    pub fn parse_provider(&self) -> Option<Result<SourceProviderBlob, serde_json::Error>> {
        self.provider.as_ref().map(|raw| serde_json::from_value(raw.clone()))
    }

    /// Best-effort parse of the gallery blob, handling both the native
    /// JSON-array shape and the "array encoded as a JSON string" shape
    /// (spec §4.8 step 1).
    pub fn parse_gallery(&self) -> Result<Vec<SourceGalleryEntry>, serde_json::Error> {
        match &self.gallery {
            serde_json::Value::String(s) => {
                if s.trim().is_empty() {
                    Ok(Vec::new())
                } else {
                    serde_json::from_str(s)
                }
            }
            serde_json::Value::Null => Ok(Vec::new()),
            other => serde_json::from_value(other.clone()),
        }
    }
}

/// A source history row (spec §3, `SourceHistory`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHistory {
    pub external_product_id: String,
    pub platform_name: String,
    pub country_code: String,
    /// ISO `yyyy-mm-dd`, kept as text per spec §3 rather than parsed —
    /// the gap-fill set arithmetic in C5 only ever compares these as
    /// opaque keys, never arithmetic on dates.
    pub date: String,
    pub stock: i32,
    pub sale_price: f64,
    pub sold_units: i32,
    pub sales_amount: f64,
    pub stock_adjustment: bool,
    pub stock_adjustment_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_entry_prefers_url_over_fallbacks() {
        let entry = SourceGalleryEntry {
            url: Some("a.jpg".into()),
            own_image: Some("b.jpg".into()),
            ..Default::default()
        };
        assert_eq!(entry.usable_url(), Some("a.jpg"));
    }

    #[test]
    fn gallery_entry_falls_back_in_order() {
        let entry = SourceGalleryEntry {
            source_url: Some("c.jpg".into()),
            original_url: Some("d.jpg".into()),
            ..Default::default()
        };
        assert_eq!(entry.usable_url(), Some("c.jpg"));
    }

    #[test]
    fn gallery_entry_with_no_url_is_unusable() {
        assert_eq!(SourceGalleryEntry::default().usable_url(), None);
    }

    fn sample_product(provider: Option<serde_json::Value>, gallery: serde_json::Value) -> SourceProduct {
        SourceProduct {
            source_id: 1,
            external_id: "X1".into(),
            name: "widget".into(),
            description: None,
            platform_name: "dropi".into(),
            country_code: "CO".into(),
            sale_price: 1.0,
            suggested_price: 1.0,
            stock: 1,
            variations_amount: 1,
            score: 1.0,
            sold_units_last_7_days: 0,
            sold_units_last_30_days: 0,
            total_sold_units: 0,
            billing_last_7_days: 0.0,
            billing_last_30_days: 0.0,
            total_billing: 0.0,
            visible: true,
            categories: vec![],
            provider,
            gallery,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn parse_provider_absent_is_none() {
        let product = sample_product(None, serde_json::json!([]));
        assert!(product.parse_provider().is_none());
    }

    #[test]
    fn parse_provider_malformed_surfaces_error() {
        let product = sample_product(Some(serde_json::json!("not-an-object")), serde_json::json!([]));
        assert!(product.parse_provider().unwrap().is_err());
    }

    #[test]
    fn parse_gallery_accepts_native_array() {
        let product = sample_product(None, serde_json::json!([{"url": "a.jpg"}]));
        let gallery = product.parse_gallery().unwrap();
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn parse_gallery_accepts_string_encoded_array() {
        let product = sample_product(None, serde_json::Value::String(r#"[{"url":"a.jpg"}]"#.into()));
        let gallery = product.parse_gallery().unwrap();
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn parse_gallery_null_is_empty() {
        let product = sample_product(None, serde_json::Value::Null);
        assert_eq!(product.parse_gallery().unwrap().len(), 0);
    }
}
