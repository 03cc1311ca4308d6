use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration_types::{MigrationError, MigrationResult, SourceCategoryRef, SourceProduct};
use serde::Deserialize;

use crate::SourceReader;

/// The on-disk snapshot shape (spec §6: `data/products/all-products.json`,
/// "the same array wrapped in a one-field object" is also accepted).
/// Field names are the legacy snake-case JSON keys; this is the boundary
/// where the snapshot's naming gets normalized into the same in-memory
/// shape the store backend produces.
#[derive(Debug, Deserialize)]
struct RawSourceProduct {
    id: i64,
    external_id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    platform_name: String,
    country_code: String,
    #[serde(default)]
    sale_price: f64,
    #[serde(default)]
    suggested_price: f64,
    #[serde(default)]
    stock: i32,
    #[serde(default)]
    variations_amount: i32,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    sold_units_last_7_days: i64,
    #[serde(default)]
    sold_units_last_30_days: i64,
    #[serde(default)]
    total_sold_units: i64,
    #[serde(default)]
    billing_last_7_days: f64,
    #[serde(default)]
    billing_last_30_days: f64,
    #[serde(default)]
    total_billing: f64,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    categories: Vec<SourceCategoryRef>,
    #[serde(default)]
    provider: Option<serde_json::Value>,
    #[serde(default)]
    gallery: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawSourceProduct {
    fn into_source_product(self) -> SourceProduct {
        SourceProduct {
            source_id: self.id,
            external_id: self.external_id.expect("checked non-empty by caller"),
            name: self.name,
            description: self.description,
            platform_name: self.platform_name,
            country_code: self.country_code,
            sale_price: self.sale_price,
            suggested_price: self.suggested_price,
            stock: self.stock,
            variations_amount: self.variations_amount,
            score: self.score,
            sold_units_last_7_days: self.sold_units_last_7_days,
            sold_units_last_30_days: self.sold_units_last_30_days,
            total_sold_units: self.total_sold_units,
            billing_last_7_days: self.billing_last_7_days,
            billing_last_30_days: self.billing_last_30_days,
            total_billing: self.total_billing,
            visible: self.visible,
            categories: self.categories,
            provider: self.provider,
            gallery: self.gallery,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Reads products from a pre-exported JSON snapshot rather than the live
/// legacy store (spec §4.3 "Snapshot backend"). Loaded once and cached
/// process-wide; `read`/`count` are pure slices afterward.
pub struct SnapshotSourceReader {
    records: Vec<SourceProduct>,
}

impl SnapshotSourceReader {
    pub async fn load(path: &Path) -> MigrationResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MigrationError::Configuration(format!("failed to read snapshot {}: {e}", path.display())))?;
        let root: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| MigrationError::Configuration(format!("snapshot is not valid JSON: {e}")))?;

        let array = match root {
            serde_json::Value::Array(arr) => arr,
            serde_json::Value::Object(map) => {
                let (_, first) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| MigrationError::Configuration("snapshot object has no fields".into()))?;
                match first {
                    serde_json::Value::Array(arr) => arr,
                    _ => {
                        return Err(MigrationError::Configuration(
                            "wrapped snapshot value is not an array".into(),
                        ))
                    }
                }
            }
            _ => {
                return Err(MigrationError::Configuration(
                    "snapshot root must be a JSON array or a single-field object wrapping one".into(),
                ))
            }
        };

        let mut records = Vec::with_capacity(array.len());
        for raw in array {
            match serde_json::from_value::<RawSourceProduct>(raw) {
                Ok(parsed) => match &parsed.external_id {
                    Some(external_id) if !external_id.is_empty() => {
                        records.push(parsed.into_source_product());
                    }
                    _ => {
                        tracing::warn!(source_id = parsed.id, "dropping snapshot entry with missing external_id");
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unparseable snapshot entry");
                }
            }
        }
        // Both backends must agree on ordering (spec §4.3): createdAt
        // asc, sourceId asc, matching the store backend's ORDER BY.
        records.sort_by(|a, b| (a.created_at, a.source_id).cmp(&(b.created_at, b.source_id)));

        tracing::info!(count = records.len(), "loaded snapshot source backend");
        Ok(Self { records })
    }
}

#[async_trait]
impl SourceReader for SnapshotSourceReader {
    async fn count(&self) -> MigrationResult<u64> {
        Ok(self.records.len() as u64)
    }

    async fn read(&self, skip: u64, take: u64) -> MigrationResult<Vec<SourceProduct>> {
        let skip = skip as usize;
        let take = take as usize;
        if skip >= self.records.len() {
            return Ok(Vec::new());
        }
        let end = std::cmp::min(skip + take, self.records.len());
        Ok(self.records[skip..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn sample_json(external_id: &str) -> String {
        format!(
            r#"{{"id": 1, "external_id": "{external_id}", "name": "widget", "platform_name": "dropi",
            "country_code": "CO", "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"}}"#
        )
    }

    #[tokio::test]
    async fn loads_plain_array() {
        let body = format!("[{}]", sample_json("X1"));
        let tmp = write_temp(&body);
        let reader = SnapshotSourceReader::load(tmp.path()).await.unwrap();
        assert_eq!(reader.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn loads_single_field_wrapped_array() {
        let body = format!(r#"{{"products": [{}]}}"#, sample_json("X1"));
        let tmp = write_temp(&body);
        let reader = SnapshotSourceReader::load(tmp.path()).await.unwrap();
        assert_eq!(reader.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn drops_entries_missing_external_id() {
        let body = r#"[{"id": 1, "name": "widget", "platform_name": "dropi", "country_code": "CO",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"}]"#;
        let tmp = write_temp(body);
        let reader = SnapshotSourceReader::load(tmp.path()).await.unwrap();
        assert_eq!(reader.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_slices_respect_skip_and_take() {
        let body = format!("[{}, {}]", sample_json("X1"), sample_json("X2"));
        let tmp = write_temp(&body);
        let reader = SnapshotSourceReader::load(tmp.path()).await.unwrap();
        let page = reader.read(1, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].external_id, "X2");
    }
}
