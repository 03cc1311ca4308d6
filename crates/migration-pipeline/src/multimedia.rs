use std::sync::Arc;

use migration_store::{MultimediaStore, NewMultimedia};
use migration_types::{MediaType, MigrationResult, SourceGalleryEntry, SourceProduct};

/// The CDN host table (spec §6, out-of-scope detail filled in here since
/// nothing downstream can function without it): `AR`/`GT` get dedicated
/// hosts, everything else shares a default.
fn cdn_host_for(country_code: &str) -> &'static str {
    match country_code {
        "AR" => "cdn-ar.example.com",
        "GT" => "cdn-gt.example.com",
        _ => "cdn.example.com",
    }
}

/// Normalizes a gallery entry's URL (spec §4.8 step 2): absolute URLs
/// pass through unchanged, everything else is prefixed with the
/// country's CDN host after trimming a leading `/`.
pub fn normalize_url(raw: &str, country_code: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    let trimmed = raw.trim_start_matches('/');
    format!("https://{}/{}", cdn_host_for(country_code), trimmed)
}

/// Classifies a normalized URL's media type by suffix (spec §4.8 step 3).
pub fn classify_media_type(url: &str, explicit: Option<&str>) -> MediaType {
    let lower = url.to_lowercase();
    const VIDEO_SUFFIXES: &[&str] = &[".mp4", ".mov", ".avi", ".webm"];
    const IMAGE_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];
    if VIDEO_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return MediaType::Video;
    }
    if IMAGE_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return MediaType::Image;
    }
    match explicit {
        Some("video") => MediaType::Video,
        _ => MediaType::Image,
    }
}

struct ValidEntry {
    url: String,
    media_type: MediaType,
}

/// The Multimedia Reconciler (spec §4.8): parses the gallery blob,
/// normalizes URLs, and either updates existing rows in place or
/// appends new ones (the update-then-append variant, spec §9 Q5).
pub struct MultimediaReconciler<T: MultimediaStore + ?Sized> {
    store: Arc<T>,
}

impl<T: MultimediaStore + ?Sized> MultimediaReconciler<T> {
    pub fn new(store: Arc<T>) -> Self {
        Self { store }
    }

    /// Returns the total number of rows updated plus inserted.
    pub async fn reconcile(&self, product: &SourceProduct, target_product_id: i64) -> MigrationResult<u64> {
        let entries = match product.parse_gallery() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(external_id = %product.external_id, error = %e, "malformed gallery blob, treating as empty");
                Vec::new()
            }
        };

        let valid: Vec<ValidEntry> = entries
            .iter()
            .filter_map(|entry: &SourceGalleryEntry| entry.usable_url().map(|raw_url| (raw_url, entry)))
            .map(|(raw_url, entry)| {
                let url = normalize_url(raw_url, &product.country_code);
                let media_type = classify_media_type(&url, entry.media_type.as_deref());
                ValidEntry { url, media_type }
            })
            .collect();

        let existing = self.store.existing_for_product(target_product_id).await?;

        let mut updated = 0u64;
        for (existing_row, new_entry) in existing.iter().zip(valid.iter()) {
            self.store.update_url(existing_row.id, &new_entry.url).await?;
            updated += 1;
        }

        let remainder: Vec<NewMultimedia> = valid
            .iter()
            .skip(existing.len())
            .map(|entry| NewMultimedia {
                product_id: target_product_id,
                url: entry.url.clone(),
                original_url: entry.url.clone(),
                media_type: migration_store::media_type_to_str(entry.media_type).to_string(),
                extracted: false,
            })
            .collect();
        let inserted = if remainder.is_empty() {
            0
        } else {
            self.store.insert_batch(remainder).await?
        };

        Ok(updated + inserted)
    }
}
