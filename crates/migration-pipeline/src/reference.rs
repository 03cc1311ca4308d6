use std::collections::HashMap;
use std::sync::Arc;

use migration_types::{BaseCategory, MigrationError, MigrationResult};
use tokio::sync::RwLock;

use migration_store::ReferenceStore;

/// The closed platform enum (spec §4.4). Anything else normalizes to
/// `dropi` with a warning.
const KNOWN_PLATFORMS: &[&str] = &[
    "dropi",
    "aliclick",
    "droplatam",
    "seventy block",
    "wimpy",
    "easydrop",
    "mastershop",
    "dropea",
];

/// Hard-coded id representing "other" (spec §4.4 step 6). Must exist in
/// the target `base_categories` table; out of scope for this system to
/// provision it.
const FALLBACK_BASE_CATEGORY_ID: i64 = 1;

/// Hand-coded category synonym table (spec §4.4 step 5).
const CATEGORY_SYNONYMS: &[(&str, &str)] = &[("bienestar y salud", "salud")];

/// Normalizes a raw legacy platform name into one of the closed enum's
/// members (spec §4.4).
pub fn normalize_platform_name(raw: &str) -> &'static str {
    let lower = raw.trim().to_lowercase();
    KNOWN_PLATFORMS
        .iter()
        .find(|&&p| p == lower)
        .copied()
        .unwrap_or_else(|| {
            tracing::warn!(platform = %raw, "unknown platform name, defaulting to dropi");
            "dropi"
        })
}

/// Normalizes a raw legacy country code (spec §4.4: `CO1 -> CO`).
pub fn normalize_country_code(raw: &str) -> String {
    match raw.trim().to_uppercase().as_str() {
        "CO1" => "CO".to_string(),
        other => other.to_string(),
    }
}

struct Caches {
    /// code -> target Country id
    countries: HashMap<String, i64>,
    /// normalized platform name -> the real `platforms.id` (spec §4.4: this
    /// is a genuine lookup against the target store's `platforms` table,
    /// not an assumption about how `platform_id` values are assigned)
    platform_ids: HashMap<String, i64>,
    /// (platform id, country id) -> PlatformCountry id
    platform_countries: HashMap<(i64, i64), i64>,
    /// name -> BaseCategory id, plus the full list for fuzzy matching
    base_category_ids: HashMap<String, i64>,
    base_categories: Vec<BaseCategory>,
    loaded: bool,
}

impl Caches {
    fn empty() -> Self {
        Self {
            countries: HashMap::new(),
            platform_ids: HashMap::new(),
            platform_countries: HashMap::new(),
            base_category_ids: HashMap::new(),
            base_categories: Vec::new(),
            loaded: false,
        }
    }
}

/// The Reference Resolver (spec §4.4): process-lifetime, read-through
/// caches over the read-only target reference tables, shared across
/// every record a worker processes.
pub struct ReferenceResolver<S: ReferenceStore + ?Sized> {
    store: Arc<S>,
    caches: RwLock<Caches>,
}

impl<S: ReferenceStore + ?Sized> ReferenceResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            caches: RwLock::new(Caches::empty()),
        }
    }

    async fn ensure_loaded(&self) -> MigrationResult<()> {
        {
            let caches = self.caches.read().await;
            if caches.loaded {
                return Ok(());
            }
        }
        let countries = self.store.all_countries().await?;
        let platforms = self.store.all_platforms().await?;
        let platform_countries = self.store.all_platform_countries().await?;
        let base_categories = self.store.all_base_categories().await?;

        let mut caches = self.caches.write().await;
        if caches.loaded {
            return Ok(());
        }
        for country in &countries {
            caches.countries.insert(country.code.clone(), country.id);
        }
        // The real `platforms(id, name)` table (spec §3's `PlatformCountry`
        // is an opaque foreign id; this resolves it for real instead of
        // assuming `platform_id` equals a position in `KNOWN_PLATFORMS`).
        for platform in &platforms {
            caches
                .platform_ids
                .insert(normalize_platform_name(&platform.name).to_string(), platform.id);
        }
        for pc in &platform_countries {
            caches.platform_countries.insert((pc.platform_id, pc.country_id), pc.id);
        }
        for bc in &base_categories {
            caches.base_category_ids.insert(bc.name.clone(), bc.id);
        }
        caches.base_categories = base_categories;
        caches.loaded = true;
        Ok(())
    }

    /// spec §4.4 `resolvePlatformCountry`.
    pub async fn resolve_platform_country(&self, platform_name: &str, country_code: &str) -> MigrationResult<i64> {
        self.ensure_loaded().await?;
        let platform = normalize_platform_name(platform_name);
        let country_code = normalize_country_code(country_code);

        let caches = self.caches.read().await;
        let country_id = *caches
            .countries
            .get(&country_code)
            .ok_or_else(|| MigrationError::ReferenceMissing(format!("country code {country_code}")))?;
        let platform_id = *caches
            .platform_ids
            .get(platform)
            .ok_or_else(|| MigrationError::ReferenceMissing(format!("platform {platform}")))?;
        caches
            .platform_countries
            .get(&(platform_id, country_id))
            .copied()
            .ok_or_else(|| {
                MigrationError::ReferenceMissing(format!("platform-country ({platform}, {country_code})"))
            })
    }

    /// spec §4.4 `resolveBaseCategoryByName`: six-step fallback, never
    /// fails — the final step always resolves to the fallback id.
    pub async fn resolve_base_category_by_name(&self, name: &str, platform_name: Option<&str>) -> MigrationResult<i64> {
        self.ensure_loaded().await?;
        let caches = self.caches.read().await;

        // 1. exact match
        if let Some(&id) = caches.base_category_ids.get(name) {
            return Ok(id);
        }
        // 2. case-normalized match
        let lower = name.to_lowercase();
        if let Some((_, &id)) = caches
            .base_category_ids
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
        {
            return Ok(id);
        }
        // 3. platform category lookup
        if let Some(platform_name) = platform_name {
            let platform = normalize_platform_name(platform_name);
            let platform_id = caches.platform_ids.get(platform).copied();
            if let Some(platform_id) = platform_id {
                if let Ok(categories) = self.store.platform_categories_for(platform_id).await {
                    if let Some(pc) = categories.iter().find(|pc| pc.name.eq_ignore_ascii_case(name)) {
                        return Ok(pc.base_category_id);
                    }
                }
            }
        }
        // 4. substring containment either way
        if let Some((_, &id)) = caches.base_category_ids.iter().find(|(k, _)| {
            let k_lower = k.to_lowercase();
            k_lower.contains(&lower) || lower.contains(k_lower.as_str())
        }) {
            return Ok(id);
        }
        // 5. hand-coded synonyms
        if let Some((_, synonym)) = CATEGORY_SYNONYMS.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            if let Some(&id) = caches.base_category_ids.get(*synonym) {
                return Ok(id);
            }
        }
        // 6. fixed fallback
        tracing::warn!(category = %name, "no base-category match, using fallback");
        Ok(FALLBACK_BASE_CATEGORY_ID)
    }

    /// spec §4.4 `resolveValidBaseCategoryId`.
    pub async fn resolve_valid_base_category_id(
        &self,
        existing_id: Option<i64>,
        name: Option<&str>,
        platform_name: Option<&str>,
    ) -> MigrationResult<i64> {
        self.ensure_loaded().await?;
        if let Some(existing_id) = existing_id {
            let caches = self.caches.read().await;
            if caches.base_categories.iter().any(|bc| bc.id == existing_id) {
                return Ok(existing_id);
            }
        }
        if let Some(name) = name {
            return self.resolve_base_category_by_name(name, platform_name).await;
        }
        Ok(FALLBACK_BASE_CATEGORY_ID)
    }
}
