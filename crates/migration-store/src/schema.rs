//! Target-store schema (spec §3). Column lists are restricted to the
//! fields the pipeline actually reads or writes; anything beyond that
//! is out of scope (Non-goal: full target schema fidelity).

diesel::table! {
    countries (id) {
        id -> Int8,
        code -> Text,
    }
}

diesel::table! {
    platforms (id) {
        id -> Int8,
        name -> Text,
    }
}

diesel::table! {
    platform_countries (id) {
        id -> Int8,
        platform_id -> Int8,
        country_id -> Int8,
    }
}

diesel::table! {
    base_categories (id) {
        id -> Int8,
        name -> Text,
    }
}

diesel::table! {
    platform_categories (id) {
        platform_id -> Int8,
        name -> Text,
        base_category_id -> Int8,
    }
}

diesel::table! {
    providers (id) {
        id -> Int8,
        name -> Text,
        external_id -> Text,
        verified -> Bool,
        platform_country_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    // Product.id == SourceProduct.sourceId (invariant I1); there is no
    // separate surrogate key.
    products (id) {
        id -> Int8,
        external_id -> Text,
        name -> Text,
        sale_price -> Float8,
        suggested_price -> Float8,
        stock -> Int4,
        variations_amount -> Int4,
        score -> Float8,
        sold_units_last_7_days -> Int8,
        sold_units_last_30_days -> Int8,
        total_sold_units -> Int8,
        billing_last_7_days -> Float8,
        billing_last_30_days -> Float8,
        total_billing -> Float8,
        status -> Text,
        platform_country_id -> Int8,
        provider_id -> Int8,
        base_category_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    histories (id) {
        id -> Int8,
        date -> Text,
        product_id -> Int8,
        stock -> Int4,
        sale_price -> Float8,
        sold_units -> Int4,
        sold_units_last_7_days -> Int8,
        sold_units_last_30_days -> Int8,
        total_sold_units -> Int8,
        billing_last_7_days -> Float8,
        billing_last_30_days -> Float8,
        total_billing -> Float8,
        suggested_price -> Float8,
    }
}

diesel::table! {
    multimedia (id) {
        id -> Int8,
        product_id -> Int8,
        url -> Text,
        original_url -> Text,
        media_type -> Text,
        extracted -> Bool,
    }
}

diesel::joinable!(platform_countries -> countries (country_id));
diesel::joinable!(platform_countries -> platforms (platform_id));
diesel::joinable!(products -> platform_countries (platform_country_id));
diesel::joinable!(products -> base_categories (base_category_id));
diesel::joinable!(products -> providers (provider_id));
diesel::joinable!(providers -> platform_countries (platform_country_id));
diesel::joinable!(histories -> products (product_id));
diesel::joinable!(multimedia -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    countries,
    platforms,
    platform_countries,
    base_categories,
    platform_categories,
    providers,
    products,
    histories,
    multimedia,
);
