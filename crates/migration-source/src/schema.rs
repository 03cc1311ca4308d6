//! Legacy-store table definitions, restricted to the columns this system
//! consumes (spec §1: "the schemas of the two data stores beyond the
//! fields consumed" are out of scope).

diesel::table! {
    use diesel::sql_types::*;

    legacy_products (id) {
        id -> BigInt,
        external_id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        platform_name -> Text,
        country_code -> Text,
        sale_price -> Double,
        suggested_price -> Double,
        stock -> Integer,
        variations_amount -> Integer,
        score -> Double,
        sold_units_last_7_days -> BigInt,
        sold_units_last_30_days -> BigInt,
        total_sold_units -> BigInt,
        billing_last_7_days -> Double,
        billing_last_30_days -> Double,
        total_billing -> Double,
        visible -> Bool,
        categories -> Jsonb,
        provider -> Nullable<Jsonb>,
        gallery -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    legacy_product_history (id) {
        id -> BigInt,
        external_product_id -> Text,
        platform_name -> Text,
        country_code -> Text,
        date -> Text,
        stock -> Integer,
        sale_price -> Double,
        sold_units -> Integer,
        sales_amount -> Double,
        stock_adjustment -> Bool,
        stock_adjustment_reason -> Nullable<Text>,
    }
}
