mod common;

use common::{ids, setup};
use datakit_engine::{Criteria, ListingEngine};
use datakit_schema::SortDirection;

#[tokio::test]
async fn test_plain_listing_excludes_soft_deleted() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine.list(&schema, &Criteria::new()).await.unwrap();
    assert_eq!(result.count, 5);
    assert_eq!(result.count_filtered, 5);
    assert_eq!(ids(&result.rows), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_include_deleted_widens_counts() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().include_deleted(true))
        .await
        .unwrap();
    assert_eq!(result.count, 6);
    assert_eq!(result.count_filtered, 6);
}

#[tokio::test]
async fn test_equals_filter_keeps_baseline_count() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().filter("status", "open"))
        .await
        .unwrap();
    // Baseline ignores the filter; the soft-deleted open order stays out.
    assert_eq!(result.count, 5);
    assert_eq!(result.count_filtered, 3);
    assert_eq!(ids(&result.rows), vec![1, 2, 4]);
}

#[tokio::test]
async fn test_greater_than_filter_uses_schema_operator() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().filter("total", "90"))
        .await
        .unwrap();
    assert_eq!(result.count_filtered, 3);
    assert_eq!(ids(&result.rows), vec![1, 2, 5]);
}

#[tokio::test]
async fn test_like_filter() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().filter("customer", "acme"))
        .await
        .unwrap();
    assert_eq!(result.count_filtered, 2);
    assert_eq!(ids(&result.rows), vec![1, 3]);
}

#[tokio::test]
async fn test_between_filter_binds_both_bounds() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().filter("customer_id", "1,2"))
        .await
        .unwrap();
    assert_eq!(result.count_filtered, 3);
    assert_eq!(ids(&result.rows), vec![1, 2, 3]);

    // A between value without a comma is dropped like any other invalid
    // criterion, leaving the listing unfiltered.
    let dropped = engine
        .list(&schema, &Criteria::new().filter("customer_id", "1"))
        .await
        .unwrap();
    assert_eq!(dropped.count_filtered, 5);
}

#[tokio::test]
async fn test_like_wildcards_in_values_match_literally() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    // "cme%" would match 'Acme Corp' if % acted as a wildcard.
    let searched = engine
        .list(&schema, &Criteria::new().search("cme%"))
        .await
        .unwrap();
    assert_eq!(searched.count_filtered, 0);

    let filtered = engine
        .list(&schema, &Criteria::new().filter("customer", "%"))
        .await
        .unwrap();
    assert_eq!(filtered.count_filtered, 0);
}

#[tokio::test]
async fn test_search_is_case_insensitive_across_fields() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().search("ACME"))
        .await
        .unwrap();
    assert_eq!(result.count, 5);
    assert_eq!(result.count_filtered, 2);

    // Search spans every searchable field with OR semantics.
    let result = engine
        .list(&schema, &Criteria::new().search("pend"))
        .await
        .unwrap();
    assert_eq!(ids(&result.rows), vec![5]);
}

#[tokio::test]
async fn test_filters_and_search_are_conjunctive() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(
            &schema,
            &Criteria::new().filter("status", "open").search("acme"),
        )
        .await
        .unwrap();
    assert_eq!(result.count_filtered, 1);
    assert_eq!(ids(&result.rows), vec![1]);
}

#[tokio::test]
async fn test_pagination() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let criteria = Criteria::new().per_page(2).page(2);
    let result = engine.list(&schema, &criteria).await.unwrap();
    assert_eq!(result.page, 2);
    assert_eq!(result.per_page, 2);
    assert_eq!(result.total_pages, 3);
    assert!(result.rows.len() <= 2);
    assert_eq!(ids(&result.rows), vec![3, 4]);
}

#[tokio::test]
async fn test_requested_sort_direction() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine
        .list(&schema, &Criteria::new().sort("total", SortDirection::Desc))
        .await
        .unwrap();
    assert_eq!(ids(&result.rows), vec![5, 2, 1, 3, 4]);
}

#[tokio::test]
async fn test_unknown_criteria_fields_are_ignored() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let baseline = engine.list(&schema, &Criteria::new()).await.unwrap();
    let injected = engine
        .list(
            &schema,
            &Criteria::new()
                .filter("no_such_field", "x")
                .filter("status; DROP TABLE orders", "y")
                .sort("no_such_field", SortDirection::Desc),
        )
        .await
        .unwrap();

    assert_eq!(baseline.count, injected.count);
    assert_eq!(baseline.count_filtered, injected.count_filtered);
    assert_eq!(ids(&baseline.rows), ids(&injected.rows));
}

#[tokio::test]
async fn test_counts_invariants() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let unfiltered = engine.list(&schema, &Criteria::new()).await.unwrap();
    assert_eq!(unfiltered.count, unfiltered.count_filtered);

    let filtered = engine
        .list(&schema, &Criteria::new().search("widget-that-matches-nothing"))
        .await
        .unwrap();
    assert!(filtered.count_filtered <= filtered.count);
    assert_eq!(filtered.count_filtered, 0);
    assert!(filtered.rows.is_empty());
}

#[tokio::test]
async fn test_rows_carry_listable_columns_only() {
    let fx = setup().await;
    let schema = fx.resolver.resolve("orders", None).unwrap();
    let engine = ListingEngine::new(fx.backend.clone());

    let result = engine.list(&schema, &Criteria::new()).await.unwrap();
    let row = &result.rows[0];
    assert!(row.contains_key("id"));
    assert!(row.contains_key("customer"));
    assert!(!row.contains_key("deleted_at"));
}
