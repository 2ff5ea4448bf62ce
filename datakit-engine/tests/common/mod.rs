use std::sync::Arc;

use datakit_engine::SqliteBackend;
use datakit_schema::{SchemaResolver, StaticSource};
use sqlx::sqlite::SqlitePoolOptions;

pub struct Fixture {
    pub backend: Arc<SqliteBackend>,
    pub resolver: Arc<SchemaResolver>,
}

const DDL: &[&str] = &[
    "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER,
        customer TEXT NOT NULL,
        status TEXT NOT NULL,
        total REAL NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE order_details (
        id INTEGER PRIMARY KEY,
        order_id INTEGER NOT NULL,
        product TEXT NOT NULL
    )",
    "CREATE TABLE shipments (
        id INTEGER PRIMARY KEY,
        order_id INTEGER NOT NULL,
        carrier TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE roles (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE category_links (
        role_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        note TEXT NOT NULL
    )",
    "CREATE TABLE permissions (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE permission_roles (
        role_id INTEGER NOT NULL,
        permission_id INTEGER NOT NULL,
        UNIQUE (role_id, permission_id)
    )",
];

const SEED: &[&str] = &[
    "INSERT INTO customers (id, name) VALUES (1, 'Acme Corp'), (2, 'Beta LLC')",
    "INSERT INTO orders (id, customer_id, customer, status, total, deleted_at) VALUES
        (1, 1, 'Acme Corp', 'open', 100.0, NULL),
        (2, 2, 'Beta LLC', 'open', 250.5, NULL),
        (3, 1, 'Acme Corp', 'closed', 80.0, NULL),
        (4, NULL, 'Gamma Inc', 'open', 10.0, NULL),
        (5, NULL, 'Delta Co', 'pending', 999.0, NULL),
        (6, NULL, 'Zeta Ltd', 'open', 50.0, '2026-01-01T00:00:00Z')",
    "INSERT INTO order_details (id, order_id, product) VALUES
        (1, 1, 'widget'), (2, 1, 'gadget'), (3, 5, 'gizmo'),
        (4, 5, 'doohickey'), (5, 2, 'widget')",
    "INSERT INTO shipments (id, order_id, carrier, deleted_at) VALUES
        (1, 2, 'UPS', NULL), (2, 2, 'DHL', NULL), (3, 1, 'FedEx', NULL)",
    "INSERT INTO roles (id, name) VALUES (1, 'admin'), (3, 'editor')",
    "INSERT INTO permissions (id, name) VALUES (7, 'read'), (8, 'write'), (9, 'delete')",
    "INSERT INTO permission_roles (role_id, permission_id) VALUES (1, 7)",
];

fn schema_source() -> StaticSource {
    StaticSource::new()
        .with_document(
            "orders",
            serde_json::json!({
                "model": "orders",
                "table": "orders",
                "primary_key": "id",
                "fields": {
                    "id": { "type": "int", "label": "Id", "sortable": true },
                    "customer_id": {
                        "type": "int", "label": "Customer Id",
                        "filterable": true, "filter_type": "between"
                    },
                    "customer": {
                        "type": "text", "label": "Customer",
                        "sortable": true, "filterable": true, "searchable": true,
                        "listable": true, "filter_type": "like"
                    },
                    "status": {
                        "type": "text", "label": "Status",
                        "filterable": true, "searchable": true, "listable": true
                    },
                    "total": {
                        "type": "float", "label": "Total",
                        "sortable": true, "filterable": true, "listable": true,
                        "filter_type": "greater_than"
                    }
                },
                "soft_delete": true,
                "details": [
                    { "model": "order_details", "foreign_key": "order_id",
                      "list_fields": ["product"] },
                    { "model": "shipments", "foreign_key": "order_id",
                      "list_fields": ["carrier"] }
                ]
            }),
        )
        .with_document(
            "order_details",
            serde_json::json!({
                "model": "order_details",
                "table": "order_details",
                "primary_key": "id",
                "fields": {
                    "id": { "type": "int", "label": "Id", "sortable": true },
                    "order_id": { "type": "int", "label": "Order" },
                    "product": {
                        "type": "text", "label": "Product",
                        "sortable": true, "filterable": true, "searchable": true,
                        "listable": true
                    }
                }
            }),
        )
        .with_document(
            "shipments",
            serde_json::json!({
                "model": "shipments",
                "table": "shipments",
                "primary_key": "id",
                "fields": {
                    "id": { "type": "int", "label": "Id", "sortable": true },
                    "order_id": { "type": "int", "label": "Order" },
                    "carrier": { "type": "text", "label": "Carrier", "listable": true }
                },
                "soft_delete": true
            }),
        )
        .with_document(
            "roles",
            serde_json::json!({
                "model": "roles",
                "table": "roles",
                "primary_key": "id",
                "fields": {
                    "id": { "type": "int", "label": "Id", "sortable": true },
                    "name": { "type": "text", "label": "Name", "listable": true }
                },
                "relationships": [
                    { "name": "permissions", "type": "many_to_many",
                      "pivot_table": "permission_roles",
                      "foreign_key": "role_id", "related_key": "permission_id" },
                    { "name": "categories", "type": "many_to_many",
                      "pivot_table": "category_links",
                      "foreign_key": "role_id", "related_key": "category_id" }
                ]
            }),
        )
        .with_document(
            "permissions",
            serde_json::json!({
                "model": "permissions",
                "table": "permissions",
                "primary_key": "id",
                "fields": {
                    "id": { "type": "int", "label": "Id", "sortable": true },
                    "name": {
                        "type": "text", "label": "Name",
                        "sortable": true, "filterable": true, "searchable": true,
                        "listable": true
                    }
                }
            }),
        )
        .with_document(
            "customers",
            serde_json::json!({
                "model": "customers",
                "table": "customers",
                "primary_key": "id",
                "fields": {
                    "id": { "type": "int", "label": "Id", "sortable": true },
                    "name": { "type": "text", "label": "Name", "listable": true }
                },
                "relationships": [
                    { "name": "order_details", "type": "belongs_to_many_through",
                      "through": "orders",
                      "foreign_key": "customer_id", "through_key": "order_id" }
                ]
            }),
        )
        // Cascade failure scenarios: a child schema whose table does not
        // exist, and a details entry with no schema at all.
        .with_document(
            "ghost_items",
            serde_json::json!({
                "model": "ghost_items",
                "table": "ghost_items",
                "primary_key": "id",
                "fields": { "id": { "type": "int", "label": "Id" } }
            }),
        )
        .with_document(
            "orders_bad_child",
            serde_json::json!({
                "model": "orders_bad_child",
                "table": "orders",
                "primary_key": "id",
                "fields": { "id": { "type": "int", "label": "Id" } },
                "details": [
                    { "model": "order_details", "foreign_key": "order_id" },
                    { "model": "ghost_items", "foreign_key": "order_id" }
                ]
            }),
        )
        .with_document(
            "orders_missing_child",
            serde_json::json!({
                "model": "orders_missing_child",
                "table": "orders",
                "primary_key": "id",
                "fields": { "id": { "type": "int", "label": "Id" } },
                "details": [
                    { "model": "no_such_entity", "foreign_key": "order_id" }
                ]
            }),
        )
}

pub async fn setup() -> Fixture {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");

    for statement in DDL.iter().chain(SEED) {
        sqlx::query(statement).execute(&pool).await.expect("fixture sql");
    }

    Fixture {
        backend: Arc::new(SqliteBackend::new(pool)),
        resolver: Arc::new(SchemaResolver::new(Arc::new(schema_source()))),
    }
}

/// Row ids from a result set, for order-sensitive assertions.
pub fn ids(rows: &[datakit_engine::Record]) -> Vec<i64> {
    rows.iter().map(|row| row["id"].as_i64().unwrap()).collect()
}
