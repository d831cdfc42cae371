//! Repository-level tests of ingestion, catalog queries and the basket/order
//! engine against an in-memory database. Concurrency tests use a database
//! file so that the pool holds more than one connection.

use std::path::PathBuf;

use market_core::price_list::PriceList;
use market_core::{
    ContactInput, CoreError, ListingFilter, NewLine, NewUser, NotificationEvent, OrderState,
    UserKind, MAX_ITEM_QUANTITY, MAX_PRICE,
};
use market_db::{Database, DbConfig, DbError};

const SVYAZNOY: &str = r#"
shop: Svyaznoy
categories:
  - id: 224
    name: Смартфоны
  - id: 15
    name: Аксессуары
goods:
  - id: 4216292
    category: 224
    model: apple/iphone/xs-max
    name: Смартфон Apple iPhone XS Max 512GB (золотистый)
    price: 110000
    price_rrc: 116990
    quantity: 14
    parameters:
      "Диагональ (дюйм)": 6.5
      "Цвет": золотистый
  - id: 4216313
    category: 224
    model: apple/iphone/xr
    name: Смартфон Apple iPhone XR 256GB (красный)
    price: 65000
    price_rrc: 69990
    quantity: 9
    parameters:
      "Диагональ (дюйм)": 6.1
      "Цвет": красный
"#;

const EUROSET: &str = r#"
shop: Euroset
categories:
  - id: 15
    name: Аксессуары
goods:
  - id: 1
    category: 15
    model: apple/airpods
    name: Наушники Apple AirPods 2
    price: 12000
    price_rrc: 13990
    quantity: 20
    parameters: {}
"#;

// =============================================================================
// Fixtures
// =============================================================================

async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A database file in the temp directory, removed on drop.
struct FileDb {
    db: Database,
    path: PathBuf,
}

impl FileDb {
    async fn open(connections: u32) -> Self {
        let path = std::env::temp_dir().join(format!("market-test-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(connections))
            .await
            .unwrap();
        FileDb { db, path }
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

async fn user(db: &Database, email: &str, kind: UserKind) -> i64 {
    db.users()
        .create(&NewUser {
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            kind,
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

async fn buyer_with_contact(db: &Database, email: &str) -> (i64, i64) {
    let id = user(db, email, UserKind::Buyer).await;
    let contact = db
        .contacts()
        .create(
            id,
            &ContactInput {
                city: "Moscow".to_string(),
                street: "Gogolya".to_string(),
                phone: "+79424238142".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    (id, contact.id)
}

async fn ingest(db: &Database, supplier: i64, document: &str) -> i64 {
    let list = PriceList::parse(document.as_bytes()).unwrap();
    db.ingest()
        .replace_catalog(supplier, Some("https://example.com/shop.yaml"), &list)
        .await
        .unwrap()
        .shop_id
}

/// Listing ids of the catalog in id order.
async fn listing_ids(db: &Database) -> Vec<i64> {
    db.catalog()
        .list_listings(ListingFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|l| l.id)
        .collect()
}

// =============================================================================
// Ingestion & Catalog
// =============================================================================

#[tokio::test]
async fn test_ingest_scenario_svyaznoy() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    let shop_id = ingest(&db, supplier, SVYAZNOY).await;

    let listings = db.catalog().list_listings(ListingFilter::default()).await.unwrap();
    assert_eq!(listings.len(), 2);
    assert!(listings.iter().all(|l| l.shop == "Svyaznoy" && l.shop_id == shop_id));
    assert_eq!(listings[0].product.category, "Смартфоны");
    assert_eq!(listings[0].product_parameters.len(), 2);
    assert_eq!(listings[0].product_parameters[0].value, "6.5");

    let narrowed = db
        .catalog()
        .list_listings(ListingFilter {
            shop_id: Some(shop_id),
            category_id: Some(224),
        })
        .await
        .unwrap();
    assert_eq!(narrowed.len(), 2);

    let empty = db
        .catalog()
        .list_listings(ListingFilter {
            shop_id: None,
            category_id: Some(15),
        })
        .await
        .unwrap();
    assert!(empty.is_empty());

    assert_eq!(db.catalog().list_categories().await.unwrap().len(), 2);
    assert_eq!(db.catalog().list_shops().await.unwrap()[0].name, "Svyaznoy");
}

#[tokio::test]
async fn test_ingest_twice_is_idempotent() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;

    let first = ingest(&db, supplier, SVYAZNOY).await;
    let second = ingest(&db, supplier, SVYAZNOY).await;

    assert_eq!(first, second);
    assert_eq!(db.catalog().count_listings(first).await.unwrap(), 2);
    assert_eq!(db.catalog().list_categories().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ingest_leaves_no_stale_listings() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    let other = user(&db, "other@example.com", UserKind::Shop).await;

    let shop_id = ingest(&db, supplier, SVYAZNOY).await;
    let other_shop = ingest(&db, other, EUROSET).await;

    let smaller = SVYAZNOY
        .split("  - id: 4216313")
        .next()
        .unwrap()
        .to_string();
    ingest(&db, supplier, &smaller).await;

    let listings = db.catalog().list_listings(ListingFilter::default()).await.unwrap();
    let own: Vec<_> = listings.iter().filter(|l| l.shop_id == shop_id).collect();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].external_id, 4216292);
    assert_eq!(db.catalog().count_listings(other_shop).await.unwrap(), 1);
}

#[tokio::test]
async fn test_ingest_rejects_foreign_shop_name() {
    let db = setup().await;
    let owner = user(&db, "owner@example.com", UserKind::Shop).await;
    let intruder = user(&db, "intruder@example.com", UserKind::Shop).await;
    let shop_id = ingest(&db, owner, SVYAZNOY).await;

    let list = PriceList::parse(SVYAZNOY.as_bytes()).unwrap();
    let err = db.ingest().replace_catalog(intruder, None, &list).await.unwrap_err();

    assert!(matches!(err, DbError::Domain(CoreError::Uniqueness { .. })));
    assert_eq!(db.catalog().count_listings(shop_id).await.unwrap(), 2);

    let shop = db.shops().find_by_name("Svyaznoy").await.unwrap().unwrap();
    assert_eq!(shop.id, shop_id);
    assert_eq!(shop.user_id, owner);
}

#[tokio::test]
async fn test_rejected_document_leaves_catalog_untouched() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    let shop_id = ingest(&db, supplier, SVYAZNOY).await;

    let typo = "shop: Svyaznoy\ngood:\n  - id: 1\n";
    let err = PriceList::parse(typo.as_bytes()).unwrap_err();
    assert_eq!(err.field(), "document");

    let overpriced = SVYAZNOY.replace("price: 65000", "price: 1000000000000000000");
    assert!(PriceList::parse(overpriced.as_bytes()).is_err());

    assert_eq!(db.catalog().count_listings(shop_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_highest_price_at_highest_quantity_totals() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    let document = SVYAZNOY.replace("price: 110000", &format!("price: {}", MAX_PRICE.units()));
    ingest(&db, supplier, &document).await;
    let (buyer, _) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(buyer, &[NewLine { listing_id: ids[0], quantity: MAX_ITEM_QUANTITY }])
        .await
        .unwrap();

    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    assert_eq!(basket.sum, MAX_PRICE * MAX_ITEM_QUANTITY);
    assert_eq!(basket.total_sum.units(), MAX_PRICE.units() * MAX_ITEM_QUANTITY + 300);
}

#[tokio::test]
async fn test_inactive_shops_are_hidden() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;

    assert_eq!(db.shops().set_state(supplier, false).await.unwrap(), 1);
    assert!(!db.shops().shops_of(supplier).await.unwrap()[0].active);
    assert!(listing_ids(&db).await.is_empty());
    assert!(db.catalog().list_shops().await.unwrap().is_empty());

    db.shops().set_state(supplier, true).await.unwrap();
    assert_eq!(listing_ids(&db).await.len(), 2);
}

// =============================================================================
// Basket
// =============================================================================

#[tokio::test]
async fn test_add_items_requires_contact() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let buyer = user(&db, "buyer@example.com", UserKind::Buyer).await;
    let ids = listing_ids(&db).await;

    let err = db
        .orders()
        .add_items(buyer, &[NewLine { listing_id: ids[0], quantity: 1 }])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::Precondition(_))));
    assert!(db.orders().get_basket(buyer).await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_items_collects_rejections() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, _) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    let outcome = db
        .orders()
        .add_items(
            buyer,
            &[
                NewLine { listing_id: ids[0], quantity: 2 },
                NewLine { listing_id: 999_999, quantity: 1 },
                NewLine { listing_id: ids[0], quantity: 5 },
                NewLine { listing_id: ids[1], quantity: 2 },
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.created, 2);
    let rejected: Vec<usize> = outcome.rejected.iter().map(|r| r.index).collect();
    assert_eq!(rejected, vec![1, 2]);

    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    assert_eq!(basket.ordered_items.len(), 2);
    assert_eq!(basket.ordered_items[0].quantity, 2);
}

#[tokio::test]
async fn test_basket_totals_one_shop() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, _) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(
            buyer,
            &[
                NewLine { listing_id: ids[0], quantity: 2 },
                NewLine { listing_id: ids[1], quantity: 2 },
            ],
        )
        .await
        .unwrap();

    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    assert_eq!(basket.state, OrderState::Basket);
    assert_eq!(basket.sum.units(), 2 * 110_000 + 2 * 65_000);
    assert_eq!(basket.delivery.units(), 300);
    assert_eq!(basket.total_sum, basket.sum + basket.delivery);
}

#[tokio::test]
async fn test_basket_totals_two_shops() {
    let db = setup().await;
    let first = user(&db, "first@example.com", UserKind::Shop).await;
    let second = user(&db, "second@example.com", UserKind::Shop).await;
    ingest(&db, first, SVYAZNOY).await;
    ingest(&db, second, EUROSET).await;
    let (buyer, _) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(
            buyer,
            &[
                NewLine { listing_id: ids[0], quantity: 2 },
                NewLine { listing_id: ids[2], quantity: 2 },
            ],
        )
        .await
        .unwrap();

    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    assert_eq!(basket.sum.units(), 2 * 110_000 + 2 * 12_000);
    assert_eq!(basket.delivery.units(), 600);
}

#[tokio::test]
async fn test_remove_and_update_items() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, _) = buyer_with_contact(&db, "buyer@example.com").await;
    let (stranger, _) = buyer_with_contact(&db, "stranger@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(
            buyer,
            &[
                NewLine { listing_id: ids[0], quantity: 1 },
                NewLine { listing_id: ids[1], quantity: 1 },
            ],
        )
        .await
        .unwrap();
    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    let line_ids: Vec<i64> = basket.ordered_items.iter().map(|l| l.id).collect();

    // Another buyer cannot touch these lines.
    let updates = [market_core::LineUpdate { id: line_ids[0], quantity: 4 }];
    assert_eq!(db.orders().update_items(stranger, &updates).await.unwrap(), 0);
    assert_eq!(db.orders().remove_items(stranger, &line_ids).await.unwrap(), 0);

    assert_eq!(db.orders().update_items(buyer, &updates).await.unwrap(), 1);

    // "1,abc" style input: only the digit id reaches the repository.
    let parsed = market_core::validation::parse_line_ids(Some(&format!("{},abc", line_ids[1]))).unwrap();
    assert_eq!(db.orders().remove_items(buyer, &parsed).await.unwrap(), 1);

    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    assert_eq!(basket.ordered_items.len(), 1);
    assert_eq!(basket.ordered_items[0].quantity, 4);
    assert_eq!(basket.sum.units(), 4 * 110_000);
}

#[tokio::test]
async fn test_single_basket_per_buyer() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, _) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    let orders = db.orders();
    let lines_a = [NewLine { listing_id: ids[0], quantity: 1 }];
    let lines_b = [NewLine { listing_id: ids[1], quantity: 1 }];
    let (a, b) = tokio::join!(
        orders.add_items(buyer, &lines_a),
        orders.add_items(buyer, &lines_b),
    );
    a.unwrap();
    b.unwrap();

    let baskets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?1 AND state = 'basket'")
        .bind(buyer)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(baskets, 1);
    assert_eq!(db.orders().get_basket(buyer).await.unwrap().unwrap().ordered_items.len(), 2);
}

// =============================================================================
// Placing & Reading Orders
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_place_order_exactly_once() {
    let file = FileDb::open(4).await;
    let db = file.db.clone();
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, contact) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(buyer, &[NewLine { listing_id: ids[0], quantity: 1 }])
        .await
        .unwrap();
    let basket_id = db.orders().get_basket(buyer).await.unwrap().unwrap().id;

    // Each attempt runs on its own task and its own pooled connection.
    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let orders = db.orders();
            tokio::spawn(async move { orders.place_order(buyer, basket_id, contact).await })
        })
        .collect();
    let mut placed = 0;
    for attempt in attempts {
        if attempt.await.unwrap().is_ok() {
            placed += 1;
        }
    }
    assert_eq!(placed, 1);

    let events = db.outbox().list_by_kind("order_placed").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].event().unwrap(),
        NotificationEvent::OrderPlaced {
            order_id: basket_id,
            user_id: buyer,
            email: "buyer@example.com".to_string(),
        }
    );

    assert!(db.orders().get_basket(buyer).await.unwrap().is_none());
    let detail = db.orders().get_order(buyer, basket_id).await.unwrap();
    assert_eq!(detail.state, OrderState::Placed);
    assert_eq!(detail.total_sum.units(), 110_000 + 300);
    assert_eq!(detail.phone.as_deref(), Some("+79424238142"));
    assert_eq!(detail.contact.unwrap().city, "Moscow");
}

#[tokio::test]
async fn test_place_foreign_order_fails() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (owner, owner_contact) = buyer_with_contact(&db, "owner@example.com").await;
    let (thief, thief_contact) = buyer_with_contact(&db, "thief@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(owner, &[NewLine { listing_id: ids[0], quantity: 1 }])
        .await
        .unwrap();
    let basket_id = db.orders().get_basket(owner).await.unwrap().unwrap().id;

    for (user_id, contact) in [(thief, thief_contact), (thief, owner_contact), (owner, thief_contact)] {
        let err = db.orders().place_order(user_id, basket_id, contact).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Argument(_))));
    }

    let basket = db.orders().get_basket(owner).await.unwrap().unwrap();
    assert_eq!(basket.state, OrderState::Basket);
    assert!(db.outbox().list_by_kind("order_placed").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_place_empty_basket_fails() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, contact) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(buyer, &[NewLine { listing_id: ids[0], quantity: 1 }])
        .await
        .unwrap();
    let basket = db.orders().get_basket(buyer).await.unwrap().unwrap();
    db.orders().remove_items(buyer, &[basket.ordered_items[0].id]).await.unwrap();

    assert!(db.orders().place_order(buyer, basket.id, contact).await.is_err());
}

#[tokio::test]
async fn test_order_lists_for_buyer_and_suppliers() {
    let db = setup().await;
    let first = user(&db, "first@example.com", UserKind::Shop).await;
    let second = user(&db, "second@example.com", UserKind::Shop).await;
    let idle = user(&db, "idle@example.com", UserKind::Shop).await;
    ingest(&db, first, SVYAZNOY).await;
    ingest(&db, second, EUROSET).await;
    let (buyer, contact) = buyer_with_contact(&db, "buyer@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(
            buyer,
            &[
                NewLine { listing_id: ids[1], quantity: 2 },
                NewLine { listing_id: ids[2], quantity: 1 },
            ],
        )
        .await
        .unwrap();
    let order_id = db.orders().get_basket(buyer).await.unwrap().unwrap().id;
    db.orders().place_order(buyer, order_id, contact).await.unwrap();

    let mine = db.orders().list_orders(buyer).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].total_sum.units(), 2 * 65_000 + 12_000 + 600);

    let first_view = db.orders().supplier_orders(first).await.unwrap();
    assert_eq!(first_view.len(), 1);
    assert_eq!(first_view[0].total_sum.units(), 2 * 65_000);

    let detail = db.orders().supplier_order(second, order_id).await.unwrap();
    assert_eq!(detail.ordered_items.len(), 1);
    assert_eq!(detail.ordered_items[0].product_info.shop, "Euroset");
    assert_eq!(detail.total_sum.units(), 12_000);
    assert_eq!(detail.user.email, "buyer@example.com");

    assert!(db.orders().supplier_orders(idle).await.unwrap().is_empty());
    let err = db.orders().supplier_order(idle, order_id).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));

    let (stranger, _) = buyer_with_contact(&db, "stranger@example.com").await;
    assert!(db.orders().get_order(stranger, order_id).await.is_err());
    assert!(db.orders().list_orders(stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_placed_order_survives_catalog_replacement() {
    let db = setup().await;
    let supplier = user(&db, "partner@example.com", UserKind::Shop).await;
    ingest(&db, supplier, SVYAZNOY).await;
    let (buyer, contact) = buyer_with_contact(&db, "buyer@example.com").await;
    let (shopper, _) = buyer_with_contact(&db, "shopper@example.com").await;
    let ids = listing_ids(&db).await;

    db.orders()
        .add_items(
            buyer,
            &[
                NewLine { listing_id: ids[0], quantity: 2 },
                NewLine { listing_id: ids[1], quantity: 1 },
            ],
        )
        .await
        .unwrap();
    let order_id = db.orders().get_basket(buyer).await.unwrap().unwrap().id;
    db.orders().place_order(buyer, order_id, contact).await.unwrap();

    db.orders()
        .add_items(shopper, &[NewLine { listing_id: ids[0], quantity: 1 }])
        .await
        .unwrap();

    let cheaper = SVYAZNOY.replace("price: 110000", "price: 99000");
    ingest(&db, supplier, &cheaper).await;

    let expected = 2 * 110_000 + 65_000 + 300;
    let detail = db.orders().get_order(buyer, order_id).await.unwrap();
    assert_eq!(detail.total_sum.units(), expected);
    assert_eq!(detail.ordered_items.len(), 2);
    assert_eq!(detail.ordered_items[0].product_info.price.units(), 110_000);
    assert_eq!(detail.ordered_items[0].product_info.product_parameters.len(), 2);
    assert_eq!(db.orders().list_orders(buyer).await.unwrap()[0].total_sum.units(), expected);

    let supplier_view = db.orders().supplier_order(supplier, order_id).await.unwrap();
    assert_eq!(supplier_view.total_sum.units(), 2 * 110_000 + 65_000);
    assert_eq!(db.orders().supplier_orders(supplier).await.unwrap().len(), 1);

    // Basket lines pointed at the replaced listings and are gone.
    let basket = db.orders().get_basket(shopper).await.unwrap().unwrap();
    assert!(basket.ordered_items.is_empty());

    let listings = db.catalog().list_listings(ListingFilter::default()).await.unwrap();
    assert_eq!(listings[0].price.units(), 99_000);
}
