//! Retry, rollback and token refresh behavior against a misbehaving server.

use std::time::Duration;

use axum::http::StatusCode;
use pantry_core::ProductId;
use pantry_integration_tests::{
    FakeServer, SHOPPER_PHONE, address, product, signed_in, storefront,
};
use pantry_sync::{ApiError, Storefront, SyncError};
use url::Url;

async fn server() -> FakeServer {
    FakeServer::start()
        .await
        .with_products([product("p1", 100, 0), product("p2", 50, 0)])
}

#[tokio::test]
async fn test_reads_retry_transient_failures() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = storefront(&server, dir.path()).await;

    server.fail("list_products", StatusCode::SERVICE_UNAVAILABLE, 2);
    let products = shop.catalog().list().await.expect("third attempt succeeds");
    assert_eq!(products.len(), 2);
    assert_eq!(server.hits("list_products"), 3);
}

#[tokio::test]
async fn test_reads_give_up_after_attempts() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = storefront(&server, dir.path()).await;

    server.fail("list_products", StatusCode::BAD_GATEWAY, 10);
    let err = shop.catalog().list().await.expect_err("all attempts fail");
    assert!(matches!(err, ApiError::Server { status: 502, .. }));
    assert_eq!(server.hits("list_products"), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = storefront(&server, dir.path()).await;

    let err = shop
        .catalog()
        .product(&ProductId::new("missing"))
        .await
        .expect_err("unknown product");
    assert_eq!(err, ApiError::NotFound);
    assert_eq!(server.hits("get_product"), 1);
}

#[tokio::test]
async fn test_writes_are_never_retried() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = signed_in(&server, dir.path()).await;

    server.fail("upsert_cart", StatusCode::INTERNAL_SERVER_ERROR, 1);
    let pending = shop
        .cart()
        .add_product(&ProductId::new("p1"), 1)
        .await
        .expect("submitted");
    let err = pending.await.expect_err("server error");

    assert!(matches!(err, SyncError::Remote(ApiError::Server { status: 500, .. })));
    assert_eq!(server.hits("upsert_cart"), 1);
    assert!(shop.cart().items().is_empty());
    assert!(server.profile(SHOPPER_PHONE).expect("profile").cart.is_empty());
}

#[tokio::test]
async fn test_rollback_keeps_earlier_confirmed_changes() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = signed_in(&server, dir.path()).await;
    let p1 = ProductId::new("p1");
    let p2 = ProductId::new("p2");

    shop.cart()
        .add_product(&p1, 2)
        .await
        .expect("submitted")
        .await
        .expect("ok");

    server.fail("upsert_cart", StatusCode::INTERNAL_SERVER_ERROR, 1);
    let pending = shop.cart().add_product(&p2, 1).await.expect("submitted");
    assert!(pending.await.is_err());

    let cart = shop.cart().items();
    assert_eq!(cart.get(&p1).map(|i| i.quantity), Some(2));
    assert!(cart.get(&p2).is_none());
}

#[tokio::test]
async fn test_queued_failure_keeps_confirmed_address() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = signed_in(&server, dir.path()).await;

    server.set_latency(Duration::from_millis(50));
    server.pass("create_address", 1);
    server.fail("create_address", StatusCode::INTERNAL_SERVER_ERROR, 1);
    let (home_tmp, home) = shop.addresses().add(address("Home"), false).expect("submitted");
    let (office_tmp, office) = shop.addresses().add(address("Office"), false).expect("submitted");
    assert_eq!(shop.addresses().list().addresses().len(), 2);

    let saved = home.await.expect("home saved");
    assert!(office.await.is_err());

    let book = shop.addresses().list();
    assert_eq!(book, saved);
    assert_eq!(book.addresses().len(), 1);
    assert!(book.addresses().iter().all(|a| !a.id.is_temporary()));
    assert!(shop.addresses().get(&home_tmp).is_none());
    assert!(shop.addresses().get(&office_tmp).is_none());
    assert_eq!(server.profile(SHOPPER_PHONE).expect("profile").addresses, book);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = signed_in(&server, dir.path()).await;
    let before = shop.session().token();

    server.expire_access_tokens();
    let first = shop.wishlist().add(&ProductId::new("p1")).expect("submitted");
    let second = shop.wishlist().add(&ProductId::new("p2")).expect("submitted");
    first.await.expect("replayed after refresh");
    second.await.expect("uses refreshed token");

    assert_eq!(server.hits("refresh"), 1);
    assert_ne!(shop.session().token(), before);
    assert!(shop.is_signed_in());
    assert_eq!(shop.wishlist().items().len(), 2);
}

#[tokio::test]
async fn test_failed_refresh_signs_out() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = signed_in(&server, dir.path()).await;

    server.expire_access_tokens();
    server.revoke_refresh_tokens();
    let pending = shop.wishlist().add(&ProductId::new("p1")).expect("submitted");
    let err = pending.await.expect_err("refresh rejected");

    assert!(matches!(err, SyncError::Remote(ApiError::Unauthorized)));
    assert!(!shop.is_signed_in());
    assert!(shop.wishlist().items().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_rolls_back() {
    let server = server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = signed_in(&server, dir.path()).await;
    shop.teardown().await;

    // Reopen the same data directory against a port nothing listens on
    let closed = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = closed.local_addr().expect("addr");
    drop(closed);
    let mut config = server.config(dir.path());
    config.api_url = Url::parse(&format!("http://{addr}/api/")).expect("url");
    let offline = Storefront::from_config(&config).expect("storefront");
    offline.init().await;
    assert!(offline.is_signed_in());

    let p1 = ProductId::new("p1");
    let pending = offline.wishlist().add(&p1).expect("submitted");
    assert!(offline.wishlist().contains(&p1));

    let err = pending.await.expect_err("connection refused");
    assert!(matches!(
        err,
        SyncError::Remote(ApiError::Transport(_) | ApiError::Timeout)
    ));
    assert!(offline.wishlist().items().is_empty());
}
