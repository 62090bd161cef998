//! Login, registration and logout against the mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use kreg_integration_tests::MockBackend;
use kreg_storefront::SyncError;
use kreg_storefront::api::HttpApi;
use kreg_storefront::config::ClientConfig;
use kreg_storefront::store::{KeyValueStore, MemoryStore};
use kreg_storefront::sync::{AuthOutcome, CartSync, Phase};
use secrecy::SecretString;

async fn setup() -> (MockBackend, CartSync<HttpApi>, Arc<MemoryStore>) {
    let mock = MockBackend::spawn().await.unwrap();
    mock.add_product("p1", "Milk 1L", "Dairy", None, 1.5)
        .add_user("Ann", "ann@kreg.market", "hunter2", "tok-ann");

    let url = mock.api_url();
    let config = ClientConfig::from_lookup(|key| (key == "KREG_API_URL").then(|| url.clone()))
        .unwrap();
    let store = Arc::new(MemoryStore::new());
    let sync = CartSync::new(HttpApi::new(&config).unwrap(), store.clone());
    sync.bootstrap().await;
    (mock, sync, store)
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s)
}

#[tokio::test]
async fn test_login_loads_account_cart() {
    let (mock, sync, store) = setup().await;
    mock.set_cart("tok-ann", &[("p1", 2)]);

    let outcome = sync
        .login("ann@kreg.market", &secret("hunter2"))
        .await
        .unwrap();
    assert_eq!(outcome, AuthOutcome::LoggedIn);

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.phase, Phase::Authenticated);
    assert_eq!(snapshot.user.unwrap().email, "ann@kreg.market");
    assert_eq!(snapshot.cart.item_count(), 2);
    assert_eq!(store.get("token").unwrap().as_deref(), Some("tok-ann"));
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let (_mock, sync, store) = setup().await;
    let err = sync
        .login("ann@kreg.market", &secret("wrong"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SyncError::Rejected("Invalid email or password".to_string())
    );
    assert_eq!(sync.snapshot().phase, Phase::Guest);
    assert_eq!(store.get("token").unwrap(), None);
}

#[tokio::test]
async fn test_register_then_login() {
    let (_mock, sync, _) = setup().await;

    let outcome = sync
        .register("Bob", "bob@kreg.market", &secret("s3cret"))
        .await
        .unwrap();
    assert_eq!(outcome, AuthOutcome::LoginRequired);
    assert_eq!(sync.snapshot().phase, Phase::Guest);

    let err = sync
        .register("Bob", "bob@kreg.market", &secret("s3cret"))
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::Rejected("User already exists".to_string()));

    sync.login("bob@kreg.market", &secret("s3cret"))
        .await
        .unwrap();
    assert_eq!(sync.snapshot().user.unwrap().name, "Bob");
    sync.add_to_cart(&kreg_core::ProductId::new("p1"))
        .await
        .unwrap();
    assert_eq!(sync.snapshot().cart.item_count(), 1);
}

#[tokio::test]
async fn test_logout() {
    let (_mock, sync, store) = setup().await;
    sync.login("ann@kreg.market", &secret("hunter2"))
        .await
        .unwrap();

    sync.logout();
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.phase, Phase::LoggedOut);
    assert!(snapshot.user.is_none());
    assert_eq!(store.get("token").unwrap(), None);

    let err = sync
        .add_to_cart(&kreg_core::ProductId::new("p1"))
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::Unauthenticated);
    assert_eq!(sync.snapshot().phase, Phase::Guest);
}
