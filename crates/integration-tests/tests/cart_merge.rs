//! Scenario tests for the guest-to-account merge: the summing law, the
//! empty-local shortcut, and the abort-on-failure contract.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use ramen_bae_cart::store::{LocalCartStore, RemoteCartStore};
use ramen_bae_cart::{CartConfig, CartEngine};
use ramen_bae_core::{
    CurrencyCode, Price, ProductId, ProductRef, RemoteLine, UserId,
};
use ramen_bae_integration_tests::{MemoryLocalStore, RecordingRemoteStore, StaticIdentity};

fn product(id: &str, dollars: i64) -> ProductRef {
    ProductRef {
        product_id: ProductId::new(id),
        name: format!("Product {id}"),
        unit_price: Price::new(Decimal::from(dollars), CurrencyCode::USD),
        image_url: format!("https://cdn.example.com/{id}.webp"),
        slug: id.to_owned(),
    }
}

fn remote_line(id: &str, dollars: i64, quantity: u32) -> RemoteLine {
    RemoteLine {
        product_id: ProductId::new(id),
        name: format!("Product {id}"),
        unit_price: Price::new(Decimal::from(dollars), CurrencyCode::USD),
        quantity,
        image_url: format!("https://cdn.example.com/{id}.webp"),
        slug: id.to_owned(),
    }
}

fn qty(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).expect("nonzero")
}

fn harness() -> (CartEngine, Arc<RecordingRemoteStore>, Arc<MemoryLocalStore>) {
    let remote = Arc::new(RecordingRemoteStore::default());
    let local = Arc::new(MemoryLocalStore::default());
    let engine = CartEngine::new(
        CartConfig::default(),
        Arc::clone(&local) as Arc<dyn LocalCartStore>,
        Arc::clone(&remote) as Arc<dyn RemoteCartStore>,
    );
    (engine, remote, local)
}

#[tokio::test(start_paused = true)]
async fn merge_sums_guest_and_account_quantities() {
    let (engine, remote, _) = harness();
    let user = UserId::generate();
    let cart = remote.seed_cart(user);
    remote.seed_lines(cart, [remote_line("p", 4, 5)]);

    engine.add_line(&product("p", 4), qty(3));
    engine.merge_on_login(user).await.expect("merge");

    // 3 (guest) + 5 (account) = 8: never 3, never 5, never max
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(
        snapshot.line_for(&ProductId::new("p")).map(|l| l.quantity),
        Some(8)
    );

    // The merged result was written back in one batched upsert
    let lines = remote.lines_for(cart);
    assert_eq!(lines.first().map(|l| l.quantity), Some(8));
    assert_eq!(remote.calls().upsert_lines.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn merge_keeps_products_unique_to_either_side() {
    let (engine, remote, _) = harness();
    let user = UserId::generate();
    let cart = remote.seed_cart(user);
    remote.seed_lines(cart, [remote_line("account-only", 6, 2)]);

    engine.add_line(&product("guest-only", 3), qty(1));
    engine.merge_on_login(user).await.expect("merge");

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.lines.len(), 2);
    assert_eq!(snapshot.item_count, 3);
    assert_eq!(remote.lines_for(cart).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_local_merge_is_a_plain_pull() {
    let (engine, remote, _) = harness();
    let user = UserId::generate();
    let cart = remote.seed_cart(user);
    remote.seed_lines(cart, [remote_line("a", 3, 2), remote_line("b", 5, 1)]);

    engine.merge_on_login(user).await.expect("merge");

    // Identical observable result to a pull-and-replace
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.lines.len(), 2);
    assert_eq!(snapshot.item_count, 3);
    assert_eq!(snapshot.subtotal.amount, Decimal::from(11));

    // ...and the cheaper path: no write-back of what was just read
    assert!(remote.calls().upsert_lines.is_empty());
    assert_eq!(remote.lines_for(cart).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn merge_failure_leaves_local_state_untouched() {
    let (engine, remote, _) = harness();
    let user = UserId::generate();

    engine.add_line(&product("p", 4), qty(3));
    let before = engine.snapshot();

    remote.set_failing(true);
    let result = engine.merge_on_login(user).await;
    assert!(result.is_err());

    // Pre-merge state intact, session still anonymous: a mutation after
    // the failed merge schedules nothing remotely
    assert_eq!(engine.snapshot(), before);
    let calls_after_failure = remote.calls().total();
    engine.update_quantity(&ProductId::new("p"), 5);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.calls().total(), calls_after_failure);
}

#[tokio::test(start_paused = true)]
async fn refresh_identity_merges_once_for_a_fresh_login() {
    let (engine, remote, _) = harness();
    let user = UserId::generate();

    engine.add_line(&product("p", 4), qty(2));
    let provider = StaticIdentity(Some(user));
    engine.refresh_identity(&provider).await.expect("refresh");

    // A second check is a no-op: the merge runs at most once per session
    engine.refresh_identity(&provider).await.expect("refresh");

    let calls = remote.calls();
    assert_eq!(calls.create_cart, 1);
    assert_eq!(calls.read_lines, 1);
    assert_eq!(engine.snapshot().item_count, 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_identity_without_login_does_nothing() {
    let (engine, remote, _) = harness();
    engine.add_line(&product("p", 4), qty(2));

    engine
        .refresh_identity(&StaticIdentity(None))
        .await
        .expect("refresh");

    assert_eq!(remote.calls().total(), 0);
}
