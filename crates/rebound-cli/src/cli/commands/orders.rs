//! `rebound orders` – create an order with a retried database transaction.

use super::resolve_policy;
use anyhow::Result;
use rebound_core::config::ReboundConfig;
use rebound_core::orders::OrderStore;
use rebound_core::retry::Cancellation;

const OPENING_BALANCE: f64 = 1_000.0;

pub async fn run_orders(
    cfg: &ReboundConfig,
    profile: Option<&str>,
    cancel: &Cancellation,
    customer: &str,
    amount: f64,
) -> Result<()> {
    let policy = resolve_policy(cfg, profile, "default")?;
    let store = OrderStore::open_memory(policy).await?;
    store.add_customer(customer, OPENING_BALANCE).await?;

    match store.create_order_with_notify(cancel, customer, amount).await {
        Ok(order_id) => println!("  Created order {} for {}", order_id, customer),
        Err(err) => println!("  Order failed ({:?}): {}", err.reason(), err),
    }
    if let Some(balance) = store.balance(customer).await? {
        println!("  Balance for {}: {:.2}", customer, balance);
    }
    Ok(())
}
