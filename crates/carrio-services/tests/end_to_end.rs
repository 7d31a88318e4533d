//! Quote, pay and book a shipment against the in-memory store

use carrio_core::config::{PricingConfig, ProviderCostConfig};
use carrio_core::models::{
    ApiSource, CostConfidence, LedgerMetadata, PriceList, PriceListAssignment, PriceListEntry,
    PriceListStatus, PriceListType, ShipmentCostInput,
};
use carrio_core::vat::VatMode;
use carrio_core::zone::{Destination, ZONE_MAINLAND};
use carrio_db::InMemoryStore;
use carrio_services::{ProviderCostEstimator, RateResolver, RetryConfig, WalletLedger};
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn seed_platform_list(store: &InMemoryStore, user: Uuid) -> Uuid {
    let list = PriceList {
        name: "BRT fornitore".to_string(),
        list_type: PriceListType::Supplier,
        status: PriceListStatus::Active,
        courier_code: Some("BRT".to_string()),
        vat_mode: Some(VatMode::Excluded),
        ..Default::default()
    };
    let id = list.id;
    store.insert_price_list(list);
    store.insert_entries(vec![PriceListEntry {
        price_list_id: id,
        zone_code: ZONE_MAINLAND.to_string(),
        weight_from: dec!(0),
        weight_to: dec!(5),
        base_price: dec!(5.00),
        ..Default::default()
    }]);
    store.insert_assignment(PriceListAssignment {
        user_id: user,
        price_list_id: id,
        assigned_by: None,
        assigned_by_platform: true,
        assigned_at: Utc::now(),
        revoked_at: None,
    });
    id
}

#[tokio::test]
async fn quote_debit_and_replay() {
    let store = InMemoryStore::new();
    let user = Uuid::new_v4();
    let list_id = seed_platform_list(&store, user);
    store.set_balance(user, dec!(6.10));

    let resolver = RateResolver::new(Arc::new(store.clone()), PricingConfig::default());
    let ledger = WalletLedger::with_retry_config(Arc::new(store.clone()), RetryConfig::default());

    let quote = resolver
        .quote_for_user(user, dec!(2), &Destination::italy("MI", "20121"), None, None)
        .await
        .unwrap();
    assert_eq!(quote.price_list_id, list_id);
    assert_eq!(quote.base_price, dec!(5.00));
    assert_eq!(quote.vat_amount, dec!(1.10));
    assert_eq!(quote.final_price, dec!(6.10));

    let check = ledger
        .check_credit_before_booking(user, quote.final_price)
        .await
        .unwrap();
    assert!(check.sufficient);

    let shipment_id = Uuid::new_v4();
    let key = format!("shipment:{}", shipment_id);
    let metadata = LedgerMetadata::reference(shipment_id.to_string());

    let first = ledger
        .debit(user, quote.final_price, &key, metadata.clone())
        .await
        .unwrap();
    assert_eq!(first.new_balance, dec!(0.00));

    let replay = ledger
        .debit(user, quote.final_price, &key, metadata)
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.transaction_id, first.transaction_id);
    assert_eq!(replay.new_balance, dec!(0.00));
    assert_eq!(store.transactions_of(user).len(), 1);
    assert_eq!(ledger.balance(user).await.unwrap().balance, dec!(0.00));

    let estimator = ProviderCostEstimator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        PricingConfig::default(),
        ProviderCostConfig::default(),
    );
    let input = ShipmentCostInput {
        shipment_id,
        user_id: user,
        courier_code: "BRT".to_string(),
        price_list_id: Some(list_id),
        weight: dec!(2),
        zone_code: quote.zone_code.clone(),
        service_type: quote.service_type.clone(),
        billed_amount: quote.final_price,
    };

    let booked = estimator.record_provider_cost(&input).await.unwrap();
    assert_eq!(booked.api_source, ApiSource::Platform);
    assert_eq!(booked.provider_cost, dec!(5.00));
    assert_eq!(booked.margin, dec!(1.10));
    assert_eq!(booked.confidence, CostConfidence::High);

    let again = estimator.record_provider_cost(&input).await.unwrap();
    assert_eq!(again.id, booked.id);
}

#[tokio::test]
async fn insufficient_balance_blocks_booking() {
    let store = InMemoryStore::new();
    let user = Uuid::new_v4();
    seed_platform_list(&store, user);
    store.set_balance(user, dec!(6.09));

    let resolver = RateResolver::new(Arc::new(store.clone()), PricingConfig::default());
    let ledger = WalletLedger::with_retry_config(Arc::new(store.clone()), RetryConfig::default());

    let quote = resolver
        .quote_for_user(user, dec!(2), &Destination::italy("RM", "00184"), None, None)
        .await
        .unwrap();

    let check = ledger
        .check_credit_before_booking(user, quote.final_price)
        .await
        .unwrap();
    assert!(!check.sufficient);
    assert_eq!(check.shortfall, dec!(0.01));

    let err = ledger
        .debit(user, quote.final_price, "shipment:short", LedgerMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "insufficient_funds");
    assert_eq!(ledger.balance(user).await.unwrap().balance, dec!(6.09));
}
