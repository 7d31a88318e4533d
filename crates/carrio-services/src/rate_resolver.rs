//! Rate matrix resolver
//!
//! Resolves the tier of a price list that prices a shipment, then applies
//! surcharges and the list's normalized VAT mode. A missing tier is the
//! business error `RateNotFound`, never a zero price.

use carrio_core::{
    config::PricingConfig,
    models::{PriceList, PriceListEntry, RateQuote},
    money::round2,
    traits::{AssignmentRepository, PriceListRepository},
    vat::apply_vat,
    zone::Destination,
    AppError, AppResult,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const EXTRA_STEP_KG: Decimal = Decimal::ONE_HUNDRED;

/// Where a weight falls within the tiers of one (zone, service type)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierMatch<'a> {
    /// A tier whose `[weight_from, weight_to)` contains the weight
    InRange(&'a PriceListEntry),
    /// The weight is at or beyond the highest tier; carries that tier
    BeyondTop(&'a PriceListEntry),
    /// Below the first tier, in a gap, or no tier for the zone
    NoTier,
}

/// Select the tier pricing `weight` in `zone` among already service-filtered entries
pub fn select_tier<'a>(entries: &'a [PriceListEntry], zone: &str, weight: Decimal) -> TierMatch<'a> {
    let mut zone_entries: Vec<&PriceListEntry> = entries
        .iter()
        .filter(|e| e.zone_code.eq_ignore_ascii_case(zone))
        .collect();

    if zone_entries.is_empty() {
        return TierMatch::NoTier;
    }

    // Deterministic pick if tiers overlap
    zone_entries.sort_by(|a, b| a.weight_from.cmp(&b.weight_from).then(a.weight_to.cmp(&b.weight_to)));

    if let Some(entry) = zone_entries.iter().find(|e| e.contains_weight(weight)) {
        return TierMatch::InRange(entry);
    }

    match zone_entries.iter().max_by(|a, b| a.weight_to.cmp(&b.weight_to)) {
        Some(top) if weight >= top.weight_to => TierMatch::BeyondTop(top),
        _ => TierMatch::NoTier,
    }
}

/// Number of started 100 kg steps beyond `ceiling`
pub fn extra_steps(weight: Decimal, ceiling: Decimal) -> Option<u32> {
    if weight <= ceiling {
        return Some(0);
    }
    ((weight - ceiling) / EXTRA_STEP_KG).ceil().to_u32()
}

/// Tier chosen for a shipment, with any extra steps beyond the last tier
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTier {
    pub entry: PriceListEntry,
    pub extra_steps: u32,
    /// Price of one extra step, zero for in-range weights
    pub step_price: Decimal,
}

impl ResolvedTier {
    /// Tier base price including extra steps
    pub fn base_price(&self) -> Decimal {
        self.entry.base_price + self.step_price * Decimal::from(self.extra_steps)
    }
}

/// Price a resolved tier under a list's VAT settings
///
/// A stored VAT rate outside `[0, 100)` is a `Configuration` error.
pub fn price_tier(list: &PriceList, tier: &ResolvedTier, weight: Decimal) -> AppResult<RateQuote> {
    let base_price = tier.base_price();
    let fuel_surcharge = round2(tier.entry.fuel_surcharge_on(base_price));
    let island_surcharge = tier.entry.island_surcharge();
    let surcharges = fuel_surcharge + island_surcharge;
    let subtotal = base_price + surcharges;

    let vat_mode = list.vat_mode();
    let vat = apply_vat(subtotal, vat_mode, list.vat_rate).map_err(|_| {
        AppError::Configuration(format!(
            "price list {} has invalid VAT rate {}",
            list.id, list.vat_rate
        ))
    })?;

    Ok(RateQuote {
        price_list_id: list.id,
        entry_id: tier.entry.id,
        zone_code: tier.entry.zone_code.clone(),
        service_type: tier.entry.service_type.clone(),
        weight,
        base_price,
        fuel_surcharge,
        island_surcharge,
        surcharges,
        subtotal,
        vat_mode,
        vat_rate: list.vat_rate,
        vat_amount: vat.vat_amount,
        final_price: round2(vat.total),
        extra_steps: tier.extra_steps,
        delivery_days: tier.entry.delivery_days,
    })
}

/// Rate resolution service
///
/// Read-only and side-effect free; safe to share across any number of
/// concurrent requests.
pub struct RateResolver<P> {
    repo: Arc<P>,
    pricing: PricingConfig,
}

impl<P> RateResolver<P>
where
    P: PriceListRepository + AssignmentRepository,
{
    /// Create a new rate resolver
    pub fn new(repo: Arc<P>, pricing: PricingConfig) -> Self {
        Self { repo, pricing }
    }

    fn service_type<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.pricing.standard_service_type)
    }

    async fn load_list(&self, price_list_id: Uuid) -> AppResult<PriceList> {
        self.repo
            .find_by_id(price_list_id)
            .await?
            .ok_or_else(|| AppError::PriceListNotFound(price_list_id.to_string()))
    }

    /// Resolve the tier of a list pricing `weight` in `zone`
    #[instrument(skip(self))]
    pub async fn resolve_entry(
        &self,
        price_list_id: Uuid,
        weight: Decimal,
        zone: &str,
        service_type: Option<&str>,
    ) -> AppResult<ResolvedTier> {
        let list = self.load_list(price_list_id).await?;
        self.resolve_in(&list, weight, zone, service_type).await
    }

    async fn resolve_in(
        &self,
        list: &PriceList,
        weight: Decimal,
        zone: &str,
        service_type: Option<&str>,
    ) -> AppResult<ResolvedTier> {
        if weight <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "weight must be positive, got {}",
                weight
            )));
        }

        let service_type = self.service_type(service_type);
        let entries = self.repo.find_entries(list.id, Some(service_type)).await?;
        debug!(
            "Resolving {} kg to {} among {} {} entries of {}",
            weight,
            zone,
            entries.len(),
            service_type,
            list.id
        );

        let not_found = || AppError::RateNotFound {
            zone: zone.to_string(),
            weight: weight.to_string(),
            service_type: service_type.to_string(),
        };

        match select_tier(&entries, zone, weight) {
            TierMatch::InRange(entry) => Ok(ResolvedTier {
                entry: entry.clone(),
                extra_steps: 0,
                step_price: Decimal::ZERO,
            }),
            TierMatch::BeyondTop(top) => {
                let Some(step_price) = list.metadata_decimal(&self.pricing.extra_step_metadata_key)
                else {
                    warn!(
                        "{} kg exceeds the last tier ({} kg) of {} and no extra-step rule is set",
                        weight, top.weight_to, list.id
                    );
                    return Err(not_found());
                };

                let steps = extra_steps(weight, top.weight_to).ok_or_else(|| {
                    AppError::InvalidInput(format!("weight {} is out of range", weight))
                })?;

                debug!(
                    "Pricing {} extra steps of {} beyond {} kg",
                    steps, step_price, top.weight_to
                );
                Ok(ResolvedTier {
                    entry: top.clone(),
                    extra_steps: steps,
                    step_price,
                })
            }
            TierMatch::NoTier => {
                warn!("No tier of {} for {} kg to {}", list.id, weight, zone);
                Err(not_found())
            }
        }
    }

    /// Quote a shipment to an already classified zone
    #[instrument(skip(self))]
    pub async fn quote_zone(
        &self,
        price_list_id: Uuid,
        weight: Decimal,
        zone: &str,
        service_type: Option<&str>,
    ) -> AppResult<RateQuote> {
        let list = self.load_list(price_list_id).await?;
        let tier = self.resolve_in(&list, weight, zone, service_type).await?;
        price_tier(&list, &tier, weight)
    }

    /// Quote a shipment to a destination
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        price_list_id: Uuid,
        weight: Decimal,
        destination: &Destination,
        service_type: Option<&str>,
    ) -> AppResult<RateQuote> {
        let zone = destination.zone();
        self.quote_zone(price_list_id, weight, &zone, service_type).await
    }

    /// Quote for a user: the hinted list, else the user's most recent active assignment
    #[instrument(skip(self))]
    pub async fn quote_for_user(
        &self,
        user_id: Uuid,
        weight: Decimal,
        destination: &Destination,
        service_type: Option<&str>,
        price_list_hint: Option<Uuid>,
    ) -> AppResult<RateQuote> {
        let price_list_id = match price_list_hint {
            Some(id) => id,
            None => self.assigned_list(user_id).await?,
        };

        self.quote(price_list_id, weight, destination, service_type).await
    }

    async fn assigned_list(&self, user_id: Uuid) -> AppResult<Uuid> {
        let assignments = self.repo.find_active_for_user(user_id).await?;

        let mut candidates: Vec<_> = assignments.iter().filter(|a| a.is_active()).collect();
        candidates.sort_by(|a, b| {
            b.assigned_at
                .cmp(&a.assigned_at)
                .then(a.price_list_id.cmp(&b.price_list_id))
        });

        for assignment in candidates {
            match self.repo.find_by_id(assignment.price_list_id).await? {
                Some(list) if list.is_active() => return Ok(list.id),
                _ => debug!(
                    "Skipping inactive assigned list {} of {}",
                    assignment.price_list_id, user_id
                ),
            }
        }

        Err(AppError::NotFound(format!(
            "no active price list assigned to user {}",
            user_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrio_core::models::{PriceListAssignment, PriceListStatus};
    use carrio_core::vat::VatMode;
    use carrio_core::zone::{ZONE_MAINLAND, ZONE_SICILY};
    use carrio_db::InMemoryStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn entry(list: Uuid, zone: &str, from: Decimal, to: Decimal, base: Decimal) -> PriceListEntry {
        PriceListEntry {
            price_list_id: list,
            zone_code: zone.to_string(),
            weight_from: from,
            weight_to: to,
            base_price: base,
            ..Default::default()
        }
    }

    fn setup(vat_mode: Option<VatMode>) -> (InMemoryStore, RateResolver<InMemoryStore>, Uuid) {
        let store = InMemoryStore::new();
        let list = PriceList {
            name: "BRT Standard".to_string(),
            status: PriceListStatus::Active,
            vat_mode,
            ..Default::default()
        };
        let id = list.id;
        store.insert_price_list(list);
        store.insert_entries(vec![
            entry(id, ZONE_MAINLAND, dec!(0), dec!(5), dec!(5.00)),
            entry(id, ZONE_MAINLAND, dec!(5), dec!(10), dec!(7.00)),
            PriceListEntry {
                fuel_surcharge_percent: Some(dec!(10)),
                island_surcharge: Some(dec!(2.50)),
                ..entry(id, ZONE_SICILY, dec!(0), dec!(5), dec!(6.00))
            },
        ]);
        let resolver = RateResolver::new(Arc::new(store.clone()), PricingConfig::default());
        (store, resolver, id)
    }

    #[test]
    fn test_select_tier() {
        let list = Uuid::new_v4();
        let entries = vec![
            entry(list, ZONE_MAINLAND, dec!(5), dec!(10), dec!(7.00)),
            entry(list, ZONE_MAINLAND, dec!(0), dec!(5), dec!(5.00)),
        ];

        assert!(matches!(
            select_tier(&entries, ZONE_MAINLAND, dec!(5)),
            TierMatch::InRange(e) if e.base_price == dec!(7.00)
        ));
        assert!(matches!(
            select_tier(&entries, "it-italia", dec!(0.1)),
            TierMatch::InRange(e) if e.base_price == dec!(5.00)
        ));
        assert!(matches!(
            select_tier(&entries, ZONE_MAINLAND, dec!(10)),
            TierMatch::BeyondTop(e) if e.weight_to == dec!(10)
        ));
        assert_eq!(select_tier(&entries, ZONE_SICILY, dec!(1)), TierMatch::NoTier);
    }

    #[test]
    fn test_extra_steps_round_up() {
        assert_eq!(extra_steps(dec!(10), dec!(10)), Some(0));
        assert_eq!(extra_steps(dec!(10.5), dec!(10)), Some(1));
        assert_eq!(extra_steps(dec!(110), dec!(10)), Some(1));
        assert_eq!(extra_steps(dec!(110.01), dec!(10)), Some(2));
    }

    #[tokio::test]
    async fn test_quote_excluded_vat() {
        let (_, resolver, id) = setup(Some(VatMode::Excluded));

        let quote = resolver
            .quote_zone(id, dec!(3), ZONE_MAINLAND, None)
            .await
            .unwrap();

        assert_eq!(quote.base_price, dec!(5.00));
        assert_eq!(quote.vat_amount, dec!(1.10));
        assert_eq!(quote.final_price, dec!(6.10));
    }

    #[tokio::test]
    async fn test_quote_included_vat_keeps_total() {
        let (_, resolver, id) = setup(Some(VatMode::Included));

        let quote = resolver
            .quote_zone(id, dec!(3), ZONE_MAINLAND, None)
            .await
            .unwrap();

        assert_eq!(quote.final_price, dec!(5.00));
        // 5.00 - 5.00 / 1.22
        assert_eq!(quote.vat_amount, dec!(0.90));
    }

    #[tokio::test]
    async fn test_invalid_stored_vat_rate_is_configuration_error() {
        let store = InMemoryStore::new();
        let list = PriceList {
            vat_mode: Some(VatMode::Included),
            vat_rate: dec!(-100),
            ..Default::default()
        };
        let id = list.id;
        store.insert_price_list(list);
        store.insert_entries(vec![entry(id, ZONE_MAINLAND, dec!(0), dec!(5), dec!(5.00))]);
        let resolver = RateResolver::new(Arc::new(store), PricingConfig::default());

        let err = resolver
            .quote_zone(id, dec!(3), ZONE_MAINLAND, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_quote_applies_surcharges() {
        let (_, resolver, id) = setup(None);

        let quote = resolver
            .quote(id, dec!(2), &Destination::italy("PA", "90121"), Some("standard"))
            .await
            .unwrap();

        assert_eq!(quote.zone_code, ZONE_SICILY);
        assert_eq!(quote.fuel_surcharge, dec!(0.60));
        assert_eq!(quote.island_surcharge, dec!(2.50));
        assert_eq!(quote.subtotal, dec!(9.10));
        // legacy list reads as excluded: 9.10 + 2.00
        assert_eq!(quote.final_price, dec!(11.10));
    }

    #[tokio::test]
    async fn test_missing_tier_is_rate_not_found() {
        let (_, resolver, id) = setup(None);

        let err = resolver
            .quote_zone(id, dec!(3), "IT-SARDEGNA", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateNotFound { .. }));

        let err = resolver
            .quote_zone(id, dec!(12), ZONE_MAINLAND, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_extra_step_rule() {
        let (store, resolver, id) = setup(None);
        let mut list = PriceListRepository::find_by_id(&store, id).await.unwrap().unwrap();
        list.metadata = json!({ "extra_step_per_100kg": "4.00" });
        store.insert_price_list(list);

        let quote = resolver
            .quote_zone(id, dec!(150), ZONE_MAINLAND, None)
            .await
            .unwrap();

        // top tier 7.00 + 2 steps of 4.00
        assert_eq!(quote.extra_steps, 2);
        assert_eq!(quote.base_price, dec!(15.00));
        assert_eq!(quote.final_price, dec!(18.30));
    }

    #[tokio::test]
    async fn test_non_positive_weight_is_rejected() {
        let (_, resolver, id) = setup(None);
        let err = resolver
            .quote_zone(id, dec!(0), ZONE_MAINLAND, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_quote_for_user_uses_latest_active_assignment() {
        let (store, resolver, id) = setup(None);
        let user = Uuid::new_v4();

        let archived = PriceList {
            status: PriceListStatus::Archived,
            ..Default::default()
        };
        let archived_id = archived.id;
        store.insert_price_list(archived);

        let now = Utc::now();
        store.insert_assignment(PriceListAssignment {
            user_id: user,
            price_list_id: id,
            assigned_by: None,
            assigned_by_platform: true,
            assigned_at: now - Duration::days(2),
            revoked_at: None,
        });
        store.insert_assignment(PriceListAssignment {
            user_id: user,
            price_list_id: archived_id,
            assigned_by: None,
            assigned_by_platform: true,
            assigned_at: now,
            revoked_at: None,
        });

        let quote = resolver
            .quote_for_user(user, dec!(3), &Destination::italy("MI", "20121"), None, None)
            .await
            .unwrap();
        assert_eq!(quote.price_list_id, id);

        let err = resolver
            .quote_for_user(Uuid::new_v4(), dec!(3), &Destination::italy("MI", "20121"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    proptest::proptest! {
        #[test]
        fn prop_legacy_list_quotes_like_excluded(
            base_cents in 1i64..100_000,
            fuel in proptest::option::of(0i64..3_000),
            weight_grams in 1i64..5_000,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();

            let quote_with = |vat_mode: Option<VatMode>| {
                let store = InMemoryStore::new();
                let list = PriceList {
                    vat_mode,
                    ..Default::default()
                };
                let id = list.id;
                store.insert_price_list(list);
                store.insert_entries(vec![PriceListEntry {
                    fuel_surcharge_percent: fuel.map(|f| Decimal::new(f, 2)),
                    ..entry(id, ZONE_MAINLAND, dec!(0), dec!(5), Decimal::new(base_cents, 2))
                }]);
                let resolver = RateResolver::new(Arc::new(store), PricingConfig::default());
                runtime
                    .block_on(resolver.quote_zone(id, Decimal::new(weight_grams, 3), ZONE_MAINLAND, None))
                    .unwrap()
            };

            let legacy = quote_with(None);
            let explicit = quote_with(Some(VatMode::Excluded));
            proptest::prop_assert_eq!(legacy.base_price, explicit.base_price);
            proptest::prop_assert_eq!(legacy.surcharges, explicit.surcharges);
            proptest::prop_assert_eq!(legacy.vat_amount, explicit.vat_amount);
            proptest::prop_assert_eq!(legacy.final_price, explicit.final_price);
        }
    }
}
