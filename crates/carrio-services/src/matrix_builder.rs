//! Margin & matrix builder
//!
//! Builds a zone x weight-tier pricing snapshot of a price list under a
//! margin, for commercial offers. Cells are rounded once, after the margin.

use carrio_core::{
    config::PricingConfig,
    models::{MatrixOptions, MatrixRow, PriceListEntry, QuoteMatrix},
    money::round2,
    traits::PriceListRepository,
    vat::{convert_vat_basis, validate_vat_rate, VatMode},
    zone::compare_zones,
    AppError, AppResult,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cell price: surcharged base, converted to the target VAT basis, plus margin
pub fn cell_price(
    entry: &PriceListEntry,
    list_mode: VatMode,
    target_mode: VatMode,
    vat_rate: Decimal,
    margin_percent: Decimal,
) -> AppResult<Decimal> {
    let base = convert_vat_basis(entry.price_with_surcharges(), list_mode, target_mode, vat_rate)?;
    Ok(round2(base * (Decimal::ONE + margin_percent / Decimal::ONE_HUNDRED)))
}

/// Arrange entries into canonical zone columns and ascending weight rows
pub fn arrange(
    entries: &[PriceListEntry],
    mut price: impl FnMut(&PriceListEntry) -> Decimal,
) -> (Vec<String>, Vec<MatrixRow>) {
    let mut zones: Vec<String> = Vec::new();
    let mut tiers: Vec<Decimal> = Vec::new();
    for entry in entries {
        if !zones.iter().any(|z| z.eq_ignore_ascii_case(&entry.zone_code)) {
            zones.push(entry.zone_code.clone());
        }
        if !tiers.contains(&entry.weight_to) {
            tiers.push(entry.weight_to);
        }
    }
    zones.sort_by(|a, b| compare_zones(a, b));
    tiers.sort();

    let rows = tiers
        .into_iter()
        .map(|weight_to| {
            let prices = zones
                .iter()
                .map(|zone| {
                    entries
                        .iter()
                        .filter(|e| e.weight_to == weight_to && e.zone_code.eq_ignore_ascii_case(zone))
                        .min_by(|a, b| a.weight_from.cmp(&b.weight_from))
                        .map(&mut price)
                })
                .collect();
            MatrixRow { weight_to, prices }
        })
        .collect();

    (zones, rows)
}

/// Matrix builder service
pub struct MatrixBuilder<P> {
    repo: Arc<P>,
    pricing: PricingConfig,
}

impl<P: PriceListRepository> MatrixBuilder<P> {
    /// Create a new matrix builder
    pub fn new(repo: Arc<P>, pricing: PricingConfig) -> Self {
        Self { repo, pricing }
    }

    /// Build the standard-service matrix of a list
    ///
    /// `vat_mode` and `vat_rate` default to the list's own settings. When
    /// the requested mode differs from the list's, stored prices are
    /// converted before the margin is applied.
    ///
    /// # Errors
    ///
    /// - `PriceListNotFound` if the list does not exist
    /// - `Configuration` if the list has no standard-service entries
    /// - `InvalidInput` if the margin is -100% or lower, or the VAT rate is
    ///   outside `[0, 100)`
    #[instrument(skip(self, options))]
    pub async fn build_matrix(
        &self,
        price_list_id: Uuid,
        margin_percent: Decimal,
        vat_mode: Option<VatMode>,
        vat_rate: Option<Decimal>,
        options: MatrixOptions,
    ) -> AppResult<QuoteMatrix> {
        if margin_percent <= -Decimal::ONE_HUNDRED {
            return Err(AppError::InvalidInput(format!(
                "margin must be above -100%, got {}%",
                margin_percent
            )));
        }

        let list = self
            .repo
            .find_by_id(price_list_id)
            .await?
            .ok_or_else(|| AppError::PriceListNotFound(price_list_id.to_string()))?;

        let service_type = &self.pricing.standard_service_type;
        let entries = self.repo.find_entries(list.id, Some(service_type.as_str())).await?;
        if entries.is_empty() {
            return Err(AppError::Configuration(format!(
                "price list {} has no {} entries",
                list.id, service_type
            )));
        }

        let list_mode = list.vat_mode();
        let target_mode = vat_mode.unwrap_or(list_mode);
        let rate = vat_rate.unwrap_or(list.vat_rate);
        validate_vat_rate(rate)?;

        let mut failure = None;
        let (zones, rows) = arrange(&entries, |entry| {
            match cell_price(entry, list_mode, target_mode, rate, margin_percent) {
                Ok(price) => price,
                Err(e) => {
                    failure.get_or_insert(e);
                    Decimal::ZERO
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let matrix = QuoteMatrix {
            price_list_id: list.id,
            courier_code: list.courier_code.clone(),
            service_type: service_type.clone(),
            zones,
            rows,
            margin_percent,
            vat_mode: target_mode,
            vat_rate: rate,
            delivery_mode: options.delivery_mode,
            pickup_fee: options.pickup_fee,
            processing_fee: options.processing_fee,
            generated_at: Utc::now(),
        };

        info!(
            "Built matrix for {}: {} zones x {} tiers, margin {}%",
            list.id,
            matrix.zones.len(),
            matrix.rows.len(),
            margin_percent
        );

        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrio_core::models::{DeliveryMode, PriceList};
    use carrio_core::zone::{ZONE_CALABRIA, ZONE_MAINLAND, ZONE_SARDINIA};
    use carrio_db::InMemoryStore;
    use rust_decimal_macros::dec;

    fn entry(list: Uuid, zone: &str, to: Decimal, base: Decimal) -> PriceListEntry {
        PriceListEntry {
            price_list_id: list,
            zone_code: zone.to_string(),
            weight_from: to - dec!(1),
            weight_to: to,
            base_price: base,
            ..Default::default()
        }
    }

    fn builder_with(list: PriceList, entries: Vec<PriceListEntry>) -> MatrixBuilder<InMemoryStore> {
        let store = InMemoryStore::new();
        store.insert_price_list(list);
        store.insert_entries(entries);
        MatrixBuilder::new(Arc::new(store), PricingConfig::default())
    }

    #[test]
    fn test_cell_price_rounds_once_after_margin() {
        let e = PriceListEntry {
            base_price: dec!(5.00),
            ..Default::default()
        };
        assert_eq!(
            cell_price(&e, VatMode::Excluded, VatMode::Excluded, dec!(22), dec!(33)).unwrap(),
            dec!(6.65)
        );

        // 1.005 * 1.5 = 1.5075; rounding the base first would give 1.52
        let e = PriceListEntry {
            base_price: dec!(1.005),
            ..Default::default()
        };
        assert_eq!(
            cell_price(&e, VatMode::Excluded, VatMode::Excluded, dec!(22), dec!(50)).unwrap(),
            dec!(1.51)
        );
    }

    #[tokio::test]
    async fn test_matrix_layout() {
        let list = PriceList {
            courier_code: Some("BRT".to_string()),
            ..Default::default()
        };
        let id = list.id;
        let builder = builder_with(
            list,
            vec![
                entry(id, ZONE_SARDINIA, dec!(2), dec!(9.00)),
                entry(id, ZONE_MAINLAND, dec!(2), dec!(6.00)),
                entry(id, ZONE_MAINLAND, dec!(1), dec!(5.00)),
                entry(id, ZONE_CALABRIA, dec!(1), dec!(5.50)),
                PriceListEntry {
                    service_type: "express".to_string(),
                    ..entry(id, ZONE_MAINLAND, dec!(1), dec!(99.00))
                },
            ],
        );

        let options = MatrixOptions {
            delivery_mode: DeliveryMode::SenderDropoff,
            pickup_fee: Some(dec!(2.00)),
            processing_fee: None,
        };
        let matrix = builder
            .build_matrix(id, dec!(33), None, None, options)
            .await
            .unwrap();

        assert_eq!(matrix.zones, vec![ZONE_MAINLAND, ZONE_CALABRIA, ZONE_SARDINIA]);
        assert_eq!(
            matrix.rows.iter().map(|r| r.weight_to).collect::<Vec<_>>(),
            vec![dec!(1), dec!(2)]
        );
        assert_eq!(matrix.price(dec!(1), ZONE_MAINLAND), Some(dec!(6.65)));
        assert_eq!(matrix.price(dec!(2), ZONE_CALABRIA), None);
        assert_eq!(matrix.priced_cells(), 4);

        // generation inputs are snapshotted, fees stay out of the cells
        assert_eq!(matrix.margin_percent, dec!(33));
        assert_eq!(matrix.vat_mode, VatMode::Excluded);
        assert_eq!(matrix.delivery_mode, DeliveryMode::SenderDropoff);
        assert_eq!(matrix.pickup_fee, Some(dec!(2.00)));
        assert_eq!(matrix.courier_code.as_deref(), Some("BRT"));
    }

    #[tokio::test]
    async fn test_included_list_converted_before_margin() {
        let list = PriceList {
            vat_mode: Some(VatMode::Included),
            ..Default::default()
        };
        let id = list.id;
        let builder = builder_with(list, vec![entry(id, ZONE_MAINLAND, dec!(1), dec!(12.20))]);

        let matrix = builder
            .build_matrix(id, dec!(10), Some(VatMode::Excluded), None, MatrixOptions::default())
            .await
            .unwrap();

        // 12.20 / 1.22 = 10.00, +10%
        assert_eq!(matrix.price(dec!(1), ZONE_MAINLAND), Some(dec!(11.00)));
        assert_eq!(matrix.vat_mode, VatMode::Excluded);
    }

    #[tokio::test]
    async fn test_vat_rate_out_of_range_is_rejected() {
        let list = PriceList {
            vat_mode: Some(VatMode::Included),
            ..Default::default()
        };
        let id = list.id;
        let builder = builder_with(list, vec![entry(id, ZONE_MAINLAND, dec!(1), dec!(12.20))]);

        for rate in [dec!(-100), dec!(-5), dec!(100)] {
            let err = builder
                .build_matrix(
                    id,
                    dec!(10),
                    Some(VatMode::Excluded),
                    Some(rate),
                    MatrixOptions::default(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_empty_list_is_configuration_error() {
        let list = PriceList::default();
        let id = list.id;
        let builder = builder_with(list, Vec::new());

        let err = builder
            .build_matrix(id, dec!(20), None, None, MatrixOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_list() {
        let builder = builder_with(PriceList::default(), Vec::new());
        let err = builder
            .build_matrix(Uuid::new_v4(), dec!(20), None, None, MatrixOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PriceListNotFound(_)));
    }
}
