//! Provider cost estimator
//!
//! Attributes a shipment to the contract it was booked under and estimates
//! what the platform pays the carrier for it. The result is bookkeeping
//! only; it never feeds back into customer prices or wallet movements.

use carrio_core::{
    config::{PricingConfig, ProviderCostConfig},
    models::{
        ApiSource, ApiSourceDecision, CostConfidence, CostSource, PlatformProviderCost, PriceList,
        PriceListType, ProviderCostEstimate, ShipmentCostInput, UserAccountType,
    },
    money::round2,
    traits::{AssignmentRepository, PriceListRepository, ProviderCostRepository, UserProfileRepository},
    vat::{convert_vat_basis, VatMode},
    AppResult,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::rate_resolver::{select_tier, TierMatch};

/// Provider cost estimation service
pub struct ProviderCostEstimator<P, U, C> {
    price_lists: Arc<P>,
    users: Arc<U>,
    costs: Arc<C>,
    pricing: PricingConfig,
    config: ProviderCostConfig,
}

impl<P, U, C> ProviderCostEstimator<P, U, C>
where
    P: PriceListRepository + AssignmentRepository,
    U: UserProfileRepository,
    C: ProviderCostRepository,
{
    /// Create a new provider cost estimator
    pub fn new(
        price_lists: Arc<P>,
        users: Arc<U>,
        costs: Arc<C>,
        pricing: PricingConfig,
        config: ProviderCostConfig,
    ) -> Self {
        Self {
            price_lists,
            users,
            costs,
            pricing,
            config,
        }
    }

    /// Decide which contract a shipment was booked under
    ///
    /// First match wins:
    /// 1. the list derives from a master list
    /// 2. the list is global
    /// 3. the list was assigned to the user by a platform operator
    /// 4. without an explicit list, the user holds an active platform assignment
    /// 5. the user is a BYOC account
    /// 6. otherwise the reseller's own contract
    #[instrument(skip(self))]
    pub async fn determine_api_source(
        &self,
        user_id: Uuid,
        price_list_id: Option<Uuid>,
        courier_code: Option<&str>,
    ) -> AppResult<ApiSourceDecision> {
        if let Some(list_id) = price_list_id {
            match self.price_lists.find_by_id(list_id).await? {
                Some(list) => {
                    if let Some(master_id) = list.master_list_id {
                        return Ok(platform(
                            Some(master_id),
                            format!("price list {} derives from master list {}", list.id, master_id),
                        ));
                    }

                    if list.list_type == PriceListType::Global {
                        return Ok(platform(
                            Some(list.id),
                            format!("price list {} is a global platform list", list.id),
                        ));
                    }

                    let assignments = self.price_lists.find_active_for_user(user_id).await?;
                    if assignments
                        .iter()
                        .any(|a| a.price_list_id == list.id && a.is_active() && a.assigned_by_platform)
                    {
                        return Ok(platform(
                            None,
                            format!(
                                "price list {} was assigned to user {} by a platform operator",
                                list.id, user_id
                            ),
                        ));
                    }
                }
                None => warn!("Price list {} not found while attributing shipment", list_id),
            }
        } else if let Some((list, reason)) = self.platform_assignment(user_id, courier_code).await? {
            let master = list
                .master_list_id
                .or_else(|| list.is_platform_owned().then_some(list.id));
            return Ok(platform(master, reason));
        }

        let account_type = self
            .users
            .find_profile(user_id)
            .await?
            .map(|p| p.account_type)
            .unwrap_or_default();

        if account_type == UserAccountType::Byoc {
            return Ok(ApiSourceDecision {
                api_source: ApiSource::ByocOwn,
                master_price_list_id: None,
                reason: format!("user {} ships on their own carrier contract (BYOC)", user_id),
            });
        }

        Ok(ApiSourceDecision {
            api_source: ApiSource::ResellerOwn,
            master_price_list_id: None,
            reason: format!(
                "no platform list or assignment found for user {} ({} account)",
                user_id, account_type
            ),
        })
    }

    /// Most recent active platform assignment, preferring lists serving the courier
    async fn platform_assignment(
        &self,
        user_id: Uuid,
        courier_code: Option<&str>,
    ) -> AppResult<Option<(PriceList, String)>> {
        let mut assignments = self.price_lists.find_active_for_user(user_id).await?;
        assignments.retain(|a| a.is_active());
        assignments.sort_by(|a, b| {
            b.assigned_at
                .cmp(&a.assigned_at)
                .then(a.price_list_id.cmp(&b.price_list_id))
        });

        let mut fallback = None;
        for assignment in assignments {
            let Some(list) = self.price_lists.find_by_id(assignment.price_list_id).await? else {
                continue;
            };
            if !(assignment.assigned_by_platform || list.is_platform_owned()) {
                continue;
            }

            let serves = courier_code.map_or(true, |c| list.serves_courier(c));
            if serves {
                let reason = format!(
                    "user {} holds active platform assignment of price list {}",
                    user_id, list.id
                );
                return Ok(Some((list, reason)));
            }
            if fallback.is_none() {
                fallback = Some(list);
            }
        }

        Ok(fallback.map(|list| {
            let reason = format!(
                "user {} holds active platform assignment of price list {} (other courier)",
                user_id, list.id
            );
            (list, reason)
        }))
    }

    /// Estimate the platform's cost of a shipment
    ///
    /// Never fails: store errors are logged and the chain falls through to
    /// the next source, ending at the linear estimate.
    #[instrument(skip(self))]
    pub async fn calculate_provider_cost(
        &self,
        courier_code: &str,
        weight: Decimal,
        zone: &str,
        service_type: Option<&str>,
        master_price_list_id: Option<Uuid>,
    ) -> ProviderCostEstimate {
        let service_type = service_type.unwrap_or(&self.pricing.standard_service_type);

        if let Some(master_id) = master_price_list_id {
            match self.lookup_list_cost(master_id, weight, zone, service_type).await {
                Ok(Some(cost)) => {
                    debug!("Provider cost {} from master list {}", cost, master_id);
                    return estimate(cost, CostSource::MasterList, CostConfidence::High);
                }
                Ok(None) => debug!("Master list {} has no tier for {} kg to {}", master_id, weight, zone),
                Err(e) => warn!("Master list lookup failed: {}", e),
            }
        }

        match self.lookup_courier_lists(courier_code, master_price_list_id, weight, zone, service_type).await {
            Ok(Some(cost)) => return estimate(cost, CostSource::MasterList, CostConfidence::High),
            Ok(None) => debug!("No platform list of {} prices {} kg to {}", courier_code, weight, zone),
            Err(e) => warn!("Platform list lookup for {} failed: {}", courier_code, e),
        }

        let since = Utc::now() - Duration::days(self.config.history_window_days);
        match self.costs.find_recent_costs(courier_code, since).await {
            Ok(history) if !history.is_empty() && history.len() >= self.config.min_history_samples => {
                let sum: Decimal = history.iter().copied().sum();
                let mean = round2(sum / Decimal::from(history.len()));
                debug!("Provider cost {} averaged over {} samples", mean, history.len());
                return estimate(mean, CostSource::HistoricalAvg, CostConfidence::Medium);
            }
            Ok(history) => debug!(
                "Only {} recent costs for {}, need {}",
                history.len(),
                courier_code,
                self.config.min_history_samples
            ),
            Err(e) => warn!("Cost history lookup for {} failed: {}", courier_code, e),
        }

        let cost = round2(self.config.linear_base + weight * self.config.linear_per_kg);
        warn!("Falling back to linear provider cost {} for {}", cost, courier_code);
        estimate(cost, CostSource::Estimate, CostConfidence::Low)
    }

    /// Net tier price of a list, `None` when the list has no tier for the shipment
    async fn lookup_list_cost(
        &self,
        list_id: Uuid,
        weight: Decimal,
        zone: &str,
        service_type: &str,
    ) -> AppResult<Option<Decimal>> {
        let Some(list) = self.price_lists.find_by_id(list_id).await? else {
            return Ok(None);
        };
        self.list_cost(&list, weight, zone, service_type).await
    }

    async fn list_cost(
        &self,
        list: &PriceList,
        weight: Decimal,
        zone: &str,
        service_type: &str,
    ) -> AppResult<Option<Decimal>> {
        let entries = self.price_lists.find_entries(list.id, Some(service_type)).await?;
        let cost = match select_tier(&entries, zone, weight) {
            TierMatch::InRange(entry) => Some(round2(convert_vat_basis(
                entry.price_with_surcharges(),
                list.vat_mode(),
                VatMode::Excluded,
                list.vat_rate,
            )?)),
            _ => None,
        };
        Ok(cost)
    }

    async fn lookup_courier_lists(
        &self,
        courier_code: &str,
        skip: Option<Uuid>,
        weight: Decimal,
        zone: &str,
        service_type: &str,
    ) -> AppResult<Option<Decimal>> {
        let lists = self.price_lists.find_platform_lists_for_courier(courier_code).await?;
        for list in lists.iter().filter(|l| Some(l.id) != skip) {
            if let Some(cost) = self.list_cost(list, weight, zone, service_type).await? {
                debug!("Provider cost {} from platform list {}", cost, list.id);
                return Ok(Some(cost));
            }
        }
        Ok(None)
    }

    /// Attribute, estimate and persist the provider cost of a shipment, once
    #[instrument(skip(self, shipment), fields(shipment_id = %shipment.shipment_id))]
    pub async fn record_provider_cost(
        &self,
        shipment: &ShipmentCostInput,
    ) -> AppResult<PlatformProviderCost> {
        if let Some(existing) = self.costs.find_by_shipment(shipment.shipment_id).await? {
            debug!("Provider cost of {} already recorded", shipment.shipment_id);
            return Ok(existing);
        }

        let decision = self
            .determine_api_source(
                shipment.user_id,
                shipment.price_list_id,
                Some(&shipment.courier_code),
            )
            .await?;

        let estimate = self
            .calculate_provider_cost(
                &shipment.courier_code,
                shipment.weight,
                &shipment.zone_code,
                Some(&shipment.service_type),
                decision.master_price_list_id,
            )
            .await;

        let row = PlatformProviderCost {
            id: Uuid::new_v4(),
            shipment_id: shipment.shipment_id,
            user_id: shipment.user_id,
            courier_code: shipment.courier_code.clone(),
            api_source: decision.api_source,
            provider_cost: estimate.cost,
            billed_amount: shipment.billed_amount,
            margin: shipment.billed_amount - estimate.cost,
            confidence: estimate.confidence,
            source: estimate.source,
            master_price_list_id: decision.master_price_list_id,
            reason: decision.reason,
            created_at: Utc::now(),
        };

        let stored = self.costs.insert_once(&row).await?;
        info!(
            "Recorded provider cost {} ({}, {}) for shipment {}: margin {}",
            stored.provider_cost, stored.source, stored.confidence, stored.shipment_id, stored.margin
        );
        Ok(stored)
    }
}

fn platform(master_price_list_id: Option<Uuid>, reason: String) -> ApiSourceDecision {
    ApiSourceDecision {
        api_source: ApiSource::Platform,
        master_price_list_id,
        reason,
    }
}

fn estimate(cost: Decimal, source: CostSource, confidence: CostConfidence) -> ProviderCostEstimate {
    ProviderCostEstimate {
        cost,
        source,
        confidence,
    }
}
