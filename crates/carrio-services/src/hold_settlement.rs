//! Hold/action settlement (giacenze)
//!
//! Charges a customer for the action chosen on an open hold and moves the
//! hold to `action_confirmed`. The wallet is only touched through the
//! ledger. A debit whose hold was taken by another action is refunded
//! under a key derived from the debit key. A debit whose confirmation
//! failed on a hold that is still open is kept, so the retry replays it
//! and confirms once.

use carrio_core::{
    models::{
        Address, HoldActionResult, HoldActionType, LedgerMetadata, ShipmentHold,
        WalletTransactionType,
    },
    traits::{HoldActionConfirmation, HoldRepository, WalletStore},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::wallet_ledger::WalletLedger;

/// Hold settlement service
pub struct HoldSettlement<H, W> {
    holds: Arc<H>,
    ledger: Arc<WalletLedger<W>>,
}

impl<H: HoldRepository, W: WalletStore> HoldSettlement<H, W> {
    /// Create a new settlement service
    pub fn new(holds: Arc<H>, ledger: Arc<WalletLedger<W>>) -> Self {
        Self { holds, ledger }
    }

    /// Current cost of `action` on a hold, from the courier's configuration
    #[instrument(skip(self))]
    pub async fn action_cost(
        &self,
        hold_id: Uuid,
        user_id: Uuid,
        action: HoldActionType,
    ) -> AppResult<Decimal> {
        let hold = self.load_hold(hold_id, user_id).await?;
        self.compute_cost(&hold, action).await
    }

    /// Execute a billable action on an open hold
    ///
    /// # Errors
    ///
    /// - `HoldNotFound` if the hold does not exist or belongs to another user
    /// - `HoldNotModifiable` if the hold is not open, including when a
    ///   concurrent request confirmed it first
    /// - `MissingField` / `Validation` for a missing or incomplete address
    /// - `Configuration` if the courier has no storage-surcharge config or
    ///   does not offer the action
    /// - `InsufficientFunds` if the wallet does not cover the cost
    /// - the store error when the confirmation fails on a hold that is still
    ///   open; the debit stays booked and a retry replays it
    #[instrument(skip(self, new_address))]
    pub async fn execute_action(
        &self,
        hold_id: Uuid,
        user_id: Uuid,
        action: HoldActionType,
        new_address: Option<Address>,
    ) -> AppResult<HoldActionResult> {
        let hold = self.load_hold(hold_id, user_id).await?;
        if !hold.status.is_modifiable() {
            warn!("Hold {} is {}, action {} refused", hold.id, hold.status, action);
            return Err(not_modifiable(&hold));
        }

        let new_address = if action.requires_new_address() {
            let address =
                new_address.ok_or_else(|| AppError::MissingField("new_address".to_string()))?;
            address.validate()?;
            Some(address)
        } else {
            None
        };

        let cost = self.compute_cost(&hold, action).await?;

        let mut payment: Option<(Uuid, String)> = None;
        if cost > Decimal::ZERO {
            let key = hold.action_idempotency_key(action);

            // A debit kept from an earlier unconfirmed attempt is replayed, not re-checked
            if self.ledger.find_movement(user_id, &key).await?.is_none() {
                let check = self.ledger.check_credit_before_booking(user_id, cost).await?;
                if !check.sufficient {
                    warn!(
                        "Hold {}: {} costs {}, balance {}",
                        hold.id, action, cost, check.current_balance
                    );
                    return Err(AppError::InsufficientFunds {
                        required: cost.to_string(),
                        available: check.current_balance.to_string(),
                    });
                }
            }

            let metadata = LedgerMetadata::reference(hold.id.to_string()).with_description(
                format!("Giacenza {} on shipment {}", action, hold.shipment_id),
            );
            let movement = self
                .ledger
                .debit_as(user_id, cost, &key, WalletTransactionType::GiacenzaAction, metadata)
                .await?;
            payment = Some((movement.transaction_id, key));
        }

        let confirmation = HoldActionConfirmation {
            hold_id: hold.id,
            action_type: action,
            action_cost: cost,
            new_address,
            wallet_transaction_id: payment.as_ref().map(|(id, _)| *id),
        };

        let failure = match self.holds.confirm_action(&confirmation).await {
            Ok(Some(updated)) => {
                info!(
                    "Hold {} confirmed with {} for {}",
                    updated.id, action, cost
                );
                return Ok(HoldActionResult {
                    wallet_transaction_id: updated.wallet_transaction_id,
                    hold: updated,
                });
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        let Some((tx_id, key)) = payment else {
            return match failure {
                Some(e) => Err(e),
                None => {
                    let current = self.reload(hold.id).await?;
                    Err(not_modifiable(&current))
                }
            };
        };

        // The outcome of a failed confirmation is unknown until the hold is read back
        let current = match self.reload(hold.id).await {
            Ok(current) => current,
            Err(reload_err) => {
                error!(
                    "Hold {} unreadable after settlement, debit {} kept: {}",
                    hold.id, key, reload_err
                );
                return Err(failure.unwrap_or(reload_err));
            }
        };

        if current.wallet_transaction_id == Some(tx_id) {
            info!("Hold {} confirmed with debit {}", hold.id, tx_id);
            return Ok(HoldActionResult {
                wallet_transaction_id: Some(tx_id),
                hold: current,
            });
        }

        if let Some(e) = failure {
            if current.status.is_modifiable() && current.updated_at == hold.updated_at {
                warn!(
                    "Hold {} not confirmed, debit {} kept for the retry: {}",
                    hold.id, key, e
                );
                return Err(e);
            }
        }

        warn!("Hold {} changed to {} during settlement", hold.id, current.status);
        self.refund(user_id, cost, &key, hold.id).await;
        Err(not_modifiable(&current))
    }

    async fn reload(&self, hold_id: Uuid) -> AppResult<ShipmentHold> {
        self.holds
            .find_by_id(hold_id)
            .await?
            .ok_or_else(|| AppError::HoldNotFound(hold_id.to_string()))
    }

    async fn load_hold(&self, hold_id: Uuid, user_id: Uuid) -> AppResult<ShipmentHold> {
        match self.holds.find_by_id(hold_id).await? {
            Some(hold) if hold.user_id == user_id => Ok(hold),
            Some(_) => {
                warn!("Hold {} requested by non-owner {}", hold_id, user_id);
                Err(AppError::HoldNotFound(hold_id.to_string()))
            }
            None => Err(AppError::HoldNotFound(hold_id.to_string())),
        }
    }

    async fn compute_cost(&self, hold: &ShipmentHold, action: HoldActionType) -> AppResult<Decimal> {
        let config = self
            .holds
            .find_storage_config(&hold.courier_code)
            .await?
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no storage surcharge configuration for courier {}",
                    hold.courier_code
                ))
            })?;

        config
            .action_cost(action, hold.shipment_cost)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "courier {} does not offer {}",
                    hold.courier_code, action
                ))
            })
    }

    async fn refund(&self, user_id: Uuid, amount: Decimal, debit_key: &str, hold_id: Uuid) {
        let key = format!("{}:refund", debit_key);
        let metadata = LedgerMetadata::reference(hold_id.to_string())
            .with_description("Giacenza action not confirmed");

        match self
            .ledger
            .credit_as(user_id, amount, &key, WalletTransactionType::Refund, metadata)
            .await
        {
            Ok(movement) => info!(
                "Refunded {} to {} for hold {}, balance {}",
                amount, user_id, hold_id, movement.new_balance
            ),
            Err(e) => error!(
                "Refund {} for hold {} failed, needs manual reconciliation: {}",
                key, hold_id, e
            ),
        }
    }
}

fn not_modifiable(hold: &ShipmentHold) -> AppError {
    AppError::HoldNotModifiable {
        id: hold.id.to_string(),
        status: hold.status.to_string(),
    }
}
