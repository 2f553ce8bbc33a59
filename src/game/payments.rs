//! Stars and TON purchases.
//!
//! A purchase starts as a pending [`PaymentRecord`]. Confirmation settles it
//! exactly once: the provider transaction id is written under `paytx:` in the
//! same batch that grants the package, so a repeated confirmation finds the
//! marker and is acknowledged without granting again.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::catalog::{PackageGrant, PaymentPackage};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::locks::EntityKey;
use crate::game::storage::WriteBatch;
use crate::game::types::{PaymentMethod, PaymentRecord, PaymentStatus, PlayerRecord, PAYMENT_SCHEMA_VERSION};
use crate::game::views::PlayerView;
use crate::logutil::escape_log;

const NANO_PER_TON: f64 = 1e9;

/// An incoming transfer seen on the receiving wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TonTransfer {
    pub hash: String,
    pub value_nano: u64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Settlement {
    /// The package was granted by this call.
    Ok { player: PlayerView, package_id: String },
    /// This transaction was settled earlier; nothing was granted.
    AlreadyProcessed { payment_id: String },
    /// No matching on-chain transfer yet.
    Pending,
}

/// TON comment tying a transfer to a player and package.
pub fn ton_comment(telegram_id: i64, package_id: &str, nonce: &Uuid) -> String {
    let hex = nonce.simple().to_string();
    format!("se_{}_{}_{}", telegram_id, package_id, &hex[..8])
}

/// First transfer that carries `comment` and pays at least `min_nano`.
pub fn match_transfer<'a>(transfers: &'a [TonTransfer], comment: &str, min_nano: u64) -> Option<&'a TonTransfer> {
    transfers
        .iter()
        .find(|t| t.comment.contains(comment) && t.value_nano > 0 && t.value_nano >= min_nano)
}

impl Engine {
    /// Open a pending payment for `package_id`.
    pub fn create_payment(&self, telegram_id: i64, package_id: &str, method: PaymentMethod) -> GameResult<PaymentRecord> {
        self.store.get_player(telegram_id)?;
        let package = self.catalog.package(package_id)?;
        let nonce = Uuid::new_v4();
        let (amount, amount_nano, comment) = match method {
            PaymentMethod::Stars => (f64::from(package.stars), 0, nonce.simple().to_string()),
            PaymentMethod::Ton => {
                let ton = package
                    .ton
                    .ok_or_else(|| GameError::InvalidRequest("TON price not set for this package".into()))?;
                (ton, (ton * NANO_PER_TON).round() as u64, ton_comment(telegram_id, package_id, &nonce))
            }
        };
        let payment = PaymentRecord {
            id: nonce.simple().to_string(),
            telegram_id,
            package_id: package.id.clone(),
            method,
            amount,
            amount_nano,
            comment,
            status: PaymentStatus::Pending,
            provider_tx: None,
            created_at: self.now(),
            completed_at: None,
            schema_version: PAYMENT_SCHEMA_VERSION,
        };
        let _locks = self.locks.acquire_all(vec![EntityKey::Payment(payment.id.clone())])?;
        let mut batch = WriteBatch::new();
        batch.put_payment(&payment)?;
        self.store.commit(batch)?;
        info!(
            "payments: opened {:?} invoice {} for player {} ({})",
            method, payment.id, telegram_id, package.id
        );
        Ok(payment)
    }

    pub(crate) fn apply_grant(&self, player: &mut PlayerRecord, package: &PaymentPackage) -> GameResult<()> {
        match &package.grant {
            PackageGrant::Vip { days } => self.extend_vip(player, *days),
            PackageGrant::Cash { amount } => player.cash += amount,
            PackageGrant::Cases { cases } => {
                for grant in cases {
                    for _ in 0..grant.count {
                        self.grant_case(player, &grant.case_id)?;
                    }
                }
            }
            PackageGrant::SeasonPremium => player.season.premium = true,
        }
        Ok(())
    }

    /// Settle `payment_id` against `provider_tx` once `check` accepts it.
    fn settle(
        &self,
        payment_id: &str,
        provider_tx: &str,
        check: impl FnOnce(&PaymentRecord) -> GameResult<()>,
    ) -> GameResult<Settlement> {
        if let Some(done) = self.store.payment_for_tx(provider_tx)? {
            return Ok(Settlement::AlreadyProcessed { payment_id: done });
        }
        let owner = self
            .store
            .find_payment(payment_id)?
            .ok_or_else(|| GameError::PaymentUnverified("unknown invoice".into()))?
            .telegram_id;
        let locks = self.locks.acquire_all(vec![
            EntityKey::Player(owner),
            EntityKey::Payment(payment_id.to_string()),
        ])?;
        let mut payment = self
            .store
            .find_payment(payment_id)?
            .ok_or_else(|| GameError::PaymentUnverified("unknown invoice".into()))?;
        if payment.status == PaymentStatus::Completed || self.store.payment_for_tx(provider_tx)?.is_some() {
            return Ok(Settlement::AlreadyProcessed {
                payment_id: payment.id,
            });
        }
        check(&payment)?;

        let package = self.catalog.package(&payment.package_id)?.clone();
        let mut txn = self.touch(&locks, owner)?;
        self.apply_grant(&mut txn.player, &package)?;
        payment.status = PaymentStatus::Completed;
        payment.provider_tx = Some(provider_tx.to_string());
        payment.completed_at = Some(self.now());

        let mut batch = WriteBatch::new();
        batch.put_payment(&payment)?;
        batch.put_payment_tx(provider_tx, &payment.id)?;
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        info!(
            "payments: settled {} ({}) for player {} via {}",
            payment.id,
            package.id,
            owner,
            escape_log(provider_tx)
        );
        Ok(Settlement::Ok {
            player: self.view(&player),
            package_id: package.id,
        })
    }

    /// Confirm a Stars charge reported by the bot.
    pub fn confirm_stars(&self, payment_id: &str, charge_id: &str, total_amount: u32) -> GameResult<Settlement> {
        if charge_id.trim().is_empty() {
            return Err(GameError::InvalidRequest("charge id required".into()));
        }
        self.settle(payment_id, charge_id, |payment| {
            if payment.method != PaymentMethod::Stars {
                return Err(GameError::PaymentUnverified("not a Stars invoice".into()));
            }
            if f64::from(total_amount) < payment.amount {
                warn!(
                    "payments: stars amount mismatch on {}: got {}, expected {}",
                    payment.id, total_amount, payment.amount
                );
                return Err(GameError::PaymentUnverified("amount mismatch".into()));
            }
            Ok(())
        })
    }

    /// Look for the TON transfer that pays `payment_id` and settle it.
    ///
    /// Transfers below `tolerance × expected` are ignored; no match leaves
    /// the payment pending.
    pub fn confirm_ton(
        &self,
        telegram_id: i64,
        payment_id: &str,
        transfers: &[TonTransfer],
        tolerance: f64,
    ) -> GameResult<Settlement> {
        let payment = self
            .store
            .find_payment(payment_id)?
            .ok_or_else(|| GameError::PaymentUnverified("unknown invoice".into()))?;
        if payment.telegram_id != telegram_id || payment.method != PaymentMethod::Ton {
            return Err(GameError::PaymentUnverified("invoice does not match".into()));
        }
        if payment.status == PaymentStatus::Completed {
            return Ok(Settlement::AlreadyProcessed {
                payment_id: payment.id,
            });
        }
        let min_nano = (payment.amount_nano as f64 * tolerance).floor() as u64;
        let Some(transfer) = match_transfer(transfers, &payment.comment, min_nano) else {
            return Ok(Settlement::Pending);
        };
        self.settle(payment_id, &transfer.hash, |_| Ok(()))
    }

    pub fn payment(&self, payment_id: &str) -> GameResult<PaymentRecord> {
        self.store
            .find_payment(payment_id)?
            .ok_or_else(|| GameError::NotFound(format!("payment {}", payment_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(hash: &str, value_nano: u64, comment: &str) -> TonTransfer {
        TonTransfer {
            hash: hash.into(),
            value_nano,
            comment: comment.into(),
        }
    }

    #[test]
    fn comment_embeds_player_and_package() {
        let nonce = Uuid::nil();
        assert_eq!(ton_comment(42, "vip_week", &nonce), "se_42_vip_week_00000000");
    }

    #[test]
    fn underpaid_transfer_is_skipped() {
        let transfers = vec![
            transfer("a", 400_000_000, "se_1_vip_week_abcd1234"),
            transfer("b", 480_000_000, "se_1_vip_week_abcd1234"),
        ];
        let found = match_transfer(&transfers, "se_1_vip_week_abcd1234", 475_000_000).unwrap();
        assert_eq!(found.hash, "b");
        assert!(match_transfer(&transfers, "se_2_vip_week_ffff0000", 1).is_none());
    }
}
