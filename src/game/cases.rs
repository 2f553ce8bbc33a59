//! Loot cases: purchase, opening and the duplicate policy.
//!
//! Drops are weighted (`weight / total`). Rare and better entries get their
//! weight boosted by the lootbox_master talent. An item the player already
//! owns is re-rolled; when every re-roll lands on a duplicate the player is
//! paid `price × ratio × rarity multiplier` instead.

use serde::Serialize;

use crate::game::catalog::{CaseDef, Catalog, GameAction, ItemDef, TalentEffect};
use crate::game::engine::{Engine, PlayerTxn};
use crate::game::errors::{GameError, GameResult};
use crate::game::prestige::TalentBonuses;
use crate::game::rng::RandomSource;
use crate::game::types::{InventoryEntry, OwnedCase};
use crate::game::views::{round2, PlayerView};

/// Effective draw weights for a case, with rare+ entries boosted by `boost_pct`.
pub fn loot_weights(catalog: &Catalog, case: &CaseDef, boost_pct: f64) -> Vec<f64> {
    case.loot
        .iter()
        .map(|entry| {
            let weight = entry.weight as f64;
            let rare = catalog
                .item(&entry.item_id)
                .map(|i| i.rarity.is_rare_or_better())
                .unwrap_or(false);
            if rare && boost_pct > 0.0 {
                weight * (1.0 + boost_pct / 100.0)
            } else {
                weight
            }
        })
        .collect()
}

/// One weighted draw from `case`; returns the loot index.
pub fn draw(weights: &[f64], rng: &mut dyn RandomSource) -> GameResult<usize> {
    rng.weighted_index(weights)
        .ok_or_else(|| GameError::Content("case has no drawable loot".into()))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaseDrop {
    pub won_item_id: Option<String>,
    pub cash_compensation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOpenOutcome {
    pub player: PlayerView,
    pub won_item_id: Option<String>,
    pub won_item: Option<ItemDef>,
    pub cash_compensation: f64,
    pub inventory: Vec<InventoryEntry>,
    pub player_cases: Vec<OwnedCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseBuyOutcome {
    pub player: PlayerView,
    pub player_cases: Vec<OwnedCase>,
}

impl Engine {
    /// Roll a case for the player in `txn` and apply the drop.
    fn roll_case(&self, txn: &mut PlayerTxn, case: &CaseDef) -> GameResult<CaseDrop> {
        let boost = TalentBonuses::for_player(&self.catalog, &txn.player).get(TalentEffect::LootboxMaster);
        let weights = loot_weights(&self.catalog, case, boost);
        let attempts = self.tuning.case_reroll_attempts.max(1);
        let player = &txn.player;
        let won = self.roll(|rng| -> GameResult<Option<usize>> {
            for _ in 0..attempts {
                let idx = draw(&weights, rng)?;
                if !player.owns_item(&case.loot[idx].item_id) {
                    return Ok(Some(idx));
                }
            }
            Ok(None)
        })?;

        let drop = match won {
            Some(idx) => {
                let item_id = case.loot[idx].item_id.clone();
                txn.player.inventory.push(InventoryEntry {
                    item_id: item_id.clone(),
                    equipped: false,
                    acquired_at: self.now(),
                });
                CaseDrop {
                    won_item_id: Some(item_id),
                    cash_compensation: 0.0,
                }
            }
            None => {
                let idx = self.roll(|rng| draw(&weights, rng))?;
                let item = self.catalog.item(&case.loot[idx].item_id)?;
                let multiplier = self
                    .catalog
                    .rarity(item.rarity)
                    .map(|r| r.compensation_multiplier)
                    .unwrap_or(1.0);
                let ratio = case
                    .duplicate_compensation_ratio
                    .unwrap_or(self.tuning.duplicate_compensation_ratio);
                let cash = round2(case.price * ratio * multiplier);
                txn.player.cash += cash;
                CaseDrop {
                    won_item_id: None,
                    cash_compensation: cash,
                }
            }
        };
        txn.player.stats.cases_opened += 1;
        self.track(txn, GameAction::CaseOpen, 1.0)?;
        Ok(drop)
    }

    fn case_outcome(&self, player: crate::game::types::PlayerRecord, drop: CaseDrop) -> CaseOpenOutcome {
        CaseOpenOutcome {
            player: self.view(&player),
            won_item: drop
                .won_item_id
                .as_deref()
                .and_then(|id| self.catalog.item(id).ok().cloned()),
            won_item_id: drop.won_item_id,
            cash_compensation: drop.cash_compensation,
            inventory: player.inventory,
            player_cases: player.cases,
        }
    }

    pub fn buy_case(&self, telegram_id: i64, case_id: &str) -> GameResult<CaseBuyOutcome> {
        let case = self.catalog.case(case_id)?.clone();
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            self.try_spend(&mut txn.player, case.price)?;
            self.grant_case(&mut txn.player, &case.id)?;
            Ok(())
        })?;
        Ok(CaseBuyOutcome {
            player: self.view(&player),
            player_cases: player.cases,
        })
    }

    /// Open an owned, unopened case instance.
    pub fn open_case(&self, telegram_id: i64, player_case_id: u64) -> GameResult<CaseOpenOutcome> {
        let (drop, player) = self.with_player(telegram_id, |txn, _| {
            let pos = txn
                .player
                .cases
                .iter()
                .position(|c| c.id == player_case_id)
                .ok_or_else(|| GameError::NotFound(format!("case {}", player_case_id)))?;
            let case = self
                .catalog
                .case(&txn.player.cases[pos].case_id)
                .map_err(|_| GameError::InvalidRequest("This case is opened elsewhere".into()))?
                .clone();
            txn.player.cases.remove(pos);
            self.roll_case(txn, &case)
        })?;
        Ok(self.case_outcome(player, drop))
    }

    /// Buy and open in one step.
    pub fn spin_case(&self, telegram_id: i64, case_id: &str) -> GameResult<CaseOpenOutcome> {
        let case = self.catalog.case(case_id)?.clone();
        let (drop, player) = self.with_player(telegram_id, |txn, _| {
            self.try_spend(&mut txn.player, case.price)?;
            self.roll_case(txn, &case)
        })?;
        Ok(self.case_outcome(player, drop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;

    #[test]
    fn boost_only_touches_rare_entries() {
        let catalog = load_builtin().unwrap();
        let case = catalog.case("case_basic").unwrap();
        let plain = loot_weights(&catalog, case, 0.0);
        let boosted = loot_weights(&catalog, case, 15.0);
        for (entry, (a, b)) in case.loot.iter().zip(plain.iter().zip(boosted.iter())) {
            let rare = catalog.item(&entry.item_id).unwrap().rarity.is_rare_or_better();
            if rare {
                assert!((b - a * 1.15).abs() < 1e-9);
            } else {
                assert_eq!(a, b);
            }
        }
    }
}
