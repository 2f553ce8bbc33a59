//! Cosmetic business skins: skin cases, the VIP daily roll and equipping.
//!
//! A roll first picks a rarity by walking the rarity table in order, then a
//! skin uniformly within that rarity. The VIP roll multiplies the chance of
//! rare and better tiers by a boost factor before normalizing.

use serde::{Deserialize, Serialize};

use crate::game::catalog::{Catalog, SkinCaseDef, SkinDef, SkinRarityDef};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::rng::RandomSource;
use crate::game::types::OwnedCase;
use crate::game::views::PlayerView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkinCaseKind {
    #[default]
    #[serde(alias = "normal")]
    Regular,
    Vip,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkinsConfig {
    pub skins: Vec<SkinDef>,
    pub rarities: Vec<SkinRarityDef>,
    pub case: SkinCaseDef,
    pub case_vip: SkinCaseDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkinDrop {
    pub skin_id: String,
    pub skin: SkinDef,
    pub rarity: SkinRarityDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkinOpenOutcome {
    pub player: PlayerView,
    pub results: Vec<SkinDrop>,
    pub player_skins: std::collections::BTreeMap<String, u32>,
    pub player_cases: Vec<OwnedCase>,
}

/// Rarity chances, rare and better multiplied by `boost` and renormalized.
pub fn rarity_weights(catalog: &Catalog, boost: f64) -> Vec<f64> {
    catalog
        .monetization
        .skin_rarities
        .iter()
        .map(|r| {
            if boost > 1.0 && r.rarity.is_rare_or_better() {
                r.chance * boost
            } else {
                r.chance
            }
        })
        .collect()
}

/// Roll one skin. Returns `None` only for an empty table.
pub fn roll_skin<'a>(catalog: &'a Catalog, boost: f64, rng: &mut dyn RandomSource) -> Option<(&'a SkinDef, &'a SkinRarityDef)> {
    let weights = rarity_weights(catalog, boost);
    let tier = &catalog.monetization.skin_rarities[rng.weighted_index(&weights)?];
    let pool: Vec<&SkinDef> = catalog
        .monetization
        .skins
        .iter()
        .filter(|s| s.rarity == tier.rarity)
        .collect();
    if pool.is_empty() {
        return None;
    }
    Some((pool[rng.below(pool.len())], tier))
}

impl Engine {
    pub fn skins_config(&self) -> SkinsConfig {
        let m = &self.catalog.monetization;
        SkinsConfig {
            skins: m.skins.clone(),
            rarities: m.skin_rarities.clone(),
            case: m.skin_case.clone(),
            case_vip: m.skin_case_vip.clone(),
        }
    }

    fn draw_skin(&self, boost: f64) -> GameResult<SkinDrop> {
        let (skin, rarity) = self
            .roll(|rng| roll_skin(&self.catalog, boost, rng))
            .ok_or_else(|| GameError::Content("skin table is empty".into()))?;
        Ok(SkinDrop {
            skin_id: skin.id.clone(),
            skin: skin.clone(),
            rarity: rarity.clone(),
        })
    }

    /// Open `count` skin cases (clamped to 1..=max), or the VIP daily roll.
    pub fn open_skin_case(&self, telegram_id: i64, kind: SkinCaseKind, count: u32) -> GameResult<SkinOpenOutcome> {
        let count = count.clamp(1, self.tuning.max_skin_open.max(1)) as usize;
        let (results, player) = self.with_player(telegram_id, |txn, _| {
            let mut results = Vec::new();
            match kind {
                SkinCaseKind::Vip => {
                    if !txn.player.is_vip(self.now()) {
                        return Err(GameError::VipRequired);
                    }
                    let today = self.clock.today();
                    if txn.player.last_vip_skin_claim == Some(today) {
                        return Err(GameError::AlreadyClaimed);
                    }
                    txn.player.last_vip_skin_claim = Some(today);
                    results.push(self.draw_skin(self.tuning.vip_skin_rare_boost)?);
                }
                SkinCaseKind::Regular => {
                    let skin_case = &self.catalog.monetization.skin_case.id;
                    let mut opened = 0;
                    txn.player.cases.retain(|c| {
                        if opened < count && &c.case_id == skin_case {
                            opened += 1;
                            false
                        } else {
                            true
                        }
                    });
                    if opened == 0 {
                        return Err(GameError::NotFound("skin case".into()));
                    }
                    for _ in 0..opened {
                        results.push(self.draw_skin(1.0)?);
                    }
                }
            }
            for drop in &results {
                *txn.player.skins.entry(drop.skin_id.clone()).or_insert(0) += 1;
            }
            Ok(results)
        })?;
        Ok(SkinOpenOutcome {
            player: self.view(&player),
            results,
            player_skins: player.skins,
            player_cases: player.cases,
        })
    }

    /// Equip an owned skin on a business; `"none"` clears the slot.
    pub fn equip_skin(
        &self,
        telegram_id: i64,
        business_id: &str,
        skin_id: &str,
    ) -> GameResult<std::collections::BTreeMap<String, String>> {
        self.catalog.business(business_id)?;
        let (equipped, _) = self.with_player(telegram_id, |txn, _| {
            if skin_id == "none" {
                txn.player.equipped_skins.remove(business_id);
            } else {
                self.catalog.skin(skin_id)?;
                if !txn.player.skins.contains_key(skin_id) {
                    return Err(GameError::NotOwned);
                }
                txn.player
                    .equipped_skins
                    .insert(business_id.to_string(), skin_id.to_string());
            }
            Ok(txn.player.equipped_skins.clone())
        })?;
        Ok(equipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn boost_shifts_odds_toward_rare() {
        let catalog = load_builtin().unwrap();
        let base = rarity_weights(&catalog, 1.0);
        let boosted = rarity_weights(&catalog, 2.0);
        let share = |w: &[f64]| {
            let rare: f64 = catalog
                .monetization
                .skin_rarities
                .iter()
                .zip(w)
                .filter(|(r, _)| r.rarity.is_rare_or_better())
                .map(|(_, w)| *w)
                .sum();
            rare / w.iter().sum::<f64>()
        };
        assert!(share(&boosted) > share(&base));
    }

    #[test]
    fn rolled_skin_matches_its_tier() {
        let catalog = load_builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let (skin, tier) = roll_skin(&catalog, 1.0, &mut rng).unwrap();
            assert_eq!(skin.rarity, tier.rarity);
        }
    }
}
