//! Inventory, equipment slots and the shop.

use serde::Serialize;

use crate::game::catalog::{BonusType, Catalog, GameAction, Slot};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::types::{InventoryEntry, PlayerRecord};
use crate::game::views::PlayerView;

/// Bonuses summed across equipped items.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct EquipmentBonuses {
    pub fear: f64,
    pub respect: f64,
    pub income_pct: f64,
    /// Reduction points; each point removes `equip_suspicion_unit` suspicion/s.
    pub suspicion_reduce: f64,
}

pub fn equipment_bonuses(catalog: &Catalog, player: &PlayerRecord) -> EquipmentBonuses {
    let mut bonuses = EquipmentBonuses::default();
    for entry in player.inventory.iter().filter(|e| e.equipped) {
        let Ok(item) = catalog.item(&entry.item_id) else {
            continue;
        };
        match item.bonus_type {
            BonusType::Fear => bonuses.fear += item.bonus,
            BonusType::Respect => bonuses.respect += item.bonus,
            BonusType::Income => bonuses.income_pct += item.bonus,
            BonusType::SuspicionReduce => bonuses.suspicion_reduce += item.bonus,
            BonusType::None => {}
        }
    }
    bonuses
}

/// The item equipped in `slot`, if any.
pub fn equipped_in(catalog: &Catalog, player: &PlayerRecord, slot: Slot) -> Option<String> {
    player
        .inventory
        .iter()
        .filter(|e| e.equipped)
        .find(|e| catalog.item(&e.item_id).map(|i| i.slot == slot).unwrap_or(false))
        .map(|e| e.item_id.clone())
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub slot: Slot,
    pub item_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Character {
    pub slots: Vec<SlotView>,
    pub bonuses: EquipmentBonuses,
    pub inventory: Vec<InventoryEntry>,
}

pub fn character(catalog: &Catalog, player: &PlayerRecord) -> Character {
    Character {
        slots: Slot::ALL
            .iter()
            .map(|slot| SlotView {
                slot: *slot,
                item_id: equipped_in(catalog, player, *slot),
            })
            .collect(),
        bonuses: equipment_bonuses(catalog, player),
        inventory: player.inventory.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryOutcome {
    pub player: PlayerView,
    pub character: Character,
}

impl Engine {
    fn inventory_outcome(&self, player: &PlayerRecord) -> InventoryOutcome {
        InventoryOutcome {
            player: self.view(player),
            character: character(&self.catalog, player),
        }
    }

    pub fn shop_buy(&self, telegram_id: i64, item_id: &str) -> GameResult<InventoryOutcome> {
        let item = self.catalog.item(item_id)?.clone();
        if !item.purchasable() {
            return Err(GameError::InvalidRequest("This item is not sold in the shop".into()));
        }
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            if txn.player.owns_item(&item.id) {
                return Err(GameError::AlreadyOwned);
            }
            self.try_spend(&mut txn.player, item.price)?;
            txn.player.inventory.push(InventoryEntry {
                item_id: item.id.clone(),
                equipped: false,
                acquired_at: self.now(),
            });
            self.track(txn, GameAction::ShopBuy, 1.0)
        })?;
        Ok(self.inventory_outcome(&player))
    }

    /// Equip an owned item, displacing whatever sits in its slot.
    pub fn equip(&self, telegram_id: i64, item_id: &str) -> GameResult<InventoryOutcome> {
        let slot = self.catalog.item(item_id)?.slot;
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            if !txn.player.owns_item(item_id) {
                return Err(GameError::NotOwned);
            }
            let current = equipped_in(&self.catalog, &txn.player, slot);
            for entry in txn.player.inventory.iter_mut() {
                if Some(&entry.item_id) == current.as_ref() {
                    entry.equipped = false;
                }
                if entry.item_id == item_id {
                    entry.equipped = true;
                }
            }
            Ok(())
        })?;
        Ok(self.inventory_outcome(&player))
    }

    pub fn unequip(&self, telegram_id: i64, slot: Slot) -> GameResult<InventoryOutcome> {
        let ((), player) = self.with_player(telegram_id, |txn, _| {
            let current = equipped_in(&self.catalog, &txn.player, slot);
            for entry in txn.player.inventory.iter_mut() {
                if Some(&entry.item_id) == current.as_ref() {
                    entry.equipped = false;
                }
            }
            Ok(())
        })?;
        Ok(self.inventory_outcome(&player))
    }

    pub fn character(&self, telegram_id: i64) -> GameResult<Character> {
        let player = self.store.get_player(telegram_id)?;
        Ok(character(&self.catalog, &player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;

    fn owned(item_id: &str, equipped: bool) -> InventoryEntry {
        InventoryEntry {
            item_id: item_id.into(),
            equipped,
            acquired_at: 0,
        }
    }

    #[test]
    fn bonuses_sum_equipped_items_only() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        p.inventory.push(owned("hat_mask", true));
        p.inventory.push(owned("jacket_gold", true));
        p.inventory.push(owned("acc_glasses", true));
        p.inventory.push(owned("weapon_ak", false));
        let b = equipment_bonuses(&catalog, &p);
        assert_eq!(b.fear, 3.0);
        assert_eq!(b.income_pct, 10.0);
        assert_eq!(b.suspicion_reduce, 2.0);
    }

    #[test]
    fn character_lists_every_slot() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        p.inventory.push(owned("car_old", true));
        let c = character(&catalog, &p);
        assert_eq!(c.slots.len(), 5);
        let car = c.slots.iter().find(|s| s.slot == Slot::Car).unwrap();
        assert_eq!(car.item_id.as_deref(), Some("car_old"));
    }
}
