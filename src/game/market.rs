//! Player-to-player marketplace.
//!
//! Listing an item moves it out of the seller's inventory into a listing
//! record, so a listed item can never be equipped. A sale moves cash and the
//! item between both players and deletes the listing in a single commit.

use log::info;
use serde::Serialize;

use crate::game::catalog::{GameAction, ItemDef};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::locks::EntityKey;
use crate::game::storage::{keys, WriteBatch};
use crate::game::types::{InventoryEntry, ListingRecord, PlayerRecord, LISTING_SCHEMA_VERSION};
use crate::game::views::{round2, PlayerView};
use crate::logutil::escape_log;

#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub id: u64,
    pub seller_id: i64,
    pub seller_name: String,
    pub item_id: String,
    pub item: Option<ItemDef>,
    pub price: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOutcome {
    pub player: PlayerView,
    pub inventory: Vec<InventoryEntry>,
    pub my_listings: Vec<ListingRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    pub player: PlayerView,
    pub inventory: Vec<InventoryEntry>,
    pub item_id: String,
    pub price: f64,
    pub seller_received: f64,
}

impl Engine {
    pub fn commission_for(&self, seller: &PlayerRecord) -> f64 {
        if seller.is_vip(self.now()) {
            self.tuning.vip_market_commission
        } else {
            self.tuning.market_commission
        }
    }

    pub(crate) fn listings_of(&self, telegram_id: i64) -> GameResult<Vec<ListingRecord>> {
        Ok(self
            .store
            .list_listings()?
            .into_iter()
            .filter(|l| l.seller_id == telegram_id)
            .collect())
    }

    /// Newest listings first, at most 100.
    pub fn market(&self) -> GameResult<Vec<ListingView>> {
        let mut listings = self.store.list_listings()?;
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        listings.truncate(100);
        let mut out = Vec::with_capacity(listings.len());
        for l in listings {
            let seller_name = self
                .store
                .find_player(l.seller_id)?
                .map(|p| p.username)
                .unwrap_or_default();
            out.push(ListingView {
                id: l.id,
                seller_id: l.seller_id,
                seller_name,
                item: self.catalog.item(&l.item_id).ok().cloned(),
                item_id: l.item_id,
                price: l.price,
                created_at: l.created_at,
            });
        }
        Ok(out)
    }

    pub fn market_sell(&self, telegram_id: i64, item_id: &str, price: f64) -> GameResult<MarketOutcome> {
        if !price.is_finite() || price < self.tuning.market_min_price {
            return Err(GameError::PriceTooLow {
                min: self.tuning.market_min_price,
            });
        }
        let listing_id = self.store.next_id()?;
        let ((), player) = self.with_player(telegram_id, |txn, batch| {
            let entry = txn.player.inventory_entry(item_id).ok_or(GameError::NotOwned)?;
            if entry.equipped {
                return Err(GameError::ItemEquipped);
            }
            txn.player.inventory.retain(|e| e.item_id != item_id);
            batch.put_listing(&ListingRecord {
                id: listing_id,
                seller_id: telegram_id,
                item_id: item_id.to_string(),
                price: round2(price),
                created_at: self.now(),
                schema_version: LISTING_SCHEMA_VERSION,
            })?;
            Ok(())
        })?;
        info!("market: player {} listed {} for {:.2}", telegram_id, escape_log(item_id), price);
        Ok(MarketOutcome {
            player: self.view(&player),
            inventory: player.inventory,
            my_listings: self.listings_of(telegram_id)?,
        })
    }

    /// Buy a listing. Of two concurrent buyers exactly one succeeds; the
    /// other observes `ListingGone`.
    pub fn market_buy(&self, telegram_id: i64, listing_id: u64) -> GameResult<PurchaseOutcome> {
        let seller_id = self
            .store
            .find_listing(listing_id)?
            .ok_or(GameError::ListingGone)?
            .seller_id;
        if seller_id == telegram_id {
            return Err(GameError::InvalidRequest("Cannot buy your own listing".into()));
        }
        let locks = self.locks.acquire_all(vec![
            EntityKey::Player(telegram_id),
            EntityKey::Player(seller_id),
            EntityKey::Listing(listing_id),
        ])?;
        let listing = self.store.find_listing(listing_id)?.ok_or(GameError::ListingGone)?;
        let mut buyer = self.touch(&locks, telegram_id)?;
        let mut seller = self.touch(&locks, seller_id)?;

        if buyer.player.owns_item(&listing.item_id) {
            return Err(GameError::AlreadyOwned);
        }
        self.try_spend(&mut buyer.player, listing.price)?;
        buyer.player.inventory.push(InventoryEntry {
            item_id: listing.item_id.clone(),
            equipped: false,
            acquired_at: self.now(),
        });
        let received = round2(listing.price * (1.0 - self.commission_for(&seller.player)));
        seller.player.cash += received;
        seller.player.stats.market_sales += 1;
        self.track(&mut seller, GameAction::MarketSale, 1.0)?;

        let mut batch = WriteBatch::new();
        batch.remove(keys::listing(listing.id));
        let buyer = self.stage(&mut batch, buyer)?;
        self.stage(&mut batch, seller)?;
        self.store.commit(batch)?;
        info!(
            "market: listing {} ({}) sold by {} to {} for {:.2}",
            listing.id,
            escape_log(&listing.item_id),
            seller_id,
            telegram_id,
            listing.price
        );
        Ok(PurchaseOutcome {
            player: self.view(&buyer),
            inventory: buyer.inventory,
            item_id: listing.item_id,
            price: listing.price,
            seller_received: received,
        })
    }

    /// Withdraw a listing and return the item. No commission is charged.
    pub fn market_cancel(&self, telegram_id: i64, listing_id: u64) -> GameResult<MarketOutcome> {
        let locks = self
            .locks
            .acquire_all(vec![EntityKey::Player(telegram_id), EntityKey::Listing(listing_id)])?;
        let listing = self.store.find_listing(listing_id)?.ok_or(GameError::ListingGone)?;
        if listing.seller_id != telegram_id {
            return Err(GameError::NotOwned);
        }
        let mut txn = self.touch(&locks, telegram_id)?;
        if !txn.player.owns_item(&listing.item_id) {
            txn.player.inventory.push(InventoryEntry {
                item_id: listing.item_id.clone(),
                equipped: false,
                acquired_at: self.now(),
            });
        }
        let mut batch = WriteBatch::new();
        batch.remove(keys::listing(listing.id));
        let player = self.stage(&mut batch, txn)?;
        self.store.commit(batch)?;
        Ok(MarketOutcome {
            player: self.view(&player),
            inventory: player.inventory,
            my_listings: self.listings_of(telegram_id)?,
        })
    }
}
