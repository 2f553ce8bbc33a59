use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::IVec;

use crate::game::errors::{GameError, GameResult};
use crate::game::types::{
    BossRecord, GangRecord, HeistRecord, ListingRecord, PaymentRecord, PendingCredit, PlayerRecord,
    TerritoryRecord, TournamentEntry, WarRecord, BOSS_SCHEMA_VERSION, CREDIT_SCHEMA_VERSION,
    GANG_SCHEMA_VERSION, HEIST_SCHEMA_VERSION, LISTING_SCHEMA_VERSION, PAYMENT_SCHEMA_VERSION,
    PLAYER_SCHEMA_VERSION, TERRITORY_SCHEMA_VERSION, TOURNAMENT_SCHEMA_VERSION, WAR_SCHEMA_VERSION,
};

const TREE_PRIMARY: &str = "shadow_empire";

/// A stored record with a schema version the store verifies on read.
pub trait Versioned: Serialize + DeserializeOwned {
    const ENTITY: &'static str;
    const VERSION: u8;
    fn schema_version(&self) -> u8;
}

macro_rules! versioned {
    ($ty:ty, $entity:literal, $version:ident) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $entity;
            const VERSION: u8 = $version;
            fn schema_version(&self) -> u8 {
                self.schema_version
            }
        }
    };
}

versioned!(PlayerRecord, "player", PLAYER_SCHEMA_VERSION);
versioned!(GangRecord, "gang", GANG_SCHEMA_VERSION);
versioned!(TerritoryRecord, "territory", TERRITORY_SCHEMA_VERSION);
versioned!(ListingRecord, "listing", LISTING_SCHEMA_VERSION);
versioned!(BossRecord, "boss", BOSS_SCHEMA_VERSION);
versioned!(HeistRecord, "heist", HEIST_SCHEMA_VERSION);
versioned!(WarRecord, "war", WAR_SCHEMA_VERSION);
versioned!(PaymentRecord, "payment", PAYMENT_SCHEMA_VERSION);
versioned!(PendingCredit, "credit", CREDIT_SCHEMA_VERSION);
versioned!(TournamentEntry, "tournament entry", TOURNAMENT_SCHEMA_VERSION);

/// Key layout of the primary tree.
pub mod keys {
    use chrono::NaiveDate;

    pub fn player(telegram_id: i64) -> Vec<u8> {
        format!("players:{}", telegram_id).into_bytes()
    }

    pub fn gang(id: u64) -> Vec<u8> {
        format!("gangs:{:020}", id).into_bytes()
    }

    pub fn gang_name(name: &str) -> Vec<u8> {
        format!("gangnames:{}", name.trim().to_lowercase()).into_bytes()
    }

    pub fn gang_tag(tag: &str) -> Vec<u8> {
        format!("gangtags:{}", tag.trim().to_lowercase()).into_bytes()
    }

    pub fn territory(id: u32) -> Vec<u8> {
        format!("territories:{:010}", id).into_bytes()
    }

    pub fn listing(id: u64) -> Vec<u8> {
        format!("listings:{:020}", id).into_bytes()
    }

    pub fn boss(gang_id: u64) -> Vec<u8> {
        format!("bosses:{:020}", gang_id).into_bytes()
    }

    pub fn heist(id: u64) -> Vec<u8> {
        format!("heists:{:020}", id).into_bytes()
    }

    pub fn war(id: u64) -> Vec<u8> {
        format!("wars:{:020}", id).into_bytes()
    }

    pub fn payment(id: &str) -> Vec<u8> {
        format!("payments:{}", id).into_bytes()
    }

    pub fn payment_tx(provider_tx: &str) -> Vec<u8> {
        format!("paytx:{}", provider_tx).into_bytes()
    }

    pub fn inbox_prefix(telegram_id: i64) -> Vec<u8> {
        format!("inbox:{}:", telegram_id).into_bytes()
    }

    pub fn inbox(telegram_id: i64, credit_id: u64) -> Vec<u8> {
        format!("inbox:{}:{:020}", telegram_id, credit_id).into_bytes()
    }

    pub fn tournament_prefix(day: NaiveDate) -> Vec<u8> {
        format!("tscore:{}:", day).into_bytes()
    }

    pub fn tournament(day: NaiveDate, telegram_id: i64) -> Vec<u8> {
        format!("tscore:{}:{:020}", day, telegram_id).into_bytes()
    }
}

fn serialize<T: Serialize>(value: &T) -> GameResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: Versioned>(bytes: IVec) -> GameResult<T> {
    let record: T = bincode::deserialize(&bytes)?;
    if record.schema_version() != T::VERSION {
        return Err(GameError::SchemaMismatch {
            entity: T::ENTITY,
            expected: T::VERSION,
            found: record.schema_version(),
        });
    }
    Ok(record)
}

/// Writes staged by one operation and applied atomically by [`GameStore::commit`].
#[derive(Default)]
pub struct WriteBatch {
    batch: sled::Batch,
    ops: usize,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> GameResult<()> {
        self.batch.insert(key, serialize(value)?);
        self.ops += 1;
        Ok(())
    }

    pub fn remove(&mut self, key: Vec<u8>) {
        self.batch.remove(key);
        self.ops += 1;
    }

    pub fn put_player(&mut self, player: &PlayerRecord) -> GameResult<()> {
        self.put(keys::player(player.telegram_id), player)
    }

    pub fn put_gang(&mut self, gang: &GangRecord) -> GameResult<()> {
        self.put(keys::gang(gang.id), gang)
    }

    pub fn put_territory(&mut self, territory: &TerritoryRecord) -> GameResult<()> {
        self.put(keys::territory(territory.id), territory)
    }

    pub fn put_listing(&mut self, listing: &ListingRecord) -> GameResult<()> {
        self.put(keys::listing(listing.id), listing)
    }

    pub fn put_boss(&mut self, boss: &BossRecord) -> GameResult<()> {
        self.put(keys::boss(boss.gang_id), boss)
    }

    pub fn put_heist(&mut self, heist: &HeistRecord) -> GameResult<()> {
        self.put(keys::heist(heist.id), heist)
    }

    pub fn put_war(&mut self, war: &WarRecord) -> GameResult<()> {
        self.put(keys::war(war.id), war)
    }

    pub fn put_payment(&mut self, payment: &PaymentRecord) -> GameResult<()> {
        self.put(keys::payment(&payment.id), payment)
    }

    /// Mark a provider transaction as consumed by `payment_id`.
    pub fn put_payment_tx(&mut self, provider_tx: &str, payment_id: &str) -> GameResult<()> {
        self.put(keys::payment_tx(provider_tx), &payment_id.to_string())
    }

    pub fn put_credit(&mut self, telegram_id: i64, credit_id: u64, credit: &PendingCredit) -> GameResult<()> {
        self.put(keys::inbox(telegram_id, credit_id), credit)
    }

    pub fn put_tournament(&mut self, day: NaiveDate, entry: &TournamentEntry) -> GameResult<()> {
        self.put(keys::tournament(day, entry.telegram_id), entry)
    }

    pub fn is_empty(&self) -> bool {
        self.ops == 0
    }

    pub fn len(&self) -> usize {
        self.ops
    }
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GameStoreBuilder {
    path: PathBuf,
    temporary: bool,
}

impl GameStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Delete the database when the store is dropped.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn open(self) -> GameResult<GameStore> {
        GameStore::open_with_options(self.path, self.temporary)
    }
}

/// Sled-backed persistence for players, gangs and shared world state.
pub struct GameStore {
    db: sled::Db,
    primary: sled::Tree,
    path: PathBuf,
}

impl GameStore {
    pub fn open<P: AsRef<Path>>(path: P) -> GameResult<Self> {
        Self::open_with_options(path, false)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, temporary: bool) -> GameResult<Self> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::Config::new().path(path_ref).temporary(temporary).open()?;
        let primary = db.open_tree(TREE_PRIMARY)?;
        Ok(Self {
            db,
            primary,
            path: path_ref.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Monotonic id for gangs, listings, heists, wars, cases and inbox entries.
    pub fn next_id(&self) -> GameResult<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    /// Apply a batch atomically and flush it to disk.
    pub fn commit(&self, batch: WriteBatch) -> GameResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.primary.apply_batch(batch.batch)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> GameResult<()> {
        self.primary.flush()?;
        Ok(())
    }

    fn load<T: Versioned>(&self, key: &[u8]) -> GameResult<Option<T>> {
        let Some(bytes) = self.primary.get(key)? else {
            return Ok(None);
        };
        Ok(Some(decode(bytes)?))
    }

    fn scan<T: Versioned>(&self, prefix: &[u8]) -> GameResult<Vec<T>> {
        let mut out = Vec::new();
        for entry in self.primary.scan_prefix(prefix) {
            let (_, bytes) = entry?;
            out.push(decode(bytes)?);
        }
        Ok(out)
    }

    // ---- players --------------------------------------------------------

    pub fn find_player(&self, telegram_id: i64) -> GameResult<Option<PlayerRecord>> {
        self.load(&keys::player(telegram_id))
    }

    pub fn get_player(&self, telegram_id: i64) -> GameResult<PlayerRecord> {
        self.find_player(telegram_id)?
            .ok_or_else(|| GameError::NotFound(format!("player {}", telegram_id)))
    }

    pub fn list_players(&self) -> GameResult<Vec<PlayerRecord>> {
        self.scan(b"players:")
    }

    pub fn count_players(&self) -> usize {
        self.primary.scan_prefix(b"players:").count()
    }

    // ---- gangs ----------------------------------------------------------

    pub fn find_gang(&self, id: u64) -> GameResult<Option<GangRecord>> {
        self.load(&keys::gang(id))
    }

    pub fn get_gang(&self, id: u64) -> GameResult<GangRecord> {
        self.find_gang(id)?
            .ok_or_else(|| GameError::NotFound(format!("gang {}", id)))
    }

    pub fn list_gangs(&self) -> GameResult<Vec<GangRecord>> {
        self.scan(b"gangs:")
    }

    pub fn count_gangs(&self) -> usize {
        self.primary.scan_prefix(b"gangs:").count()
    }

    pub fn gang_name_taken(&self, name: &str) -> GameResult<bool> {
        Ok(self.primary.contains_key(keys::gang_name(name))?)
    }

    pub fn gang_tag_taken(&self, tag: &str) -> GameResult<bool> {
        Ok(self.primary.contains_key(keys::gang_tag(tag))?)
    }

    // ---- territories ----------------------------------------------------

    /// Territories that were never captured read back as unclaimed.
    pub fn get_territory(&self, id: u32) -> GameResult<TerritoryRecord> {
        Ok(self
            .load(&keys::territory(id))?
            .unwrap_or_else(|| TerritoryRecord::unclaimed(id)))
    }

    pub fn list_territories(&self) -> GameResult<Vec<TerritoryRecord>> {
        self.scan(b"territories:")
    }

    // ---- market ---------------------------------------------------------

    pub fn find_listing(&self, id: u64) -> GameResult<Option<ListingRecord>> {
        self.load(&keys::listing(id))
    }

    pub fn list_listings(&self) -> GameResult<Vec<ListingRecord>> {
        self.scan(b"listings:")
    }

    // ---- bosses, heists, wars ------------------------------------------

    pub fn find_boss(&self, gang_id: u64) -> GameResult<Option<BossRecord>> {
        self.load(&keys::boss(gang_id))
    }

    pub fn find_heist(&self, id: u64) -> GameResult<Option<HeistRecord>> {
        self.load(&keys::heist(id))
    }

    pub fn list_heists(&self) -> GameResult<Vec<HeistRecord>> {
        self.scan(b"heists:")
    }

    pub fn find_war(&self, id: u64) -> GameResult<Option<WarRecord>> {
        self.load(&keys::war(id))
    }

    pub fn list_wars(&self) -> GameResult<Vec<WarRecord>> {
        self.scan(b"wars:")
    }

    // ---- payments -------------------------------------------------------

    pub fn find_payment(&self, id: &str) -> GameResult<Option<PaymentRecord>> {
        self.load(&keys::payment(id))
    }

    /// Payment id that already consumed this provider transaction, if any.
    pub fn payment_for_tx(&self, provider_tx: &str) -> GameResult<Option<String>> {
        let Some(bytes) = self.primary.get(keys::payment_tx(provider_tx))? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&bytes)?))
    }

    // ---- inbox ----------------------------------------------------------

    /// Pending credits for a player with their raw keys, oldest first.
    pub fn inbox(&self, telegram_id: i64) -> GameResult<Vec<(Vec<u8>, PendingCredit)>> {
        let mut out = Vec::new();
        for entry in self.primary.scan_prefix(keys::inbox_prefix(telegram_id)) {
            let (key, bytes) = entry?;
            out.push((key.to_vec(), decode(bytes)?));
        }
        Ok(out)
    }

    // ---- tournament -----------------------------------------------------

    pub fn tournament_entry(&self, day: NaiveDate, telegram_id: i64) -> GameResult<Option<TournamentEntry>> {
        self.load(&keys::tournament(day, telegram_id))
    }

    /// All entries for `day`, highest score first.
    pub fn tournament_standings(&self, day: NaiveDate) -> GameResult<Vec<TournamentEntry>> {
        let mut entries: Vec<TournamentEntry> = self.scan(&keys::tournament_prefix(day))?;
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.telegram_id.cmp(&b.telegram_id))
        });
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, GameStore) {
        let tmp = TempDir::new().unwrap();
        let store = GameStoreBuilder::new(tmp.path().join("db")).open().unwrap();
        (tmp, store)
    }

    #[test]
    fn player_round_trips_through_batch() {
        let (_tmp, store) = store();
        let player = PlayerRecord::new(7, "neo", 1000.0, 100);
        let mut batch = WriteBatch::new();
        batch.put_player(&player).unwrap();
        store.commit(batch).unwrap();
        assert_eq!(store.get_player(7).unwrap(), player);
        assert_eq!(store.count_players(), 1);
    }

    #[test]
    fn missing_player_is_not_found() {
        let (_tmp, store) = store();
        assert!(matches!(store.get_player(1), Err(GameError::NotFound(_))));
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let (_tmp, store) = store();
        let mut player = PlayerRecord::new(7, "neo", 0.0, 0);
        player.schema_version = 99;
        let mut batch = WriteBatch::new();
        batch.put_player(&player).unwrap();
        store.commit(batch).unwrap();
        let err = store.get_player(7).unwrap_err();
        assert!(matches!(err, GameError::SchemaMismatch { entity: "player", found: 99, .. }));
    }

    #[test]
    fn unclaimed_territory_defaults() {
        let (_tmp, store) = store();
        let t = store.get_territory(3).unwrap();
        assert_eq!(t.owner_gang_id, None);
    }

    #[test]
    fn tournament_standings_sort_by_score() {
        let (_tmp, store) = store();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut batch = WriteBatch::new();
        for (tid, score) in [(1, 10.0), (2, 30.0), (3, 20.0)] {
            batch
                .put_tournament(
                    day,
                    &TournamentEntry {
                        telegram_id: tid,
                        username: format!("p{}", tid),
                        score,
                        schema_version: TOURNAMENT_SCHEMA_VERSION,
                    },
                )
                .unwrap();
        }
        store.commit(batch).unwrap();
        let ids: Vec<i64> = store.tournament_standings(day).unwrap().iter().map(|e| e.telegram_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn ids_are_unique() {
        let (_tmp, store) = store();
        let a = store.next_id().unwrap();
        let b = store.next_id().unwrap();
        assert_ne!(a, b);
        assert!(a > 0 && b > 0);
    }
}
