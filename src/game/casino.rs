//! Casino games: coinflip, dice, slots and roulette.

use serde::Serialize;

use crate::game::catalog::{CasinoGame, CasinoRules, GameAction, TalentEffect};
use crate::game::engine::Engine;
use crate::game::errors::{GameError, GameResult};
use crate::game::prestige::TalentBonuses;
use crate::game::rng::RandomSource;
use crate::game::views::PlayerView;

/// A parsed player choice for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Heads,
    Tails,
    Over,
    Under,
    Seven,
    Red,
    Black,
    Even,
    Odd,
    Number(u8),
    /// Slots take no choice.
    Spin,
}

impl Choice {
    pub fn parse(game: CasinoGame, raw: &str) -> GameResult<Self> {
        let raw = raw.trim().to_lowercase();
        let choice = match (game, raw.as_str()) {
            (CasinoGame::Coinflip, "heads") => Choice::Heads,
            (CasinoGame::Coinflip, "tails") => Choice::Tails,
            (CasinoGame::Dice, "over") => Choice::Over,
            (CasinoGame::Dice, "under") => Choice::Under,
            (CasinoGame::Dice, "seven") => Choice::Seven,
            (CasinoGame::Slots, _) => Choice::Spin,
            (CasinoGame::Roulette, "red") => Choice::Red,
            (CasinoGame::Roulette, "black") => Choice::Black,
            (CasinoGame::Roulette, "even") => Choice::Even,
            (CasinoGame::Roulette, "odd") => Choice::Odd,
            (CasinoGame::Roulette, n) => match n.parse::<u8>() {
                Ok(n) if n <= 36 => Choice::Number(n),
                _ => return Err(GameError::InvalidBet(format!("unknown roulette choice {}", n))),
            },
            (game, other) => {
                return Err(GameError::InvalidBet(format!("choice {} is not valid for {:?}", other, game)))
            }
        };
        Ok(choice)
    }
}

/// What the table showed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Spin {
    Coin { flip: &'static str },
    Dice { dice1: u8, dice2: u8, total: u8 },
    Reels { reels: Vec<String> },
    Wheel { number: u8, color: &'static str },
}

/// Resolve one round. Returns the table result and the gross payout multiplier (0 on loss).
pub fn resolve(rules: &CasinoRules, choice: Choice, rng: &mut dyn RandomSource) -> (Spin, f64) {
    match choice {
        Choice::Heads | Choice::Tails => {
            let heads = rng.chance(0.5);
            let win = heads == (choice == Choice::Heads);
            let flip = if heads { "heads" } else { "tails" };
            (Spin::Coin { flip }, if win { rules.coinflip_payout } else { 0.0 })
        }
        Choice::Over | Choice::Under | Choice::Seven => {
            let dice1 = rng.below(6) as u8 + 1;
            let dice2 = rng.below(6) as u8 + 1;
            let total = dice1 + dice2;
            let multiplier = match choice {
                Choice::Over if total > 7 => rules.dice_payout,
                Choice::Under if total < 7 => rules.dice_payout,
                Choice::Seven if total == 7 => rules.dice_seven_payout,
                _ => 0.0,
            };
            (Spin::Dice { dice1, dice2, total }, multiplier)
        }
        Choice::Spin => {
            let symbols = &rules.slot_symbols;
            let reels: Vec<String> = (0..3)
                .map(|_| symbols.get(rng.below(symbols.len().max(1))).cloned().unwrap_or_default())
                .collect();
            let multiplier = if reels[0] == reels[1] && reels[1] == reels[2] {
                rules
                    .slot_triples
                    .iter()
                    .find(|p| p.symbol == reels[0])
                    .map(|p| p.multiplier)
                    .unwrap_or(rules.slot_two_match_payout)
            } else if reels[0] == reels[1] || reels[1] == reels[2] {
                rules.slot_two_match_payout
            } else {
                0.0
            };
            (Spin::Reels { reels }, multiplier)
        }
        Choice::Red | Choice::Black | Choice::Even | Choice::Odd | Choice::Number(_) => {
            let number = rng.below(37) as u8;
            let red = rules.roulette_red.contains(&number);
            let black = rules.roulette_black.contains(&number);
            let color = if red {
                "red"
            } else if black {
                "black"
            } else {
                "green"
            };
            let multiplier = match choice {
                Choice::Red if red => rules.roulette_color_payout,
                Choice::Black if black => rules.roulette_color_payout,
                Choice::Even if number != 0 && number % 2 == 0 => rules.roulette_color_payout,
                Choice::Odd if number % 2 == 1 => rules.roulette_color_payout,
                Choice::Number(n) if n == number => rules.roulette_number_payout,
                _ => 0.0,
            };
            (Spin::Wheel { number, color }, multiplier)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CasinoOutcome {
    pub game: CasinoGame,
    pub bet: f64,
    pub payout: f64,
    pub net: f64,
    pub win: bool,
    pub result: Spin,
    pub player: PlayerView,
}

impl Engine {
    /// Play one round. The bet is debited first; a win credits the gross payout.
    pub fn casino(&self, telegram_id: i64, game: CasinoGame, bet: f64, choice: &str) -> GameResult<CasinoOutcome> {
        let rules = &self.catalog.economy.casino;
        let limits = rules
            .games
            .get(&game)
            .ok_or_else(|| GameError::NotFound(format!("casino game {:?}", game)))?;
        let choice = Choice::parse(game, choice)?;
        if !bet.is_finite() || bet <= 0.0 {
            return Err(GameError::InvalidBet("bet must be a positive amount".into()));
        }
        let ((result, payout), player) = self.with_player(telegram_id, |txn, _| {
            let lucky = TalentBonuses::for_player(&self.catalog, &txn.player).get(TalentEffect::Lucky);
            let max_bet = limits.max_bet + lucky;
            if bet < limits.min_bet || bet > max_bet {
                return Err(GameError::InvalidBet(format!(
                    "bet must be {}-{}",
                    limits.min_bet, max_bet
                )));
            }
            if txn.player.cash < bet {
                return Err(GameError::InvalidBet("not enough cash for this bet".into()));
            }
            self.try_spend(&mut txn.player, bet)?;
            let (result, multiplier) = self.roll(|rng| resolve(rules, choice, rng));
            let payout = bet * multiplier;
            txn.player.cash += payout;
            txn.player.stats.casino_plays += 1;
            self.track(txn, GameAction::CasinoPlay, 1.0)?;
            if payout > 0.0 {
                txn.player.stats.casino_wins += 1;
                self.track(txn, GameAction::CasinoWin, 1.0)?;
            }
            Ok((result, payout))
        })?;
        Ok(CasinoOutcome {
            game,
            bet,
            payout,
            net: payout - bet,
            win: payout > 0.0,
            result,
            player: self.view(&player),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rng::ScriptedRandom;
    use crate::game::seed::load_builtin;

    #[test]
    fn dice_seven_pays_five() {
        let catalog = load_builtin().unwrap();
        // 3 + 4
        let mut rng = ScriptedRandom::new([2.0 / 6.0 + 0.01, 3.0 / 6.0 + 0.01]);
        let (spin, m) = resolve(&catalog.economy.casino, Choice::Seven, &mut rng);
        assert_eq!(spin, Spin::Dice { dice1: 3, dice2: 4, total: 7 });
        assert_eq!(m, 5.0);
    }

    #[test]
    fn zero_is_neither_even_nor_odd() {
        let catalog = load_builtin().unwrap();
        let rules = &catalog.economy.casino;
        let (_, even) = resolve(rules, Choice::Even, &mut ScriptedRandom::new([0.0]));
        let (_, odd) = resolve(rules, Choice::Odd, &mut ScriptedRandom::new([0.0]));
        assert_eq!(even, 0.0);
        assert_eq!(odd, 0.0);
        let (_, zero) = resolve(rules, Choice::Number(0), &mut ScriptedRandom::new([0.0]));
        assert_eq!(zero, 36.0);
    }

    #[test]
    fn triple_symbol_uses_table() {
        let catalog = load_builtin().unwrap();
        let rules = &catalog.economy.casino;
        let (spin, m) = resolve(rules, Choice::Spin, &mut ScriptedRandom::new([0.0, 0.0, 0.0]));
        assert_eq!(m, 5.0);
        assert!(matches!(spin, Spin::Reels { .. }));
    }

    #[test]
    fn bad_choices_are_invalid_bets() {
        assert!(matches!(
            Choice::parse(CasinoGame::Coinflip, "edge"),
            Err(GameError::InvalidBet(_))
        ));
        assert!(matches!(
            Choice::parse(CasinoGame::Roulette, "37"),
            Err(GameError::InvalidBet(_))
        ));
        assert_eq!(Choice::parse(CasinoGame::Roulette, "17").unwrap(), Choice::Number(17));
    }
}
