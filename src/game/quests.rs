//! Multi-step quest lines. Steps reward automatically on completion.

use serde::Serialize;

use crate::game::catalog::{Catalog, GameAction, Reward};
use crate::game::engine::Engine;
use crate::game::errors::GameResult;
use crate::game::types::{PlayerRecord, QuestProgress};

/// Start every quest line the player's level has unlocked.
pub fn unlock_quests(catalog: &Catalog, player: &mut PlayerRecord) {
    let level = player.level();
    for quest in &catalog.progression.quests {
        if quest.unlock_level <= level && !player.quests.iter().any(|q| q.quest_id == quest.id) {
            player.quests.push(QuestProgress {
                quest_id: quest.id.clone(),
                step: 0,
                progress: 0.0,
                completed: quest.steps.is_empty(),
            });
        }
    }
}

/// Advance active quest steps triggered by `action`; returns rewards earned.
///
/// Overflow does not carry into the next step.
pub fn advance(catalog: &Catalog, player: &mut PlayerRecord, action: GameAction, amount: f64) -> Vec<Reward> {
    let mut rewards = Vec::new();
    for progress in player.quests.iter_mut().filter(|q| !q.completed) {
        let Some(quest) = catalog.quest(&progress.quest_id) else {
            continue;
        };
        let Some(step) = quest.steps.get(progress.step) else {
            progress.completed = true;
            continue;
        };
        if step.trigger != action {
            continue;
        }
        progress.progress += amount;
        if progress.progress >= step.target {
            rewards.push(step.reward.clone());
            progress.step += 1;
            progress.progress = 0.0;
            progress.completed = progress.step >= quest.steps.len();
        }
    }
    rewards
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestStepView {
    pub description: String,
    pub target: f64,
    pub reward: Reward,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestView {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub unlock_level: u32,
    pub unlocked: bool,
    pub step: usize,
    pub total_steps: usize,
    pub progress: f64,
    pub completed: bool,
    pub current: Option<QuestStepView>,
}

pub fn quest_views(catalog: &Catalog, player: &PlayerRecord) -> Vec<QuestView> {
    catalog
        .progression
        .quests
        .iter()
        .map(|quest| {
            let state = player.quests.iter().find(|q| q.quest_id == quest.id);
            let step = state.map(|s| s.step).unwrap_or(0);
            let completed = state.map(|s| s.completed).unwrap_or(false);
            QuestView {
                id: quest.id.clone(),
                name: quest.name.clone(),
                emoji: quest.emoji.clone(),
                description: quest.description.clone(),
                unlock_level: quest.unlock_level,
                unlocked: state.is_some(),
                step,
                total_steps: quest.steps.len(),
                progress: state.map(|s| s.progress).unwrap_or(0.0),
                completed,
                current: if completed {
                    None
                } else {
                    quest.steps.get(step).map(|s| QuestStepView {
                        description: s.description.clone(),
                        target: s.target,
                        reward: s.reward.clone(),
                    })
                },
            }
        })
        .collect()
}

impl Engine {
    /// Quest lines for a player, syncing unlocks first.
    pub fn quests(&self, telegram_id: i64) -> GameResult<Vec<QuestView>> {
        let (views, _) = self.with_player(telegram_id, |txn, _| Ok(quest_views(&self.catalog, &txn.player)))?;
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::seed::load_builtin;
    use crate::game::types::OwnedBusiness;

    #[test]
    fn level_gates_quest_lines() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        unlock_quests(&catalog, &mut p);
        assert_eq!(p.quests.len(), 1);
        p.businesses.push(OwnedBusiness {
            business_id: "cafe".into(),
            level: 5,
            has_manager: false,
        });
        unlock_quests(&catalog, &mut p);
        assert_eq!(p.quests.len(), 2);
    }

    #[test]
    fn completing_a_step_moves_to_the_next() {
        let catalog = load_builtin().unwrap();
        let mut p = PlayerRecord::new(1, "neo", 0.0, 0);
        unlock_quests(&catalog, &mut p);
        let rewards = advance(&catalog, &mut p, GameAction::BuyBusiness, 1.0);
        assert_eq!(rewards, vec![Reward::Cash { amount: 500.0 }]);
        assert_eq!(p.quests[0].step, 1);
        assert!(advance(&catalog, &mut p, GameAction::Robbery, 2.0).is_empty());
        assert_eq!(advance(&catalog, &mut p, GameAction::Robbery, 1.0).len(), 1);
    }
}
