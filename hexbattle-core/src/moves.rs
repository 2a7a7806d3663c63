//! Move processing: validate and apply player actions
//!
//! The processor holds no game state. Expected failures (wrong unit, not
//! enough movement, target out of range) come back as a `Rejection` inside
//! the result and leave the game untouched; `Err` means the game or the
//! catalog is broken.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::board::Hex;
use crate::config::{BatchPolicy, ProcessorConfig};
use crate::game::{Game, GameError, GameStatus};
use crate::rules::{AttackCheck, AttackDenied, RulesEngine};
use crate::world::{PlayerId, Unit, World};

/// Slack for comparing fractional movement costs
const COST_EPSILON: f64 = 1e-9;

// ============================================================================
// ACTIONS AND RESULTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move { from: Hex, to: Hex },
    Attack { attacker: Hex, target: Hex },
    EndTurn,
}

/// Why an action was refused
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("game is not being played (status {status:?})")]
    GameNotActive { status: GameStatus },
    #[error("no unit at {coord}")]
    NoUnit { coord: Hex },
    #[error("unit at {coord} belongs to player {owner}")]
    NotYourUnit { coord: Hex, owner: PlayerId },
    #[error("unit at {coord} has already attacked this turn")]
    AlreadyActed { coord: Hex },
    #[error("{coord} is occupied")]
    Occupied { coord: Hex },
    #[error("no path to {to}")]
    Unreachable { to: Hex },
    #[error("move costs {needed} but only {remaining} movement remains")]
    InsufficientMovement { needed: f64, remaining: f64 },
    #[error("no unit to attack at {coord}")]
    NoTarget { coord: Hex },
    #[error("{denied}")]
    AttackDenied { denied: AttackDenied },
}

/// What an accepted action did
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutcome {
    Moved {
        from: Hex,
        to: Hex,
        cost: f64,
    },
    Attacked {
        attacker: Hex,
        target: Hex,
        damage: i32,
        counter_damage: Option<i32>,
        target_destroyed: bool,
        attacker_destroyed: bool,
    },
    TurnEnded {
        next_player: PlayerId,
        turn: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: Action,
    pub outcome: Option<ActionOutcome>,
    pub rejection: Option<Rejection>,
    /// Set when this action ended the game
    pub winner: Option<PlayerId>,
}

impl ActionResult {
    fn applied(action: Action, outcome: ActionOutcome, winner: Option<PlayerId>) -> Self {
        Self {
            action,
            outcome: Some(outcome),
            rejection: None,
            winner,
        }
    }

    fn rejected(action: Action, rejection: Rejection) -> Self {
        Self {
            action,
            outcome: None,
            rejection: Some(rejection),
            winner: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Result of running a list of actions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub policy: BatchPolicy,
    pub results: Vec<ActionResult>,
    /// Number of actions whose effects are now part of the game
    pub applied: usize,
    /// Index of the first rejected action, if any
    pub stopped_at: Option<usize>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.stopped_at.is_none()
    }
}

/// A destination a unit can reach this turn
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveOption {
    pub to: Hex,
    pub cost: f64,
}

// ============================================================================
// PATH SEARCH
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct Frontier {
    cost: f64,
    hex: Hex,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    /// Reversed so `BinaryHeap` pops the cheapest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hex.cmp(&self.hex))
    }
}

/// Uniform-cost search from the unit's position over existing tiles.
/// Friendly units can be passed through, enemy units and impassable
/// terrain block. Stops expanding past `budget` and returns early once
/// `target` is settled.
fn search(
    world: &World,
    rules: &RulesEngine,
    unit: &Unit,
    budget: Option<f64>,
    target: Option<Hex>,
) -> Result<FxHashMap<Hex, f64>, GameError> {
    let mut best: FxHashMap<Hex, f64> = FxHashMap::default();
    let mut heap = BinaryHeap::new();
    best.insert(unit.coord, 0.0);
    heap.push(Frontier {
        cost: 0.0,
        hex: unit.coord,
    });

    while let Some(Frontier { cost, hex }) = heap.pop() {
        if best.get(&hex).is_some_and(|&c| cost > c) {
            continue;
        }
        if Some(hex) == target {
            break;
        }

        for next in hex.neighbors() {
            let Some(tile) = world.tile_at(next) else {
                continue;
            };
            if world
                .unit_at(next)
                .is_some_and(|other| other.player != unit.player)
            {
                continue;
            }
            let step = rules.movement_cost(unit.unit_type, tile.terrain_type)?;
            if !step.is_finite() {
                continue;
            }
            let total = cost + step;
            if budget.is_some_and(|b| total > b + COST_EPSILON) {
                continue;
            }
            if best.get(&next).map_or(true, |&c| total < c) {
                best.insert(next, total);
                heap.push(Frontier { cost: total, hex: next });
            }
        }
    }

    Ok(best)
}

// ============================================================================
// MOVE PROCESSOR
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct MoveProcessor {
    config: ProcessorConfig,
}

impl MoveProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Validate and apply one action
    pub fn apply(&self, game: &mut Game, action: &Action) -> Result<ActionResult, GameError> {
        if !game.is_playing() {
            return Ok(ActionResult::rejected(
                *action,
                Rejection::GameNotActive {
                    status: game.status(),
                },
            ));
        }

        let result = match *action {
            Action::Move { from, to } => self.apply_move(game, from, to)?,
            Action::Attack { attacker, target } => self.apply_attack(game, attacker, target)?,
            Action::EndTurn => {
                game.end_turn()?;
                ActionResult::applied(
                    *action,
                    ActionOutcome::TurnEnded {
                        next_player: game.current_player(),
                        turn: game.turn_counter(),
                    },
                    game.winner(),
                )
            }
        };

        match &result.rejection {
            None => debug!(?action, player = game.current_player(), "action applied"),
            Some(rejection) => debug!(?action, %rejection, "action rejected"),
        }
        Ok(result)
    }

    /// Apply a list of actions under the configured batch policy
    pub fn submit(&self, game: &mut Game, actions: &[Action]) -> Result<BatchReport, GameError> {
        self.apply_batch(game, actions, self.config.batch_policy)
    }

    /// Apply a list of actions in order, stopping at the first rejection.
    /// Under `AllOrNothing` a rejection anywhere leaves `game` as it was.
    ///
    /// A hard error comes back as `GameError::BatchAborted` carrying the
    /// failing index and how many actions stayed applied.
    pub fn apply_batch(
        &self,
        game: &mut Game,
        actions: &[Action],
        policy: BatchPolicy,
    ) -> Result<BatchReport, GameError> {
        let mut working = match policy {
            BatchPolicy::AllOrNothing => Some(game.clone()),
            BatchPolicy::Prefix => None,
        };
        let target: &mut Game = match working.as_mut() {
            Some(copy) => copy,
            None => &mut *game,
        };

        let mut results = Vec::with_capacity(actions.len());
        let mut stopped_at = None;
        for (index, action) in actions.iter().enumerate() {
            let result = match self.apply(target, action) {
                Ok(result) => result,
                Err(err) => {
                    let applied = match policy {
                        BatchPolicy::Prefix => index,
                        BatchPolicy::AllOrNothing => 0,
                    };
                    warn!(index, applied, %err, "batch aborted");
                    return Err(GameError::BatchAborted {
                        index,
                        applied,
                        source: Box::new(err),
                    });
                }
            };
            let rejected = !result.is_applied();
            results.push(result);
            if rejected {
                stopped_at = Some(index);
                break;
            }
        }

        let applied = match (policy, stopped_at) {
            (BatchPolicy::Prefix, Some(index)) => index,
            (BatchPolicy::AllOrNothing, Some(index)) => {
                warn!(index, total = actions.len(), "batch rolled back");
                0
            }
            (_, None) => {
                if let Some(working) = working {
                    *game = working;
                }
                actions.len()
            }
        };

        Ok(BatchReport {
            policy,
            results,
            applied,
            stopped_at,
        })
    }

    // ========================================================================
    // MOVE
    // ========================================================================

    fn apply_move(&self, game: &mut Game, from: Hex, to: Hex) -> Result<ActionResult, GameError> {
        let action = Action::Move { from, to };
        let reject = |r| Ok(ActionResult::rejected(action, r));

        let Some(unit) = game.world().unit_at(from) else {
            return reject(Rejection::NoUnit { coord: from });
        };
        if unit.player != game.current_player() {
            return reject(Rejection::NotYourUnit {
                coord: from,
                owner: unit.player,
            });
        }
        if unit.has_attacked {
            return reject(Rejection::AlreadyActed { coord: from });
        }
        if from == to || game.world().unit_at(to).is_some() {
            return reject(Rejection::Occupied { coord: to });
        }
        if game.world().tile_at(to).is_none() {
            return reject(Rejection::Unreachable { to });
        }

        let costs = search(game.world(), game.rules(), unit, None, Some(to))?;
        let Some(&cost) = costs.get(&to) else {
            return reject(Rejection::Unreachable { to });
        };
        let remaining = unit.movement_remaining;
        if cost > remaining + COST_EPSILON {
            return reject(Rejection::InsufficientMovement {
                needed: cost,
                remaining,
            });
        }

        let world = game.world_mut();
        world.move_unit(from, to)?;
        if let Some(moved) = world.unit_at_mut(to) {
            moved.movement_remaining = (moved.movement_remaining - cost).max(0.0);
        }

        Ok(ActionResult::applied(
            action,
            ActionOutcome::Moved { from, to, cost },
            None,
        ))
    }

    // ========================================================================
    // ATTACK
    // ========================================================================

    fn apply_attack(
        &self,
        game: &mut Game,
        attacker_at: Hex,
        target_at: Hex,
    ) -> Result<ActionResult, GameError> {
        let action = Action::Attack {
            attacker: attacker_at,
            target: target_at,
        };
        let reject = |r| Ok(ActionResult::rejected(action, r));

        let Some(attacker) = game.world().unit_at(attacker_at).cloned() else {
            return reject(Rejection::NoUnit { coord: attacker_at });
        };
        if attacker.player != game.current_player() {
            return reject(Rejection::NotYourUnit {
                coord: attacker_at,
                owner: attacker.player,
            });
        }
        if attacker.has_attacked {
            return reject(Rejection::AlreadyActed { coord: attacker_at });
        }
        let Some(defender) = game.world().unit_at(target_at).cloned() else {
            return reject(Rejection::NoTarget { coord: target_at });
        };

        let rules = Arc::clone(game.rules());
        if let AttackCheck::Denied(reason) = rules.can_unit_attack_target(&attacker, &defender)? {
            return reject(Rejection::AttackDenied { denied: reason });
        }

        let (prediction, _) = rules.combat_prediction(attacker.unit_type, defender.unit_type)?;
        let damage = prediction.sample(game.rng_mut());
        let defender_health = defender.current_health - damage;

        let mut counter_damage = None;
        let mut attacker_health = attacker.current_health;
        if defender_health > 0 {
            let mut wounded = defender.clone();
            wounded.current_health = defender_health;
            if rules.can_unit_attack_target(&wounded, &attacker)?.is_allowed() {
                let (counter, _) =
                    rules.combat_prediction(defender.unit_type, attacker.unit_type)?;
                let dealt = counter.sample(game.rng_mut());
                attacker_health -= dealt;
                counter_damage = Some(dealt);
            }
        }

        let world = game.world_mut();
        let target_destroyed = settle_health(world, target_at, defender_health)?;
        let attacker_destroyed = settle_health(world, attacker_at, attacker_health)?;
        // Attacking ends the unit's turn
        if let Some(unit) = world.unit_at_mut(attacker_at) {
            unit.has_attacked = true;
            unit.movement_remaining = 0.0;
        }

        let winner = if target_destroyed || attacker_destroyed {
            game.check_victory()
        } else {
            None
        };

        Ok(ActionResult::applied(
            action,
            ActionOutcome::Attacked {
                attacker: attacker_at,
                target: target_at,
                damage,
                counter_damage,
                target_destroyed,
                attacker_destroyed,
            },
            winner,
        ))
    }

    // ========================================================================
    // OPTIONS
    // ========================================================================

    /// Empty destinations the unit at `coord` can reach with its remaining
    /// movement, sorted by coordinate
    pub fn move_options(&self, game: &Game, coord: Hex) -> Result<Vec<MoveOption>, GameError> {
        let Some(unit) = game.world().unit_at(coord).filter(|u| !u.has_attacked) else {
            return Ok(Vec::new());
        };
        let costs = search(
            game.world(),
            game.rules(),
            unit,
            Some(unit.movement_remaining),
            None,
        )?;

        let mut options: Vec<MoveOption> = costs
            .into_iter()
            .filter(|(hex, _)| game.world().unit_at(*hex).is_none())
            .map(|(to, cost)| MoveOption { to, cost })
            .collect();
        options.sort_by_key(|o| o.to);
        Ok(options)
    }

    /// Coordinates of enemy units the unit at `coord` can attack from where
    /// it stands, sorted
    pub fn attack_options(&self, game: &Game, coord: Hex) -> Result<Vec<Hex>, GameError> {
        let Some(unit) = game.world().unit_at(coord).filter(|u| !u.has_attacked) else {
            return Ok(Vec::new());
        };
        let mut targets = Vec::new();
        for other in game.world().units() {
            if game.rules().can_unit_attack_target(unit, other)?.is_allowed() {
                targets.push(other.coord);
            }
        }
        targets.sort();
        Ok(targets)
    }
}

/// Write back a unit's health, removing it when it drops to zero.
/// Returns true if the unit was destroyed.
fn settle_health(world: &mut World, coord: Hex, health: i32) -> Result<bool, GameError> {
    if health <= 0 {
        world.remove_unit(coord)?;
        return Ok(true);
    }
    if let Some(unit) = world.unit_at_mut(coord) {
        unit.current_health = health;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesError;
    use crate::world::Unit;

    const SOLDIER: u32 = 1;
    const TANK: u32 = 2;
    const ARTILLERY: u32 = 3;
    const SUBMARINE: u32 = 5;
    const GRASS: u32 = 1;
    const FOREST: u32 = 2;
    const MOUNTAIN: u32 = 3;

    fn rules() -> Arc<RulesEngine> {
        Arc::new(RulesEngine::embedded().unwrap())
    }

    fn grass_world() -> World {
        let mut world = World::new(2).unwrap();
        for hex in Hex::new(0, 0).range(4) {
            world.set_tile_type(hex, GRASS);
        }
        world
    }

    fn game_with(world: World) -> Game {
        Game::new(world, rules(), 42).unwrap()
    }

    fn processor() -> MoveProcessor {
        MoveProcessor::default()
    }

    #[test]
    fn test_move_on_grass() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-3, 0))).unwrap();
        let mut game = game_with(world);

        let result = processor()
            .apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(2, 0) })
            .unwrap();
        assert!(result.is_applied());
        let unit = game.world().unit_at(Hex::new(2, 0)).unwrap();
        assert_eq!(unit.movement_remaining, 1.0);
        assert!(game.world().unit_at(Hex::new(0, 0)).is_none());
    }

    #[test]
    fn test_insufficient_movement_leaves_state() {
        let mut world = grass_world();
        world.set_tile_type(Hex::new(1, 0), MOUNTAIN);
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-3, 0))).unwrap();
        let mut game = game_with(world);
        game.world_mut().unit_at_mut(Hex::new(0, 0)).unwrap().movement_remaining = 2.0;

        let before = game.to_snapshot();
        let result = processor()
            .apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(1, 0) })
            .unwrap();
        assert_eq!(
            result.rejection,
            Some(Rejection::InsufficientMovement { needed: 3.0, remaining: 2.0 })
        );
        assert_eq!(game.to_snapshot(), before);
    }

    #[test]
    fn test_path_prefers_cheaper_detour() {
        let mut world = grass_world();
        world.set_tile_type(Hex::new(1, 0), FOREST);
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-3, 0))).unwrap();
        let mut game = game_with(world);

        // (1,0) is forest; straight line costs 2 + 1, detour via (1,-1) costs 1 + 1
        let result = processor()
            .apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(2, -1) })
            .unwrap();
        assert_eq!(
            result.outcome,
            Some(ActionOutcome::Moved { from: Hex::new(0, 0), to: Hex::new(2, -1), cost: 2.0 })
        );
    }

    #[test]
    fn test_move_rejections() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(1, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(0, 1))).unwrap();
        let mut game = game_with(world);
        let p = processor();

        let r = p.apply(&mut game, &Action::Move { from: Hex::new(3, 0), to: Hex::new(2, 0) }).unwrap();
        assert_eq!(r.rejection, Some(Rejection::NoUnit { coord: Hex::new(3, 0) }));

        let r = p.apply(&mut game, &Action::Move { from: Hex::new(0, 1), to: Hex::new(0, 2) }).unwrap();
        assert_eq!(r.rejection, Some(Rejection::NotYourUnit { coord: Hex::new(0, 1), owner: 2 }));

        let r = p.apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(1, 0) }).unwrap();
        assert_eq!(r.rejection, Some(Rejection::Occupied { coord: Hex::new(1, 0) }));

        let r = p.apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(9, 9) }).unwrap();
        assert_eq!(r.rejection, Some(Rejection::Unreachable { to: Hex::new(9, 9) }));
    }

    #[test]
    fn test_friendly_units_passable_enemies_block() {
        let mut world = World::new(2).unwrap();
        // A one-hex-wide corridor along r = 0
        for q in 0..4 {
            world.set_tile_type(Hex::new(q, 0), GRASS);
        }
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(1, 0))).unwrap();
        let mut game = game_with(world.clone());
        let r = processor()
            .apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(2, 0) })
            .unwrap();
        assert!(r.is_applied());

        world.remove_unit(Hex::new(1, 0)).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(1, 0))).unwrap();
        let mut game = game_with(world);
        let r = processor()
            .apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(2, 0) })
            .unwrap();
        assert_eq!(r.rejection, Some(Rejection::Unreachable { to: Hex::new(2, 0) }));
    }

    #[test]
    fn test_attack_out_of_range_rejected() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(2, 0))).unwrap();
        let mut game = game_with(world);
        let r = processor()
            .apply(&mut game, &Action::Attack { attacker: Hex::new(0, 0), target: Hex::new(2, 0) })
            .unwrap();
        assert_eq!(
            r.rejection,
            Some(Rejection::AttackDenied {
                denied: AttackDenied::OutOfRange { distance: 2, min: 1, max: 1 }
            })
        );
    }

    #[test]
    fn test_attack_untargetable() {
        let mut world = grass_world();
        world.set_tile_type(Hex::new(1, 0), 5);
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SUBMARINE, 2, Hex::new(1, 0))).unwrap();
        let mut game = game_with(world);
        let r = processor()
            .apply(&mut game, &Action::Attack { attacker: Hex::new(0, 0), target: Hex::new(1, 0) })
            .unwrap();
        assert!(matches!(
            r.rejection,
            Some(Rejection::AttackDenied { denied: AttackDenied::NotTargetable { .. } })
        ));
        assert_eq!(
            processor().attack_options(&game, Hex::new(0, 0)).unwrap(),
            Vec::<Hex>::new()
        );
    }

    #[test]
    fn test_attack_applies_damage_and_counter() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(1, 0))).unwrap();
        let mut game = game_with(world);
        let r = processor()
            .apply(&mut game, &Action::Attack { attacker: Hex::new(0, 0), target: Hex::new(1, 0) })
            .unwrap();

        let Some(ActionOutcome::Attacked { damage, counter_damage, target_destroyed, .. }) = r.outcome else {
            panic!("expected attack outcome, got {r:?}");
        };
        assert!((0..=8).contains(&damage));
        assert!(!target_destroyed);
        let counter = counter_damage.expect("adjacent soldiers always counter");
        assert_eq!(game.world().unit_at(Hex::new(1, 0)).unwrap().current_health, 10 - damage);
        assert_eq!(game.world().unit_at(Hex::new(0, 0)).unwrap().current_health, 10 - counter);
    }

    #[test]
    fn test_artillery_gets_no_counter() {
        let mut world = grass_world();
        world.add_unit(Unit::new(ARTILLERY, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(2, 0))).unwrap();
        let mut game = game_with(world);
        let r = processor()
            .apply(&mut game, &Action::Attack { attacker: Hex::new(0, 0), target: Hex::new(2, 0) })
            .unwrap();
        match r.outcome {
            Some(ActionOutcome::Attacked { counter_damage, .. }) => assert_eq!(counter_damage, None),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_destroying_last_unit_wins() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(1, 0))).unwrap();
        let mut game = game_with(world);
        game.world_mut().unit_at_mut(Hex::new(1, 0)).unwrap().current_health = 1;
        game.world_mut().unit_at_mut(Hex::new(0, 0)).unwrap().current_health = 1000;

        // Soldier vs soldier can roll 0; retry across end turns until a hit lands
        let p = processor();
        for _ in 0..50 {
            let r = p
                .apply(&mut game, &Action::Attack { attacker: Hex::new(0, 0), target: Hex::new(1, 0) })
                .unwrap();
            if r.winner.is_some() {
                assert_eq!(r.winner, Some(1));
                assert_eq!(game.status(), GameStatus::Ended);
                assert!(game.world().unit_at(Hex::new(1, 0)).is_none());
                return;
            }
            p.apply(&mut game, &Action::EndTurn).unwrap();
            p.apply(&mut game, &Action::EndTurn).unwrap();
        }
        panic!("no hit landed in 50 attacks");
    }

    #[test]
    fn test_actions_rejected_after_game_ends() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        let mut game = game_with(world);
        game.check_victory();
        let r = processor().apply(&mut game, &Action::EndTurn).unwrap();
        assert_eq!(
            r.rejection,
            Some(Rejection::GameNotActive { status: GameStatus::Ended })
        );
    }

    #[test]
    fn test_move_options_respect_budget() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-4, 0))).unwrap();
        let game = game_with(world);
        let options = processor().move_options(&game, Hex::new(0, 0)).unwrap();
        // Everything within 3 on open grass, minus the origin
        assert_eq!(options.len(), 36);
        assert!(options.iter().all(|o| o.cost <= 3.0));
        assert!(options.iter().all(|o| o.to != Hex::new(0, 0)));
    }

    #[test]
    fn test_unit_attacks_once_per_turn() {
        let mut world = grass_world();
        world.add_unit(Unit::new(TANK, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(1, 0))).unwrap();
        let mut game = game_with(world);
        game.world_mut().unit_at_mut(Hex::new(0, 0)).unwrap().current_health = 1000;
        game.world_mut().unit_at_mut(Hex::new(1, 0)).unwrap().current_health = 1000;

        let p = processor();
        let attack = Action::Attack { attacker: Hex::new(0, 0), target: Hex::new(1, 0) };
        assert!(p.apply(&mut game, &attack).unwrap().is_applied());

        let before = game.to_snapshot();
        let again = p.apply(&mut game, &attack).unwrap();
        assert_eq!(again.rejection, Some(Rejection::AlreadyActed { coord: Hex::new(0, 0) }));
        let step = p
            .apply(&mut game, &Action::Move { from: Hex::new(0, 0), to: Hex::new(-1, 0) })
            .unwrap();
        assert_eq!(step.rejection, Some(Rejection::AlreadyActed { coord: Hex::new(0, 0) }));
        assert_eq!(game.to_snapshot(), before);
        assert!(p.attack_options(&game, Hex::new(0, 0)).unwrap().is_empty());
        assert!(p.move_options(&game, Hex::new(0, 0)).unwrap().is_empty());

        // Player 1's next turn clears the flag
        p.apply(&mut game, &Action::EndTurn).unwrap();
        p.apply(&mut game, &Action::EndTurn).unwrap();
        assert!(p.apply(&mut game, &attack).unwrap().is_applied());
    }

    #[test]
    fn test_batch_hard_error_reports_progress() {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-3, 0))).unwrap();
        let mut game = game_with(world);
        // Terrain the catalog does not know makes path search fail hard
        game.world_mut().set_tile_type(Hex::new(3, -1), 99);

        let actions = vec![
            Action::Move { from: Hex::new(0, 0), to: Hex::new(1, 0) },
            Action::Move { from: Hex::new(1, 0), to: Hex::new(3, 0) },
        ];
        let err = processor()
            .apply_batch(&mut game, &actions, BatchPolicy::Prefix)
            .unwrap_err();
        match err {
            GameError::BatchAborted { index, applied, source } => {
                assert_eq!((index, applied), (1, 1));
                assert!(matches!(*source, GameError::Rules(RulesError::UnknownTerrain(99))));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(game.world().unit_at(Hex::new(1, 0)).is_some());

        // Same failure under AllOrNothing leaves nothing behind
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-3, 0))).unwrap();
        let mut game = game_with(world);
        game.world_mut().set_tile_type(Hex::new(3, -1), 99);
        let before = game.to_snapshot();
        let err = processor()
            .apply_batch(&mut game, &actions, BatchPolicy::AllOrNothing)
            .unwrap_err();
        assert!(matches!(err, GameError::BatchAborted { index: 1, applied: 0, .. }));
        assert_eq!(game.to_snapshot(), before);
    }

    fn two_step_batch() -> Vec<Action> {
        vec![
            Action::Move { from: Hex::new(0, 0), to: Hex::new(1, 0) },
            Action::Move { from: Hex::new(1, 0), to: Hex::new(2, 0) },
            Action::Move { from: Hex::new(2, 0), to: Hex::new(9, 9) },
        ]
    }

    fn batch_game() -> Game {
        let mut world = grass_world();
        world.add_unit(Unit::new(SOLDIER, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(SOLDIER, 2, Hex::new(-3, 0))).unwrap();
        game_with(world)
    }

    #[test]
    fn test_batch_all_or_nothing_rolls_back() {
        let mut game = batch_game();
        let before = game.to_snapshot();
        let report = processor()
            .apply_batch(&mut game, &two_step_batch(), BatchPolicy::AllOrNothing)
            .unwrap();
        assert_eq!(report.stopped_at, Some(2));
        assert_eq!(report.applied, 0);
        assert_eq!(game.to_snapshot(), before);
    }

    #[test]
    fn test_batch_prefix_keeps_progress() {
        let mut game = batch_game();
        let report = processor()
            .apply_batch(&mut game, &two_step_batch(), BatchPolicy::Prefix)
            .unwrap();
        assert_eq!(report.stopped_at, Some(2));
        assert_eq!(report.applied, 2);
        assert!(game.world().unit_at(Hex::new(2, 0)).is_some());
    }

    #[test]
    fn test_batch_commits_when_all_succeed() {
        let mut game = batch_game();
        let actions = &two_step_batch()[..2];
        let p = MoveProcessor::new(ProcessorConfig::all_or_nothing());
        let report = p.submit(&mut game, actions).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.applied, 2);
        assert!(game.world().unit_at(Hex::new(2, 0)).is_some());
    }
}
