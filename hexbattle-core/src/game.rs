//! Game state: turn order, unit refresh and victory

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::board::Hex;
use crate::rules::{RulesEngine, RulesError};
use crate::snapshot::{GameSnapshot, SnapshotError, WorldData, SNAPSHOT_VERSION};
use crate::world::{PlayerId, World, WorldError};

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("game is not active (status {0:?})")]
    NotActive(GameStatus),
    #[error("invalid game state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Hard error inside a batch; `applied` actions remain on the game
    #[error("batch aborted at action {index} ({applied} applied): {source}")]
    BatchAborted {
        index: usize,
        applied: usize,
        source: Box<GameError>,
    },
}

/// Authoritative game: world plus turn bookkeeping and the seeded RNG
#[derive(Clone, Debug)]
pub struct Game {
    world: World,
    rules: Arc<RulesEngine>,
    current_player: PlayerId,
    turn_counter: u32,
    status: GameStatus,
    seed: u64,
    winner: Option<PlayerId>,
    rng: ChaCha8Rng,
}

impl Game {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Start a game on `world`. Units get their health and movement from the
    /// catalog; player 1 moves first on turn 1.
    pub fn new(world: World, rules: Arc<RulesEngine>, seed: u64) -> Result<Self, GameError> {
        let mut game = Self {
            world,
            rules,
            current_player: 1,
            turn_counter: 1,
            status: GameStatus::Playing,
            seed,
            winner: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        game.initialize_starting_units()?;
        game.validate()?;
        debug!(
            players = game.world.player_count(),
            tiles = game.world.tile_count(),
            seed,
            "game created"
        );
        Ok(game)
    }

    fn initialize_starting_units(&mut self) -> Result<(), GameError> {
        let turn = self.turn_counter;
        for player in 1..=self.world.player_count() {
            for coord in self.world.player_unit_coords(player) {
                self.refresh_unit(coord, turn, true)?;
            }
        }
        Ok(())
    }

    /// Restore movement (and optionally health) from the catalog
    fn refresh_unit(&mut self, coord: Hex, turn: u32, restore_health: bool) -> Result<(), GameError> {
        let unit = self
            .world
            .unit_at_mut(coord)
            .ok_or(WorldError::NoUnit(coord))?;
        let data = self.rules.unit_data(unit.unit_type)?;
        if restore_health {
            unit.current_health = data.health;
        }
        unit.movement_remaining = data.movement_points;
        unit.turn_last_acted = turn;
        unit.has_attacked = false;
        Ok(())
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for the move processor
    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn rules(&self) -> &Arc<RulesEngine> {
        &self.rules
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn turn_counter(&self) -> u32 {
        self.turn_counter
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Short label such as `A3`: player letter plus position in that
    /// player's unit list
    pub fn unit_label(&self, coord: Hex) -> Option<String> {
        let unit = self.world.unit_at(coord)?;
        let index = self
            .world
            .player_unit_coords(unit.player)
            .iter()
            .position(|c| *c == coord)?;
        let letter = char::from_u32('A' as u32 + unit.player - 1).unwrap_or('?');
        Some(format!("{letter}{}", index + 1))
    }

    // ========================================================================
    // TURN FLOW
    // ========================================================================

    /// Pass play to the next player. Wrapping back to player 1 starts a new
    /// turn. The incoming player's units are refreshed.
    pub fn end_turn(&mut self) -> Result<(), GameError> {
        if !self.is_playing() {
            return Err(GameError::NotActive(self.status));
        }

        let previous = self.current_player;
        self.current_player = previous % self.world.player_count() + 1;
        if self.current_player == 1 {
            self.turn_counter += 1;
        }

        let turn = self.turn_counter;
        for coord in self.world.player_unit_coords(self.current_player) {
            self.refresh_unit(coord, turn, false)?;
        }

        debug!(
            from = previous,
            to = self.current_player,
            turn = self.turn_counter,
            "turn ended"
        );
        self.check_victory();
        Ok(())
    }

    /// Exactly one player with units left wins. No players with units leaves
    /// the game running. Once ended the result never changes.
    pub fn check_victory(&mut self) -> Option<PlayerId> {
        if self.status == GameStatus::Ended {
            return self.winner;
        }

        let mut alive = (1..=self.world.player_count()).filter(|&p| self.world.unit_count(p) > 0);
        if let (Some(winner), None) = (alive.next(), alive.next()) {
            self.status = GameStatus::Ended;
            self.winner = Some(winner);
            info!(winner, turn = self.turn_counter, "game over");
        }
        self.winner
    }

    pub fn pause(&mut self) -> Result<(), GameError> {
        match self.status {
            GameStatus::Playing => {
                self.status = GameStatus::Paused;
                Ok(())
            }
            other => Err(GameError::NotActive(other)),
        }
    }

    pub fn resume(&mut self) -> Result<(), GameError> {
        match self.status {
            GameStatus::Paused => {
                self.status = GameStatus::Playing;
                Ok(())
            }
            GameStatus::Playing => Ok(()),
            GameStatus::Ended => Err(GameError::NotActive(GameStatus::Ended)),
        }
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    pub fn validate(&self) -> Result<(), GameError> {
        let players = self.world.player_count();
        if self.current_player < 1 || self.current_player > players {
            return Err(GameError::InvalidState(format!(
                "current player {} outside 1..={players}",
                self.current_player
            )));
        }
        if self.turn_counter < 1 {
            return Err(GameError::InvalidState(format!(
                "turn counter {} below 1",
                self.turn_counter
            )));
        }
        if self.world.player_list_count() != players as usize {
            return Err(GameError::InvalidState(format!(
                "{} unit lists for {players} players",
                self.world.player_list_count()
            )));
        }
        if let Some(winner) = self.winner {
            if winner < 1 || winner > players {
                return Err(GameError::InvalidState(format!("winner {winner} is not a player")));
            }
        }
        self.world
            .check_consistency()
            .map_err(|e| GameError::InvalidState(e.to_string()))
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    pub fn to_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            version: SNAPSHOT_VERSION,
            player_count: self.world.player_count(),
            current_player: self.current_player,
            turn_counter: self.turn_counter,
            status: self.status,
            seed: self.seed,
            rng_word_pos: self.rng.get_word_pos() as u64,
            winner: self.winner,
            world: WorldData::from_world(&self.world),
        }
    }

    /// Rebuild a game from a snapshot. Unit stats are taken as saved, not
    /// refreshed from the catalog.
    pub fn from_snapshot(snapshot: GameSnapshot, rules: Arc<RulesEngine>) -> Result<Self, GameError> {
        let snapshot = snapshot.migrate()?;
        let world = snapshot.world.into_world(snapshot.player_count)?;

        for unit in world.units() {
            rules.unit_data(unit.unit_type)?;
        }
        for tile in world.tiles() {
            rules.terrain_data(tile.terrain_type)?;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(snapshot.seed);
        rng.set_word_pos(snapshot.rng_word_pos as u128);

        let game = Self {
            world,
            rules,
            current_player: snapshot.current_player,
            turn_counter: snapshot.turn_counter,
            status: snapshot.status,
            seed: snapshot.seed,
            winner: snapshot.winner,
            rng,
        };
        game.validate()?;
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Unit;
    use rand::Rng;

    fn rules() -> Arc<RulesEngine> {
        Arc::new(RulesEngine::embedded().unwrap())
    }

    fn world_with(players: u32, units: &[(PlayerId, Hex)]) -> World {
        let mut world = World::new(players).unwrap();
        for hex in Hex::new(0, 0).range(4) {
            world.set_tile_type(hex, 1);
        }
        for &(player, coord) in units {
            world.add_unit(Unit::new(1, player, coord)).unwrap();
        }
        world
    }

    #[test]
    fn test_new_initializes_units() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0))]);
        let game = Game::new(world, rules(), 1).unwrap();
        let unit = game.world().unit_at(Hex::new(0, 0)).unwrap();
        assert_eq!(unit.current_health, 10);
        assert_eq!(unit.movement_remaining, 3.0);
        assert_eq!(unit.turn_last_acted, 1);
        assert_eq!(game.current_player(), 1);
        assert_eq!(game.turn_counter(), 1);
        assert_eq!(game.status(), GameStatus::Playing);
    }

    #[test]
    fn test_new_rejects_unknown_unit_type() {
        let mut world = world_with(2, &[]);
        world.add_unit(Unit::new(99, 1, Hex::new(0, 0))).unwrap();
        assert!(matches!(
            Game::new(world, rules(), 1),
            Err(GameError::Rules(RulesError::UnknownUnit(99)))
        ));
    }

    #[test]
    fn test_new_rejects_unit_off_the_map() {
        let mut world = World::new(2).unwrap();
        world.set_tile_type(Hex::new(0, 0), 1);
        world.add_unit(Unit::new(1, 1, Hex::new(0, 0))).unwrap();
        world.add_unit(Unit::new(1, 2, Hex::new(4, 0))).unwrap();
        assert!(matches!(
            Game::new(world, rules(), 1),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_from_snapshot_rejects_unit_off_the_map() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0))]);
        let game = Game::new(world, rules(), 1).unwrap();
        let mut snapshot = game.to_snapshot();
        snapshot.world.tiles_map.remove("2,0");
        assert!(matches!(
            Game::from_snapshot(snapshot, rules()),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_turn_cycling() {
        let world = world_with(
            3,
            &[(1, Hex::new(0, 0)), (2, Hex::new(1, 0)), (3, Hex::new(2, 0))],
        );
        let mut game = Game::new(world, rules(), 1).unwrap();
        let mut players = Vec::new();
        let mut turns = Vec::new();
        for _ in 0..5 {
            game.end_turn().unwrap();
            players.push(game.current_player());
            turns.push(game.turn_counter());
        }
        assert_eq!(players, vec![2, 3, 1, 2, 3]);
        assert_eq!(turns, vec![1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_end_turn_refreshes_incoming_player() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0))]);
        let mut game = Game::new(world, rules(), 1).unwrap();
        game.world_mut().unit_at_mut(Hex::new(2, 0)).unwrap().movement_remaining = 0.0;
        game.world_mut().unit_at_mut(Hex::new(0, 0)).unwrap().movement_remaining = 0.0;
        game.world_mut().unit_at_mut(Hex::new(2, 0)).unwrap().has_attacked = true;

        game.end_turn().unwrap();
        let p2 = game.world().unit_at(Hex::new(2, 0)).unwrap();
        assert_eq!(p2.movement_remaining, 3.0);
        assert_eq!(p2.turn_last_acted, 1);
        assert!(!p2.has_attacked);
        // Player 1 is not refreshed until their turn comes round
        assert_eq!(game.world().unit_at(Hex::new(0, 0)).unwrap().movement_remaining, 0.0);

        game.end_turn().unwrap();
        let p1 = game.world().unit_at(Hex::new(0, 0)).unwrap();
        assert_eq!(p1.movement_remaining, 3.0);
        assert_eq!(p1.turn_last_acted, 2);
    }

    #[test]
    fn test_victory_single_survivor() {
        let world = world_with(3, &[(2, Hex::new(0, 0)), (2, Hex::new(1, 0))]);
        let mut game = Game::new(world, rules(), 1).unwrap();
        assert_eq!(game.check_victory(), Some(2));
        assert_eq!(game.status(), GameStatus::Ended);
        // Idempotent
        assert_eq!(game.check_victory(), Some(2));
        assert!(matches!(game.end_turn(), Err(GameError::NotActive(GameStatus::Ended))));
    }

    #[test]
    fn test_no_victory_with_two_players_alive() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0))]);
        let mut game = Game::new(world, rules(), 1).unwrap();
        assert_eq!(game.check_victory(), None);
        assert!(game.is_playing());
    }

    #[test]
    fn test_no_victory_with_empty_board() {
        let world = world_with(2, &[]);
        let mut game = Game::new(world, rules(), 1).unwrap();
        assert_eq!(game.check_victory(), None);
        assert!(game.is_playing());
        game.end_turn().unwrap();
    }

    #[test]
    fn test_pause_blocks_end_turn() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0))]);
        let mut game = Game::new(world, rules(), 1).unwrap();
        game.pause().unwrap();
        assert!(matches!(game.end_turn(), Err(GameError::NotActive(GameStatus::Paused))));
        game.resume().unwrap();
        game.end_turn().unwrap();
        assert_eq!(game.current_player(), 2);
    }

    #[test]
    fn test_unit_label() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0)), (2, Hex::new(3, 0))]);
        let game = Game::new(world, rules(), 1).unwrap();
        assert_eq!(game.unit_label(Hex::new(0, 0)).as_deref(), Some("A1"));
        assert_eq!(game.unit_label(Hex::new(3, 0)).as_deref(), Some("B2"));
        assert_eq!(game.unit_label(Hex::new(-1, 0)), None);
    }

    #[test]
    fn test_snapshot_preserves_rng_stream() {
        let world = world_with(2, &[(1, Hex::new(0, 0)), (2, Hex::new(2, 0))]);
        let mut game = Game::new(world, rules(), 99).unwrap();
        let _: u32 = game.rng_mut().gen();

        let mut restored = Game::from_snapshot(game.to_snapshot(), rules()).unwrap();
        let expected: Vec<u32> = (0..8).map(|_| game.rng_mut().gen()).collect();
        let actual: Vec<u32> = (0..8).map(|_| restored.rng_mut().gen()).collect();
        assert_eq!(expected, actual);
        assert_eq!(restored.current_player(), game.current_player());
    }

    #[test]
    fn test_from_snapshot_rejects_bad_current_player() {
        let world = world_with(2, &[(1, Hex::new(0, 0))]);
        let game = Game::new(world, rules(), 1).unwrap();
        let mut snapshot = game.to_snapshot();
        snapshot.current_player = 5;
        assert!(matches!(
            Game::from_snapshot(snapshot, rules()),
            Err(GameError::InvalidState(_))
        ));
    }
}
