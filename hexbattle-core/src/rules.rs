//! Rules engine - data-driven unit/terrain catalog
//!
//! The catalog is loaded once (JSON) and treated as read-only afterwards.
//! Games share it through an `Arc`.

use std::path::Path;

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{TerrainTypeId, Unit, UnitTypeId};

/// Tolerance when checking that a distribution's probabilities sum to one
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

const EMBEDDED_RULES: &str = include_str!("../data/default_rules.json");

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown unit type: {0}")]
    UnknownUnit(UnitTypeId),
    #[error("unknown terrain type: {0}")]
    UnknownTerrain(TerrainTypeId),
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: u32 },
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("invalid {kind} {id}: {reason}")]
    InvalidStat {
        kind: &'static str,
        id: u32,
        reason: String,
    },
    #[error("invalid damage distribution for {attacker}:{defender}: {reason}")]
    InvalidDistribution {
        attacker: UnitTypeId,
        defender: UnitTypeId,
        reason: String,
    },
}

// ============================================================================
// CATALOG RECORDS
// ============================================================================

/// Static stats for a unit type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitData {
    pub id: UnitTypeId,
    pub name: String,
    pub health: i32,
    pub movement_points: f64,
    pub attack_range: i32,
    #[serde(default = "default_min_attack_range")]
    pub min_attack_range: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub properties: Vec<String>,
}

fn default_min_attack_range() -> i32 {
    1
}

/// Whether a terrain is natural or a player-ownable structure
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    #[default]
    Nature,
    Player,
}

/// Static stats for a terrain type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainData {
    pub id: TerrainTypeId,
    pub name: String,
    pub base_move_cost: f64,
    #[serde(default)]
    pub defense_bonus: f64,
    #[serde(default)]
    pub kind: TerrainKind,
}

/// Per-unit override of a terrain's properties
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainUnitProperties {
    pub terrain_id: TerrainTypeId,
    pub unit_id: UnitTypeId,
    #[serde(default)]
    pub movement_cost: Option<f64>,
    #[serde(default)]
    pub impassable: bool,
    #[serde(default)]
    pub defense_bonus: Option<f64>,
}

/// One band of a damage distribution
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageRange {
    pub min_value: f64,
    pub max_value: f64,
    pub probability: f64,
}

/// Attack table entry. Absence of a pair means the attacker cannot target
/// that defender type at all.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackEntry {
    pub attacker_id: UnitTypeId,
    pub defender_id: UnitTypeId,
    pub ranges: Vec<DamageRange>,
}

/// The raw catalog as stored on disk
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RulesCatalog {
    pub units: Vec<UnitData>,
    pub terrains: Vec<TerrainData>,
    #[serde(default)]
    pub terrain_unit_properties: Vec<TerrainUnitProperties>,
    #[serde(default)]
    pub attacks: Vec<AttackEntry>,
}

// ============================================================================
// DAMAGE PREDICTION
// ============================================================================

/// Discrete damage distribution for one attacker/defender type pairing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DamagePrediction {
    pub expected_damage: f64,
    pub ranges: Vec<DamageRange>,
}

impl DamagePrediction {
    /// Validate bands and derive the expected value.
    /// Each band contributes the midpoint of the integers it covers.
    fn from_ranges(
        attacker: UnitTypeId,
        defender: UnitTypeId,
        ranges: Vec<DamageRange>,
    ) -> Result<Self, RulesError> {
        let invalid = |reason: String| RulesError::InvalidDistribution {
            attacker,
            defender,
            reason,
        };

        if ranges.is_empty() {
            return Err(invalid("no damage ranges".to_string()));
        }

        let mut total = 0.0;
        let mut expected = 0.0;
        let mut prev_max: Option<f64> = None;
        for band in &ranges {
            let (lo, hi) = (band.min_value.ceil(), band.max_value.floor());
            if band.min_value < 0.0 || lo > hi {
                return Err(invalid(format!(
                    "band [{}, {}] covers no damage values",
                    band.min_value, band.max_value
                )));
            }
            if !(0.0..=1.0).contains(&band.probability) {
                return Err(invalid(format!("probability {} out of range", band.probability)));
            }
            if let Some(prev) = prev_max {
                if band.min_value <= prev {
                    return Err(invalid("bands overlap or are not ascending".to_string()));
                }
            }
            prev_max = Some(band.max_value);
            total += band.probability;
            expected += band.probability * (lo + hi) / 2.0;
        }

        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(invalid(format!("probabilities sum to {total}")));
        }

        Ok(Self {
            expected_damage: expected,
            ranges,
        })
    }

    pub fn probability_mass(&self) -> f64 {
        self.ranges.iter().map(|r| r.probability).sum()
    }

    /// Draw a damage value: pick a band by cumulative probability, then a
    /// uniform integer inside it. Empty predictions deal no damage.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let roll: f64 = rng.gen();
        let mut acc = 0.0;
        let band = self
            .ranges
            .iter()
            .find(|band| {
                acc += band.probability;
                roll < acc
            })
            .or_else(|| self.ranges.last());

        match band {
            Some(band) => {
                let lo = band.min_value.ceil() as i32;
                let hi = band.max_value.floor() as i32;
                rng.gen_range(lo..=hi)
            }
            None => 0,
        }
    }
}

// ============================================================================
// ATTACK ELIGIBILITY
// ============================================================================

/// Why an attack is not possible
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum AttackDenied {
    #[error("cannot attack your own units")]
    SameOwner,
    #[error("unit type {attacker_type} cannot target unit type {defender_type}")]
    NotTargetable {
        attacker_type: UnitTypeId,
        defender_type: UnitTypeId,
    },
    #[error("target at distance {distance} is outside attack range {min}-{max}")]
    OutOfRange { distance: i32, min: i32, max: i32 },
}

/// Outcome of `RulesEngine::can_unit_attack_target`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttackCheck {
    Allowed,
    Denied(AttackDenied),
}

impl AttackCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AttackCheck::Allowed)
    }
}

// ============================================================================
// CATALOG VALIDATION
// ============================================================================

/// Movement costs must be finite and non-negative so path search terminates.
/// Impassable terrain is declared with the override flag, not an infinite cost.
fn check_cost(kind: &'static str, id: u32, cost: f64) -> Result<(), RulesError> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(RulesError::InvalidStat {
            kind,
            id,
            reason: format!("movement cost {cost} must be finite and non-negative"),
        });
    }
    Ok(())
}

fn check_unit_stats(unit: &UnitData) -> Result<(), RulesError> {
    let invalid = |reason: String| RulesError::InvalidStat {
        kind: "unit",
        id: unit.id,
        reason,
    };
    if unit.health <= 0 {
        return Err(invalid(format!("health {} must be positive", unit.health)));
    }
    if !unit.movement_points.is_finite() || unit.movement_points <= 0.0 {
        return Err(invalid(format!(
            "movement points {} must be positive",
            unit.movement_points
        )));
    }
    if unit.min_attack_range < 1 || unit.attack_range < unit.min_attack_range {
        return Err(invalid(format!(
            "attack range {}-{} is empty",
            unit.min_attack_range, unit.attack_range
        )));
    }
    Ok(())
}

// ============================================================================
// RULES ENGINE
// ============================================================================

#[derive(Clone, Debug)]
pub struct RulesEngine {
    units: FxHashMap<UnitTypeId, UnitData>,
    terrains: FxHashMap<TerrainTypeId, TerrainData>,
    terrain_unit: FxHashMap<(TerrainTypeId, UnitTypeId), TerrainUnitProperties>,
    attacks: FxHashMap<(UnitTypeId, UnitTypeId), DamagePrediction>,
}

impl RulesEngine {
    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, RulesError> {
        let catalog: RulesCatalog = serde_json::from_str(content)?;
        Self::from_catalog(catalog)
    }

    /// The catalog bundled with the crate
    pub fn embedded() -> Result<Self, RulesError> {
        Self::from_json_str(EMBEDDED_RULES)
    }

    /// Index and validate a catalog
    pub fn from_catalog(catalog: RulesCatalog) -> Result<Self, RulesError> {
        let mut units = FxHashMap::default();
        for unit in catalog.units {
            check_unit_stats(&unit)?;
            let id = unit.id;
            if units.insert(id, unit).is_some() {
                return Err(RulesError::DuplicateId { kind: "unit", id });
            }
        }

        let mut terrains = FxHashMap::default();
        for terrain in catalog.terrains {
            check_cost("terrain", terrain.id, terrain.base_move_cost)?;
            let id = terrain.id;
            if terrains.insert(id, terrain).is_some() {
                return Err(RulesError::DuplicateId { kind: "terrain", id });
            }
        }

        let mut terrain_unit = FxHashMap::default();
        for props in catalog.terrain_unit_properties {
            if !terrains.contains_key(&props.terrain_id) {
                return Err(RulesError::MissingId(format!("terrain {}", props.terrain_id)));
            }
            if !units.contains_key(&props.unit_id) {
                return Err(RulesError::MissingId(format!("unit {}", props.unit_id)));
            }
            if let Some(cost) = props.movement_cost {
                check_cost("terrain override", props.terrain_id, cost)?;
            }
            terrain_unit.insert((props.terrain_id, props.unit_id), props);
        }

        let mut attacks = FxHashMap::default();
        for entry in catalog.attacks {
            for id in [entry.attacker_id, entry.defender_id] {
                if !units.contains_key(&id) {
                    return Err(RulesError::MissingId(format!("unit {id}")));
                }
            }
            let prediction =
                DamagePrediction::from_ranges(entry.attacker_id, entry.defender_id, entry.ranges)?;
            attacks.insert((entry.attacker_id, entry.defender_id), prediction);
        }

        Ok(Self {
            units,
            terrains,
            terrain_unit,
            attacks,
        })
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn unit_data(&self, unit_type: UnitTypeId) -> Result<&UnitData, RulesError> {
        self.units
            .get(&unit_type)
            .ok_or(RulesError::UnknownUnit(unit_type))
    }

    pub fn terrain_data(&self, terrain_type: TerrainTypeId) -> Result<&TerrainData, RulesError> {
        self.terrains
            .get(&terrain_type)
            .ok_or(RulesError::UnknownTerrain(terrain_type))
    }

    /// All unit type ids, ascending
    pub fn unit_types(&self) -> Vec<UnitTypeId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All terrain type ids, ascending
    pub fn terrain_types(&self) -> Vec<TerrainTypeId> {
        let mut ids: Vec<_> = self.terrains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ========================================================================
    // MOVEMENT
    // ========================================================================

    /// Cost for `unit_type` to enter a tile of `terrain_type`.
    /// `f64::INFINITY` means the unit cannot enter that terrain.
    pub fn movement_cost(
        &self,
        unit_type: UnitTypeId,
        terrain_type: TerrainTypeId,
    ) -> Result<f64, RulesError> {
        self.unit_data(unit_type)?;
        let terrain = self.terrain_data(terrain_type)?;

        match self.terrain_unit.get(&(terrain_type, unit_type)) {
            Some(props) if props.impassable => Ok(f64::INFINITY),
            Some(TerrainUnitProperties {
                movement_cost: Some(cost),
                ..
            }) => Ok(*cost),
            _ => Ok(terrain.base_move_cost),
        }
    }

    /// Defense bonus of `terrain_type` for `unit_type`, override first
    pub fn defense_bonus(
        &self,
        unit_type: UnitTypeId,
        terrain_type: TerrainTypeId,
    ) -> Result<f64, RulesError> {
        let terrain = self.terrain_data(terrain_type)?;
        Ok(self
            .terrain_unit
            .get(&(terrain_type, unit_type))
            .and_then(|p| p.defense_bonus)
            .unwrap_or(terrain.defense_bonus))
    }

    // ========================================================================
    // COMBAT
    // ========================================================================

    /// Damage distribution for an attacker/defender type pairing, plus
    /// whether the pairing can fight at all. Independent of range, terrain
    /// and current health.
    pub fn combat_prediction(
        &self,
        attacker_type: UnitTypeId,
        defender_type: UnitTypeId,
    ) -> Result<(DamagePrediction, bool), RulesError> {
        self.unit_data(attacker_type)?;
        self.unit_data(defender_type)?;
        Ok(match self.attacks.get(&(attacker_type, defender_type)) {
            Some(prediction) => (prediction.clone(), true),
            None => (DamagePrediction::default(), false),
        })
    }

    /// Combine ownership, attack range and the attack table
    pub fn can_unit_attack_target(
        &self,
        attacker: &Unit,
        defender: &Unit,
    ) -> Result<AttackCheck, RulesError> {
        if attacker.player == defender.player {
            return Ok(AttackCheck::Denied(AttackDenied::SameOwner));
        }

        let (_, can_attack) = self.combat_prediction(attacker.unit_type, defender.unit_type)?;
        if !can_attack {
            return Ok(AttackCheck::Denied(AttackDenied::NotTargetable {
                attacker_type: attacker.unit_type,
                defender_type: defender.unit_type,
            }));
        }

        let data = self.unit_data(attacker.unit_type)?;
        let distance = attacker.coord.distance_to(defender.coord);
        if distance < data.min_attack_range || distance > data.attack_range {
            return Ok(AttackCheck::Denied(AttackDenied::OutOfRange {
                distance,
                min: data.min_attack_range,
                max: data.attack_range,
            }));
        }

        Ok(AttackCheck::Allowed)
    }
}
