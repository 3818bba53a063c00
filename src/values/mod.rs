//! Block value table
//!
//! One prioritized lookup chain shared by the scorer and the breakdown
//! report: specific type (`name:variant`) → generic type → world-specific
//! override → global default → unconfigured.

use crate::config::{DeathMode, ScoringConfig};
use crate::world::{BlockId, BlockRegistry, BlockState, WorldId};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a value lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valuation {
    /// Points per occurrence
    Value(i64),
    /// No table matched; tallied into the unconfigured bucket at zero
    Unconfigured,
}

/// Resolved, id-keyed view of the scoring configuration.
///
/// Built once at load time; shared read-only across the pipeline.
pub struct ValueTable {
    registry: Arc<BlockRegistry>,
    specific: HashMap<(BlockId, u8), i64>,
    generic: HashMap<BlockId, i64>,
    world_specific: HashMap<WorldId, HashMap<(BlockId, u8), i64>>,
    world_generic: HashMap<WorldId, HashMap<BlockId, i64>>,
    world_sea_height: HashMap<WorldId, i32>,
    limits: HashMap<BlockId, u64>,
    default_value: Option<i64>,
    sea_height: i32,
    underwater_multiplier: f64,
    level_cost: i64,
    death_penalty: i64,
    death_mode: DeathMode,
    formula: String,
}

/// Split a `name:variant` key into its parts
fn parse_key(key: &str) -> (&str, Option<u8>) {
    match key.rsplit_once(':') {
        Some((name, variant)) => match variant.parse() {
            Ok(v) => (name, Some(v)),
            Err(_) => (key, None),
        },
        None => (key, None),
    }
}

impl ValueTable {
    /// Build the table from a sanitized configuration, interning every
    /// named type into a fresh registry.
    pub fn from_config(config: &ScoringConfig) -> Self {
        let mut registry = BlockRegistry::new();
        let mut specific = HashMap::new();
        let mut generic = HashMap::new();

        for (key, &value) in &config.blocks {
            let (name, variant) = parse_key(key);
            let id = registry.intern(name);
            match variant {
                Some(v) => {
                    specific.insert((id, v), value);
                }
                None => {
                    generic.insert(id, value);
                }
            }
        }

        let mut limits = HashMap::new();
        for (name, &limit) in &config.limits {
            limits.insert(registry.intern(name), limit);
        }

        let mut world_specific = HashMap::new();
        let mut world_generic = HashMap::new();
        let mut world_sea_height = HashMap::new();
        for (world_name, overrides) in &config.worlds {
            let world = WorldId::new(world_name.clone());
            if let Some(sea) = overrides.sea_height {
                world_sea_height.insert(world.clone(), sea);
            }
            let mut w_specific = HashMap::new();
            let mut w_generic = HashMap::new();
            for (key, &value) in &overrides.blocks {
                let (name, variant) = parse_key(key);
                let id = registry.intern(name);
                match variant {
                    Some(v) => {
                        w_specific.insert((id, v), value);
                    }
                    None => {
                        w_generic.insert(id, value);
                    }
                }
            }
            if !w_specific.is_empty() {
                world_specific.insert(world.clone(), w_specific);
            }
            if !w_generic.is_empty() {
                world_generic.insert(world.clone(), w_generic);
            }
        }

        log::info!(
            "value table loaded: {} types, {} capped, {} world overrides",
            registry.len() - 1,
            limits.len(),
            config.worlds.len()
        );

        Self {
            registry: Arc::new(registry),
            specific,
            generic,
            world_specific,
            world_generic,
            world_sea_height,
            limits,
            default_value: config.default_value,
            sea_height: config.sea_height,
            underwater_multiplier: config.underwater_multiplier,
            level_cost: config.level_cost,
            death_penalty: config.death_penalty,
            death_mode: config.death_mode,
            formula: config.formula.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Resolve the value of one captured block state in `world`
    pub fn value_of(&self, state: BlockState, world: &WorldId) -> Valuation {
        if let Some(&value) = self.specific.get(&(state.id, state.variant)) {
            return Valuation::Value(value);
        }
        if let Some(&value) = self.generic.get(&state.id) {
            return Valuation::Value(value);
        }
        if let Some(&value) = self
            .world_specific
            .get(world)
            .and_then(|m| m.get(&(state.id, state.variant)))
        {
            return Valuation::Value(value);
        }
        if let Some(&value) = self.world_generic.get(world).and_then(|m| m.get(&state.id)) {
            return Valuation::Value(value);
        }
        match self.default_value {
            Some(value) => Valuation::Value(value),
            None => Valuation::Unconfigured,
        }
    }

    /// Tally cap for a type; `None` means uncapped
    pub fn limit_of(&self, id: BlockId) -> Option<u64> {
        self.limits.get(&id).copied()
    }

    /// Sea height threshold in `world`; 0 disables underwater scoring
    pub fn sea_height(&self, world: &WorldId) -> i32 {
        self.world_sea_height
            .get(world)
            .copied()
            .unwrap_or(self.sea_height)
    }

    pub fn underwater_multiplier(&self) -> f64 {
        self.underwater_multiplier
    }

    pub fn level_cost(&self) -> i64 {
        self.level_cost
    }

    pub fn death_penalty(&self) -> i64 {
        self.death_penalty
    }

    pub fn death_mode(&self) -> DeathMode {
        self.death_mode
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldOverrides;

    fn table() -> ValueTable {
        let mut config = ScoringConfig::default();
        config.blocks.insert("stone".to_string(), 1);
        config.blocks.insert("spruce_log".to_string(), 2);
        config.blocks.insert("spruce_log:1".to_string(), 7);
        config.limits.insert("hopper".to_string(), 5);
        config.blocks.insert("hopper".to_string(), 10);
        config.worlds.insert(
            "nether".to_string(),
            WorldOverrides {
                sea_height: Some(32),
                blocks: [("netherrack".to_string(), 3)].into_iter().collect(),
            },
        );
        config.sea_height = 53;
        ValueTable::from_config(&config)
    }

    #[test]
    fn test_specific_beats_generic() {
        let table = table();
        let id = table.registry().get_id("spruce_log").unwrap();
        assert_eq!(
            table.value_of(BlockState::with_variant(id, 1), &WorldId::new("overworld")),
            Valuation::Value(7)
        );
        assert_eq!(
            table.value_of(BlockState::with_variant(id, 2), &WorldId::new("overworld")),
            Valuation::Value(2)
        );
    }

    #[test]
    fn test_world_override_and_unconfigured() {
        let table = table();
        let id = table.registry().get_id("netherrack").unwrap();
        assert_eq!(
            table.value_of(BlockState::new(id), &WorldId::new("nether")),
            Valuation::Value(3)
        );
        // No global entry, no override in this world, no default
        assert_eq!(
            table.value_of(BlockState::new(id), &WorldId::new("overworld")),
            Valuation::Unconfigured
        );
    }

    #[test]
    fn test_global_default_catches_rest() {
        let mut config = ScoringConfig::default();
        config.default_value = Some(4);
        let table = ValueTable::from_config(&config);
        assert_eq!(
            table.value_of(BlockState::new(BlockId(999)), &WorldId::new("overworld")),
            Valuation::Value(4)
        );
    }

    #[test]
    fn test_sea_height_override() {
        let table = table();
        assert_eq!(table.sea_height(&WorldId::new("nether")), 32);
        assert_eq!(table.sea_height(&WorldId::new("overworld")), 53);
    }

    #[test]
    fn test_limits() {
        let table = table();
        let hopper = table.registry().get_id("hopper").unwrap();
        assert_eq!(table.limit_of(hopper), Some(5));
        let stone = table.registry().get_id("stone").unwrap();
        assert_eq!(table.limit_of(stone), None);
    }
}
