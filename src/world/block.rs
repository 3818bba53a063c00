use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a block type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: BlockId = BlockId(0);
}

impl Default for BlockId {
    fn default() -> Self {
        BlockId::AIR
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A block type plus its variant, as captured in a snapshot.
///
/// The variant distinguishes sub-states of a type (orientation, growth
/// stage) that the value table may price separately from the generic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockState {
    pub id: BlockId,
    pub variant: u8,
}

impl BlockState {
    pub fn new(id: BlockId) -> Self {
        Self { id, variant: 0 }
    }

    pub fn with_variant(id: BlockId, variant: u8) -> Self {
        Self { id, variant }
    }

    pub fn is_empty(&self) -> bool {
        self.id == BlockId::AIR
    }
}

/// Registry mapping block type names to ids.
///
/// Built once while loading the value configuration, then shared read-only.
pub struct BlockRegistry {
    name_to_id: HashMap<String, BlockId>,
    names: Vec<String>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        // Index 0 is reserved for AIR
        let mut name_to_id = HashMap::new();
        name_to_id.insert("air".to_string(), BlockId::AIR);
        Self {
            name_to_id,
            names: vec!["air".to_string()],
        }
    }

    /// Intern a type name, returning its id (existing or freshly assigned)
    pub fn intern(&mut self, name: &str) -> BlockId {
        if let Some(id) = self.name_to_id.get(name) {
            return *id;
        }
        let id = BlockId(self.names.len() as u16);
        self.names.push(name.to_string());
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// Get an id by name without interning
    pub fn get_id(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Get the name for an id
    pub fn name(&self, id: BlockId) -> &str {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
