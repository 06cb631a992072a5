//! World-probe types and predicates.
//!
//! Thin, pure query surface over whatever the block/entity accessor
//! returned for the current tick. Nothing here caches: a `BlockInfo` is a
//! snapshot valid for one tick only, and callers re-fetch before use.

use crate::geometry::{Axis, BlockPos, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of one cell, as reported by the external block accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub pos: BlockPos,
    pub name: String,
    /// Whether the cell blocks movement.
    pub solid: bool,
    /// Water, lava and friends.
    pub liquid: bool,
    /// Whether an excavation tool can break it at all.
    pub diggable: bool,
    /// Light level 0–15 at this cell.
    pub light: u8,
    /// Portal plane axis, when the block is a portal.
    pub axis: Option<Axis>,
}

impl BlockInfo {
    pub fn is_air(&self) -> bool {
        self.name == "air"
    }

    /// Can the agent's body occupy this cell.
    pub fn is_passable(&self) -> bool {
        !self.solid && !self.liquid
    }

    /// Can the agent stand on this cell.
    pub fn is_solid_ground(&self) -> bool {
        self.solid && !self.liquid
    }

    /// Cells that end an agent: lava and the void.
    pub fn is_dangerous(&self) -> bool {
        self.name == "lava" || self.name == "void"
    }

    pub fn is_portal(&self) -> bool {
        PortalKind::from_block_name(&self.name).is_some()
    }
}

/// An inventory stack, as reported by the external inventory manager.
///
/// `placeable` means the item has a solid block form — the inventory
/// manager knows, the controller does not second-guess it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub count: u32,
    pub placeable: bool,
}

impl Item {
    pub fn new(name: impl Into<String>, count: u32, placeable: bool) -> Self {
        Self {
            name: name.into(),
            count,
            placeable,
        }
    }
}

/// A nearby entity, as reported by the entity accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub name: String,
    pub position: Position,
}

/// The dimension the agent currently inhabits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Overworld,
    Nether,
    End,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overworld => write!(f, "overworld"),
            Self::Nether => write!(f, "nether"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Portal varieties the handshake knows how to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalKind {
    Nether,
    End,
}

impl PortalKind {
    pub fn block_name(&self) -> &'static str {
        match self {
            Self::Nether => "nether_portal",
            Self::End => "end_portal",
        }
    }

    pub fn from_block_name(name: &str) -> Option<Self> {
        match name {
            "nether_portal" => Some(Self::Nether),
            "end_portal" => Some(Self::End),
            _ => None,
        }
    }

    /// Where this portal leads from the given dimension.
    pub fn destination_from(&self, from: Dimension) -> Dimension {
        match (self, from) {
            (Self::Nether, Dimension::Nether) => Dimension::Overworld,
            (Self::Nether, _) => Dimension::Nether,
            (Self::End, Dimension::End) => Dimension::Overworld,
            (Self::End, _) => Dimension::End,
        }
    }
}

impl fmt::Display for PortalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nether => write!(f, "nether"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Whether an inventory item may be spent as pillar scaffolding.
///
/// Candidates must have a solid block form and must not match the
/// exclusion list (ores, valuables, spawners, portal blocks — anything
/// too precious to bury in a pillar).
pub fn is_scaffold_candidate(item: &Item, exclusions: &[String]) -> bool {
    if !item.placeable || item.count == 0 {
        return false;
    }
    let name = item.name.to_ascii_lowercase();
    !exclusions.iter().any(|e| name.contains(e.as_str()))
}

/// Total scaffold blocks available across the inventory.
pub fn scaffold_count(items: &[Item], exclusions: &[String]) -> u32 {
    items
        .iter()
        .filter(|i| is_scaffold_candidate(i, exclusions))
        .map(|i| i.count)
        .sum()
}

/// Pick the best excavation tool from the inventory, pickaxes first.
pub fn best_excavation_tool(items: &[Item]) -> Option<&Item> {
    const TOOL_ORDER: [&str; 3] = ["pickaxe", "shovel", "axe"];
    for kind in TOOL_ORDER {
        if let Some(item) = items
            .iter()
            .filter(|i| i.count > 0 && i.name.contains(kind))
            .max_by_key(|i| tool_grade(&i.name))
        {
            return Some(item);
        }
    }
    None
}

fn tool_grade(name: &str) -> u8 {
    const GRADES: [(&str, u8); 5] = [
        ("netherite", 5),
        ("diamond", 4),
        ("iron", 3),
        ("stone", 2),
        ("wooden", 1),
    ];
    GRADES
        .iter()
        .find(|(m, _)| name.contains(m))
        .map(|(_, g)| *g)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(name: &str, solid: bool, liquid: bool) -> BlockInfo {
        BlockInfo {
            pos: BlockPos::new(0, 64, 0),
            name: name.to_string(),
            solid,
            liquid,
            diggable: true,
            light: 0,
            axis: None,
        }
    }

    #[test]
    fn test_probe_predicates() {
        assert!(block("air", false, false).is_passable());
        assert!(!block("stone", true, false).is_passable());
        assert!(!block("water", false, true).is_passable());
        assert!(block("stone", true, false).is_solid_ground());
        assert!(block("lava", false, true).is_dangerous());
        assert!(!block("water", false, true).is_dangerous());
    }

    #[test]
    fn test_scaffold_exclusions() {
        let exclusions = vec!["ore".to_string(), "spawner".to_string()];
        assert!(is_scaffold_candidate(
            &Item::new("cobblestone", 12, true),
            &exclusions
        ));
        assert!(!is_scaffold_candidate(
            &Item::new("iron_ore", 12, true),
            &exclusions
        ));
        assert!(!is_scaffold_candidate(
            &Item::new("bread", 12, false),
            &exclusions
        ));
        assert!(!is_scaffold_candidate(
            &Item::new("cobblestone", 0, true),
            &exclusions
        ));
    }

    #[test]
    fn test_scaffold_count_aggregates() {
        let exclusions = vec!["ore".to_string()];
        let items = vec![
            Item::new("cobblestone", 12, true),
            Item::new("dirt", 5, true),
            Item::new("gold_ore", 9, true),
        ];
        assert_eq!(scaffold_count(&items, &exclusions), 17);
    }

    #[test]
    fn test_tool_selection_prefers_pickaxe_then_grade() {
        let items = vec![
            Item::new("iron_shovel", 1, false),
            Item::new("stone_pickaxe", 1, false),
            Item::new("diamond_pickaxe", 1, false),
        ];
        assert_eq!(
            best_excavation_tool(&items).map(|i| i.name.as_str()),
            Some("diamond_pickaxe")
        );

        let shovel_only = vec![Item::new("iron_shovel", 1, false)];
        assert_eq!(
            best_excavation_tool(&shovel_only).map(|i| i.name.as_str()),
            Some("iron_shovel")
        );
        assert!(best_excavation_tool(&[]).is_none());
    }

    #[test]
    fn test_portal_destinations() {
        assert_eq!(
            PortalKind::Nether.destination_from(Dimension::Overworld),
            Dimension::Nether
        );
        assert_eq!(
            PortalKind::Nether.destination_from(Dimension::Nether),
            Dimension::Overworld
        );
        assert_eq!(
            PortalKind::End.destination_from(Dimension::Overworld),
            Dimension::End
        );
    }

    #[test]
    fn test_portal_block_names() {
        assert!(block("nether_portal", false, false).is_portal());
        assert!(!block("stone", true, false).is_portal());
        assert_eq!(
            PortalKind::from_block_name("end_portal"),
            Some(PortalKind::End)
        );
    }
}
