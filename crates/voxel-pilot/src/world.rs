//! The live world, as the controller sees it.
//!
//! Every query returns a snapshot valid for the current tick only — the
//! world mutates under the agent, so handles are never retained across an
//! await point. Reads can fail (`NavError::Disconnected`) at any moment;
//! operations that must survive a mid-flight disconnect treat those
//! failures as benign.

use async_trait::async_trait;
use guidance::{BlockInfo, BlockPos, Dimension, Entity, Face, Item, NavError, Position};
use tokio::sync::broadcast;

/// Out-of-band world notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// The agent crossed into another dimension.
    DimensionChanged(Dimension),
    /// The agent respawned.
    Respawned,
    /// The connection to the world dropped.
    Disconnected,
}

/// Direct actuation channels, for forced movement outside the path engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Forward,
    Jump,
    Sneak,
}

/// Contract with the world/block accessor and the inventory manager.
#[async_trait]
pub trait WorldView: Send + Sync {
    /// The agent's feet position, fresh from the live snapshot.
    fn position(&self) -> Result<Position, NavError>;

    fn dimension(&self) -> Dimension;

    /// Block identity at a cell, or `None` outside the loaded world.
    fn block_at(&self, pos: BlockPos) -> Option<BlockInfo>;

    /// Nearest block matching the predicate within `range` of the agent.
    fn find_nearest_block(
        &self,
        predicate: &(dyn Fn(&BlockInfo) -> bool + Sync),
        range: f64,
    ) -> Option<BlockInfo>;

    /// Entities within `range` of the agent.
    fn find_entities(&self, range: f64) -> Result<Vec<Entity>, NavError>;

    /// The inventory, as the inventory manager reports it.
    fn inventory_items(&self) -> Vec<Item>;

    /// Wield an item.
    async fn equip(&self, item: &Item) -> Result<(), NavError>;

    /// Break the block at `pos`. Resolves when the block is gone.
    async fn excavate(&self, pos: BlockPos) -> Result<(), NavError>;

    /// Place the held block against `reference` on the given face.
    async fn place_block(&self, reference: BlockPos, face: Face) -> Result<(), NavError>;

    /// Press or release a control.
    async fn set_control(&self, control: Control, state: bool) -> Result<(), NavError>;

    /// Turn the agent's view toward a point.
    async fn look_at(&self, target: Position) -> Result<(), NavError>;

    /// Subscribe to world notifications. Dropping the receiver detaches.
    fn events(&self) -> broadcast::Receiver<WorldEvent>;
}

/// Equip the best excavation tool in the inventory, if any. Digging with
/// bare hands still works, just slowly, so an empty toolbox is not an
/// error.
pub async fn equip_excavation_tool(world: &dyn WorldView) -> Result<(), NavError> {
    let items = world.inventory_items();
    if let Some(tool) = guidance::world::best_excavation_tool(&items) {
        world.equip(tool).await?;
    }
    Ok(())
}
