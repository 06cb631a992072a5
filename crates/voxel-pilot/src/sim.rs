//! In-memory voxel world and path engine with toy kinematics.
//!
//! Backs the integration tests and the demo binary: a flat map of cells,
//! an agent with gravity/jump/step-up physics, and a straight-line
//! "pathfinder" that walks toward the goal and emits the same lifecycle
//! events a real engine would. Deliberately dumb — it cannot climb, so a
//! target overhead stalls exactly the way the controller must recover
//! from.
//!
//! All mutation goes through a shared state behind a mutex; the driver
//! task ticks physics every 50 ms of (possibly paused) tokio time.

use crate::engine::{Goal, PathEngine, PathEvent};
use crate::world::{Control, WorldEvent, WorldView};
use async_trait::async_trait;
use guidance::{
    Axis, BlockInfo, BlockPos, Dimension, Entity, Face, Item, NavError, PortalKind, Position,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(50);
const WALK_PER_TICK: f64 = 0.215;
const RISE_PER_TICK: f64 = 0.2;
const FALL_PER_TICK: f64 = 0.25;
const JUMP_TICKS: u32 = 6;
const DIG_DELAY: Duration = Duration::from_millis(100);
const PORTAL_TRANSIT_TICKS: u32 = 20;

#[derive(Debug)]
struct SimState {
    blocks: HashMap<BlockPos, String>,
    portal_axes: HashMap<BlockPos, Axis>,
    lights: HashMap<BlockPos, u8>,
    sky_level: i32,

    agent: Position,
    dimension: Dimension,
    inventory: Vec<Item>,
    equipped: Option<Item>,
    entities: Vec<Entity>,
    disconnected: bool,

    goal: Option<Goal>,
    goal_reached_sent: bool,
    moving: bool,
    excavating: bool,
    engine_paused: bool,

    jump_held: bool,
    forward_held: bool,
    look_target: Option<Position>,
    rise_ticks: u32,
    ticks_in_portal: u32,
    transited: bool,
}

impl SimState {
    fn new(agent: Position) -> Self {
        Self {
            blocks: HashMap::new(),
            portal_axes: HashMap::new(),
            lights: HashMap::new(),
            sky_level: 64,
            agent,
            dimension: Dimension::Overworld,
            inventory: Vec::new(),
            equipped: None,
            entities: Vec::new(),
            disconnected: false,
            goal: None,
            goal_reached_sent: false,
            moving: false,
            excavating: false,
            engine_paused: false,
            jump_held: false,
            forward_held: false,
            look_target: None,
            rise_ticks: 0,
            ticks_in_portal: 0,
            transited: false,
        }
    }

    fn name_at(&self, pos: BlockPos) -> &str {
        self.blocks.get(&pos).map(String::as_str).unwrap_or("air")
    }

    fn info_at(&self, pos: BlockPos) -> BlockInfo {
        let name = self.name_at(pos).to_string();
        let liquid = matches!(name.as_str(), "water" | "lava");
        let solid = !matches!(
            name.as_str(),
            "air" | "water" | "lava" | "void" | "nether_portal" | "end_portal"
        );
        let light = match self.lights.get(&pos) {
            Some(l) => *l,
            None if name == "air" && pos.y >= self.sky_level => 15,
            None => 0,
        };
        BlockInfo {
            pos,
            diggable: name != "bedrock",
            axis: self.portal_axes.get(&pos).copied(),
            name,
            solid,
            liquid,
            light,
        }
    }

    fn passable(&self, pos: BlockPos) -> bool {
        self.info_at(pos).is_passable() || self.info_at(pos).is_portal()
    }

    fn supported(&self) -> bool {
        let feet = self.agent.block();
        // Standing exactly on a block top.
        self.info_at(feet.down()).is_solid_ground() && (self.agent.y - feet.y as f64) < 0.05
    }
}

/// Shared handles for one simulated agent.
pub struct Sim {
    pub world: Arc<SimWorld>,
    pub engine: Arc<SimPathEngine>,
    driver: JoinHandle<()>,
}

impl Sim {
    /// Build a sim with the agent at `agent` and start the physics task.
    pub fn spawn(agent: Position) -> Self {
        let state = Arc::new(Mutex::new(SimState::new(agent)));
        let (world_tx, _) = broadcast::channel(64);
        let (path_tx, _) = broadcast::channel(64);

        let world = Arc::new(SimWorld {
            state: Arc::clone(&state),
            events: world_tx.clone(),
        });
        let engine = Arc::new(SimPathEngine {
            state: Arc::clone(&state),
            events: path_tx.clone(),
            avoided: Mutex::new(vec![
                "nether_portal".to_string(),
                "end_portal".to_string(),
                "lava".to_string(),
            ]),
        });

        let driver = tokio::spawn(drive(state, world_tx, path_tx));
        Self {
            world,
            engine,
            driver,
        }
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    state: Arc<Mutex<SimState>>,
    world_tx: broadcast::Sender<WorldEvent>,
    path_tx: broadcast::Sender<PathEvent>,
) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        let mut s = state.lock().expect("sim state poisoned");
        if s.disconnected {
            continue;
        }

        step_portal_transit(&mut s, &world_tx);
        step_vertical(&mut s);
        step_engine(&mut s, &path_tx);
        step_controls(&mut s);
    }
}

fn step_portal_transit(s: &mut SimState, world_tx: &broadcast::Sender<WorldEvent>) {
    let feet = s.agent.block();
    match PortalKind::from_block_name(s.name_at(feet)) {
        // One transit per stay: the agent has to leave the frame before
        // the portal will take it again.
        Some(_) if s.transited => {}
        Some(kind) => {
            s.ticks_in_portal += 1;
            if s.ticks_in_portal >= PORTAL_TRANSIT_TICKS {
                let dest = kind.destination_from(s.dimension);
                s.dimension = dest;
                s.ticks_in_portal = 0;
                s.transited = true;
                let _ = world_tx.send(WorldEvent::DimensionChanged(dest));
            }
        }
        None => {
            s.ticks_in_portal = 0;
            s.transited = false;
        }
    }
}

fn step_vertical(s: &mut SimState) {
    if s.rise_ticks > 0 {
        let next_y = s.agent.y + RISE_PER_TICK;
        let head = BlockPos::new(
            s.agent.x.floor() as i32,
            (next_y + 1.8).floor() as i32,
            s.agent.z.floor() as i32,
        );
        if s.info_at(head).is_solid_ground() {
            s.rise_ticks = 0;
        } else {
            s.agent.y = next_y;
            s.rise_ticks -= 1;
        }
        return;
    }

    if !s.supported() {
        let next_y = (s.agent.y - FALL_PER_TICK).max(-64.0);
        let below = BlockPos::new(
            s.agent.x.floor() as i32,
            next_y.floor() as i32,
            s.agent.z.floor() as i32,
        );
        if s.info_at(below).is_solid_ground() {
            s.agent.y = below.y as f64 + 1.0;
        } else {
            s.agent.y = next_y;
        }
        return;
    }

    if s.jump_held {
        s.rise_ticks = JUMP_TICKS;
    }
}

fn step_engine(s: &mut SimState, path_tx: &broadcast::Sender<PathEvent>) {
    if s.engine_paused {
        s.moving = false;
        return;
    }
    let Some(goal) = s.goal else {
        s.moving = false;
        return;
    };
    if s.agent.distance_to(goal.target) < goal.radius {
        if !s.goal_reached_sent {
            s.goal_reached_sent = true;
            let _ = path_tx.send(PathEvent::GoalReached);
        }
        s.moving = false;
        return;
    }
    s.moving = true;
    step_toward(s, goal.target);
}

fn step_controls(s: &mut SimState) {
    if s.forward_held {
        if let Some(look) = s.look_target {
            step_toward(s, look);
        }
    }
}

/// Horizontal straight-line step with 1-block step-up; blocked otherwise.
fn step_toward(s: &mut SimState, target: Position) {
    let Some((dx, dz)) = s.agent.horizontal_direction_to(target) else {
        return;
    };
    let reach = s.agent.horizontal_distance_to(target).min(WALK_PER_TICK);
    let next = s.agent.offset(dx * reach, 0.0, dz * reach);
    let cell = next.block();

    if s.passable(cell) && s.passable(cell.up()) {
        s.agent = next;
    } else if s.info_at(cell).is_solid_ground()
        && s.passable(cell.up())
        && s.passable(cell.offset(0, 2, 0))
        && s.supported()
    {
        s.agent = Position::new(next.x, cell.y as f64 + 1.0, next.z);
    }
    // else blocked: no movement this tick.
}

// ── the world half ────────────────────────────────────────────────────

pub struct SimWorld {
    state: Arc<Mutex<SimState>>,
    events: broadcast::Sender<WorldEvent>,
}

impl SimWorld {
    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("sim state poisoned")
    }

    // ── scenario builders ─────────────────────────────────────────────

    pub fn set_block(&self, pos: BlockPos, name: &str) {
        self.state().blocks.insert(pos, name.to_string());
    }

    /// Fill a horizontal slab from `(x0, z0)` to `(x1, z1)` at `y`.
    pub fn fill_floor(&self, y: i32, x0: i32, x1: i32, z0: i32, z1: i32, name: &str) {
        let mut s = self.state();
        for x in x0..=x1 {
            for z in z0..=z1 {
                s.blocks.insert(BlockPos::new(x, y, z), name.to_string());
            }
        }
    }

    /// Place a 1×2 portal column with its lowest cell at `base`.
    pub fn set_portal(&self, base: BlockPos, kind: PortalKind, axis: Axis) {
        let mut s = self.state();
        for cell in [base, base.up()] {
            s.blocks.insert(cell, kind.block_name().to_string());
            s.portal_axes.insert(cell, axis);
        }
    }

    pub fn set_light(&self, pos: BlockPos, level: u8) {
        self.state().lights.insert(pos, level);
    }

    pub fn set_sky_level(&self, y: i32) {
        self.state().sky_level = y;
    }

    pub fn set_inventory(&self, items: Vec<Item>) {
        self.state().inventory = items;
    }

    pub fn add_entity(&self, entity: Entity) {
        self.state().entities.push(entity);
    }

    pub fn set_excavating(&self, value: bool) {
        self.state().excavating = value;
    }

    pub fn teleport(&self, pos: Position) {
        self.state().agent = pos;
    }

    pub fn agent_position(&self) -> Position {
        self.state().agent
    }

    pub fn dimension_now(&self) -> Dimension {
        self.state().dimension
    }

    pub fn block_name(&self, pos: BlockPos) -> String {
        self.state().name_at(pos).to_string()
    }

    /// Sever the connection: reads start failing and an event goes out.
    pub fn disconnect(&self) {
        self.state().disconnected = true;
        let _ = self.events.send(WorldEvent::Disconnected);
    }

    pub fn world_event_subscribers(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl WorldView for SimWorld {
    fn position(&self) -> Result<Position, NavError> {
        let s = self.state();
        if s.disconnected {
            return Err(NavError::Disconnected("sim connection severed".into()));
        }
        Ok(s.agent)
    }

    fn dimension(&self) -> Dimension {
        self.state().dimension
    }

    fn block_at(&self, pos: BlockPos) -> Option<BlockInfo> {
        Some(self.state().info_at(pos))
    }

    fn find_nearest_block(
        &self,
        predicate: &(dyn Fn(&BlockInfo) -> bool + Sync),
        range: f64,
    ) -> Option<BlockInfo> {
        let s = self.state();
        s.blocks
            .keys()
            .map(|pos| s.info_at(*pos))
            .filter(|info| s.agent.distance_to(info.pos.center()) <= range && predicate(info))
            .min_by(|a, b| {
                s.agent
                    .distance_to(a.pos.center())
                    .partial_cmp(&s.agent.distance_to(b.pos.center()))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn find_entities(&self, range: f64) -> Result<Vec<Entity>, NavError> {
        let s = self.state();
        if s.disconnected {
            return Err(NavError::Disconnected("sim connection severed".into()));
        }
        Ok(s.entities
            .iter()
            .filter(|e| s.agent.distance_to(e.position) <= range)
            .cloned()
            .collect())
    }

    fn inventory_items(&self) -> Vec<Item> {
        self.state().inventory.clone()
    }

    async fn equip(&self, item: &Item) -> Result<(), NavError> {
        self.state().equipped = Some(item.clone());
        Ok(())
    }

    async fn excavate(&self, pos: BlockPos) -> Result<(), NavError> {
        {
            let s = self.state();
            if s.disconnected {
                return Err(NavError::Disconnected("sim connection severed".into()));
            }
            let info = s.info_at(pos);
            if !info.diggable {
                return Err(NavError::World(format!("cannot break {} at {pos}", info.name)));
            }
        }
        tokio::time::sleep(DIG_DELAY).await;
        self.state().blocks.remove(&pos);
        Ok(())
    }

    async fn place_block(&self, reference: BlockPos, face: Face) -> Result<(), NavError> {
        let mut s = self.state();
        let target = match face {
            Face::Up => reference.up(),
            Face::Down => reference.down(),
            Face::North => reference.offset(0, 0, -1),
            Face::South => reference.offset(0, 0, 1),
            Face::East => reference.offset(1, 0, 0),
            Face::West => reference.offset(-1, 0, 0),
        };
        if s.info_at(target).is_solid_ground() {
            return Err(NavError::World(format!("cell {target} already occupied")));
        }
        let Some(held) = s.equipped.clone().filter(|i| i.placeable) else {
            return Err(NavError::World("no placeable block equipped".into()));
        };
        let Some(stack) = s
            .inventory
            .iter_mut()
            .find(|i| i.name == held.name && i.count > 0)
        else {
            return Err(NavError::World(format!("no {} left to place", held.name)));
        };
        stack.count -= 1;
        s.blocks.insert(target, held.name);
        Ok(())
    }

    async fn set_control(&self, control: Control, value: bool) -> Result<(), NavError> {
        let mut s = self.state();
        match control {
            Control::Jump => s.jump_held = value,
            Control::Forward => s.forward_held = value,
            Control::Sneak => {}
        }
        Ok(())
    }

    async fn look_at(&self, target: Position) -> Result<(), NavError> {
        self.state().look_target = Some(target);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<WorldEvent> {
        self.events.subscribe()
    }
}

// ── the engine half ───────────────────────────────────────────────────

pub struct SimPathEngine {
    state: Arc<Mutex<SimState>>,
    events: broadcast::Sender<PathEvent>,
    avoided: Mutex<Vec<String>>,
}

impl SimPathEngine {
    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("sim state poisoned")
    }

    /// Inject a lifecycle event, as a real engine would emit it.
    pub fn emit(&self, event: PathEvent) {
        let _ = self.events.send(event);
    }

    /// Freeze the engine in place (it stops reporting `is_moving`).
    pub fn set_paused(&self, value: bool) {
        self.state().engine_paused = value;
    }

    pub fn path_event_subscribers(&self) -> usize {
        self.events.receiver_count()
    }
}

impl PathEngine for SimPathEngine {
    fn set_goal(&self, goal: Option<Goal>) {
        let mut s = self.state();
        s.goal = goal;
        s.goal_reached_sent = false;
        if goal.is_none() {
            s.moving = false;
        }
    }

    fn current_goal(&self) -> Option<Goal> {
        self.state().goal
    }

    fn is_moving(&self) -> bool {
        self.state().moving
    }

    fn is_excavating(&self) -> bool {
        self.state().excavating
    }

    fn subscribe(&self) -> broadcast::Receiver<PathEvent> {
        self.events.subscribe()
    }

    fn avoided_blocks(&self) -> Vec<String> {
        self.avoided.lock().expect("avoid list poisoned").clone()
    }

    fn set_avoided_blocks(&self, blocks: Vec<String>) {
        *self.avoided.lock().expect("avoid list poisoned") = blocks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_agent_walks_to_goal_and_reports() {
        let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
        sim.world.fill_floor(63, -5, 25, -5, 5, "stone");

        let mut events = sim.engine.subscribe();
        sim.engine.set_goal(Some(Goal::new(Position::new(10.5, 64.0, 0.5), 1.0)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(matches!(events.try_recv(), Ok(PathEvent::GoalReached)));
        assert!(sim.world.agent_position().distance_to(Position::new(10.5, 64.0, 0.5)) < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_blocked_by_wall_does_not_move(){
        let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
        sim.world.fill_floor(63, -5, 10, -5, 5, "stone");
        // Wall two blocks high right in front of the agent.
        for y in [64, 65, 66] {
            for z in -5..=5 {
                sim.world.set_block(BlockPos::new(2, y, z), "stone");
            }
        }
        sim.engine.set_goal(Some(Goal::new(Position::new(8.5, 64.0, 0.5), 1.0)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let pos = sim.world.agent_position();
        assert!(pos.x < 2.0, "agent should be stopped at the wall, was at {pos}");
        assert!(sim.engine.is_moving(), "engine still considers itself en route");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gravity_lands_on_floor() {
        let sim = Sim::spawn(Position::new(0.5, 70.0, 0.5));
        sim.world.fill_floor(63, -5, 5, -5, 5, "stone");
        tokio::time::sleep(Duration::from_secs(2)).await;
        let pos = sim.world.agent_position();
        assert!((pos.y - 64.0).abs() < 1e-6, "agent should rest at y=64, was {}", pos.y);
    }

    #[tokio::test(start_paused = true)]
    async fn test_portal_transit_changes_dimension() {
        let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
        sim.world.fill_floor(63, -5, 5, -5, 5, "stone");
        sim.world
            .set_portal(BlockPos::new(0, 64, 0), PortalKind::Nether, Axis::X);

        let mut events = sim.world.events();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(sim.world.dimension_now(), Dimension::Nether);
        assert!(matches!(
            events.try_recv(),
            Ok(WorldEvent::DimensionChanged(Dimension::Nether))
        ));
    }
}
