//! 回合驱动
//!
//! 每次 `update` 只推进一步：要么处理一次玩家输入，要么让全部怪物行动一次，
//! 两者不会交错。视野和寻路通过 `dungeon` 的 trait 注入。

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use combat::{RngDice, SharedDice};
use dungeon::{AStar, FieldOfView, Level, Pathfinder, RaycastFov, Visibility};
use error::Result;
use hecs::Entity;
use tracing::debug;

use crate::config::GameConfig;
use crate::ecs::{Position, SharedWorld, Tag, World, lock_world};
use crate::event_bus::{EventBus, GameEvent, SharedBus};
use crate::input::{AutoMoveState, Direction, PlayerCommand};
use crate::systems::{SharedLevel, SystemRegistry, lock_level};
use crate::turn_system::{TurnState, TurnType, next_state};

pub struct Game {
    world: SharedWorld,
    bus: SharedBus,
    level: SharedLevel,
    systems: SystemRegistry,
    config: GameConfig,
    fov: Box<dyn FieldOfView + Send + Sync>,
    pathfinder: Box<dyn Pathfinder + Send + Sync>,
    player_visibility: Visibility,
    auto_move: AutoMoveState,
}

impl Game {
    /// 按房间布置玩家和怪物，然后组装全部系统
    pub fn new(mut level: Level, config: GameConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => RngDice::seeded(seed),
            None => RngDice::from_entropy(),
        };

        let mut world = World::new();
        world.populate(&mut level, &mut rng, &config.player_label);

        let dice: SharedDice = Arc::new(Mutex::new(rng));
        Ok(Self::from_parts(world, level, dice, config))
    }

    /// 使用已经布置好的世界
    ///
    /// 调用方负责让格子占用与实体位置一致。
    pub fn from_parts(world: World, level: Level, dice: SharedDice, config: GameConfig) -> Self {
        let world = world.into_shared();
        let bus = EventBus::shared();
        let level = Arc::new(Mutex::new(level));
        let systems = SystemRegistry::new(
            world.clone(),
            bus.clone(),
            level.clone(),
            dice,
            &config,
        );
        let auto_move = AutoMoveState::new(Duration::from_millis(config.auto_move_cooldown_ms));

        let mut game = Self {
            world,
            bus,
            level,
            systems,
            config,
            fov: Box::new(RaycastFov),
            pathfinder: Box::new(AStar),
            player_visibility: Visibility::default(),
            auto_move,
        };
        game.refresh_player_visibility();
        game
    }

    pub fn with_fov(mut self, fov: impl FieldOfView + Send + Sync + 'static) -> Self {
        self.fov = Box::new(fov);
        self.refresh_player_visibility();
        self
    }

    pub fn with_pathfinder(mut self, pathfinder: impl Pathfinder + Send + Sync + 'static) -> Self {
        self.pathfinder = Box::new(pathfinder);
        self
    }

    // ========== 访问器 ==========

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn level(&self) -> &SharedLevel {
        &self.level
    }

    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> TurnState {
        self.systems.game_state.state()
    }

    pub fn turn_counter(&self) -> u32 {
        self.systems.game_state.counter()
    }

    pub fn is_game_over(&self) -> bool {
        self.systems.game_state.is_game_over()
    }

    pub fn is_auto_moving(&self) -> bool {
        self.auto_move.is_active()
    }

    pub fn player_visibility(&self) -> &Visibility {
        &self.player_visibility
    }

    /// 最新的在前
    pub fn messages(&self) -> Vec<String> {
        self.systems.ui.message_texts()
    }

    fn player_position(&self) -> Result<Option<(Entity, Position)>> {
        let world = lock_world(&self.world);
        match world.player() {
            Some(player) => Ok(Some((player, world.position(player)?))),
            None => Ok(None),
        }
    }

    // ========== 回合驱动 ==========

    /// 推进一个 tick
    pub fn update(&mut self, command: Option<PlayerCommand>, now: Instant) -> Result<()> {
        match self.state() {
            TurnState::WaitingForPlayerInput => {
                // 玩家的行动可能已经结束游戏，此时不再交出回合
                if self.take_player_action(command, now)? && !self.is_game_over() {
                    let counter = self.turn_counter();
                    self.bus.publish_many([
                        GameEvent::TurnEnd {
                            turn_type: TurnType::Player,
                            counter,
                        },
                        GameEvent::TurnStart {
                            turn_type: TurnType::Monster,
                            counter,
                        },
                    ])?;
                    self.systems
                        .game_state
                        .set_state(TurnState::ProcessingMonsterTurn)?;
                    self.systems.game_state.increment_counter()?;
                }
            }
            TurnState::ProcessingMonsterTurn => {
                self.update_monsters()?;
                if !self.is_game_over() {
                    let counter = self.turn_counter();
                    self.bus.publish_many([
                        GameEvent::TurnEnd {
                            turn_type: TurnType::Monster,
                            counter,
                        },
                        GameEvent::TurnStart {
                            turn_type: TurnType::Player,
                            counter,
                        },
                    ])?;
                    self.systems
                        .game_state
                        .set_state(TurnState::WaitingForPlayerInput)?;
                }
            }
            TurnState::ProcessingPlayerAction => {
                self.systems.game_state.set_state(next_state(TurnState::ProcessingPlayerAction))?;
            }
            TurnState::GameOver => {}
        }
        Ok(())
    }

    /// 处理玩家命令，返回是否消耗了一个回合
    ///
    /// 自动移动进行中时，任何手动命令都只会停止自动移动。
    pub fn take_player_action(&mut self, command: Option<PlayerCommand>, now: Instant) -> Result<bool> {
        if self.auto_move.is_active() {
            if command.is_some() {
                self.auto_move.stop();
                return Ok(false);
            }
            return self.continue_auto_move(now);
        }

        match command {
            Some(PlayerCommand::Move(direction)) => self.step_player(direction),
            Some(PlayerCommand::AutoMove(direction)) => self.start_auto_move(direction, now),
            Some(PlayerCommand::Wait) => Ok(true),
            None => Ok(false),
        }
    }

    /// 单步移动；撞到非墙的阻挡格子时攻击，撞墙也算一个回合
    fn step_player(&mut self, direction: Direction) -> Result<bool> {
        let Some((player, pos)) = self.player_position()? else {
            return Ok(false);
        };
        let (dx, dy) = direction.delta();
        let target = pos.offset(dx, dy);

        let (blocked, wall) = {
            let level = lock_level(&self.level);
            (level.is_blocked(target.x, target.y), level.is_wall(target.x, target.y))
        };

        if !blocked {
            self.move_entity(player, pos, target, true)?;
        } else if !wall {
            self.systems.combat.process_attack(pos, target)?;
        }
        Ok(true)
    }

    fn start_auto_move(&mut self, direction: Direction, now: Instant) -> Result<bool> {
        self.auto_move.start(direction, now);
        let Some((player, pos)) = self.player_position()? else {
            self.auto_move.stop();
            return Ok(false);
        };
        let (dx, dy) = direction.delta();
        let target = pos.offset(dx, dy);

        let (blocked, wall) = {
            let level = lock_level(&self.level);
            (level.is_blocked(target.x, target.y), level.is_wall(target.x, target.y))
        };

        if !blocked {
            self.move_entity(player, pos, target, true)?;
            Ok(true)
        } else if !wall {
            self.auto_move.stop();
            self.systems.combat.process_attack(pos, target)?;
            Ok(true)
        } else {
            self.auto_move.stop();
            Ok(false)
        }
    }

    fn continue_auto_move(&mut self, now: Instant) -> Result<bool> {
        let Some(direction) = self.auto_move.direction() else {
            return Ok(false);
        };
        if !self.auto_move.ready(now) {
            return Ok(false);
        }
        let Some((player, pos)) = self.player_position()? else {
            self.auto_move.stop();
            return Ok(false);
        };
        let (dx, dy) = direction.delta();
        let target = pos.offset(dx, dy);

        let (in_bounds, wall, blocked, open_neighbors) = {
            let level = lock_level(&self.level);
            (
                level.in_bounds(target.x, target.y),
                level.is_wall(target.x, target.y),
                level.is_blocked(target.x, target.y),
                level.open_neighbors(pos.x, pos.y),
            )
        };

        if !in_bounds || wall {
            self.auto_move.stop();
            return Ok(false);
        }
        if blocked {
            self.auto_move.stop();
            self.systems.combat.process_attack(pos, target)?;
            return Ok(true);
        }
        if self.monster_visible()? {
            self.auto_move.stop();
            return Ok(false);
        }
        if open_neighbors > 2 {
            debug!(x = pos.x, y = pos.y, "auto-move reached a junction");
            self.auto_move.stop();
            return Ok(false);
        }

        self.auto_move.record_step(now);
        self.move_entity(player, pos, target, true)?;
        Ok(true)
    }

    fn monster_visible(&self) -> Result<bool> {
        let world = lock_world(&self.world);
        for monster in world.query_by_tag(Tag::Monsters) {
            let pos = world.position(monster)?;
            if self.player_visibility.is_visible(pos.x, pos.y) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 写入新坐标并发布 `Move`，格子占用由地图系统更新
    ///
    /// 不回滚：后面的 `Move` 处理器失败时，坐标和格子已经更新，
    /// 错误返回给 `update` 的调用方，本回合不会交给怪物。
    fn move_entity(&mut self, entity: Entity, from: Position, to: Position, is_player: bool) -> Result<()> {
        {
            let world = lock_world(&self.world);
            *world.get_mut::<Position>(entity)? = to;
        }
        self.bus.publish(&GameEvent::Move {
            entity,
            from,
            to,
            is_player,
        })?;
        if is_player {
            self.refresh_player_visibility();
        }
        Ok(())
    }

    fn refresh_player_visibility(&mut self) {
        let pos = match self.player_position() {
            Ok(Some((_, pos))) => pos,
            _ => return,
        };
        let level = lock_level(&self.level);
        self.player_visibility = self
            .fov
            .compute(&*level, pos.x, pos.y, self.config.fov_radius);
    }

    /// 每只看得见玩家的怪物行动一次：相邻就攻击，否则沿路径走一步
    ///
    /// 玩家坐标只在开始时读取一次；游戏结束后剩下的怪物不再行动。
    pub fn update_monsters(&mut self) -> Result<()> {
        let Some((_, player_pos)) = self.player_position()? else {
            return Ok(());
        };
        let monsters = lock_world(&self.world).query_by_tag(Tag::Monsters);

        for monster in monsters {
            if self.is_game_over() {
                break;
            }

            let monster_pos = {
                let world = lock_world(&self.world);
                if !world.contains(monster) {
                    continue;
                }
                world.position(monster)?
            };

            let next_step = {
                let level = lock_level(&self.level);
                let sees_player = self
                    .fov
                    .compute(&*level, monster_pos.x, monster_pos.y, self.config.fov_radius)
                    .is_visible(player_pos.x, player_pos.y);
                if !sees_player {
                    continue;
                }
                if monster_pos.manhattan_distance(&player_pos) == 1 {
                    None
                } else {
                    let path = self.pathfinder.find_path(
                        &*level,
                        monster_pos.as_tuple(),
                        player_pos.as_tuple(),
                    );
                    match path.get(1) {
                        Some(&(x, y)) if !level.is_blocked(x, y) => Some(Position::new(x, y)),
                        _ => continue,
                    }
                }
            };

            match next_step {
                None => self.systems.combat.process_attack(monster_pos, player_pos)?,
                Some(step) => self.move_entity(monster, monster_pos, step, false)?,
            }
        }
        Ok(())
    }
}
