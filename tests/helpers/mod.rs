//! Test helpers and builders for setting up deterministic encounters.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use combat::{ScriptedDice, SharedDice};
use dungeon::Level;
use dungeon_skirmish::ecs::{MonsterKind, Position, World};
use dungeon_skirmish::{EventKind, Game, GameConfig, GameEvent};
use hecs::Entity;

/// 一条走廊形状的小地图
pub const HALL: &str = "\
############
#..........#
#..........#
#..........#
############
";

/// Builder for a game with hand-placed combatants and forced dice
pub struct TestGameBuilder {
    level: Level,
    world: World,
    dice: ScriptedDice,
    config: GameConfig,
    player: Option<Entity>,
    monsters: Vec<Entity>,
}

impl TestGameBuilder {
    pub fn new(ascii: &str) -> Self {
        Self {
            level: Level::parse(ascii).expect("valid test level"),
            world: World::new(),
            dice: ScriptedDice::new(),
            config: GameConfig::default(),
            player: None,
            monsters: Vec::new(),
        }
    }

    pub fn with_player(mut self, x: i32, y: i32) -> Self {
        let label = self.config.player_label.clone();
        self.player = Some(self.world.spawn_player(&label, Position::new(x, y)));
        self.level.block_tile(x, y);
        self
    }

    pub fn with_monster(mut self, kind: MonsterKind, x: i32, y: i32) -> Self {
        self.monsters.push(self.world.spawn_monster(kind, Position::new(x, y)));
        self.level.block_tile(x, y);
        self
    }

    pub fn with_die_rolls(mut self, rolls: impl IntoIterator<Item = i32>) -> Self {
        self.dice = self.dice.with_die_rolls(rolls);
        self
    }

    pub fn with_between_rolls(mut self, rolls: impl IntoIterator<Item = i32>) -> Self {
        self.dice = self.dice.with_between_rolls(rolls);
        self
    }

    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    /// 直接修改尚未交给游戏的世界
    pub fn tweak(mut self, f: impl FnOnce(&mut World, Option<Entity>, &[Entity])) -> Self {
        f(&mut self.world, self.player, &self.monsters);
        self
    }

    pub fn build(self) -> TestGame {
        let dice: SharedDice = Arc::new(Mutex::new(self.dice));
        let game = Game::from_parts(self.world, self.level, dice, self.config);
        let events = EventLog::attach(&game);
        TestGame {
            game,
            player: self.player.expect("test game needs a player"),
            monsters: self.monsters,
            events,
        }
    }
}

pub struct TestGame {
    pub game: Game,
    pub player: Entity,
    pub monsters: Vec<Entity>,
    pub events: EventLog,
}

/// 记录总线上出现过的所有事件
///
/// 记录器在系统之后注册，所以嵌套事件会排在触发它的事件之前。
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn attach(game: &Game) -> Self {
        let log = Self::default();
        for kind in EventKind::all() {
            let events = log.events.clone();
            game.bus().subscribe_fn(kind, "event-log", move |event| {
                events.lock().unwrap().push(event.clone());
                Ok(())
            });
        }
        log
    }

    pub fn all(&self) -> Vec<GameEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<GameEvent> {
        self.all().into_iter().filter(|e| e.kind() == kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).len()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
