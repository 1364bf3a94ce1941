//! ECS (Entity Component System) implementation for the game.
//!
//! 组件存储直接使用 hecs 的 archetype 表，这里只加上按标签查询、
//! 带组件名的错误以及实体模板。存储本身从不发布事件。

use std::sync::{Arc, Mutex, MutexGuard};

use combat::DiceRoller;
use dungeon::Level;
use error::{GameError, Result};
use hecs::{Component, Entity};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ========== 组件 ==========

/// 玩家标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player;

/// 怪物标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster;

/// 格子坐标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(&self, other: &Position) -> i32 {
        dungeon::manhattan_distance((self.x, self.y), (other.x, other.y))
    }

    pub fn is_equal(&self, other: &Position) -> bool {
        self == other
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }

    pub fn as_tuple(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// 生命值，扣血时不做下限保护
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current_health: i32,
    pub max_health: i32,
}

impl Health {
    pub fn new(max_health: i32) -> Self {
        Self {
            current_health: max_health,
            max_health,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current_health <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeleeWeapon {
    pub name: String,
    pub minimum_damage: i32,
    pub maximum_damage: i32,
    pub to_hit_bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    /// 命中后的固定减伤
    pub defense: i32,
    /// 命中难度
    pub armor_class: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub label: String,
}

/// 最近一次产生的叙述文本，每次都会被覆盖
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub attack_message: String,
    pub dead_message: String,
    pub game_state_message: String,
}

/// 渲染资源键，核心逻辑不解释它
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renderable {
    pub image: String,
}

// ========== 标签 ==========

/// 按组件集合划分的实体子集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Players,
    Monsters,
    Renderables,
    Messengers,
}

// ========== 实体模板 ==========

/// 怪物种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonsterKind {
    Orc,
    Skeleton,
}

impl MonsterKind {
    pub fn label(&self) -> &'static str {
        match self {
            MonsterKind::Orc => "Orc",
            MonsterKind::Skeleton => "Skeleton",
        }
    }

    fn image(&self) -> &'static str {
        match self {
            MonsterKind::Orc => "orc",
            MonsterKind::Skeleton => "skeleton",
        }
    }

    fn health(&self) -> Health {
        match self {
            MonsterKind::Orc => Health::new(30),
            MonsterKind::Skeleton => Health::new(10),
        }
    }

    fn weapon(&self) -> MeleeWeapon {
        match self {
            MonsterKind::Orc => MeleeWeapon {
                name: "Machete".to_string(),
                minimum_damage: 4,
                maximum_damage: 8,
                to_hit_bonus: 1,
            },
            MonsterKind::Skeleton => MeleeWeapon {
                name: "Short Sword".to_string(),
                minimum_damage: 2,
                maximum_damage: 6,
                to_hit_bonus: 0,
            },
        }
    }

    fn armor(&self) -> Armor {
        match self {
            MonsterKind::Orc => Armor {
                name: "Leather".to_string(),
                defense: 5,
                armor_class: 6,
            },
            MonsterKind::Skeleton => Armor {
                name: "Bone".to_string(),
                defense: 3,
                armor_class: 4,
            },
        }
    }
}

// ========== World ==========

/// 实体/组件存储
#[derive(Default)]
pub struct World {
    inner: hecs::World,
}

/// 在系统之间共享的世界
pub type SharedWorld = Arc<Mutex<World>>;

/// 加锁，锁中毒时继续使用内部数据
pub fn lock_world(world: &SharedWorld) -> MutexGuard<'_, World> {
    match world.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("world lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedWorld {
        Arc::new(Mutex::new(self))
    }

    pub fn inner(&self) -> &hecs::World {
        &self.inner
    }

    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// 返回拥有标签全部组件的实体，顺序为存储迭代顺序
    pub fn query_by_tag(&self, tag: Tag) -> Vec<Entity> {
        match tag {
            Tag::Players => self
                .inner
                .query::<(&Player, &Position, &Health, &MeleeWeapon, &Armor, &Name, &UserMessage)>()
                .iter()
                .map(|(entity, _)| entity)
                .collect(),
            Tag::Monsters => self
                .inner
                .query::<(&Monster, &Position, &Health, &MeleeWeapon, &Armor, &Name, &UserMessage)>()
                .iter()
                .map(|(entity, _)| entity)
                .collect(),
            Tag::Renderables => self
                .inner
                .query::<(&Renderable, &Position)>()
                .iter()
                .map(|(entity, _)| entity)
                .collect(),
            Tag::Messengers => self
                .inner
                .query::<&UserMessage>()
                .iter()
                .map(|(entity, _)| entity)
                .collect(),
        }
    }

    /// 读取组件，实体缺少该组件时返回 `ComponentAccess`
    pub fn get<T: Component>(&self, entity: Entity) -> Result<hecs::Ref<'_, T>> {
        self.inner
            .get::<&T>(entity)
            .map_err(|err| GameError::from_component::<T>(entity, err))
    }

    pub fn get_mut<T: Component>(&self, entity: Entity) -> Result<hecs::RefMut<'_, T>> {
        self.inner
            .get::<&mut T>(entity)
            .map_err(|err| GameError::from_component::<T>(entity, err))
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    pub fn position(&self, entity: Entity) -> Result<Position> {
        self.get::<Position>(entity).map(|pos| *pos)
    }

    pub fn is_player(&self, entity: Entity) -> bool {
        self.inner.get::<&Player>(entity).is_ok()
    }

    /// 移除实体及其全部组件，返回实体是否存在
    pub fn dispose_entity(&mut self, entity: Entity) -> bool {
        match self.inner.despawn(entity) {
            Ok(()) => {
                debug!(?entity, "entity disposed");
                true
            }
            Err(_) => {
                debug!(?entity, "dispose of unknown entity ignored");
                false
            }
        }
    }

    /// 先扫描玩家再扫描怪物，返回第一个站在该格子上的战斗单位
    pub fn combatant_at(&self, pos: Position) -> Option<Entity> {
        let candidates: Vec<Entity> = self
            .query_by_tag(Tag::Players)
            .into_iter()
            .chain(self.query_by_tag(Tag::Monsters))
            .filter(|&entity| self.position(entity).is_ok_and(|p| p == pos))
            .collect();

        if candidates.len() > 1 {
            warn!(x = pos.x, y = pos.y, count = candidates.len(), "multiple combatants share a tile");
        }
        candidates.first().copied()
    }

    /// 第一个玩家实体
    pub fn player(&self) -> Option<Entity> {
        self.query_by_tag(Tag::Players).into_iter().next()
    }

    pub fn spawn_player(&mut self, label: &str, pos: Position) -> Entity {
        self.inner.spawn((
            Player,
            pos,
            Health::new(30),
            MeleeWeapon {
                name: "Battle Axe".to_string(),
                minimum_damage: 10,
                maximum_damage: 20,
                to_hit_bonus: 3,
            },
            Armor {
                name: "Plate Armor".to_string(),
                defense: 15,
                armor_class: 18,
            },
            Name {
                label: label.to_string(),
            },
            UserMessage::default(),
            Renderable {
                image: "player".to_string(),
            },
        ))
    }

    pub fn spawn_monster(&mut self, kind: MonsterKind, pos: Position) -> Entity {
        self.inner.spawn((
            Monster,
            pos,
            kind.health(),
            kind.weapon(),
            kind.armor(),
            Name {
                label: kind.label().to_string(),
            },
            UserMessage::default(),
            Renderable {
                image: kind.image().to_string(),
            },
        ))
    }

    /// 玩家放在第一个房间中心，其余每个房间中心放一只怪物
    ///
    /// 怪物种类由掷硬币决定，所有占用的格子都会被标记为阻挡。
    pub fn populate(
        &mut self,
        level: &mut Level,
        dice: &mut dyn DiceRoller,
        player_label: &str,
    ) -> Option<Entity> {
        let mut rooms = level.rooms.clone().into_iter();
        let first = rooms.next()?;

        let (px, py) = first.center();
        let player = self.spawn_player(player_label, Position::new(px, py));
        level.block_tile(px, py);

        for room in rooms {
            let (mx, my) = room.center();
            let kind = if dice.roll_die(2) == 1 {
                MonsterKind::Orc
            } else {
                MonsterKind::Skeleton
            };
            self.spawn_monster(kind, Position::new(mx, my));
            level.block_tile(mx, my);
        }

        debug!(rooms = level.rooms.len(), "world populated");
        Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat::ScriptedDice;
    use dungeon::Room;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_by_tag_separates_players_and_monsters() {
        let mut world = World::new();
        let player = world.spawn_player("Player", Position::new(1, 1));
        let orc = world.spawn_monster(MonsterKind::Orc, Position::new(2, 1));
        let skeleton = world.spawn_monster(MonsterKind::Skeleton, Position::new(3, 1));

        assert_eq!(world.query_by_tag(Tag::Players), vec![player]);
        let monsters = world.query_by_tag(Tag::Monsters);
        assert_eq!(monsters.len(), 2);
        assert!(monsters.contains(&orc));
        assert!(monsters.contains(&skeleton));
        assert_eq!(world.query_by_tag(Tag::Renderables).len(), 3);
        assert_eq!(world.query_by_tag(Tag::Messengers).len(), 3);
    }

    #[test]
    fn test_partial_entity_not_in_tag() {
        let mut world = World::new();
        world.spawn((Monster, Position::new(0, 0), Health::new(5)));
        assert!(world.query_by_tag(Tag::Monsters).is_empty());
    }

    #[test]
    fn test_missing_component_is_access_error() {
        let mut world = World::new();
        let entity = world.spawn((Position::new(0, 0),));
        let err = world.get::<Armor>(entity).err();
        assert!(matches!(
            err,
            Some(GameError::ComponentAccess { component: "Armor", .. })
        ));
    }

    #[test]
    fn test_get_mut_writes_through() {
        let mut world = World::new();
        let orc = world.spawn_monster(MonsterKind::Orc, Position::new(0, 0));
        world.get_mut::<Health>(orc).unwrap().current_health -= 12;
        assert_eq!(world.get::<Health>(orc).unwrap().current_health, 18);
    }

    #[test]
    fn test_dispose_twice_does_not_corrupt() {
        let mut world = World::new();
        let a = world.spawn_monster(MonsterKind::Orc, Position::new(0, 0));
        let b = world.spawn_monster(MonsterKind::Skeleton, Position::new(1, 0));

        assert!(world.dispose_entity(a));
        assert!(!world.dispose_entity(a));
        assert!(!world.contains(a));
        assert_eq!(world.query_by_tag(Tag::Monsters), vec![b]);
        assert!(matches!(world.get::<Health>(a), Err(GameError::NoSuchEntity(_))));
    }

    #[test]
    fn test_combatant_at_prefers_players() {
        let mut world = World::new();
        let orc = world.spawn_monster(MonsterKind::Orc, Position::new(4, 4));
        let player = world.spawn_player("Player", Position::new(4, 4));

        assert_eq!(world.combatant_at(Position::new(4, 4)), Some(player));
        world.dispose_entity(player);
        assert_eq!(world.combatant_at(Position::new(4, 4)), Some(orc));
        assert_eq!(world.combatant_at(Position::new(9, 9)), None);
    }

    #[test]
    fn test_templates() {
        let mut world = World::new();
        let player = world.spawn_player("Player", Position::new(0, 0));
        let skeleton = world.spawn_monster(MonsterKind::Skeleton, Position::new(1, 0));

        assert_eq!(*world.get::<Health>(player).unwrap(), Health::new(30));
        assert_eq!(world.get::<MeleeWeapon>(player).unwrap().to_hit_bonus, 3);
        assert_eq!(world.get::<Armor>(player).unwrap().armor_class, 18);
        assert_eq!(world.get::<Armor>(skeleton).unwrap().defense, 3);
        assert_eq!(world.get::<Name>(skeleton).unwrap().label, "Skeleton");
        assert!(world.is_player(player));
        assert!(!world.is_player(skeleton));
    }

    #[test]
    fn test_populate_places_player_and_monsters() {
        let mut level = Level::new(30, 12);
        level.carve_room(Room::new(1, 1, 6, 6));
        level.carve_room(Room::new(10, 1, 6, 6));
        level.carve_room(Room::new(20, 1, 6, 6));

        let mut world = World::new();
        let mut dice = ScriptedDice::new().with_die_rolls([1, 2]);
        let player = world.populate(&mut level, &mut dice, "Player").unwrap();

        assert_eq!(world.position(player).unwrap(), Position::new(4, 4));
        assert!(level.is_blocked(4, 4));

        let labels: Vec<String> = world
            .query_by_tag(Tag::Monsters)
            .into_iter()
            .map(|m| world.get::<Name>(m).unwrap().label.clone())
            .collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"Orc".to_string()));
        assert!(labels.contains(&"Skeleton".to_string()));
        assert!(level.is_blocked(13, 4));
        assert!(level.is_blocked(23, 4));
    }

    #[test]
    fn test_populate_without_rooms() {
        let mut level = Level::new(5, 5);
        let mut world = World::new();
        let mut dice = ScriptedDice::new();
        assert!(world.populate(&mut level, &mut dice, "Player").is_none());
    }

    #[test]
    fn test_position_distance() {
        let a = Position::new(1, 2);
        let b = Position::new(4, 0);
        assert_eq!(a.manhattan_distance(&b), 5);
        assert_eq!(a.manhattan_distance(&a), 0);
        assert!(a.is_equal(&Position::from((1, 2))));
    }
}
