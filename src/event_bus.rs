//! 事件总线系统，用于解耦模块间通信
//!
//! 同步、递归的发布-订阅：
//! - `publish` 在调用者的线程上按注册顺序依次调用处理器
//! - 处理器可以在处理过程中继续发布事件，嵌套事件会先处理完（深度优先）
//! - 处理器返回的错误不会被总线吞掉，而是原样返回给发布者
//!
//! 处理器列表在读锁下快照，释放锁之后再调用，所以处理器内部
//! 可以再次发布或订阅。

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use error::Result;
use hecs::Entity;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};
use tracing::error;

use crate::ecs::Position;
use crate::turn_system::TurnType;

/// 事件种类，订阅按种类进行
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Attack,
    Damage,
    Death,
    Move,
    TurnStart,
    TurnEnd,
    TurnChange,
    TurnCounter,
    GameOver,
    TileBlocked,
    TileUnblocked,
    Message,
    ClearMessages,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    pub fn all() -> impl Iterator<Item = EventKind> {
        <Self as IntoEnumIterator>::iter()
    }
}

/// 叙述消息的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum MessageCategory {
    Attack,
    Death,
    GameState,
    System,
}

/// 游戏事件定义 - 用于模块间解耦通信
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    // ===== 战斗事件 =====
    /// 一次命中判定已经完成
    Attack {
        attacker: Entity,
        defender: Entity,
        attacker_pos: Position,
        defender_pos: Position,
        to_hit_roll: i32,
        hit: bool,
    },
    /// 对目标造成伤害，`is_fatal` 只是发布时的预估
    Damage {
        target: Entity,
        amount: i32,
        source: Option<Entity>,
        is_fatal: bool,
    },
    /// 实体死亡，`position` 是死亡时所在的格子
    Death {
        entity: Entity,
        position: Position,
        is_player: bool,
    },

    // ===== 移动事件 =====
    Move {
        entity: Entity,
        from: Position,
        to: Position,
        is_player: bool,
    },

    // ===== 回合事件 =====
    TurnStart { turn_type: TurnType, counter: u32 },
    TurnEnd { turn_type: TurnType, counter: u32 },
    /// 状态以名字编码，未知名字按等待输入处理
    TurnChange {
        from_state: String,
        to_state: String,
        counter: u32,
    },
    /// 设置回合计数的绝对值
    TurnCounter { count: u32, increment: bool },
    GameOver { reason: String, final_turn: u32 },

    // ===== 地图事件 =====
    TileBlocked { position: Position, reason: String },
    TileUnblocked { position: Position, reason: String },

    // ===== UI 事件 =====
    Message {
        text: String,
        category: MessageCategory,
    },
    ClearMessages { clear_all: bool },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::Attack { .. } => EventKind::Attack,
            GameEvent::Damage { .. } => EventKind::Damage,
            GameEvent::Death { .. } => EventKind::Death,
            GameEvent::Move { .. } => EventKind::Move,
            GameEvent::TurnStart { .. } => EventKind::TurnStart,
            GameEvent::TurnEnd { .. } => EventKind::TurnEnd,
            GameEvent::TurnChange { .. } => EventKind::TurnChange,
            GameEvent::TurnCounter { .. } => EventKind::TurnCounter,
            GameEvent::GameOver { .. } => EventKind::GameOver,
            GameEvent::TileBlocked { .. } => EventKind::TileBlocked,
            GameEvent::TileUnblocked { .. } => EventKind::TileUnblocked,
            GameEvent::Message { .. } => EventKind::Message,
            GameEvent::ClearMessages { .. } => EventKind::ClearMessages,
        }
    }

    /// 获取事件类型名称
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// 事件处理器 trait
pub trait EventHandler: Send + Sync {
    /// 处理事件
    fn handle(&self, event: &GameEvent) -> Result<()>;

    /// 事件处理器的名称（用于调试）
    fn name(&self) -> &str;
}

type HandlerFn = dyn Fn(&GameEvent) -> Result<()> + Send + Sync;

/// 用闭包实现的处理器
pub struct FnHandler {
    name: String,
    handler_fn: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&GameEvent) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler_fn: Box::new(f),
        }
    }
}

impl EventHandler for FnHandler {
    fn handle(&self, event: &GameEvent) -> Result<()> {
        (self.handler_fn)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 同步事件总线
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
}

/// 在系统之间共享的总线
pub type SharedBus = Arc<EventBus>;

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedBus {
        Arc::new(Self::new())
    }

    // ========== 订阅 API ==========

    /// 注册处理器，同一种类的处理器按注册顺序调用
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(handler);
    }

    /// 用闭包注册处理器
    pub fn subscribe_fn<F>(&self, kind: EventKind, name: impl Into<String>, f: F)
    where
        F: Fn(&GameEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnHandler::new(name, f)));
    }

    /// 移除某一种类的全部处理器
    pub fn unsubscribe_all(&self, kind: EventKind) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.remove(&kind);
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&kind).map_or(0, Vec::len)
    }

    // ========== 发布 API ==========

    /// 同步调用当前注册的全部处理器，遇到第一个错误即返回
    pub fn publish(&self, event: &GameEvent) -> Result<()> {
        let kind = event.kind();
        let snapshot: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            match handlers.get(&kind) {
                Some(list) => list.clone(),
                None => return Ok(()),
            }
        };

        for handler in snapshot {
            if let Err(err) = handler.handle(event) {
                error!(handler = handler.name(), event = %kind, %err, "event handler failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// 依次发布，等价于多次调用 `publish`
    pub fn publish_many(&self, events: impl IntoIterator<Item = GameEvent>) -> Result<()> {
        for event in events {
            self.publish(&event)?;
        }
        Ok(())
    }
}
