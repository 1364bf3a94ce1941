//! 玩法系统
//!
//! 每个系统声明自己关心的事件种类，通过 [`register_system`] 挂到总线上。
//! 总线只持有系统的弱引用，系统被释放后对应的处理器自动失效。

use std::sync::{Arc, Weak};

use error::Result;

use crate::event_bus::{EventBus, EventHandler, EventKind, GameEvent};

pub mod combat;
pub mod game_state;
pub mod map;
pub mod registry;
pub mod ui;

pub use combat::CombatSystem;
pub use game_state::GameStateSystem;
pub use map::{MapSystem, SharedLevel, lock_level};
pub use registry::SystemRegistry;
pub use ui::{UISystem, UiMessage};

pub trait System: Send + Sync {
    fn name(&self) -> &str;

    /// 需要订阅的事件种类，按顺序注册
    fn subscriptions(&self) -> &'static [EventKind];

    fn handle_event(&self, event: &GameEvent) -> Result<()>;
}

/// 把系统转发到总线的适配器
struct SystemHandler {
    name: String,
    system: Weak<dyn System>,
}

impl EventHandler for SystemHandler {
    fn handle(&self, event: &GameEvent) -> Result<()> {
        match self.system.upgrade() {
            Some(system) => system.handle_event(event),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 为系统声明的每个事件种类注册一个处理器
pub fn register_system<S: System + 'static>(bus: &EventBus, system: &Arc<S>) {
    let name = system.name().to_string();
    let dyn_system: Arc<dyn System> = system.clone();
    for &kind in system.subscriptions() {
        bus.subscribe(
            kind,
            Arc::new(SystemHandler {
                name: format!("{}::{}", name, kind),
                system: Arc::downgrade(&dyn_system),
            }),
        );
    }
    tracing::debug!(system = %name, kinds = system.subscriptions().len(), "system registered");
}
