//! 系统注册表：创建全部系统并按固定顺序挂到总线上

use std::sync::Arc;

use combat::SharedDice;

use super::{CombatSystem, GameStateSystem, MapSystem, SharedLevel, UISystem, register_system};
use crate::config::GameConfig;
use crate::ecs::SharedWorld;
use crate::event_bus::SharedBus;

pub struct SystemRegistry {
    pub combat: Arc<CombatSystem>,
    pub map: Arc<MapSystem>,
    pub game_state: Arc<GameStateSystem>,
    pub ui: Arc<UISystem>,
}

impl SystemRegistry {
    /// 注册顺序：Combat、Map、GameState、UI
    pub fn new(
        world: SharedWorld,
        bus: SharedBus,
        level: SharedLevel,
        dice: SharedDice,
        config: &GameConfig,
    ) -> Self {
        let combat = Arc::new(CombatSystem::new(
            world.clone(),
            bus.clone(),
            dice,
            config.player_label.clone(),
        ));
        let map = Arc::new(MapSystem::new(level, bus.clone()));
        let game_state = Arc::new(GameStateSystem::new(world, bus.clone()));
        let ui = Arc::new(UISystem::new(
            bus.clone(),
            config.max_messages,
            config.partial_clear_keep,
        ));

        register_system(&bus, &combat);
        register_system(&bus, &map);
        register_system(&bus, &game_state);
        register_system(&bus, &ui);

        Self {
            combat,
            map,
            game_state,
            ui,
        }
    }
}
