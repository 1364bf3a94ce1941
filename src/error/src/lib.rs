//! 游戏错误处理模块
//!
//! 模拟核心中所有可失败操作共用的错误类型。解析失败（坐标上找不到实体）
//! 不属于错误，由调用方静默忽略；这里只收录真正需要上抛的情况。

use hecs::{ComponentError, Entity};
use thiserror::Error;

/// 模拟运行过程中可能出现的错误类型
#[derive(Debug, Error)]
pub enum GameError {
    /// 访问了实体不具备的组件（程序不变量被破坏）
    #[error("entity {entity:?} has no {component} component")]
    ComponentAccess {
        entity: Entity,
        component: &'static str,
    },

    /// 实体已经被销毁或从未存在
    #[error("no such entity: {0:?}")]
    NoSuchEntity(Entity),

    /// 坐标超出地图范围
    #[error("position ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },

    /// 地图数据无效
    #[error("invalid level data: {0}")]
    InvalidLevel(String),

    /// 配置无效
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO操作错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GameError {
    /// 将 hecs 的组件错误转换为带组件名的访问错误
    pub fn from_component<T: 'static>(entity: Entity, err: ComponentError) -> Self {
        match err {
            ComponentError::NoSuchEntity => GameError::NoSuchEntity(entity),
            ComponentError::MissingComponent(_) => GameError::ComponentAccess {
                entity,
                component: short_type_name::<T>(),
            },
        }
    }

    /// 是否是程序不变量被破坏导致的错误
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            GameError::ComponentAccess { .. } | GameError::NoSuchEntity(_)
        )
    }
}

/// 便捷的 Result 别名
pub type Result<T> = std::result::Result<T, GameError>;

fn short_type_name<T: 'static>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
