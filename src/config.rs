//! 游戏配置
//!
//! 所有字段都有默认值，JSON 中缺省的字段使用默认值。

use std::path::Path;

use error::{GameError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// 怪物视野半径
    pub fov_radius: i32,
    /// 自动移动两步之间的最小间隔（毫秒）
    pub auto_move_cooldown_ms: u64,
    /// 消息环形缓冲的容量
    pub max_messages: usize,
    /// 部分清空时保留的最新消息数
    pub partial_clear_keep: usize,
    /// 玩家实体的名字，用于胜负判断
    pub player_label: String,
    /// 骰子种子，缺省时使用系统熵
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fov_radius: 8,
            auto_move_cooldown_ms: 120,
            max_messages: 10,
            partial_clear_keep: 3,
            player_label: "Player".to_string(),
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fov_radius <= 0 {
            return Err(GameError::Config(format!(
                "fov_radius must be positive, got {}",
                self.fov_radius
            )));
        }
        if self.max_messages == 0 {
            return Err(GameError::Config(
                "max_messages must be at least 1".to_string(),
            ));
        }
        if self.player_label.is_empty() {
            return Err(GameError::Config("player_label must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.fov_radius, 8);
        assert_eq!(config.auto_move_cooldown_ms, 120);
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.partial_clear_keep, 3);
        assert_eq!(config.player_label, "Player");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json_str(r#"{ "fov_radius": 5, "seed": 42 }"#).unwrap();
        assert_eq!(
            config,
            GameConfig {
                fov_radius: 5,
                seed: Some(42),
                ..GameConfig::default()
            }
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            GameConfig::from_json_str(r#"{ "fov_radius": 0 }"#),
            Err(GameError::Config(_))
        ));
        assert!(matches!(
            GameConfig::from_json_str(r#"{ "max_messages": 0 }"#),
            Err(GameError::Config(_))
        ));
        assert!(matches!(
            GameConfig::from_json_str("not json"),
            Err(GameError::Json(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_messages": 4, "player_label": "Hero" }}"#).unwrap();

        let config = GameConfig::load(file.path()).unwrap();
        assert_eq!(config.max_messages, 4);
        assert_eq!(config.player_label, "Hero");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GameConfig::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(GameError::Io(_))));
    }
}
