//src/dungeon/src/lib.rs
//! 地图层：格子、视野与寻路
//!
//! 上层只通过 [`GridMap`] 访问地图，因此视野和寻路算法都可以替换。

pub mod fov;
pub mod level;
pub mod path;

pub use crate::fov::{FieldOfView, RaycastFov, Visibility};
pub use crate::level::{Level, Room, Tile, TileType};
pub use crate::path::{AStar, Pathfinder};

/// 视野和寻路需要的最小地图接口
pub trait GridMap {
    fn in_bounds(&self, x: i32, y: i32) -> bool;

    /// 是否阻挡视线（越界视为阻挡）
    fn is_opaque(&self, x: i32, y: i32) -> bool;

    /// 地形上是否可以行走，不考虑占用
    fn is_walkable(&self, x: i32, y: i32) -> bool;
}

/// 曼哈顿距离
pub fn manhattan_distance(a: (i32, i32), b: (i32, i32)) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}
