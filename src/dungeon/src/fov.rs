//! Field of view
//!
//! 默认实现是在圆形范围内对每个格子做 Bresenham 射线检测。
//! 墙本身可见，但会挡住后面的格子。
use std::collections::HashSet;

use crate::GridMap;

/// 一次视野计算的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    tiles: HashSet<(i32, i32)>,
}

impl Visibility {
    pub fn is_visible(&self, x: i32, y: i32) -> bool {
        self.tiles.contains(&(x, y))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(i32, i32)> {
        self.tiles.iter()
    }
}

/// 视野算法
pub trait FieldOfView {
    fn compute(&self, map: &dyn GridMap, x: i32, y: i32, radius: i32) -> Visibility;
}

/// Bresenham 射线视野
#[derive(Debug, Clone, Copy, Default)]
pub struct RaycastFov;

impl RaycastFov {
    /// Check if a target is visible from a source using raycasting
    pub fn line_of_sight(map: &dyn GridMap, src: (i32, i32), target: (i32, i32)) -> bool {
        let (src_x, src_y) = src;
        let (target_x, target_y) = target;

        let dx = (target_x - src_x).abs();
        let dy = (target_y - src_y).abs();
        let sx = if src_x < target_x { 1 } else { -1 };
        let sy = if src_y < target_y { 1 } else { -1 };

        let mut err = dx - dy;
        let mut current_x = src_x;
        let mut current_y = src_y;

        loop {
            if current_x == target_x && current_y == target_y {
                return true;
            }

            // 起点不参与遮挡判断
            if (current_x, current_y) != src && map.is_opaque(current_x, current_y) {
                return false;
            }

            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                current_x += sx;
            }
            if e2 < dx {
                err += dx;
                current_y += sy;
            }
        }
    }
}

impl FieldOfView for RaycastFov {
    fn compute(&self, map: &dyn GridMap, x: i32, y: i32, radius: i32) -> Visibility {
        let mut tiles = HashSet::new();
        if !map.in_bounds(x, y) {
            return Visibility { tiles };
        }
        tiles.insert((x, y));

        let radius = radius.max(0);
        let radius_sq = radius * radius;
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }

                let target = (x + dx, y + dy);
                if !map.in_bounds(target.0, target.1) {
                    continue;
                }

                if Self::line_of_sight(map, (x, y), target) {
                    tiles.insert(target);
                }
            }
        }

        Visibility { tiles }
    }
}
