//src/dungeon/src/level.rs
use error::{GameError, Result};
use serde::{Deserialize, Serialize};

use crate::GridMap;

/// 地形类型
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TileType {
    Wall,
    Floor,
}

/// 单个格子
///
/// `blocked` 表示格子当前被实体占用（或者本身是墙）。
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tile {
    pub tile_type: TileType,
    pub blocked: bool,
}

impl Tile {
    pub fn wall() -> Self {
        Self {
            tile_type: TileType::Wall,
            blocked: true,
        }
    }

    pub fn floor() -> Self {
        Self {
            tile_type: TileType::Floor,
            blocked: false,
        }
    }

    pub fn is_wall(&self) -> bool {
        self.tile_type == TileType::Wall
    }
}

/// 矩形房间，`(x1, y1)` 与 `(x2, y2)` 是外墙角
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Room {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    /// 获取房间中心点
    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// 检查房间是否与另一个房间相交
    pub fn intersects(&self, other: &Self) -> bool {
        self.x1 <= other.x2 && self.x2 >= other.x1 && self.y1 <= other.y2 && self.y2 >= other.y1
    }

    /// 房间内部（不含外墙）是否包含该点
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x > self.x1 && x < self.x2 && y > self.y1 && y < self.y2
    }
}

/// 一层地图，按行优先存储
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
    pub width: i32,
    pub height: i32,
    pub tiles: Vec<Tile>,
    pub rooms: Vec<Room>,
}

impl Level {
    /// 创建一张全是墙的地图
    pub fn new(width: i32, height: i32) -> Self {
        let count = (width.max(0) * height.max(0)) as usize;
        Self {
            width: width.max(0),
            height: height.max(0),
            tiles: vec![Tile::wall(); count],
            rooms: Vec::new(),
        }
    }

    /// 从字符画解析地图：`#` 是墙，其余字符都是地板
    ///
    /// 所有行必须等宽。
    pub fn parse(source: &str) -> Result<Self> {
        let rows: Vec<&str> = source
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();

        let Some(first) = rows.first() else {
            return Err(GameError::InvalidLevel("level has no rows".to_string()));
        };
        let width = first.chars().count();

        let mut tiles = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(GameError::InvalidLevel(format!(
                    "row {} has width {}, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            tiles.extend(row.chars().map(|c| match c {
                '#' => Tile::wall(),
                _ => Tile::floor(),
            }));
        }

        Ok(Self {
            width: width as i32,
            height: rows.len() as i32,
            tiles,
            rooms: Vec::new(),
        })
    }

    pub fn with_rooms(mut self, rooms: impl IntoIterator<Item = Room>) -> Self {
        self.rooms.extend(rooms);
        self
    }

    /// 把房间内部挖成地板并记录房间
    pub fn carve_room(&mut self, room: Room) {
        for y in (room.y1 + 1)..room.y2 {
            for x in (room.x1 + 1)..room.x2 {
                self.set_tile(x, y, Tile::floor());
            }
        }
        self.rooms.push(room);
    }

    /// 横向走廊，包含两端
    pub fn carve_h_corridor(&mut self, x1: i32, x2: i32, y: i32) {
        for x in x1.min(x2)..=x1.max(x2) {
            self.set_tile(x, y, Tile::floor());
        }
    }

    /// 纵向走廊，包含两端
    pub fn carve_v_corridor(&mut self, y1: i32, y2: i32, x: i32) {
        for y in y1.min(y2)..=y1.max(y2) {
            self.set_tile(x, y, Tile::floor());
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// 坐标到下标，越界返回 `None`
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| (y * self.width + x) as usize)
    }

    /// 越界时返回错误的下标查询
    pub fn checked_index(&self, x: i32, y: i32) -> Result<usize> {
        self.index_of(x, y).ok_or(GameError::OutOfBounds { x, y })
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index_of(x, y).map(|idx| &self.tiles[idx])
    }

    fn set_tile(&mut self, x: i32, y: i32, tile: Tile) {
        if let Some(idx) = self.index_of(x, y) {
            self.tiles[idx] = tile;
        }
    }

    /// 标记格子被占用，越界时忽略
    pub fn block_tile(&mut self, x: i32, y: i32) {
        if let Some(idx) = self.index_of(x, y) {
            self.tiles[idx].blocked = true;
        }
    }

    /// 解除占用，墙永远保持阻挡
    pub fn unblock_tile(&mut self, x: i32, y: i32) {
        if let Some(idx) = self.index_of(x, y) {
            let tile = &mut self.tiles[idx];
            if !tile.is_wall() {
                tile.blocked = false;
            }
        }
    }

    /// 越界视为阻挡
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_none_or(|t| t.blocked)
    }

    /// 越界视为墙
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_none_or(Tile::is_wall)
    }

    pub fn is_opaque(&self, x: i32, y: i32) -> bool {
        self.is_wall(x, y)
    }

    /// 四个正方向上既不是墙也没被占用的格子数
    pub fn open_neighbors(&self, x: i32, y: i32) -> usize {
        [(0, -1), (0, 1), (-1, 0), (1, 0)]
            .iter()
            .filter(|(dx, dy)| !self.is_blocked(x + dx, y + dy))
            .count()
    }
}

impl GridMap for Level {
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        Level::in_bounds(self, x, y)
    }

    fn is_opaque(&self, x: i32, y: i32) -> bool {
        Level::is_opaque(self, x, y)
    }

    fn is_walkable(&self, x: i32, y: i32) -> bool {
        !self.is_wall(x, y)
    }
}
