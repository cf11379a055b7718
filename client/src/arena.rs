//! Grid materialization: sparse entity lists to a dense tile matrix
//!
//! The grid is rebuilt from scratch for every broadcast. Food is painted
//! first, then every snake in roster order, head to tail, so on overlap the
//! later write wins. Coordinates outside the arena are a protocol violation
//! and reject the whole frame instead of being clamped or skipped.

use crate::game::SessionState;
use shared::{Arena, Colour, Player, Point, FOOD_COLOUR, MAX_ARENA_SIDE};
use std::fmt;

/// A painted cell. `owner` is `None` for food.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile<'a> {
    pub colour: Colour,
    pub owner: Option<&'a str>,
}

impl Tile<'_> {
    pub fn is_food(&self) -> bool {
        self.owner.is_none()
    }
}

/// Dense `height` x `width` tile matrix, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<'a> {
    width: usize,
    height: usize,
    rows: Vec<Vec<Option<Tile<'a>>>>,
}

impl<'a> Grid<'a> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rows(&self) -> &[Vec<Option<Tile<'a>>>] {
        &self.rows
    }

    /// Tile at column `x`, row `y`; `None` when empty or out of range.
    pub fn tile(&self, x: usize, y: usize) -> Option<Tile<'a>> {
        self.rows.get(y).and_then(|row| row.get(x)).copied().flatten()
    }

    pub fn occupied(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|tile| tile.is_some()).count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    EmptyArena {
        width: usize,
        height: usize,
    },
    /// A side exceeds [`MAX_ARENA_SIDE`]
    TooLarge {
        width: usize,
        height: usize,
    },
    OutOfBounds {
        point: Point,
        /// Player whose snake contained the point; `None` for food
        owner: Option<String>,
        width: usize,
        height: usize,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::EmptyArena { width, height } => {
                write!(f, "arena must be non-empty, got {}x{}", width, height)
            }
            GridError::TooLarge { width, height } => write!(
                f,
                "arena {}x{} exceeds the {} tile limit per side",
                width, height, MAX_ARENA_SIDE
            ),
            GridError::OutOfBounds {
                point,
                owner,
                width,
                height,
            } => {
                let entity = match owner {
                    Some(id) => format!("snake of player {}", id),
                    None => "food".to_string(),
                };
                write!(
                    f,
                    "{} at ({}, {}) lies outside the {}x{} arena",
                    entity, point.x, point.y, width, height
                )
            }
        }
    }
}

impl std::error::Error for GridError {}

pub fn materialize<'a>(
    width: usize,
    height: usize,
    players: &'a [Player],
    food: &[Point],
) -> Result<Grid<'a>, GridError> {
    if width == 0 || height == 0 {
        return Err(GridError::EmptyArena { width, height });
    }
    if width > MAX_ARENA_SIDE || height > MAX_ARENA_SIDE {
        return Err(GridError::TooLarge { width, height });
    }

    let arena = Arena::new(width, height);
    let mut rows = vec![vec![None; width]; height];

    for &point in food {
        let (x, y) = cell(arena, point).ok_or(GridError::OutOfBounds {
            point,
            owner: None,
            width,
            height,
        })?;
        rows[y][x] = Some(Tile {
            colour: FOOD_COLOUR,
            owner: None,
        });
    }

    for player in players {
        let tile = Tile {
            colour: player.colour(),
            owner: Some(player.id.as_str()),
        };
        for &point in &player.snake.parts {
            let (x, y) = cell(arena, point).ok_or_else(|| GridError::OutOfBounds {
                point,
                owner: Some(player.id.clone()),
                width,
                height,
            })?;
            rows[y][x] = Some(tile);
        }
    }

    Ok(Grid {
        width,
        height,
        rows,
    })
}

/// Materializes the grid for a session snapshot. `Ok(None)` until the
/// server has announced the arena.
pub fn materialize_session(state: &SessionState) -> Result<Option<Grid<'_>>, GridError> {
    match state.arena {
        Some(arena) => {
            materialize(arena.width, arena.height, &state.players, &state.food).map(Some)
        }
        None => Ok(None),
    }
}

fn cell(arena: Arena, point: Point) -> Option<(usize, usize)> {
    arena
        .contains(point)
        .then(|| (point.x as usize, point.y as usize))
}
