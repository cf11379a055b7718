use crate::arena::Grid;
use crate::leaderboard::Standing;
use crate::network::ConnectionState;
use macroquad::prelude::*;

const SIDEBAR_WIDTH: f32 = 200.0;
const MARGIN: f32 = 10.0;
const LEADERBOARD_ROWS: usize = 10;

/// Where the grid lands on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayout {
    pub tile_size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl TileLayout {
    /// Largest square tile that fits `columns` x `rows` into the area,
    /// centred in it.
    pub fn fit(columns: usize, rows: usize, area_width: f32, area_height: f32) -> Self {
        if columns == 0 || rows == 0 {
            return Self {
                tile_size: 0.0,
                offset_x: 0.0,
                offset_y: 0.0,
            };
        }

        let tile_size = (area_width / columns as f32)
            .min(area_height / rows as f32)
            .floor()
            .max(1.0);

        Self {
            tile_size,
            offset_x: ((area_width - tile_size * columns as f32) / 2.0).max(0.0),
            offset_y: ((area_height - tile_size * rows as f32) / 2.0).max(0.0),
        }
    }

    pub fn origin(&self, column: usize, row: usize) -> (f32, f32) {
        (
            self.offset_x + column as f32 * self.tile_size,
            self.offset_y + row as f32 * self.tile_size,
        )
    }
}

pub struct Renderer {
    background: Color,
    empty_tile: Color,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            background: Color::from_rgba(26, 26, 26, 255),
            empty_tile: Color::from_rgba(40, 40, 40, 255),
        }
    }

    pub fn render(
        &self,
        grid: &Grid<'_>,
        standings: &[Standing<'_>],
        local_id: Option<&str>,
        status: ConnectionState,
    ) {
        clear_background(self.background);

        let layout = TileLayout::fit(
            grid.width(),
            grid.height(),
            (screen_width() - SIDEBAR_WIDTH - MARGIN * 2.0).max(0.0),
            (screen_height() - MARGIN * 2.0).max(0.0),
        );
        self.draw_grid(grid, &layout, local_id);
        self.draw_leaderboard(standings, local_id);
        self.draw_status(status);
    }

    /// Frame shown before the server has sent the arena
    pub fn render_waiting(&self, status: ConnectionState) {
        clear_background(self.background);

        let text = match status {
            ConnectionState::Open => "Waiting for the arena...",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Closed => "Disconnected, retrying",
            ConnectionState::Idle => "Press R to connect",
        };
        draw_text(text, MARGIN, screen_height() / 2.0, 24.0, WHITE);
        self.draw_status(status);
    }

    fn draw_grid(&self, grid: &Grid<'_>, layout: &TileLayout, local_id: Option<&str>) {
        let inset = if layout.tile_size > 4.0 { 1.0 } else { 0.0 };

        for (row, tiles) in grid.rows().iter().enumerate() {
            for (column, tile) in tiles.iter().enumerate() {
                let (x, y) = layout.origin(column, row);
                let x = x + MARGIN;
                let y = y + MARGIN;
                let size = layout.tile_size - inset;

                match tile {
                    None => draw_rectangle(x, y, size, size, self.empty_tile),
                    Some(tile) => {
                        let colour = tile.colour;
                        draw_rectangle(
                            x,
                            y,
                            size,
                            size,
                            Color::from_rgba(colour.r, colour.g, colour.b, 255),
                        );

                        if tile.owner.is_some() && tile.owner == local_id {
                            draw_rectangle_lines(x, y, size, size, 2.0, WHITE);
                        }
                    }
                }
            }
        }
    }

    fn draw_leaderboard(&self, standings: &[Standing<'_>], local_id: Option<&str>) {
        let x = screen_width() - SIDEBAR_WIDTH;
        let mut y = MARGIN + 16.0;

        draw_text("Leaderboard", x, y, 20.0, WHITE);

        for standing in standings.iter().take(LEADERBOARD_ROWS) {
            y += 22.0;
            let colour = standing.colour;
            draw_rectangle(
                x,
                y - 12.0,
                12.0,
                12.0,
                Color::from_rgba(colour.r, colour.g, colour.b, 255),
            );

            let text_colour = if Some(standing.id) == local_id {
                YELLOW
            } else {
                WHITE
            };
            let line = format!("{}. {} {}", standing.position, standing.name, standing.score);
            draw_text(&line, x + 18.0, y, 16.0, text_colour);
        }
    }

    fn draw_status(&self, status: ConnectionState) {
        let colour = match status {
            ConnectionState::Open => GREEN,
            ConnectionState::Connecting => YELLOW,
            ConnectionState::Closed | ConnectionState::Idle => RED,
        };
        let y = screen_height() - MARGIN - 8.0;
        draw_rectangle(MARGIN, y, 8.0, 8.0, colour);
        draw_text("CON", MARGIN + 10.0, y + 8.0, 12.0, WHITE);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
