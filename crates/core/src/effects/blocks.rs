use rand::{rngs::StdRng, Rng};

use super::{Effect, TickContext};
use crate::{AudioFrame, Color, Gradient, GridSize, Paint, Rect, Result, Stroke, Surface, VisualizerError};

/// The seven canonical pieces as occupancy matrices.
pub const SHAPES: [&[&[u8]]; 7] = [
    &[&[0, 0, 0, 0], &[1, 1, 1, 1], &[0, 0, 0, 0], &[0, 0, 0, 0]],
    &[&[1, 0, 0], &[1, 1, 1], &[0, 0, 0]],
    &[&[0, 0, 1], &[1, 1, 1], &[0, 0, 0]],
    &[&[1, 1], &[1, 1]],
    &[&[0, 1, 1], &[1, 1, 0], &[0, 0, 0]],
    &[&[0, 1, 0], &[1, 1, 1], &[0, 0, 0]],
    &[&[1, 1, 0], &[0, 1, 1], &[0, 0, 0]],
];

const MIN_INTERVAL_MS: f64 = 100.0;
const MAX_ACTIVE: usize = 6;
const PULSE_THRESHOLD: f32 = 0.6;
const PULSE_PROBABILITY: f32 = 0.1;
const BACKGROUND: Color = Color::rgb(0x11, 0x11, 0x11);
const BORDER: Color = Color::rgb(0x33, 0x33, 0x33);

/// A falling piece in grid coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub shape: usize,
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl Piece {
    /// Grid coordinates of every occupied cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        SHAPES[self.shape].iter().enumerate().flat_map(move |(dy, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| **cell != 0)
                .map(move |(dx, _)| (self.x + dx as i32, self.y + dy as i32))
        })
    }
}

/// Block-stacking automaton stepped on an energy-driven cadence.
#[derive(Debug)]
pub struct BlockStack {
    cols: usize,
    rows: usize,
    grid: Vec<Vec<bool>>,
    active: Vec<Piece>,
    last_step_ms: Option<f64>,
    rng: StdRng,
}

impl BlockStack {
    pub fn new(size: GridSize, rng: StdRng) -> Result<Self> {
        if size.cols == 0 || size.rows == 0 {
            return Err(VisualizerError::config(format!(
                "block grid must be at least 1x1, got {}x{}",
                size.cols, size.rows
            )));
        }
        Ok(Self {
            cols: size.cols,
            rows: size.rows,
            grid: vec![vec![false; size.cols]; size.rows],
            active: Vec::new(),
            last_step_ms: None,
            rng,
        })
    }

    pub(super) fn is_stale(&self, ctx: &TickContext<'_>) -> bool {
        ctx.grid.cols != self.cols || ctx.grid.rows != self.rows
    }

    /// Milliseconds between automaton steps.
    pub fn interval_ms(energy: f32, bass: f32) -> f64 {
        let interval = (1000.0 - 800.0 * energy as f64) * (1.0 - 0.5 * bass as f64);
        interval.max(MIN_INTERVAL_MS)
    }

    pub fn active_pieces(&self) -> &[Piece] {
        &self.active
    }

    pub fn settled_count(&self) -> usize {
        self.grid.iter().flatten().filter(|cell| **cell).count()
    }

    pub fn is_settled(&self, col: usize, row: usize) -> bool {
        self.grid
            .get(row)
            .and_then(|cells| cells.get(col))
            .copied()
            .unwrap_or(false)
    }

    fn spawn(&mut self, gradient: &Gradient) {
        if self.active.len() >= MAX_ACTIVE {
            return;
        }
        let shape = self.rng.random_range(0..SHAPES.len());
        let color = gradient.color_at(self.rng.random::<f32>());
        let x = (self.cols / 2) as i32 - (SHAPES[shape][0].len() / 2) as i32;
        let piece = Piece {
            shape,
            x,
            y: 0,
            color,
        };
        // A stack that reaches the spawn area blocks new pieces until rows clear.
        if self.collides(&piece) {
            tracing::trace!(shape, "spawn area blocked");
            return;
        }
        self.active.push(piece);
    }

    fn collides(&self, piece: &Piece) -> bool {
        piece.cells().any(|(x, y)| {
            if y >= self.rows as i32 || x < 0 || x >= self.cols as i32 {
                return true;
            }
            y >= 0 && self.grid[y as usize][x as usize]
        })
    }

    fn stamp(&mut self, piece: &Piece) {
        for (x, y) in piece.cells() {
            if (0..self.rows as i32).contains(&y) && (0..self.cols as i32).contains(&x) {
                self.grid[y as usize][x as usize] = true;
            }
        }
    }

    /// Removes every full row and inserts empty rows at the top. Returns
    /// the number of rows cleared.
    fn clear_full_rows(&mut self) -> usize {
        self.grid.retain(|row| !row.iter().all(|cell| *cell));
        let cleared = self.rows - self.grid.len();
        for _ in 0..cleared {
            self.grid.insert(0, vec![false; self.cols]);
        }
        cleared
    }

    fn step(&mut self, gradient: &Gradient, energy: f32, bass: f32) {
        if self.active.is_empty() {
            self.spawn(gradient);
        }

        let mut falling = std::mem::take(&mut self.active);
        falling.retain_mut(|piece| {
            piece.y += 1;
            if !self.collides(piece) {
                return true;
            }
            piece.y -= 1;
            self.stamp(piece);
            false
        });
        self.active = falling;

        let cleared = self.clear_full_rows();
        if cleared > 0 {
            tracing::trace!(cleared, "block rows cleared");
        }

        if self.rng.random::<f32>() < 0.1 * energy + 0.4 * bass * bass {
            self.spawn(gradient);
        }
    }
}

impl Effect for BlockStack {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let gradient = ctx.gradient();
        let energy = frame.average_energy();
        let bass = frame.bass_energy();

        if bass > PULSE_THRESHOLD && self.rng.random::<f32>() < PULSE_PROBABILITY {
            self.spawn(&gradient);
        }

        let interval = Self::interval_ms(energy, bass);
        let due = self
            .last_step_ms
            .map_or(true, |last| ctx.time_ms - last >= interval);
        if due {
            self.last_step_ms = Some(ctx.time_ms);
            self.step(&gradient, energy, bass);
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let cell = (ctx.width / self.cols as f32).min(ctx.height / self.rows as f32);
        let grid_width = self.cols as f32 * cell;
        let grid_height = self.rows as f32 * cell;
        let offset_x = (ctx.width - grid_width) / 2.0;
        let offset_y = (ctx.height - grid_height) / 2.0;
        let board = Rect::new(offset_x, offset_y, grid_width, grid_height);

        surface.fill_rect(board, &Paint::Solid(BACKGROUND));
        surface.stroke_rect(board, &Stroke::new(BORDER, 2.0));

        let gradient = ctx.gradient();
        let bins = frame.spectrum.len().max(1);
        let cell_rect = |x: i32, y: i32| {
            Rect::new(
                offset_x + x as f32 * cell,
                offset_y + y as f32 * cell,
                cell - 1.0,
                cell - 1.0,
            )
        };

        for (y, row) in self.grid.iter().enumerate() {
            for (x, settled) in row.iter().enumerate() {
                if *settled {
                    let color = gradient.color_at(frame.level((x + y) % bins));
                    surface.fill_rect(cell_rect(x as i32, y as i32), &Paint::Solid(color));
                }
            }
        }

        for piece in &self.active {
            for (x, y) in piece.cells() {
                if (0..self.cols as i32).contains(&x) && (0..self.rows as i32).contains(&y) {
                    surface.fill_rect(cell_rect(x, y), &Paint::Solid(piece.color));
                }
            }
        }
    }
}
