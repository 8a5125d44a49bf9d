//! Grid: settled tokens, the falling token, gravity, overflow and the two-cell selection.

use crate::fusion::{FusionResult, fuse};
use crate::token::{Lifecycle, Token, TokenColor};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

/// A selection path never grows beyond this many cells.
const MAX_PATH: usize = 2;

/// Grid cell coordinate as supplied by input mapping. Signed so that
/// out-of-bounds positions (pointer left of / above the board) are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPos {
    pub row: i32,
    pub col: i32,
}

impl CellPos {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    fn manhattan(self, other: Self) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }
}

/// Board of `cols × rows` cells. Row 0 is the top; `cells[row][col]`.
#[derive(Debug)]
pub struct Grid {
    pub cols: usize,
    pub rows: usize,
    cells: Vec<Vec<Option<Token>>>,
    falling: Option<Token>,
    /// Rows per second.
    fall_speed: f64,
    spawn_col: usize,
    /// Active selection path; `None` when no gesture is in progress.
    selection: Option<Vec<CellPos>>,
    /// Fusion output waiting for the encounter to drain it.
    pending: Option<FusionResult>,
    overflowed: bool,
    rng: StdRng,
}

impl Grid {
    pub fn new(cols: usize, rows: usize, fall_speed: f64, rng: StdRng) -> Self {
        let mut grid = Self {
            cols,
            rows,
            cells: (0..rows).map(|_| vec![None; cols]).collect(),
            falling: None,
            fall_speed,
            spawn_col: cols / 2,
            selection: None,
            pending: None,
            overflowed: false,
            rng,
        };
        grid.spawn();
        grid
    }

    /// Clear the board, drop selection and pending output, respawn one falling token.
    pub fn reset(&mut self) {
        for row in &mut self.cells {
            row.fill(None);
        }
        self.falling = None;
        self.selection = None;
        self.pending = None;
        self.overflowed = false;
        self.spawn();
    }

    fn spawn(&mut self) {
        let color = TokenColor::ALL[self.rng.gen_range(0..TokenColor::ALL.len())];
        self.falling = Some(Token::falling(color, self.spawn_col));
    }

    #[inline]
    fn index(&self, pos: CellPos) -> Option<(usize, usize)> {
        let in_bounds = pos.row >= 0
            && pos.col >= 0
            && (pos.row as usize) < self.rows
            && (pos.col as usize) < self.cols;
        in_bounds.then(|| (pos.row as usize, pos.col as usize))
    }

    pub fn in_bounds(&self, pos: CellPos) -> bool {
        self.index(pos).is_some()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&Token> {
        self.cells.get(row).and_then(|r| r.get(col)).and_then(Option::as_ref)
    }

    pub fn token_at(&self, pos: CellPos) -> Option<&Token> {
        let (r, c) = self.index(pos)?;
        self.get(r, c)
    }

    pub fn falling(&self) -> Option<&Token> {
        self.falling.as_ref()
    }

    /// Current selection path (empty when no gesture is active).
    pub fn selection(&self) -> &[CellPos] {
        self.selection.as_deref().unwrap_or(&[])
    }

    pub fn is_selecting(&self) -> bool {
        self.selection.is_some()
    }

    pub fn pending(&self) -> Option<FusionResult> {
        self.pending
    }

    /// Consume the pending fusion result, leaving the slot empty.
    pub fn take_pending(&mut self) -> Option<FusionResult> {
        self.pending.take()
    }

    /// True once per overflow punishment since the last call.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }

    /// Advance the falling token by `dt` seconds; settle it on floor or token contact.
    /// Travel is applied at most one row at a time so an oversized `dt` cannot tunnel;
    /// whatever travel remains after a settle is dropped.
    pub fn update(&mut self, dt: f64) {
        let mut travel = (self.fall_speed * dt).max(0.0);
        if !travel.is_finite() {
            return;
        }
        loop {
            let step = travel.min(1.0);
            travel -= step;
            if self.fall_step(step) || travel <= 0.0 {
                break;
            }
        }
    }

    /// Move the falling token `rows_down` (≤ 1) and settle it if blocked. Returns true on settle.
    fn fall_step(&mut self, rows_down: f64) -> bool {
        let rows = self.rows;
        let lands = match self.falling.as_mut() {
            Some(token) => {
                let from = token.row.floor();
                token.row += rows_down;
                // A step of at most one row can enter one new cell; it must be free.
                let entered = token.row.floor();
                let entered_blocked = entered > from
                    && entered >= 0.0
                    && (entered >= rows as f64
                        || self.cells[entered as usize][token.col].is_some());
                if entered_blocked {
                    token.row = from;
                    true
                } else {
                    let next_row = entered + 1.0;
                    let hit_floor = next_row >= rows as f64;
                    let hit_token = !hit_floor
                        && next_row >= 0.0
                        && self.cells[next_row as usize][token.col].is_some();
                    if hit_floor || hit_token {
                        token.row = entered;
                    }
                    hit_floor || hit_token
                }
            }
            None => false,
        };
        if lands && let Some(token) = self.falling.take() {
            self.settle(token);
        }
        lands
    }

    fn settle(&mut self, mut token: Token) {
        if token.row < 0.0 {
            warn!(col = token.col, "overflow: clearing top row");
            self.overflowed = true;
            self.cells[0].fill(None);
            self.compact();
            self.revalidate_selection();
        } else {
            let row = token.row as usize;
            debug!(row, col = token.col, color = ?token.color, "token settled");
            let col = token.col;
            token.lifecycle = Lifecycle::Settled;
            self.cells[row][col] = Some(token);
            self.compact();
        }
        self.spawn();
    }

    /// Per-column gravity: pack every token to the bottom, keeping vertical order.
    fn compact(&mut self) {
        for c in 0..self.cols {
            let mut write = self.rows;
            for r in (0..self.rows).rev() {
                if let Some(mut token) = self.cells[r][c].take() {
                    write -= 1;
                    token.row = write as f64;
                    self.cells[write][c] = Some(token);
                }
            }
        }
    }

    fn set_lifecycle(&mut self, pos: CellPos, lifecycle: Lifecycle) {
        if let Some((r, c)) = self.index(pos)
            && let Some(token) = self.cells[r][c].as_mut()
        {
            token.lifecycle = lifecycle;
        }
    }

    /// Drop the selection if any of its cells no longer holds a selected token.
    fn revalidate_selection(&mut self) {
        let stale = self.selection.as_ref().is_some_and(|path| {
            path.iter().any(|&p| {
                self.token_at(p)
                    .is_none_or(|t| t.lifecycle != Lifecycle::Selected)
            })
        });
        if stale {
            debug!("selection invalidated by overflow");
            self.cancel_selection();
        }
    }

    /// Start a path at `pos` if it holds a settled token; replaces any unfinished path.
    pub fn begin_selection(&mut self, pos: CellPos) {
        if self.token_at(pos).is_none() {
            return;
        }
        self.cancel_selection();
        self.set_lifecycle(pos, Lifecycle::Selected);
        self.selection = Some(vec![pos]);
    }

    /// Append `pos` to the active path. Invalid targets are ignored without cancelling.
    pub fn extend_selection(&mut self, pos: CellPos) {
        let Some(path) = self.selection.as_ref() else {
            return;
        };
        let Some(&last) = path.last() else {
            return;
        };
        if path.len() >= MAX_PATH || path.contains(&pos) || last.manhattan(pos) != 1 {
            return;
        }
        if !self
            .token_at(pos)
            .is_some_and(|t| t.lifecycle == Lifecycle::Settled)
        {
            return;
        }
        self.set_lifecycle(pos, Lifecycle::Selected);
        if let Some(path) = self.selection.as_mut() {
            path.push(pos);
        }
    }

    /// Finish the gesture. A two-cell path fuses into the pending slot; anything else is discarded.
    pub fn end_selection(&mut self) {
        let Some(path) = self.selection.take() else {
            return;
        };
        for &p in &path {
            self.set_lifecycle(p, Lifecycle::Settled);
        }
        let &[a, b] = path.as_slice() else {
            return;
        };
        if let Some(undrained) = self.pending {
            warn!(?undrained, "fusion refused: previous result not yet drained");
            return;
        }
        let result = match (self.token_at(a), self.token_at(b)) {
            (Some(ta), Some(tb)) => fuse(ta, tb),
            _ => return,
        };
        debug!(?result, ?a, ?b, "fused");
        self.pending = Some(result);
        for p in [a, b] {
            if let Some((r, c)) = self.index(p) {
                self.cells[r][c] = None;
            }
        }
        self.compact();
    }

    /// Drop an in-progress path without fusing.
    pub fn cancel_selection(&mut self) {
        if let Some(path) = self.selection.take() {
            for p in path {
                self.set_lifecycle(p, Lifecycle::Settled);
            }
        }
    }

    /// Number of tokens on the board (excluding the falling one).
    pub fn settled_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Place a settled token directly (no compaction).
    #[cfg(test)]
    pub(crate) fn put(
        &mut self,
        row: usize,
        col: usize,
        color: TokenColor,
        size: crate::token::TokenSize,
    ) {
        self.cells[row][col] = Some(Token::settled(color, size, row, col));
    }

    #[cfg(test)]
    pub(crate) fn set_falling(&mut self, token: Token) {
        self.falling = Some(token);
    }

    #[cfg(test)]
    pub(crate) fn force_compact(&mut self) {
        self.compact();
    }
}
