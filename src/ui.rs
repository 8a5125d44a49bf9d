//! Layout and drawing: opponent panel, board, player HUD, pause and quit overlays, fades.

use crate::app::{QuitOption, Screen};
use crate::encounter::{Encounter, EncounterEvent, Player};
use crate::grid::{CellPos, Grid};
use crate::opponent::{Opponent, Phase};
use crate::theme::Theme;
use crate::token::{Lifecycle, Token, TokenColor, TokenSize};
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Each grid cell is two terminal columns wide so tokens look square-ish.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;
/// Opponent panel and HUD never get narrower than this, even on a thin board.
const PANEL_MIN_WIDTH: u16 = 30;
/// Border + hp gauge + wind-up gauge + status line.
const OPPONENT_HEIGHT: u16 = 5;
/// Border + hp gauge + block gauge + key hints.
const HUD_HEIGHT: u16 = 5;

const RESET_FADE_MS: u32 = 600;
const OVERFLOW_FADE_MS: u32 = 350;
const HIT_FADE_MS: u32 = 250;
const DEFEAT_FADE_MS: u32 = 700;

/// Screen regions for one frame. Recomputed on every draw so resizes just work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Areas {
    pub opponent: Rect,
    pub board_outer: Rect,
    /// Board interior (no border); cell (row, col) starts at `x + col * 2`, `y + row`.
    pub board: Rect,
    pub hud: Rect,
}

/// Stack opponent panel, board and HUD in a centred column.
pub fn areas(area: Rect, cols: usize, rows: usize) -> Areas {
    let board_w = (cols as u16).saturating_mul(CELL_WIDTH).saturating_add(2);
    let board_h = (rows as u16).saturating_mul(CELL_HEIGHT).saturating_add(2);
    let column_w = board_w.max(PANEL_MIN_WIDTH);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(column_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(OPPONENT_HEIGHT),
            Constraint::Length(board_h),
            Constraint::Length(HUD_HEIGHT),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let board_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(board_w),
            Constraint::Fill(1),
        ])
        .split(vert[2]);

    let board_outer = board_row[1];
    Areas {
        opponent: vert[1],
        board_outer,
        board: Rect {
            x: board_outer.x + 1,
            y: board_outer.y + 1,
            width: board_outer.width.saturating_sub(2),
            height: board_outer.height.saturating_sub(2),
        },
        hud: vert[3],
    }
}

/// Map a terminal cell to a grid cell using the same layout `draw` uses.
/// Points off the board map to out-of-bounds positions, which the grid ignores.
pub fn cell_at(area: Rect, grid: &Grid, column: u16, row: u16) -> CellPos {
    let board = areas(area, grid.cols, grid.rows).board;
    let dx = i32::from(column) - i32::from(board.x);
    let dy = i32::from(row) - i32::from(board.y);
    CellPos::new(
        dy.div_euclid(i32::from(CELL_HEIGHT)),
        dx.div_euclid(i32::from(CELL_WIDTH)),
    )
}

/// Running fades, one slot per region. A new event replaces the region's current fade.
#[derive(Default)]
pub struct Effects {
    board: Option<Effect>,
    opponent: Option<Effect>,
    hud: Option<Effect>,
    last_process: Option<Instant>,
}

impl Effects {
    pub fn trigger(&mut self, event: EncounterEvent, theme: &Theme) {
        match event {
            EncounterEvent::RunReset => {
                let red = theme.token_color(TokenColor::R);
                self.board = Some(fade_from(red, RESET_FADE_MS));
                self.hud = Some(fade_from(red, RESET_FADE_MS));
            }
            EncounterEvent::Overflow => {
                self.board = Some(fade_from(theme.inactive_fg, OVERFLOW_FADE_MS));
            }
            EncounterEvent::Fused(result) if result.dmg > 0 => {
                let yellow = theme.token_color(TokenColor::Y);
                self.opponent = Some(fade_from(yellow, HIT_FADE_MS));
            }
            EncounterEvent::Fused(_) => {}
            EncounterEvent::OpponentDefeated => {
                self.opponent = Some(fade_from(theme.title, DEFEAT_FADE_MS));
            }
            EncounterEvent::PlayerStruck { hp_loss, poison, .. } => {
                if hp_loss + poison > 0 {
                    self.hud = Some(fade_from(theme.windup, HIT_FADE_MS));
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.board.is_none() && self.opponent.is_none() && self.hud.is_none()
    }

    fn render(&mut self, frame: &mut Frame, areas: &Areas, now: Instant) {
        let delta = self
            .last_process
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(std::time::Duration::ZERO);
        let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
        let tfx_delta = TfxDuration::from_millis(delta_ms);
        self.last_process = Some(now);

        for (slot, rect) in [
            (&mut self.board, areas.board_outer),
            (&mut self.opponent, areas.opponent),
            (&mut self.hud, areas.hud),
        ] {
            if let Some(effect) = slot.as_mut() {
                frame.render_effect(effect, rect.intersection(frame.area()), tfx_delta);
                if effect.done() {
                    *slot = None;
                }
            }
        }
    }
}

/// Cells start tinted with `color` and ease back to what was drawn.
fn fade_from(color: Color, ms: u32) -> Effect {
    fx::fade_from(color, color, (ms, Interpolation::Linear))
}

/// Draw the encounter for `screen`, overlays on top, then advance running fades.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    encounter: &Encounter,
    theme: &Theme,
    cursor: CellPos,
    paused: bool,
    quit_selected: QuitOption,
    effects: &mut Effects,
    now: Instant,
) {
    let area = frame.area();
    let grid = encounter.grid();
    let regions = areas(area, grid.cols, grid.rows);

    draw_opponent(frame, encounter.opponent(), theme, regions.opponent);
    draw_board(frame, encounter, theme, cursor, &regions);
    draw_hud(frame, encounter.player(), theme, regions.hud);
    effects.render(frame, &regions, now);

    match screen {
        Screen::Playing if paused => draw_pause_overlay(frame, theme, area),
        Screen::Playing => {}
        Screen::QuitMenu => draw_quit_menu(frame, theme, quit_selected),
    }
}

fn panel_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(
            title,
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        ))
}

/// Gauge ratio must stay in 0..=1; NaN collapses to empty.
fn unit(x: f64) -> f64 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}

fn gauge(ratio: f64, label: String, color: Color, theme: &Theme) -> Gauge<'static> {
    Gauge::default()
        .ratio(unit(ratio))
        .label(Span::styled(
            label,
            Style::default().fg(theme.main_fg).add_modifier(Modifier::BOLD),
        ))
        .gauge_style(Style::default().fg(color).bg(theme.bg))
}

fn draw_opponent(frame: &mut Frame, opponent: &Opponent, theme: &Theme, area: Rect) {
    let block = panel_block(" Slime ", theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1); 3])
        .split(inner);

    let hp_ratio = f64::from(opponent.hp()) / f64::from(opponent.max_hp().max(1));
    frame.render_widget(
        gauge(
            hp_ratio,
            format!("HP {}/{}", opponent.hp(), opponent.max_hp()),
            theme.title,
            theme,
        ),
        rows[0],
    );

    let windup = match opponent.phase() {
        Phase::Stunned => gauge(
            0.0,
            format!("Stunned {:.1}s", opponent.stun()),
            theme.inactive_fg,
            theme,
        ),
        Phase::Winding => gauge(
            opponent.windup_ratio(),
            "Winding up".to_string(),
            theme.windup,
            theme,
        ),
    };
    frame.render_widget(windup, rows[1]);

    let label = Style::default().fg(theme.inactive_fg);
    let status = Line::from(vec![
        Span::styled("Poison ", label),
        Span::styled(
            opponent.poison().to_string(),
            Style::default().fg(theme.token_color(TokenColor::G)),
        ),
        Span::styled("   Stun ", label),
        Span::styled(
            format!("{:.1}s", opponent.stun()),
            Style::default().fg(theme.main_fg),
        ),
    ]);
    frame.render_widget(Paragraph::new(status), rows[2]);
}

fn draw_hud(frame: &mut Frame, player: Player, theme: &Theme, area: Rect) {
    let block = panel_block(" You ", theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1); 3])
        .split(inner);

    let max = f64::from(player.max_hp.max(1));
    frame.render_widget(
        gauge(
            f64::from(player.hp) / max,
            format!("HP {}/{}", player.hp, player.max_hp),
            theme.token_color(TokenColor::R),
            theme,
        ),
        rows[0],
    );
    frame.render_widget(
        gauge(
            f64::from(player.block) / max,
            format!("Block {}", player.block),
            theme.token_color(TokenColor::B),
            theme,
        ),
        rows[1],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            "drag/space fuse  c drop  p pause  q quit",
            Style::default().fg(theme.inactive_fg),
        ))
        .alignment(Alignment::Center),
        rows[2],
    );
}

fn draw_board(
    frame: &mut Frame,
    encounter: &Encounter,
    theme: &Theme,
    cursor: CellPos,
    regions: &Areas,
) {
    let grid = encounter.grid();
    let title = format!(" Fusetui | Runs lost: {} ", encounter.deaths());
    frame.render_widget(panel_block(&title, theme), regions.board_outer);

    let board = regions.board.intersection(frame.area());
    let buf = frame.buffer_mut();
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let (glyph, mut style) = match grid.get(row, col) {
                Some(token) => token_glyph(token, theme),
                None => (
                    [" ", "·"],
                    Style::default().fg(theme.inactive_fg).bg(theme.bg),
                ),
            };
            if CellPos::new(row as i32, col as i32) == cursor {
                style = style.bg(theme.div_line);
            }
            put_cell(buf, board, row, col, glyph, style);
        }
    }

    if let Some(token) = grid.falling()
        && let Ok(row) = usize::try_from(token.cell_row())
        && row < grid.rows
    {
        let (glyph, style) = token_glyph(token, theme);
        put_cell(buf, board, row, token.col, glyph, style);
    }
}

/// Size reads as fill: small is a thin bar, big a solid block. Selected cells sit on the title colour.
fn token_glyph(token: &Token, theme: &Theme) -> ([&'static str; 2], Style) {
    let glyph = match token.size {
        TokenSize::Small => ["▐", "▌"],
        TokenSize::Medium => ["▆", "▆"],
        TokenSize::Big => ["█", "█"],
    };
    let bg = if token.lifecycle == Lifecycle::Selected {
        theme.title
    } else {
        theme.bg
    };
    (
        glyph,
        Style::default().fg(theme.token_color(token.color)).bg(bg),
    )
}

fn put_cell(
    buf: &mut Buffer,
    board: Rect,
    row: usize,
    col: usize,
    glyph: [&str; 2],
    style: Style,
) {
    let y = board.y.saturating_add((row as u16).saturating_mul(CELL_HEIGHT));
    if y >= board.bottom() {
        return;
    }
    let x0 = board.x.saturating_add((col as u16).saturating_mul(CELL_WIDTH));
    for (i, symbol) in glyph.iter().enumerate() {
        let x = x0.saturating_add(i as u16);
        if x < board.right()
            && let Some(cell) = buf.cell_mut((x, y))
        {
            cell.set_symbol(symbol).set_style(style);
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(theme.bg).bg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P resume    Q quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .style(Style::default().bg(theme.bg)),
        ),
        popup,
    );
}

fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let quit_rect = centered(frame.area(), 24, 6);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .style(Style::default().bg(theme.bg))
        .title(" Quit? ");

    let lines: Vec<Line> = [(QuitOption::Resume, " Resume "), (QuitOption::Exit, " Exit ")]
        .into_iter()
        .flat_map(|(opt, label)| {
            let style = if opt == selected {
                Style::default()
                    .fg(theme.bg)
                    .bg(theme.title)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.title)
            };
            [Line::from(""), Line::from(Span::styled(label, style))]
        })
        .collect();

    frame.render_widget(Clear, quit_rect);
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block),
        quit_rect,
    );
}
