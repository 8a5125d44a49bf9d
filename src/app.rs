//! App: terminal init, frame loop, dt clamping, key and mouse handling.

use crate::GameConfig;
use crate::encounter::Encounter;
use crate::grid::CellPos;
use crate::input::{Action, Pointer, key_to_action, mouse_to_pointer};
use crate::theme::Theme;
use crate::ui::Effects;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// ~60 FPS: poll timeout per frame.
const FRAME_MS: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    Exit,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    encounter: Encounter,
    screen: Screen,
    paused: bool,
    quit_selected: QuitOption,
    /// Keyboard cursor on the board, always in bounds.
    cursor: CellPos,
    effects: Effects,
    last_tick: Instant,
    /// Frame area of the last draw; mouse hit-testing uses the same layout.
    area: Rect,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        let encounter = Encounter::new(&config);
        let cursor = CellPos::new(config.rows as i32 - 1, 0);
        Self {
            config,
            theme,
            encounter,
            screen: Screen::Playing,
            paused: false,
            quit_selected: QuitOption::Resume,
            cursor,
            effects: Effects::default(),
            last_tick: Instant::now(),
            area: Rect::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        info!(deaths = self.encounter.deaths(), "exiting");

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        self.last_tick = Instant::now();
        loop {
            let now = Instant::now();
            let completed = terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.encounter,
                    &self.theme,
                    self.cursor,
                    self.paused,
                    self.quit_selected,
                    &mut self.effects,
                    now,
                );
            })?;
            self.area = completed.area;

            let timeout = Duration::from_millis(FRAME_MS).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let flow = match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            self.apply_action(key_to_action(key))
                        }
                        Event::Mouse(mouse) => {
                            if let Some(pointer) = mouse_to_pointer(mouse) {
                                self.apply_pointer(pointer);
                            }
                            ControlFlow::Continue(())
                        }
                        _ => ControlFlow::Continue(()),
                    };
                    if flow.is_break() {
                        return Ok(());
                    }
                }
            }

            self.tick(Instant::now());
        }
    }

    /// Advance the simulation by wall-clock time since the last tick, clamped to `max_dt`.
    /// Time keeps flowing while paused or in the quit menu so resuming never jumps.
    fn tick(&mut self, now: Instant) {
        let dt = now
            .saturating_duration_since(self.last_tick)
            .as_secs_f64()
            .min(self.config.max_dt);
        self.last_tick = now;
        if self.screen == Screen::Playing && !self.paused {
            self.encounter.update(dt);
        }
        for event in self.encounter.drain_events() {
            debug!(?event, "encounter event");
            self.effects.trigger(event, &self.theme);
        }
    }

    fn apply_action(&mut self, action: Action) -> ControlFlow<()> {
        match self.screen {
            Screen::Playing if self.paused => match action {
                Action::Pause => self.paused = false,
                Action::Quit => self.open_quit_menu(),
                _ => {}
            },
            Screen::Playing => match action {
                Action::Pause => self.paused = true,
                Action::Quit => self.open_quit_menu(),
                Action::CursorLeft => self.move_cursor(0, -1),
                Action::CursorRight => self.move_cursor(0, 1),
                Action::CursorUp => self.move_cursor(-1, 0),
                Action::CursorDown => self.move_cursor(1, 0),
                Action::Grab => {
                    if self.encounter.grid().is_selecting() {
                        self.encounter.end_selection();
                    } else {
                        self.encounter.begin_selection(self.cursor);
                    }
                }
                Action::Cancel => self.encounter.cancel_selection(),
                Action::None => {}
            },
            Screen::QuitMenu => match action {
                Action::CursorUp | Action::CursorDown | Action::CursorLeft | Action::CursorRight => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::Exit,
                        QuitOption::Exit => QuitOption::Resume,
                    };
                }
                Action::Grab => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::Exit => return ControlFlow::Break(()),
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                Action::Cancel | Action::None => {}
            },
        }
        ControlFlow::Continue(())
    }

    fn open_quit_menu(&mut self) {
        self.encounter.cancel_selection();
        self.screen = Screen::QuitMenu;
        self.quit_selected = QuitOption::Resume;
    }

    /// Move the cursor within the board; an active selection follows it.
    fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        let grid = self.encounter.grid();
        let next = CellPos::new(
            (self.cursor.row + d_row).clamp(0, grid.rows as i32 - 1),
            (self.cursor.col + d_col).clamp(0, grid.cols as i32 - 1),
        );
        if next == self.cursor {
            return;
        }
        self.cursor = next;
        if grid.is_selecting() {
            self.encounter.extend_selection(next);
        }
    }

    fn apply_pointer(&mut self, pointer: Pointer) {
        if self.screen != Screen::Playing || self.paused {
            return;
        }
        let grid = self.encounter.grid();
        match pointer {
            Pointer::Down(column, row) => {
                let pos = crate::ui::cell_at(self.area, grid, column, row);
                if grid.in_bounds(pos) {
                    self.cursor = pos;
                }
                self.encounter.begin_selection(pos);
            }
            Pointer::Drag(column, row) => {
                let pos = crate::ui::cell_at(self.area, grid, column, row);
                self.encounter.extend_selection(pos);
            }
            Pointer::Up(..) => self.encounter.end_selection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TokenColor, TokenSize};

    fn app() -> App {
        let mut app = App::new(
            GameConfig {
                seed: Some(5),
                ..GameConfig::default()
            },
            Theme::default(),
        );
        let grid = app.encounter.grid_mut();
        grid.put(9, 0, TokenColor::R, TokenSize::Small);
        grid.put(9, 1, TokenColor::B, TokenSize::Small);
        app.area = Rect::new(0, 0, 80, 40);
        app
    }

    #[test]
    fn test_cursor_starts_bottom_left_and_clamps() {
        let mut app = app();
        assert_eq!(app.cursor, CellPos::new(9, 0));
        let _ = app.apply_action(Action::CursorLeft);
        let _ = app.apply_action(Action::CursorDown);
        assert_eq!(app.cursor, CellPos::new(9, 0));
        let _ = app.apply_action(Action::CursorUp);
        assert_eq!(app.cursor, CellPos::new(8, 0));
    }

    #[test]
    fn test_keyboard_grab_move_grab_fuses() {
        let mut app = app();
        let _ = app.apply_action(Action::Grab);
        assert!(app.encounter.grid().is_selecting());
        let _ = app.apply_action(Action::CursorRight);
        assert_eq!(app.encounter.grid().selection().len(), 2);
        let _ = app.apply_action(Action::Grab);
        assert!(!app.encounter.grid().is_selecting());
        assert!(app.encounter.grid().pending().is_some());
        assert_eq!(app.encounter.grid().settled_count(), 0);
    }

    #[test]
    fn test_cancel_drops_selection() {
        let mut app = app();
        let _ = app.apply_action(Action::Grab);
        let _ = app.apply_action(Action::Cancel);
        assert!(!app.encounter.grid().is_selecting());
        assert_eq!(app.encounter.grid().settled_count(), 2);
    }

    #[test]
    fn test_mouse_drag_fuses() {
        let mut app = app();
        let board = crate::ui::areas(app.area, 6, 10).board;
        app.apply_pointer(Pointer::Down(board.x, board.y + 9));
        app.apply_pointer(Pointer::Drag(board.x + 2, board.y + 9));
        app.apply_pointer(Pointer::Up(board.x + 2, board.y + 9));
        assert!(app.encounter.grid().pending().is_some());
    }

    #[test]
    fn test_paused_ignores_input_and_time() {
        let mut app = app();
        let _ = app.apply_action(Action::Pause);
        let _ = app.apply_action(Action::Grab);
        assert!(!app.encounter.grid().is_selecting());
        let before = app.encounter.opponent().windup_elapsed();
        app.tick(app.last_tick + Duration::from_millis(30));
        assert_eq!(app.encounter.opponent().windup_elapsed(), before);
    }

    #[test]
    fn test_tick_clamps_dt() {
        let mut app = app();
        app.tick(app.last_tick + Duration::from_secs(5));
        let elapsed = app.encounter.opponent().windup_elapsed();
        assert!(elapsed > 0.0 && elapsed <= app.config.max_dt + 1e-9);
    }

    #[test]
    fn test_quit_menu_flow() {
        let mut app = app();
        assert!(app.apply_action(Action::Quit).is_continue());
        assert_eq!(app.screen, Screen::QuitMenu);
        assert!(app.apply_action(Action::Grab).is_continue());
        assert_eq!(app.screen, Screen::Playing);
        let _ = app.apply_action(Action::Quit);
        let _ = app.apply_action(Action::CursorDown);
        assert_eq!(app.quit_selected, QuitOption::Exit);
        assert!(app.apply_action(Action::Grab).is_break());
    }
}
