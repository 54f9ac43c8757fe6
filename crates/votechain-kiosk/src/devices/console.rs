//! Console front panel
//!
//! Renders the kiosk display, LEDs, sensor ring light and progress bar with
//! ratatui, and turns crossterm key events into simulated hardware input:
//!
//! | Key                  | Device                            |
//! |----------------------|-----------------------------------|
//! | `r`                  | START / reset button              |
//! | `a`, `b`             | candidate buttons                 |
//! | digits, Enter, Bksp  | keypad                            |
//! | Esc                  | keypad cancel                     |
//! | F1-F9                | place finger 1-9 on the sensor    |
//! | `s`                  | place an unreadable finger        |
//! | `q`, Ctrl-C          | quit                              |
//!
//! The terminal is owned by a dedicated thread; the kiosk side only writes
//! into the shared [`PanelHandle`].

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use tokio::sync::oneshot;
use tracing::{debug, info};

use votechain_core::keycode::{KEY_BACKSPACE, KEY_ENTER, KEY_ESC};
use votechain_core::Key;

use super::sim::{
    ButtonScript, KeyScript, SensorScript, SimFinger, SimulatedButtons, SimulatedKeypad,
    SimulatedSensor,
};
use super::{
    BeepPattern, Button, Devices, Display, Feedback, IndicatorColor, IndicatorMode, LedState,
};
use crate::config::KioskConfig;

/// How long a console key holds a button down
const BUTTON_HOLD: Duration = Duration::from_millis(250);
const TICK_RATE: Duration = Duration::from_millis(50);
const BEEP_VISIBLE: Duration = Duration::from_millis(800);

#[derive(Debug, Default)]
struct PanelState {
    lines: [String; 3],
    progress: Option<(f64, char)>,
    leds: LedState,
    last_beep: Option<(BeepPattern, Instant)>,
}

/// Shared state rendered by the front panel thread
#[derive(Clone, Default)]
pub struct PanelHandle(Arc<Mutex<PanelState>>);

impl PanelHandle {
    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current display lines
    pub fn lines(&self) -> [String; 3] {
        self.lock().lines.clone()
    }
}

/// Display that publishes flushed frames to the console panel
pub struct ConsoleDisplay {
    lines: [String; 3],
    progress: Option<(f64, char)>,
    panel: PanelHandle,
}

impl Display for ConsoleDisplay {
    fn clear(&mut self) {
        self.lines = Default::default();
        self.progress = None;
    }

    fn draw_text(&mut self, row: usize, text: &str) {
        if let Some(line) = self.lines.get_mut(row) {
            *line = text.to_string();
        }
    }

    fn draw_progress(&mut self, fraction: f64, spinner: char) {
        self.progress = Some((fraction, spinner));
    }

    fn flush(&mut self) -> crate::Result<()> {
        let mut state = self.panel.lock();
        state.lines = self.lines.clone();
        state.progress = self.progress;
        Ok(())
    }
}

pub struct ConsoleFeedback {
    panel: PanelHandle,
}

impl Feedback for ConsoleFeedback {
    fn set_leds(&mut self, leds: LedState) {
        self.panel.lock().leds = leds;
    }

    fn play(&mut self, pattern: BeepPattern) {
        debug!("Beep: {}", pattern.name());
        self.panel.lock().last_beep = Some((pattern, Instant::now()));
    }
}

/// Terminal side of the console front panel
pub struct ConsoleFrontPanel {
    panel: PanelHandle,
    buttons: ButtonScript,
    keys: KeyScript,
    sensor: SensorScript,
    touch_duration: Duration,
}

/// Build console-backed devices and the front panel that drives them
pub fn build(config: &KioskConfig) -> (Devices, ConsoleFrontPanel) {
    let panel = PanelHandle::default();
    let (buttons, button_script) = SimulatedButtons::new();
    let (keypad, key_script) = SimulatedKeypad::new();
    let (sensor, sensor_script) = SimulatedSensor::new();

    for template in &config.simulator.templates {
        sensor_script.enroll(template.location, template.finger);
    }

    let devices = Devices {
        buttons: Box::new(buttons),
        keypad: Box::new(keypad),
        sensor: Box::new(sensor),
        display: Arc::new(Mutex::new(ConsoleDisplay {
            lines: Default::default(),
            progress: None,
            panel: panel.clone(),
        })),
        feedback: Box::new(ConsoleFeedback {
            panel: panel.clone(),
        }),
    };
    let front = ConsoleFrontPanel {
        panel,
        buttons: button_script,
        keys: key_script,
        sensor: sensor_script,
        touch_duration: config.simulator.touch_duration,
    };
    (devices, front)
}

impl ConsoleFrontPanel {
    /// Run the panel on its own thread
    ///
    /// `quit` fires when the operator quits; setting `stop` ends the thread.
    /// The terminal is restored before the thread exits.
    pub fn spawn(
        self,
        stop: Arc<AtomicBool>,
        quit: oneshot::Sender<()>,
    ) -> io::Result<JoinHandle<io::Result<()>>> {
        std::thread::Builder::new()
            .name("front-panel".to_string())
            .spawn(move || {
                enable_raw_mode()?;
                let mut stdout = io::stdout();
                execute!(stdout, EnterAlternateScreen)?;
                let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

                let result = self.run(&mut terminal, &stop);
                let _ = quit.send(());

                disable_raw_mode()?;
                execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
                terminal.show_cursor()?;
                result
            })
    }

    fn run<B: Backend>(&self, terminal: &mut Terminal<B>, stop: &AtomicBool) -> io::Result<()> {
        while !stop.load(Ordering::SeqCst) {
            terminal.draw(|frame| self.render(frame))?;

            if event::poll(TICK_RATE)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        info!("Quit requested from front panel");
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns true when the operator asked to quit
    fn handle_key(&self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') => return true,
            KeyCode::Char('r') => self.buttons.press_now(Button::Start, BUTTON_HOLD),
            KeyCode::Char('a') => self.buttons.press_now(Button::CandidateA, BUTTON_HOLD),
            KeyCode::Char('b') => self.buttons.press_now(Button::CandidateB, BUTTON_HOLD),
            KeyCode::Char('s') => self.sensor.touch_now(SimFinger::Smudged, self.touch_duration),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.keys.key_now(Key::digit_keycode(c as u8 - b'0'))
            }
            KeyCode::Enter => self.keys.key_now(KEY_ENTER),
            KeyCode::Backspace => self.keys.key_now(KEY_BACKSPACE),
            KeyCode::Esc => self.keys.key_now(KEY_ESC),
            KeyCode::F(n @ 1..=9) => self
                .sensor
                .touch_now(SimFinger::Print(u16::from(n)), self.touch_duration),
            _ => {}
        }
        false
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        let state = self.panel.lock();
        let [display_area, progress_area, status_area, help_area] = Layout::vertical([
            Constraint::Length(5),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .areas(frame.area());

        let lines: Vec<Line> = state
            .lines
            .iter()
            .map(|l| Line::from(l.as_str()).bold())
            .collect();
        let display = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" VoteChain Kiosk "),
        );
        frame.render_widget(display, display_area);

        if let Some((fraction, spinner)) = state.progress {
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
                .ratio(fraction.clamp(0.0, 1.0))
                .label(format!("{} {:>3}%", spinner, (fraction * 100.0) as u16));
            frame.render_widget(gauge, progress_area);
        }

        let led = |on: bool, color: Color, name: &'static str| {
            if on {
                Span::styled(format!("● {}  ", name), Style::default().fg(color))
            } else {
                Span::styled(format!("○ {}  ", name), Style::default().fg(Color::DarkGray))
            }
        };
        let mut status = vec![
            led(state.leds.green, Color::Green, "GREEN"),
            led(state.leds.red, Color::Red, "RED"),
        ];
        if let Some((color, mode)) = self.sensor.indicator() {
            status.push(indicator_span(color, mode));
        }
        if let Some((pattern, at)) = state.last_beep {
            if at.elapsed() < BEEP_VISIBLE {
                status.push(Span::styled(
                    format!("  ♪ {}", pattern.name()),
                    Style::default().fg(Color::Yellow),
                ));
            }
        }
        frame.render_widget(
            Paragraph::new(Line::from(status))
                .block(Block::default().borders(Borders::ALL).title(" Panel ")),
            status_area,
        );

        let help = Paragraph::new(vec![
            Line::from("r START   a/b candidate   0-9 Enter Bksp Esc keypad"),
            Line::from("F1-F9 finger   s smudged finger   q quit"),
        ])
        .style(Style::default().fg(Color::Gray));
        frame.render_widget(help, help_area);
    }
}

fn indicator_span(color: IndicatorColor, mode: IndicatorMode) -> Span<'static> {
    let fg = match color {
        IndicatorColor::Red => Color::Red,
        IndicatorColor::Blue => Color::Blue,
        IndicatorColor::Purple => Color::Magenta,
    };
    let (glyph, label) = match mode {
        IndicatorMode::Off => ("○", "off"),
        IndicatorMode::On => ("●", "on"),
        IndicatorMode::Breathing => ("◉", "breathing"),
        IndicatorMode::Flashing => ("◎", "flashing"),
    };
    Span::styled(
        format!("  sensor {} {}", glyph, label),
        Style::default().fg(if mode == IndicatorMode::Off {
            Color::DarkGray
        } else {
            fg
        }),
    )
}
