use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::Stylize,
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

use chip8_machine::{
    DISPLAY_X, DISPLAY_Y, Machine, MachineConfig, RunState, ShiftSource, emu::Display, u4,
};

/// Host keys laid out like the hex keypad they stand in for, paired with the
/// CHIP-8 key each one drives. Rendering walks the same grid.
const KEYPAD: [[(char, u8); 4]; 4] = [
    [('1', 0x1), ('2', 0x2), ('3', 0x3), ('4', 0xC)],
    [('q', 0x4), ('w', 0x5), ('e', 0x6), ('r', 0xD)],
    [('a', 0x7), ('s', 0x8), ('d', 0x9), ('f', 0xE)],
    [('z', 0xA), ('x', 0x0), ('c', 0xB), ('v', 0xF)],
];

fn chip8_key(code: KeyCode) -> Option<u8> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    let c = c.to_ascii_lowercase();
    KEYPAD
        .iter()
        .flatten()
        .find_map(|&(host, key)| (host == c).then_some(key))
}

// Key release events are not fired in terminals on Linux.
// To handle this, we implement a timeout after which we consider a key released.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(100);

// Longest wall-clock gap we try to catch up on after a stall.
const MAX_FRAME_TIME: f32 = 0.25;

/// Converts wall-clock time into machine steps at a fixed instruction rate.
struct Runner {
    machine: Machine,
    cpu_time_step: f32,
    cpu_dt_accumulator: f32,
}

impl Runner {
    fn new(machine: Machine, hz: u32) -> Self {
        Self {
            machine,
            cpu_time_step: 1.0 / hz.max(1) as f32,
            cpu_dt_accumulator: 0.0,
        }
    }

    /// Runs as many steps as fit into `dt`, each one carrying its share of the elapsed time.
    fn update(&mut self, dt: f32) {
        self.cpu_dt_accumulator += dt.min(MAX_FRAME_TIME);

        while self.cpu_dt_accumulator >= self.cpu_time_step {
            self.cpu_dt_accumulator -= self.cpu_time_step;

            if self.machine.step(self.cpu_time_step).is_err() {
                // The machine keeps the halt reason, the UI reads it from there
                self.cpu_dt_accumulator = 0.0;
                break;
            }
        }
    }
}

struct App {
    runner: Runner,
    screen: Display<bool>,
    should_quit: bool,
    last_tick: Instant,
    key_press_times: [Option<Instant>; 16],
}

impl App {
    fn new(rom: &[u8], config: MachineConfig, hz: u32) -> anyhow::Result<Self> {
        let mut machine = Machine::with_config(config);
        machine
            .load(rom)
            .context("Failed to load ROM into CHIP-8 memory")?;

        Ok(Self {
            runner: Runner::new(machine, hz),
            screen: [[false; DISPLAY_X]; DISPLAY_Y],
            should_quit: false,
            last_tick: Instant::now(),
            key_press_times: [None; 16],
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.should_quit {
            let dt = self.last_tick.elapsed().as_secs_f32();
            self.last_tick = Instant::now();

            self.runner.update(dt);
            self.sync_screen();

            terminal.draw(|frame| self.draw(frame))?;

            self.check_key_timeout();

            if event::poll(Duration::from_millis(16))?
                && let Event::Key(key) = event::read()?
            {
                self.handle_key_event(key);
            }
        }

        Ok(())
    }

    /// Copies changed pixels out of the machine, leaving untouched ones alone.
    fn sync_screen(&mut self) {
        let machine = &mut self.runner.machine;
        if !machine.is_frame_dirty() {
            return;
        }

        for (y, row) in self.screen.iter_mut().enumerate() {
            for (x, pixel) in row.iter_mut().enumerate() {
                if machine.is_pixel_dirty(x, y) {
                    *pixel = machine.pixel(x, y);
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn check_key_timeout(&mut self) {
        let now = Instant::now();

        for (idx, press_time) in self.key_press_times.iter_mut().enumerate() {
            if let Some(time) = press_time
                && now.duration_since(*time) > KEY_RELEASE_TIMEOUT
            {
                *press_time = None;
                self.runner.machine.set_key(u4::new(idx as u8), false);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        let Some(key_index) = chip8_key(key.code) else {
            return;
        };
        let pressed = key.kind != KeyEventKind::Release;

        self.runner.machine.set_key(u4::new(key_index), pressed);
        self.key_press_times[usize::from(key_index)] = pressed.then(Instant::now);
    }
}

// Screen plus borders on the left, a 21 column status column on the right
const SIDEBAR_WIDTH: u16 = 21;
const SCREEN_WIDTH: u16 = DISPLAY_X as u16 + 2;
const SCREEN_HEIGHT: u16 = DISPLAY_Y as u16 + 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < SCREEN_WIDTH + SIDEBAR_WIDTH || area.height < SCREEN_HEIGHT + 3 {
            Line::from(format!(
                "need a {}x{} terminal, have {}x{}",
                SCREEN_WIDTH + SIDEBAR_WIDTH,
                SCREEN_HEIGHT + 3,
                area.width,
                area.height
            ))
            .red()
            .render(area, buf);
            return;
        }

        let [main, sidebar] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(SIDEBAR_WIDTH)])
                .areas(area);
        let [screen, message] =
            Layout::vertical([Constraint::Length(SCREEN_HEIGHT), Constraint::Fill(1)])
                .areas(main);
        let [status, keypad] =
            Layout::vertical([Constraint::Length(5 + 2), Constraint::Length(4 + 2)])
                .areas(sidebar);

        self.render_screen(screen, buf);
        self.render_status(status, buf);
        self.render_keypad(keypad, buf);
        self.render_message(message, buf);
    }
}

impl App {
    fn render_screen(&self, area: Rect, buf: &mut Buffer) {
        let rows: Vec<Line> = self
            .screen
            .iter()
            .map(|row| row.iter().map(|&lit| if lit { '█' } else { ' ' }).collect::<String>())
            .map(Line::from)
            .collect();

        Paragraph::new(rows)
            .green()
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" CHIP-8 "))
            .render(area, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let machine = &self.runner.machine;
        let state = match machine.run_state() {
            RunState::Running => "running".green(),
            RunState::AwaitingInput { register } => format!("key -> V{register}").yellow(),
            RunState::Stopped => "stopped".red(),
        };
        let beep = if machine.is_sound_active() { "on" } else { "off" };
        let v = machine.registers();

        let lines = vec![
            Line::from(vec!["state ".into(), state]),
            Line::from(format!("pc {:03X}   i {:03X}", machine.pc(), machine.index())),
            Line::from(format!("dt {:02X}    st {:02X}", machine.delay_timer(), machine.sound_timer())),
            Line::from(format!("depth {}  beep {beep}", machine.stack_depth())),
            Line::from(format!("v0 {:02X}    vf {:02X}", v[0x0], v[0xF])),
        ];

        Paragraph::new(lines)
            .block(Block::bordered().title(" Status "))
            .render(area, buf);
    }

    fn render_keypad(&self, area: Rect, buf: &mut Buffer) {
        let held = self.runner.machine.keypad();

        let lines: Vec<Line> = KEYPAD
            .iter()
            .map(|row| {
                let mut spans = Vec::with_capacity(row.len() * 2);
                for &(_, key) in row {
                    let label = Span::raw(format!("{key:X}"));
                    spans.push(if (held >> key) & 1 == 1 { label.reversed() } else { label });
                    spans.push(Span::raw(" "));
                }
                spans.pop();
                Line::from(spans)
            })
            .collect();

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Keys "))
            .render(area, buf);
    }

    fn render_message(&self, area: Rect, buf: &mut Buffer) {
        let text = match self.runner.machine.halt_reason() {
            Some(err) => Line::from(format!("{err}. Press Esc to quit.")).red(),
            None => Line::from("Esc quits"),
        };

        Paragraph::new(text)
            .block(Block::bordered())
            .render(area, buf);
    }
}

fn init_logging(path: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    // The terminal belongs to the UI, so logs go to a file
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    env_logger::Builder::new()
        .filter_module("chip8_machine", log::LevelFilter::Debug)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();

    Ok(())
}

/// CHIP-8 interpreter in the terminal.
///
/// The 4x4 block under 1-4 stands in for the hex keypad.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = 700)]
    hz: u32,

    /// Shift Vx in place for 8xy6/8xyE instead of reading Vy
    #[arg(long)]
    shift_vx: bool,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Write debug logs to this file (RUST_LOG overrides the level)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let config = MachineConfig {
        shift_source: if args.shift_vx {
            ShiftSource::Vx
        } else {
            ShiftSource::Vy
        },
        seed: args.seed,
        ..Default::default()
    };
    let mut app = App::new(&rom, config, args.hz).context("Failed to initialize application")?;

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    app_result
}
