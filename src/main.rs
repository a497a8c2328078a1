//! Demo front-end: loads a cartridge and runs it in a window.
//!
//! Usage: nescore <rom> [--region ntsc|pal] [--no-idle-skip] [--save-dir DIR] [--scale N]
//! [--log-level LEVEL]

use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use std::thread;
use std::time::Instant;

use ansi_term::Colour::{Blue, Green, Purple, Red, Yellow};
use clap::Parser;
use log::{Level, LevelFilter, Log, Metadata, Record};
use minifb::{Key, Scale, Window, WindowOptions};
use nescore::{
    Config, Nes, Region, Rom,
    controller::Buttons,
    host::{FileStore, FrameSink, SilentAudio},
    ppu::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};

/// 2C02 colours as 0xRRGGBB.
const NTSC_PALETTE: [u32; 64] = [
    0x545454, 0x001E74, 0x081090, 0x300088, 0x440064, 0x5C0030, 0x540400, 0x3C1800, 0x202A00,
    0x083A00, 0x004000, 0x003C00, 0x00302C, 0x000000, 0x000000, 0x000000, 0x989698, 0x084CC4,
    0x3032EC, 0x5C1EE4, 0x8814B0, 0xA01464, 0x982220, 0x783C00, 0x545A00, 0x287200, 0x087C00,
    0x007628, 0x006678, 0x000000, 0x000000, 0x000000, 0xECEEEC, 0x3C7EEC, 0x5C5CEC, 0x8844EC,
    0xB02CEC, 0xE028B0, 0xD83C50, 0xC45400, 0xAC7000, 0x808800, 0x409C30, 0x20A458, 0x209A88,
    0x404040, 0x000000, 0x000000, 0xECEEEC, 0xA8BCEC, 0xBCACEC, 0xD4A0EC, 0xEC94EC, 0xEC90D4,
    0xEC9CB4, 0xE4B090, 0xDCC878, 0xD4DC78, 0xB8EC98, 0xA8ECBC, 0xA0E4E4, 0xA0A0A0, 0x000000,
    0x000000,
];

/// Cycle-accurate NES core demo
#[derive(Parser, Debug)]
#[command(name = "nescore", about = "Runs an iNES ROM on the nescore core", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    rom: PathBuf,

    /// Video region: ntsc or pal
    #[arg(long, default_value = "ntsc")]
    region: Region,

    /// Run branch-to-self loops instruction by instruction
    #[arg(long)]
    no_idle_skip: bool,

    /// Directory for battery-backed save RAM
    #[arg(long, default_value = "saves")]
    save_dir: PathBuf,

    /// Window scale factor (1, 2 or 4)
    #[arg(short, long, default_value_t = 2)]
    scale: usize,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Console logger with coloured level tags.
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => Red.bold().paint("ERROR"),
            Level::Warn => Yellow.bold().paint("WARN"),
            Level::Info => Green.bold().paint("INFO"),
            Level::Debug => Blue.paint("DEBUG"),
            Level::Trace => Purple.paint("TRACE"),
        };
        eprintln!("{tag} {}: {}", record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Host keys for each controller port, in `Buttons` order.
struct KeyBindings {
    players: [[(Key, Buttons); 8]; 2],
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            players: [
                [
                    (Key::X, Buttons::A),
                    (Key::Z, Buttons::B),
                    (Key::RightShift, Buttons::SELECT),
                    (Key::Enter, Buttons::START),
                    (Key::Up, Buttons::UP),
                    (Key::Down, Buttons::DOWN),
                    (Key::Left, Buttons::LEFT),
                    (Key::Right, Buttons::RIGHT),
                ],
                [
                    (Key::G, Buttons::A),
                    (Key::F, Buttons::B),
                    (Key::Q, Buttons::SELECT),
                    (Key::E, Buttons::START),
                    (Key::W, Buttons::UP),
                    (Key::S, Buttons::DOWN),
                    (Key::A, Buttons::LEFT),
                    (Key::D, Buttons::RIGHT),
                ],
            ],
        }
    }
}

/// Converts colour indices to 0xRRGGBB for the window. Emphasis is not modelled here.
struct RgbSink {
    buffer: Rc<RefCell<Vec<u32>>>,
}

impl FrameSink for RgbSink {
    fn render(&mut self, pixels: &[u16], _bg_colors: &[u8; 240], _dot_crawl: bool) {
        let mut buffer = self.buffer.borrow_mut();
        for (out, &index) in buffer.iter_mut().zip(pixels) {
            *out = NTSC_PALETTE[(index & 0x3F) as usize];
        }
    }
}

fn poll_input(window: &Window, bindings: &KeyBindings, nes: &mut Nes) {
    for (port, keys) in bindings.players.iter().enumerate() {
        let pad = nes.controller(port);
        for &(key, button) in keys {
            let down = window.is_key_down(key);
            let held = pad.state.contains(button);
            if down && !held {
                pad.press(button);
            } else if !down && held {
                pad.release(button);
            }
        }
    }
}

fn window_scale(scale: usize) -> Scale {
    match scale {
        0 | 1 => Scale::X1,
        2 | 3 => Scale::X2,
        4..=7 => Scale::X4,
        _ => Scale::X8,
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {message}", Red.bold().paint("ERROR"));
    process::exit(1);
}

fn main() {
    let args = Args::parse();

    let level: LevelFilter = args
        .log_level
        .parse()
        .unwrap_or_else(|_| fail(format!("unknown log level `{}`", args.log_level)));
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    let rom = Rom::load(&args.rom)
        .unwrap_or_else(|err| fail(format!("failed to load {}: {err}", args.rom.display())));
    let save_slot = args
        .rom
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string());
    let config = Config {
        region: args.region,
        idle_loop_skip: !args.no_idle_skip,
        save_slot,
        ..Config::default()
    };
    let frame_duration = config.region.frame_duration();

    let store = FileStore::new(&args.save_dir);
    let mut nes = Nes::new(rom, config, Box::new(SilentAudio), Some(Box::new(store)))
        .unwrap_or_else(|err| fail(err));

    let frame = Rc::new(RefCell::new(vec![0u32; SCREEN_WIDTH * SCREEN_HEIGHT]));
    nes.set_frame_sink(Box::new(RgbSink {
        buffer: Rc::clone(&frame),
    }));

    let mut window = Window::new(
        "nescore",
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        WindowOptions {
            scale: window_scale(args.scale),
            ..WindowOptions::default()
        },
    )
    .unwrap_or_else(|err| fail(format!("failed to open window: {err}")));

    let bindings = KeyBindings::default();
    let mut next_frame = Instant::now();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        poll_input(&window, &bindings, &mut nes);
        nes.run_frame();
        if !nes.is_running() {
            break;
        }

        if let Err(err) = window.update_with_buffer(&frame.borrow(), SCREEN_WIDTH, SCREEN_HEIGHT) {
            log::error!("window update failed: {err}");
            break;
        }

        if nes.skip_pacing() {
            next_frame = Instant::now();
            continue;
        }
        next_frame += frame_duration;
        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
        } else {
            next_frame = now;
        }
    }

    nes.flush_save();
}
