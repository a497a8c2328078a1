//! Frame driver: owns the CPU (and through its bus the PPU and mapper) and runs whole frames.
//!
//! The PPU is the master clock. Every dot it runs, the CPU's NMI input follows the PPU's
//! output, and on every third dot the CPU and then the mapper are clocked once.

use log::{info, warn};

use crate::{
    bus::NesBus,
    cartridge::cartridge::{LoadError, Rom},
    config::Config,
    controller::Controller,
    cpu::cpu::CPU,
    host::{AudioPort, FrameSink, SaveStore, SilentAudio},
};

/// Samples below which the audio buffer counts as starving.
const AUDIO_LOW_WATER: usize = 1000;

pub struct Nes {
    pub cpu: CPU<NesBus>,
    config: Config,
    frame_count: u64,
    running: bool,
    skip_pacing: bool,
    frame_sink: Option<Box<dyn FrameSink>>,
    save_store: Option<Box<dyn SaveStore>>,
}

impl Nes {
    /// Build a session for `rom`: mapper, saved PRG RAM, CPU power-up, mapper init.
    /// Nothing outside the returned value is touched, so a failed load leaves any previous
    /// session intact.
    pub fn new(
        rom: Rom,
        config: Config,
        audio: Box<dyn AudioPort>,
        save_store: Option<Box<dyn SaveStore>>,
    ) -> Result<Self, LoadError> {
        let mut mapper = rom.into_mapper()?;

        if let Some(store) = save_store.as_deref() {
            if store.exists(&config.save_slot) {
                match store.read(&config.save_slot) {
                    Ok(data) => {
                        info!(
                            "restored {} bytes of save RAM from `{}`",
                            data.len(),
                            config.save_slot
                        );
                        mapper.restore_prg_ram(&data);
                    }
                    Err(err) => warn!("could not read save `{}`: {err}", config.save_slot),
                }
            }
        }

        let bus = NesBus::new(mapper, audio, config.region);
        let mut cpu = CPU::new(bus);
        cpu.idle_loop_skip = config.idle_loop_skip;
        cpu.power_up();
        cpu.bus.mapper.init();

        Ok(Self {
            cpu,
            config,
            frame_count: 0,
            running: true,
            skip_pacing: false,
            frame_sink: None,
            save_store,
        })
    }

    /// Session over an in-memory image with silent audio and no persistence.
    pub fn from_bytes(data: &[u8], config: Config) -> Result<Self, LoadError> {
        Self::new(Rom::parse(data)?, config, Box::new(SilentAudio), None)
    }

    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.frame_sink = Some(sink);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Frames completed since load.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// False once the CPU has locked up; a new ROM must be loaded.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The audio buffer ran low during the last frame; the front-end should not sleep.
    pub fn skip_pacing(&self) -> bool {
        self.skip_pacing
    }

    pub fn controller(&mut self, port: usize) -> &mut Controller {
        &mut self.cpu.bus.controllers[port & 1]
    }

    /// Colour indices of the last completed frame.
    pub fn pixels(&self) -> &[u16] {
        &self.cpu.bus.ppu.bitmap
    }

    /// Run the PPU through every scanline of one frame, then hand the frame out.
    pub fn run_frame(&mut self) {
        if !self.running {
            return;
        }

        for _ in 0..self.config.region.scanlines() {
            self.run_line();
        }
        if self.cpu.halted {
            warn!("CPU locked up at ${:04X}; emulation stopped", self.cpu.pc);
            self.running = false;
        }

        let bus = &mut self.cpu.bus;
        self.skip_pacing = bus.audio.buffer_has_less_than(AUDIO_LOW_WATER);
        bus.audio.finish_frame();

        if let Some(sink) = self.frame_sink.as_mut() {
            let ppu = &self.cpu.bus.ppu;
            sink.render(&ppu.bitmap, &ppu.bg_colors, ppu.dot_crawl);
        }

        let interval = self.config.sram_save_interval;
        if interval != 0 && self.frame_count % interval == 0 {
            self.flush_save();
        }
        self.frame_count += 1;
    }

    fn run_line(&mut self) {
        self.cpu.bus.ppu.begin_line();
        while self.cpu.bus.ppu.line_in_progress() {
            self.clock_dot();
        }
    }

    fn clock_dot(&mut self) {
        let bus = &mut self.cpu.bus;
        bus.ppu.clock(bus.mapper.as_mut());

        let nmi = bus.ppu.nmi_line();
        let cpu_due = bus.ppu.cpu_due();
        self.cpu.set_nmi(nmi);
        if cpu_due {
            self.cpu.run_cycle();
            self.cpu.bus.mapper.cpu_cycle();
        }

        let bus = &mut self.cpu.bus;
        bus.ppu.finish_dot(bus.mapper.as_mut());
    }

    /// Soft reset (the console's reset button).
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Snapshot PRG RAM and hand the copy to the save store.
    pub fn flush_save(&mut self) {
        let Some(store) = self.save_store.as_mut() else {
            return;
        };
        let snapshot = self.cpu.bus.mapper.prg_ram_snapshot();
        store.write(&self.config.save_slot, snapshot);
    }
}
