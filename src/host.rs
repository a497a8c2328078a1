//! Collaborators the core talks to but does not own: audio, presentation and persistence.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

/// The $4000–$4018 register window and the audio output behind it.
pub trait AudioPort {
    fn read(&mut self, _reg: u16) -> u8 {
        0x40
    }

    fn write(&mut self, _reg: u16, _data: u8) {}

    /// True when fewer than `samples` samples are queued for output.
    fn buffer_has_less_than(&self, _samples: usize) -> bool {
        false
    }

    /// Close out one frame's worth of samples.
    fn finish_frame(&mut self) {}

    /// Frame counter / DMC IRQ level.
    fn irq_line(&self) -> bool {
        false
    }
}

/// Audio port that produces nothing and reads back open bus.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioPort for SilentAudio {}

/// Receives one completed frame. The buffers are overwritten by the next frame.
pub trait FrameSink {
    /// `pixels` holds 256×240 colour indices: bits 0–5 palette colour, bits 6–8 emphasis.
    fn render(&mut self, pixels: &[u16], bg_colors: &[u8; 240], dot_crawl: bool);
}

/// Byte-array storage keyed by slot name.
pub trait SaveStore {
    fn exists(&self, slot: &str) -> bool;
    fn read(&self, slot: &str) -> io::Result<Vec<u8>>;
    /// Must not block the caller on I/O.
    fn write(&mut self, slot: &str, data: Vec<u8>);
}

/// `<dir>/<slot>.sav` files, written on a background thread. Writes land in call order,
/// and dropping the store waits for the ones still in flight.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    last_write: Option<JoinHandle<()>>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_write: None,
        }
    }

    fn path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.sav"))
    }
}

impl SaveStore for FileStore {
    fn exists(&self, slot: &str) -> bool {
        self.path(slot).is_file()
    }

    fn read(&self, slot: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(slot))
    }

    fn write(&mut self, slot: &str, data: Vec<u8>) {
        let previous = self.last_write.take();
        let path = self.path(slot);
        let dir = self.dir.clone();
        let handle = thread::spawn(move || {
            if let Some(previous) = previous {
                if previous.join().is_err() {
                    warn!("earlier save to {} panicked", path.display());
                }
            }
            let result = fs::create_dir_all(&dir).and_then(|()| fs::write(&path, &data));
            match result {
                Ok(()) => info!("saved {} bytes to {}", data.len(), path.display()),
                Err(err) => error!("failed to save {}: {err}", path.display()),
            }
        });
        self.last_write = Some(handle);
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Some(handle) = self.last_write.take() {
            if handle.join().is_err() {
                error!("save thread panicked");
            }
        }
    }
}
