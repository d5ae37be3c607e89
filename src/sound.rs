//! Key click playback through the default audio output.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of the click cue in seconds.
const CLICK_SECONDS: f32 = 0.035;
/// Pitch of the click tone in Hz.
const CLICK_PITCH: f32 = 1800.0;
/// Exponential decay time constant in seconds.
const CLICK_DECAY: f32 = 0.006;
/// Linear attack ramp in seconds, avoids a pop at the start.
const CLICK_ATTACK: f32 = 0.001;
const CLICK_AMPLITUDE: f32 = 0.6;

#[derive(Debug, Error)]
pub enum SoundError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("sound output is unavailable")]
    Unavailable,
}

/// Something that can play the key click.
pub trait ClickSound {
    /// Start the click from the beginning at `volume` (0.0 to 1.0).
    /// Must return promptly; playback happens in the background.
    fn play(&self, volume: f32) -> Result<(), SoundError>;
}

/// Build the click cue at `sample_rate`: a short decaying tone.
pub fn synthesize_click(sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let len = (CLICK_SECONDS * rate) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / rate;
            let attack = (t / CLICK_ATTACK).min(1.0);
            let envelope = attack * (-t / CLICK_DECAY).exp();
            (2.0 * std::f32::consts::PI * CLICK_PITCH * t).sin() * envelope * CLICK_AMPLITUDE
        })
        .collect()
}

/// Click player backed by a cpal output stream.
///
/// The stream runs for the lifetime of the player and plays silence until
/// `play` rewinds the shared playhead.
pub struct CpalClick {
    _stream: cpal::Stream,
    playhead: Arc<AtomicUsize>,
    volume: Arc<AtomicU32>,
}

impl CpalClick {
    pub fn open() -> Result<Self, SoundError> {
        // ALSA prints probing noise to stderr, which would land on the TUI.
        let _quiet = QuietStderr::new();

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SoundError::NoDevice)?;
        let config = click_stream_config(&device.default_output_config()?);
        let channels = usize::from(config.channels.max(1));

        let cue = synthesize_click(config.sample_rate.0);
        let playhead = Arc::new(AtomicUsize::new(cue.len()));
        let volume = Arc::new(AtomicU32::new(0.0f32.to_bits()));

        let cb_playhead = Arc::clone(&playhead);
        let cb_volume = Arc::clone(&volume);
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let gain = f32::from_bits(cb_volume.load(Ordering::Relaxed));
                for frame in data.chunks_mut(channels) {
                    let pos = cb_playhead.load(Ordering::Relaxed);
                    let sample = match cue.get(pos) {
                        Some(s) => {
                            // A failed exchange means play() rewound us; honor it next frame.
                            let _ = cb_playhead.compare_exchange(
                                pos,
                                pos + 1,
                                Ordering::Relaxed,
                                Ordering::Relaxed,
                            );
                            s * gain
                        }
                        None => 0.0,
                    };
                    frame.fill(sample);
                }
            },
            |err| warn!(error = %err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = config.sample_rate.0,
            channels,
            "click sound ready"
        );

        Ok(Self {
            _stream: stream,
            playhead,
            volume,
        })
    }
}

/// f32 output at the device's own rate and channel count, whatever its
/// default sample format; the backend converts if needed.
fn click_stream_config(supported: &cpal::SupportedStreamConfig) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    }
}

impl ClickSound for CpalClick {
    fn play(&self, volume: f32) -> Result<(), SoundError> {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        self.playhead.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Stand-in used when no audio output could be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ClickSound for Silent {
    fn play(&self, _volume: f32) -> Result<(), SoundError> {
        Err(SoundError::Unavailable)
    }
}

/// Open the audio output, or fall back to `Silent` when that fails.
pub fn open_click(muted: bool) -> Box<dyn ClickSound> {
    if muted {
        debug!("audio output disabled on the command line");
        return Box::new(Silent);
    }
    match CpalClick::open() {
        Ok(click) => Box::new(click),
        Err(e) => {
            warn!(error = %e, "click sound disabled");
            Box::new(Silent)
        }
    }
}

/// Redirects stderr to /dev/null until dropped.
struct QuietStderr {
    saved_fd: i32,
    _dev_null: File,
}

impl QuietStderr {
    fn new() -> Option<Self> {
        let dev_null = File::open("/dev/null").ok()?;

        let saved_fd = unsafe { libc::dup(libc::STDERR_FILENO) };
        if saved_fd < 0 {
            return None;
        }

        if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } < 0 {
            unsafe {
                libc::close(saved_fd);
            }
            return None;
        }

        Some(Self {
            saved_fd,
            _dev_null: dev_null,
        })
    }
}

impl Drop for QuietStderr {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved_fd, libc::STDERR_FILENO);
            libc::close(self.saved_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_length_follows_sample_rate() {
        assert_eq!(synthesize_click(48_000).len(), 1680);
        assert_eq!(synthesize_click(44_100).len(), 1543);
    }

    #[test]
    fn click_starts_and_ends_quiet() {
        let cue = synthesize_click(48_000);
        assert_eq!(cue[0], 0.0);
        let tail = &cue[cue.len() - 10..];
        assert!(tail.iter().all(|s| s.abs() < 0.01));
        assert!(cue.iter().all(|s| s.abs() <= CLICK_AMPLITUDE));
        assert!(cue.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn integer_devices_still_get_a_stream_config() {
        let supported = cpal::SupportedStreamConfig::new(
            2,
            cpal::SampleRate(44_100),
            cpal::SupportedBufferSize::Unknown,
            cpal::SampleFormat::I16,
        );
        let config = click_stream_config(&supported);
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, cpal::SampleRate(44_100));
        assert_eq!(config.buffer_size, cpal::BufferSize::Default);
    }

    #[test]
    fn silent_reports_unavailable() {
        assert!(matches!(Silent.play(0.5), Err(SoundError::Unavailable)));
    }

    #[test]
    fn muted_open_never_touches_audio() {
        let click = open_click(true);
        assert!(click.play(1.0).is_err());
    }
}
