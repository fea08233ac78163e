//! Oscillator playback on a shared audio clock.
//!
//! All sound goes through one [`Mixer`]: a list of scheduled chords, each
//! with its own gain envelope, rendered sample by sample. The real output is
//! a cpal stream owned by a dedicated audio thread that is started on first
//! use and lives for the rest of the process. Scheduling a chord only adds a
//! voice to the mixer and returns at once; overlapping requests never cancel
//! each other.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, info, warn};

use crate::error::EarError;
use crate::note::midi_to_freq;
use crate::tone::{Envelope, Tone, Waveform};

/// Default scheduling delay so a chord never starts in the past
pub const LOOKAHEAD: f64 = 0.06;
pub const DEFAULT_GAIN: f64 = 0.27;
/// Shortest arpeggio step, so large chords stay audible
const MIN_ARP_STEP: f64 = 0.06;
/// Share of an arpeggio step each note sounds for
const ARP_NOTE_FRACTION: f64 = 0.95;

static OUTPUT: OnceLock<Result<Scheduler, String>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Up,
    Down,
}

/// Options for a block chord
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordOptions {
    /// Absolute time on the audio clock; `None` means now plus [`LOOKAHEAD`]
    pub start_time: Option<f64>,
    pub gain: f64,
    pub tone: Tone,
}

impl Default for ChordOptions {
    fn default() -> Self {
        Self {
            start_time: None,
            gain: DEFAULT_GAIN,
            tone: Tone::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpeggioOptions {
    pub start_time: Option<f64>,
    pub gain: f64,
    pub tone: Tone,
    pub direction: Direction,
}

impl Default for ArpeggioOptions {
    fn default() -> Self {
        Self {
            start_time: None,
            gain: DEFAULT_GAIN,
            tone: Tone::default(),
            direction: Direction::Up,
        }
    }
}

#[derive(Debug, Clone)]
struct Oscillator {
    freq: f64,
    waveform: Waveform,
    level: f64,
}

/// One scheduled chord: its oscillators share a single envelope
#[derive(Debug, Clone)]
struct Voice {
    id: u64,
    oscillators: Vec<Oscillator>,
    envelope: Envelope,
}

impl Voice {
    fn sample(&self, t: f64) -> f64 {
        let gain = self.envelope.gain_at(t);
        if gain == 0.0 {
            return 0.0;
        }
        let elapsed = t - self.envelope.start;
        let sum: f64 = self
            .oscillators
            .iter()
            .map(|osc| osc.waveform.sample(elapsed * osc.freq) * osc.level)
            .sum();
        sum * gain
    }
}

/// Renders every scheduled voice; its frame counter is the audio clock
#[derive(Debug)]
pub struct Mixer {
    sample_rate: f64,
    frame: u64,
    voices: Vec<Voice>,
    next_id: u64,
}

impl Mixer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            frame: 0,
            voices: Vec::new(),
            next_id: 0,
        }
    }

    /// Current audio clock time in seconds
    pub fn now(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    #[cfg(test)]
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn add(&mut self, pitches: &[i32], envelope: Envelope, tone: Tone) -> u64 {
        let partials = tone.partials();
        let oscillators = pitches
            .iter()
            .flat_map(|&m| {
                let freq = midi_to_freq(m);
                partials.iter().map(move |p| Oscillator {
                    freq: freq * p.ratio,
                    waveform: p.waveform,
                    level: p.level,
                })
            })
            .collect();
        let id = self.next_id;
        self.next_id += 1;
        self.voices.push(Voice {
            id,
            oscillators,
            envelope,
        });
        id
    }

    fn remove(&mut self, id: u64) {
        self.voices.retain(|v| v.id != id);
    }

    /// Fill an interleaved buffer, writing each frame to every channel, and
    /// drop voices that have finished
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let t = self.now();
            let value: f64 = self.voices.iter().map(|v| v.sample(t)).sum();
            frame.fill(value.clamp(-1.0, 1.0) as f32);
            self.frame += 1;
        }
        let t = self.now();
        self.voices.retain(|v| !v.envelope.is_finished(t));
    }
}

/// Cancels one scheduled chord. Stopping is best-effort: a finished chord, a
/// repeated call or a torn-down mixer are all silently ignored.
#[derive(Debug, Clone)]
pub struct ChordHandle {
    mixer: Weak<Mutex<Mixer>>,
    id: u64,
}

impl ChordHandle {
    pub fn stop(&self) {
        let Some(mixer) = self.mixer.upgrade() else {
            return;
        };
        if let Ok(mut mixer) = mixer.lock() {
            mixer.remove(self.id);
        }
    }
}

/// Front end for scheduling chords and arpeggios on a mixer
#[derive(Debug, Clone)]
pub struct Scheduler {
    mixer: Arc<Mutex<Mixer>>,
}

impl Scheduler {
    /// The process-wide scheduler on the default output device, opened on
    /// first call
    pub fn global() -> Result<&'static Scheduler, EarError> {
        OUTPUT
            .get_or_init(open_output)
            .as_ref()
            .map_err(|e| EarError::Audio(e.clone()))
    }

    /// A scheduler whose mixer is not connected to any device; the audio
    /// thread wraps one of these, tests render it offline
    pub fn detached(sample_rate: f64) -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer::new(sample_rate))),
        }
    }

    #[cfg(test)]
    pub fn mixer(&self) -> &Arc<Mutex<Mixer>> {
        &self.mixer
    }

    fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current audio clock time in seconds
    pub fn now(&self) -> f64 {
        self.lock().now()
    }

    /// Schedule a block chord of `duration` seconds
    pub fn play_chord(&self, pitches: &[i32], duration: f64, options: ChordOptions) -> ChordHandle {
        let mut mixer = self.lock();
        let start = options.start_time.unwrap_or_else(|| mixer.now() + LOOKAHEAD);
        let envelope = Envelope::new(start, duration, options.gain, options.tone);
        let id = mixer.add(pitches, envelope, options.tone);
        debug!(?pitches, start, duration, "scheduled chord");
        ChordHandle {
            mixer: Arc::downgrade(&self.mixer),
            id,
        }
    }

    /// Schedule the notes one after another within `total_duration` seconds,
    /// lowest first (highest first for [`Direction::Down`])
    pub fn play_arpeggio(&self, pitches: &[i32], total_duration: f64, options: ArpeggioOptions) {
        let mut notes = pitches.to_vec();
        notes.sort_unstable();
        if options.direction == Direction::Down {
            notes.reverse();
        }
        let start = options.start_time.unwrap_or_else(|| self.now() + LOOKAHEAD);
        let step = (total_duration / notes.len().max(1) as f64).max(MIN_ARP_STEP);

        for (i, &note) in notes.iter().enumerate() {
            self.play_chord(
                &[note],
                step * ARP_NOTE_FRACTION,
                ChordOptions {
                    start_time: Some(start + i as f64 * step),
                    gain: options.gain,
                    tone: options.tone,
                },
            );
        }
    }
}

/// Start the audio thread and wait until it reports the stream is running
fn open_output() -> Result<Scheduler, String> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<Scheduler, String>>();

    thread::Builder::new()
        .name("chordear-audio".into())
        .spawn(move || {
            let _stream = match build_stream() {
                Ok((stream, scheduler)) => {
                    let _ = ready_tx.send(Ok(scheduler));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // The stream plays for as long as it is alive.
            loop {
                thread::park();
            }
        })
        .map_err(|e| format!("failed to spawn audio thread: {}", e))?;

    ready_rx
        .recv()
        .map_err(|_| "audio thread exited before the stream started".to_string())?
}

fn build_stream() -> Result<(cpal::Stream, Scheduler), String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no output audio device available")?;

    let config = device
        .default_output_config()
        .map_err(|e| format!("failed to get default output config: {}", e))?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!(
            "unsupported output sample format {:?}",
            config.sample_format()
        ));
    }

    let sample_rate = config.sample_rate() as f64;
    let channels = config.channels() as usize;
    let scheduler = Scheduler::detached(sample_rate);
    let mixer = Arc::clone(&scheduler.mixer);

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match mixer.lock() {
                Ok(mut mixer) => mixer.render(data, channels),
                Err(_) => data.fill(0.0),
            },
            move |err| {
                warn!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("failed to build output stream: {}", e))?;

    stream
        .play()
        .map_err(|e| format!("failed to play stream: {}", e))?;

    info!(sample_rate, channels, "audio output opened");
    Ok((stream, scheduler))
}
