//! Tone presets and the gain envelope shared by every note of a chord.

use std::f64::consts::PI;

use clap::ValueEnum;

/// Seconds before the nominal end at which the release begins
const RELEASE_LEAD: f64 = 0.05;

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// One sample at `phase` in cycles (0.0..1.0), range -1..=1
    pub fn sample(self, phase: f64) -> f64 {
        let p = phase.fract();
        match self {
            Waveform::Sine => (2.0 * PI * p).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
        }
    }
}

/// Playback timbre. `Piano` is the rich tone: a triangle fundamental plus a
/// soft sine an octave up, with a snappier envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Tone {
    Sine,
    #[default]
    Triangle,
    Square,
    Sawtooth,
    Piano,
}

/// One oscillator of a note: frequency multiplier, shape, level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub ratio: f64,
    pub waveform: Waveform,
    pub level: f64,
}

impl Tone {
    pub fn is_rich(self) -> bool {
        self == Tone::Piano
    }

    pub fn partials(self) -> Vec<Partial> {
        let single = |waveform| {
            vec![Partial {
                ratio: 1.0,
                waveform,
                level: 1.0,
            }]
        };
        match self {
            Tone::Sine => single(Waveform::Sine),
            Tone::Triangle => single(Waveform::Triangle),
            Tone::Square => single(Waveform::Square),
            Tone::Sawtooth => single(Waveform::Sawtooth),
            Tone::Piano => vec![
                Partial {
                    ratio: 1.0,
                    waveform: Waveform::Triangle,
                    level: 1.0,
                },
                Partial {
                    ratio: 2.0,
                    waveform: Waveform::Sine,
                    level: 1.0,
                },
            ],
        }
    }

    /// Attack ramp length in seconds
    pub fn attack(self) -> f64 {
        if self.is_rich() { 0.008 } else { 0.02 }
    }

    /// Release time constant in seconds
    pub fn release(self) -> f64 {
        if self.is_rich() { 0.12 } else { 0.2 }
    }

    /// Peak level reached for a requested gain
    pub fn peak(self, gain: f64) -> f64 {
        if self.is_rich() {
            (gain + 0.05).min(0.35)
        } else {
            gain
        }
    }

    /// How long oscillators keep running past the nominal duration
    pub fn tail(self) -> f64 {
        if self.is_rich() { 0.02 } else { 0.05 }
    }
}

/// Gain over time for one chord: a linear attack to the peak, then an
/// exponential fall towards zero starting shortly before the nominal end.
/// All times are absolute seconds on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub start: f64,
    pub attack: f64,
    pub peak: f64,
    pub release_start: f64,
    pub release: f64,
    /// Oscillators are silent from here on
    pub stop: f64,
}

impl Envelope {
    pub fn new(start: f64, duration: f64, gain: f64, tone: Tone) -> Self {
        Self {
            start,
            attack: tone.attack(),
            peak: tone.peak(gain),
            release_start: start + duration - RELEASE_LEAD,
            release: tone.release(),
            stop: start + duration + tone.tail(),
        }
    }

    fn ramp(&self, t: f64) -> f64 {
        if self.attack <= 0.0 {
            return self.peak;
        }
        self.peak * ((t - self.start) / self.attack).clamp(0.0, 1.0)
    }

    pub fn gain_at(&self, t: f64) -> f64 {
        if t < self.start || t >= self.stop {
            return 0.0;
        }
        if t < self.release_start {
            return self.ramp(t);
        }
        let from = self.ramp(self.release_start.max(self.start));
        from * (-(t - self.release_start) / self.release).exp()
    }

    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.stop
    }
}
