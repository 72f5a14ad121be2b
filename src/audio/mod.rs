//! Notes, instruments and note playback
//!
//! Bars carry a `Note`; a hit produces a `SceneEvent::NotePlayed` which the
//! frontend hands to a `NotePlayer`. The browser build plays through Web
//! Audio (`WebSynth`); native builds log.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_INSTRUMENT, DEFAULT_NOTE};
use crate::sim::SceneEvent;

#[cfg(target_arch = "wasm32")]
mod web;
#[cfg(target_arch = "wasm32")]
pub use web::WebSynth;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A pitch on the MIDI scale (C4 = 60, A4 = 69)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note {
    midi: u8,
}

impl Note {
    pub fn from_midi(midi: u8) -> Option<Self> {
        (midi <= 127).then_some(Self { midi })
    }

    pub fn midi(&self) -> u8 {
        self.midi
    }

    /// Parse names like "C4", "f#3", "Bb5" or "C-1"
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let mut chars = name.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let mut class: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let rest = chars.as_str();
        let octave_str = if let Some(r) = rest.strip_prefix('#') {
            class += 1;
            r
        } else if let Some(r) = rest.strip_prefix('b') {
            class -= 1;
            r
        } else {
            rest
        };
        let octave: i32 = octave_str.parse().ok()?;
        let midi = octave.checked_add(1)?.checked_mul(12)?.checked_add(class)?;
        u8::try_from(midi).ok().and_then(Self::from_midi)
    }

    pub fn name(&self) -> String {
        let octave = self.midi as i32 / 12 - 1;
        format!("{}{}", NOTE_NAMES[self.midi as usize % 12], octave)
    }

    /// Equal-tempered frequency in Hz
    pub fn frequency(&self) -> f32 {
        440.0 * 2f32.powf((self.midi as f32 - 69.0) / 12.0)
    }
}

impl Default for Note {
    fn default() -> Self {
        Self { midi: 60 }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl TryFrom<String> for Note {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Note::parse(&value).ok_or_else(|| format!("invalid note name: {value:?}"))
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.name()
    }
}

/// Instrument voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Marimba,
    Piano,
    Bell,
    Pluck,
    Synth,
    Bass,
}

impl Instrument {
    pub const ALL: [Instrument; 6] = [
        Instrument::Marimba,
        Instrument::Piano,
        Instrument::Bell,
        Instrument::Pluck,
        Instrument::Synth,
        Instrument::Bass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Marimba => "marimba",
            Instrument::Piano => "piano",
            Instrument::Bell => "bell",
            Instrument::Pluck => "pluck",
            Instrument::Synth => "synth",
            Instrument::Bass => "bass",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }

    /// Oscillator recipe for this instrument
    pub fn voice(&self) -> Voice {
        match self {
            Instrument::Marimba => Voice {
                partials: MARIMBA,
                attack: 0.005,
                decay: 0.5,
                filter_hz: None,
                gain: 0.5,
            },
            Instrument::Piano => Voice {
                partials: PIANO,
                attack: 0.01,
                decay: 1.2,
                filter_hz: Some(3200.0),
                gain: 0.45,
            },
            Instrument::Bell => Voice {
                partials: BELL,
                attack: 0.002,
                decay: 2.0,
                filter_hz: None,
                gain: 0.35,
            },
            Instrument::Pluck => Voice {
                partials: PLUCK,
                attack: 0.002,
                decay: 0.3,
                filter_hz: Some(1800.0),
                gain: 0.35,
            },
            Instrument::Synth => Voice {
                partials: SYNTH,
                attack: 0.02,
                decay: 0.6,
                filter_hz: Some(2400.0),
                gain: 0.25,
            },
            Instrument::Bass => Voice {
                partials: BASS,
                attack: 0.01,
                decay: 0.8,
                filter_hz: Some(900.0),
                gain: 0.6,
            },
        }
    }
}

// Oscillator stacks (frequency ratio, level, waveform)
const MARIMBA: &[Partial] = &[
    Partial::new(1.0, 1.0, Waveform::Sine),
    Partial::new(4.0, 0.25, Waveform::Sine),
];
const PIANO: &[Partial] = &[
    Partial::new(1.0, 1.0, Waveform::Triangle),
    Partial::new(2.0, 0.3, Waveform::Sine),
    Partial::new(3.0, 0.12, Waveform::Sine),
];
// Inharmonic partials give the metallic ring
const BELL: &[Partial] = &[
    Partial::new(1.0, 1.0, Waveform::Sine),
    Partial::new(2.76, 0.5, Waveform::Sine),
    Partial::new(5.4, 0.25, Waveform::Sine),
];
const PLUCK: &[Partial] = &[Partial::new(1.0, 1.0, Waveform::Sawtooth)];
const SYNTH: &[Partial] = &[
    Partial::new(1.0, 1.0, Waveform::Square),
    Partial::new(1.005, 0.6, Waveform::Sawtooth),
];
const BASS: &[Partial] = &[
    Partial::new(0.5, 1.0, Waveform::Sine),
    Partial::new(1.0, 0.4, Waveform::Triangle),
];

/// Resolve a stored instrument name, falling back to the default
pub fn instrument_or_default(name: Option<&str>) -> Instrument {
    name.and_then(Instrument::from_name)
        .or_else(|| Instrument::from_name(DEFAULT_INSTRUMENT))
        .unwrap_or_default()
}

/// Resolve a stored note name, falling back to the default
pub fn note_or_default(name: Option<&str>) -> Note {
    name.and_then(Note::parse)
        .or_else(|| Note::parse(DEFAULT_NOTE))
        .unwrap_or_default()
}

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// One oscillator of a voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    /// Frequency multiple of the note's fundamental
    pub ratio: f32,
    /// Relative level
    pub gain: f32,
    pub waveform: Waveform,
}

impl Partial {
    pub const fn new(ratio: f32, gain: f32, waveform: Waveform) -> Self {
        Self {
            ratio,
            gain,
            waveform,
        }
    }
}

/// Envelope and oscillator stack for one instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub partials: &'static [Partial],
    /// Seconds to peak (exponential ramp)
    pub attack: f32,
    /// Seconds from peak to silence (exponential ramp)
    pub decay: f32,
    /// Optional low-pass cutoff
    pub filter_hz: Option<f32>,
    pub gain: f32,
}

impl Voice {
    /// Total scheduled length including release tail
    pub fn duration(&self) -> f32 {
        self.attack + self.decay + 0.05
    }
}

/// Something that can sound a note
pub trait NotePlayer {
    /// `volume` is the final 0-1 level after mixing and hit intensity
    fn play_note(&mut self, note: Note, instrument: Instrument, volume: f32);
}

/// Volume state shared by all players
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixer {
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

impl Mixer {
    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set note volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }
}

/// Route note events to a player; returns how many notes were sounded
pub fn play_events(player: &mut dyn NotePlayer, mixer: &Mixer, events: &[SceneEvent]) -> usize {
    let vol = mixer.effective_volume();
    if vol <= 0.0 {
        return 0;
    }
    let mut played = 0;
    for event in events {
        if let SceneEvent::NotePlayed {
            note,
            instrument,
            intensity,
            ..
        } = event
        {
            player.play_note(*note, *instrument, vol * *intensity);
            played += 1;
        }
    }
    played
}

/// Player for headless builds: logs and remembers what was played
#[derive(Debug, Default)]
pub struct LogPlayer {
    pub played: Vec<(Note, Instrument)>,
}

impl NotePlayer for LogPlayer {
    fn play_note(&mut self, note: Note, instrument: Instrument, volume: f32) {
        log::debug!(
            "♪ {} on {} ({:.0} Hz, vol {:.2})",
            note,
            instrument.as_str(),
            note.frequency(),
            volume
        );
        self.played.push((note, instrument));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_parse() {
        assert_eq!(Note::parse("C4").map(|n| n.midi()), Some(60));
        assert_eq!(Note::parse("a4").map(|n| n.midi()), Some(69));
        assert_eq!(Note::parse("F#3").map(|n| n.midi()), Some(54));
        assert_eq!(Note::parse("Bb5"), Note::parse("A#5"));
        assert_eq!(Note::parse("C-1").map(|n| n.midi()), Some(0));
        assert_eq!(Note::parse("H2"), None);
        assert_eq!(Note::parse("C"), None);
        assert_eq!(Note::parse("G9000"), None);
    }

    #[test]
    fn test_note_name_round_trip() {
        for midi in 0..=127u8 {
            let note = Note::from_midi(midi).unwrap();
            assert_eq!(Note::parse(&note.name()), Some(note));
        }
    }

    #[test]
    fn test_note_frequency() {
        let a4 = Note::parse("A4").unwrap();
        assert!((a4.frequency() - 440.0).abs() < 0.01);
        let a5 = Note::parse("A5").unwrap();
        assert!((a5.frequency() - 880.0).abs() < 0.01);
    }

    #[test]
    fn test_note_serde_as_string() {
        let note = Note::parse("D#4").unwrap();
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(json, "\"D#4\"");
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
        assert!(serde_json::from_str::<Note>("\"nope\"").is_err());
    }

    #[test]
    fn test_instrument_fallbacks() {
        assert_eq!(instrument_or_default(Some("Bell")), Instrument::Bell);
        assert_eq!(instrument_or_default(Some("kazoo")), Instrument::Marimba);
        assert_eq!(instrument_or_default(None), Instrument::Marimba);
        assert_eq!(note_or_default(Some("zz")), Note::parse("C4").unwrap());
    }

    #[test]
    fn test_every_voice_has_partials() {
        for instrument in Instrument::ALL {
            let voice = instrument.voice();
            assert!(!voice.partials.is_empty());
            assert!(voice.duration() > voice.decay);
        }
    }

    #[test]
    fn test_muted_mixer_plays_nothing() {
        let events = vec![SceneEvent::NotePlayed {
            bar: 1,
            note: Note::default(),
            instrument: Instrument::Piano,
            intensity: 1.0,
        }];
        let mut player = LogPlayer::default();
        let mut mixer = Mixer::default();
        assert_eq!(play_events(&mut player, &mixer, &events), 1);
        mixer.set_muted(true);
        assert_eq!(play_events(&mut player, &mixer, &events), 0);
        assert_eq!(player.played.len(), 1);
    }
}
