//! Web Audio note synthesis
//!
//! Each note is a fresh oscillator → gain (→ low-pass) → destination graph
//! with exponential attack/decay ramps, scheduled once and left to stop.

use web_sys::{AudioContext, BiquadFilterType, GainNode, OscillatorNode, OscillatorType};

use super::{Instrument, Note, NotePlayer, Partial, Voice, Waveform};

/// Ramps to and from this level instead of zero (exponential ramps can't hit 0)
const SILENCE: f32 = 0.0001;

impl From<Waveform> for OscillatorType {
    fn from(w: Waveform) -> Self {
        match w {
            Waveform::Sine => OscillatorType::Sine,
            Waveform::Triangle => OscillatorType::Triangle,
            Waveform::Square => OscillatorType::Square,
            Waveform::Sawtooth => OscillatorType::Sawtooth,
        }
    }
}

/// Note player backed by an `AudioContext`
pub struct WebSynth {
    ctx: Option<AudioContext>,
}

impl Default for WebSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSynth {
    pub fn new() -> Self {
        // May fail outside a secure context
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        Self { ctx }
    }

    /// Resume audio context (required after user gesture)
    pub fn resume(&self) {
        if let Some(ctx) = &self.ctx {
            let _ = ctx.resume();
        }
    }

    /// Oscillator feeding a gain node, optionally through a low-pass filter
    fn create_osc(
        ctx: &AudioContext,
        freq: f32,
        waveform: Waveform,
        filter_hz: Option<f32>,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(waveform.into());
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;

        match filter_hz {
            Some(cutoff) => {
                let filter = ctx.create_biquad_filter().ok()?;
                filter.set_type(BiquadFilterType::Lowpass);
                filter.frequency().set_value(cutoff);
                gain.connect_with_audio_node(&filter).ok()?;
                filter.connect_with_audio_node(&ctx.destination()).ok()?;
            }
            None => {
                gain.connect_with_audio_node(&ctx.destination()).ok()?;
            }
        }

        Some((osc, gain))
    }

    fn schedule_partial(
        ctx: &AudioContext,
        fundamental: f32,
        partial: &Partial,
        voice: &Voice,
        volume: f32,
    ) -> Option<()> {
        let (osc, gain) = Self::create_osc(
            ctx,
            fundamental * partial.ratio,
            partial.waveform,
            voice.filter_hz,
        )?;
        let t = ctx.current_time();
        let peak = (volume * voice.gain * partial.gain).max(SILENCE * 2.0);
        let attack_end = t + voice.attack as f64;
        let decay_end = attack_end + voice.decay as f64;

        gain.gain().set_value_at_time(SILENCE, t).ok()?;
        gain.gain()
            .exponential_ramp_to_value_at_time(peak, attack_end)
            .ok()?;
        gain.gain()
            .exponential_ramp_to_value_at_time(SILENCE, decay_end)
            .ok()?;

        osc.start_with_when(t).ok()?;
        osc.stop_with_when(t + voice.duration() as f64).ok()?;
        Some(())
    }
}

impl NotePlayer for WebSynth {
    fn play_note(&mut self, note: Note, instrument: Instrument, volume: f32) {
        if volume <= 0.0 {
            return;
        }
        let Some(ctx) = &self.ctx else { return };

        // Browsers suspend the context until a user gesture
        if ctx.state() == web_sys::AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        let voice = instrument.voice();
        let fundamental = note.frequency();
        for partial in voice.partials {
            if Self::schedule_partial(ctx, fundamental, partial, &voice, volume).is_none() {
                log::warn!("Failed to schedule {} on {}", note, instrument.as_str());
                return;
            }
        }
    }
}
