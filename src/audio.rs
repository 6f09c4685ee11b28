//! Audio playback for interval completion sounds.
//!
//! Every cue is synthesized: a short list of tones and rests that is handed
//! to a detached sink.

use crate::models::SoundChoice;
use rodio::source::{Source, Zero};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::f32::consts::{PI, TAU};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const SAMPLE_RATE: u32 = 44100;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Full volume throughout.
    Flat,
    /// Exponential decay towards silence.
    Decay,
    /// Rises and falls once over the whole tone.
    Swell,
}

/// A single synthesized tone, optionally sweeping between two frequencies.
#[derive(Debug, Clone)]
pub struct Tone {
    waveform: Waveform,
    envelope: Envelope,
    start_hz: f32,
    end_hz: f32,
    volume: f32,
    total_samples: usize,
    index: usize,
    phase: f32,
}

impl Tone {
    pub fn new(waveform: Waveform, hz: f32, duration: Duration, volume: f32) -> Self {
        Self {
            waveform,
            envelope: Envelope::Flat,
            start_hz: hz,
            end_hz: hz,
            volume,
            total_samples: (duration.as_secs_f32() * SAMPLE_RATE as f32) as usize,
            index: 0,
            phase: 0.0,
        }
    }

    /// Glides exponentially to `end_hz` over the tone's duration.
    pub fn sweep_to(mut self, end_hz: f32) -> Self {
        self.end_hz = end_hz;
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }

    fn gain(&self, t: f32) -> f32 {
        match self.envelope {
            Envelope::Flat => 1.0,
            Envelope::Decay => 0.001_f32.powf(t),
            Envelope::Swell => (PI * t).sin(),
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.index >= self.total_samples {
            return None;
        }

        let t = self.index as f32 / self.total_samples as f32;
        let hz = self.start_hz * (self.end_hz / self.start_hz).powf(t);
        let sample = match self.waveform {
            Waveform::Sine => (self.phase * TAU).sin(),
            Waveform::Square if self.phase < 0.5 => 1.0,
            Waveform::Square => -1.0,
        };

        self.phase = (self.phase + hz / SAMPLE_RATE as f32).fract();
        self.index += 1;
        Some(sample * self.gain(t) * self.volume)
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.index)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[derive(Debug, Clone)]
pub enum Note {
    Play(Tone),
    Rest(Duration),
}

/// The notes making up each completion cue. `None` is silent.
pub fn cue(sound: SoundChoice) -> Vec<Note> {
    match sound {
        SoundChoice::Bell => vec![Note::Play(
            Tone::new(Waveform::Sine, 880.0, Duration::from_millis(1200), 0.3)
                .sweep_to(440.0)
                .with_envelope(Envelope::Decay),
        )],
        SoundChoice::Digital => {
            let beep = Tone::new(Waveform::Square, 1200.0, Duration::from_millis(90), 0.15);
            let gap = Duration::from_millis(30);
            vec![
                Note::Play(beep.clone()),
                Note::Rest(gap),
                Note::Play(beep.clone()),
                Note::Rest(gap),
                Note::Play(beep),
            ]
        }
        SoundChoice::Soft => vec![Note::Play(
            Tone::new(Waveform::Sine, 528.0, Duration::from_millis(1500), 0.2)
                .with_envelope(Envelope::Swell),
        )],
        SoundChoice::None => Vec::new(),
    }
}

pub struct AudioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioPlayer {
    /// Creates a new audio player. Must stay on the thread that created it.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Plays the cue for `sound` in the background.
    pub fn play(&self, sound: SoundChoice) {
        if let Err(e) = self.play_cue(sound) {
            warn!(error = %e, sound = %sound, "failed to play sound");
        }
    }

    fn play_cue(&self, sound: SoundChoice) -> Result<(), AudioError> {
        let notes = cue(sound);
        if notes.is_empty() {
            return Ok(());
        }

        let sink = Sink::try_new(&self.handle)?;
        for note in notes {
            match note {
                Note::Play(tone) => sink.append(tone),
                Note::Rest(duration) => {
                    sink.append(Zero::<f32>::new(1, SAMPLE_RATE).take_duration(duration))
                }
            }
        }
        sink.detach();
        debug!(sound = %sound, "playing cue");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tones(sound: SoundChoice) -> Vec<Tone> {
        cue(sound)
            .into_iter()
            .filter_map(|note| match note {
                Note::Play(tone) => Some(tone),
                Note::Rest(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_silent_cue() {
        assert!(cue(SoundChoice::None).is_empty());
    }

    #[test]
    fn test_digital_cue_is_three_beeps() {
        let notes = cue(SoundChoice::Digital);
        assert_eq!(notes.len(), 5);
        assert_eq!(tones(SoundChoice::Digital).len(), 3);
        assert!(matches!(notes[1], Note::Rest(d) if d == Duration::from_millis(30)));
    }

    #[test]
    fn test_tone_length_matches_duration() {
        let tone = Tone::new(Waveform::Sine, 440.0, Duration::from_millis(500), 0.5);
        assert_eq!(tone.clone().count(), 22050);
        assert_eq!(tone.total_duration(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_samples_stay_within_volume() {
        for sound in [SoundChoice::Bell, SoundChoice::Digital, SoundChoice::Soft] {
            for tone in tones(sound) {
                let volume = tone.volume;
                assert!(tone.into_iter().all(|s| s.abs() <= volume + f32::EPSILON));
            }
        }
    }

    #[test]
    fn test_bell_decays() {
        let samples: Vec<f32> = tones(SoundChoice::Bell).remove(0).collect();
        let peak = |chunk: &[f32]| chunk.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        let head = peak(&samples[..2000]);
        let tail = peak(&samples[samples.len() - 2000..]);
        assert!(tail < head / 10.0);
    }

    #[test]
    fn test_audio_player_creation() {
        // No audio device is available on most CI machines
        match AudioPlayer::new() {
            Ok(player) => player.play(SoundChoice::None),
            Err(e) => println!("Audio player creation failed (expected on CI): {}", e),
        }
    }
}
