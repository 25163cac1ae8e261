//! Sine-bank preview of the panel frequencies through the default output.

mod output;
mod voices;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use panelmorph::FrequencyData;
use tokio::runtime::Runtime;

use output::{AudioEngine, SharedPipeline, TonePipeline};
use voices::{ToneBank, VoiceCommand, VoiceHandle, spawn_voice};

pub struct AudioPreview {
    _runtime: Runtime,
    voices: Vec<VoiceHandle>,
    pipeline: SharedPipeline,
    _engine: AudioEngine,
}

impl AudioPreview {
    pub fn start(voice_count: usize) -> Result<Self> {
        let runtime = Runtime::new()?;
        let voices: Vec<VoiceHandle> = (0..voice_count).map(|_| spawn_voice(&runtime)).collect();
        let states = voices.iter().map(|(state, _)| state.clone()).collect();
        let pipeline = Arc::new(Mutex::new(TonePipeline::new(ToneBank::new(states))));
        let engine = AudioEngine::start(pipeline.clone())?;
        Ok(Self {
            _runtime: runtime,
            voices,
            pipeline,
            _engine: engine,
        })
    }

    pub fn set_frequencies(&self, data: &[FrequencyData]) {
        for ((_, tx), frequency) in self.voices.iter().zip(data) {
            let _ = tx.send(VoiceCommand::SetFrequency(frequency.frequency as f32));
        }
    }

    /// Per-voice level; hidden panels are sent 0.
    pub fn set_levels(&self, levels: &[f32]) {
        for ((_, tx), level) in self.voices.iter().zip(levels) {
            let _ = tx.send(VoiceCommand::SetLevel(*level));
        }
    }

    pub fn set_gate(&self, gate: bool) {
        if let Ok(mut pipe) = self.pipeline.lock() {
            pipe.set_gate(gate);
        }
    }
}
