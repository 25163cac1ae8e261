use std::sync::{Arc, Mutex, mpsc};

use tokio::runtime::Runtime;

const DEFAULT_LEVEL: f32 = 0.12;

#[derive(Debug)]
pub struct VoiceState {
    pub frequency: f32,
    pub level: f32,
}

impl VoiceState {
    pub fn new() -> Self {
        Self {
            frequency: 440.0,
            level: DEFAULT_LEVEL,
        }
    }
}

#[derive(Debug)]
pub enum VoiceCommand {
    SetFrequency(f32),
    SetLevel(f32),
}

pub type VoiceHandle = (Arc<Mutex<VoiceState>>, mpsc::Sender<VoiceCommand>);

pub fn spawn_voice(runtime: &Runtime) -> VoiceHandle {
    let (tx, rx) = mpsc::channel();
    let state = Arc::new(Mutex::new(VoiceState::new()));
    let thread_state = state.clone();

    runtime.spawn_blocking(move || {
        while let Ok(cmd) = rx.recv() {
            let Ok(mut guard) = thread_state.lock() else {
                break;
            };
            match cmd {
                VoiceCommand::SetFrequency(frequency) => guard.frequency = frequency.max(0.0),
                VoiceCommand::SetLevel(level) => guard.level = level.clamp(0.0, 1.0),
            }
        }
    });

    (state, tx)
}

struct ToneVoice {
    state: Arc<Mutex<VoiceState>>,
    phase: f32,
}

impl ToneVoice {
    fn sample(&mut self, sample_rate: f32) -> f32 {
        let (frequency, level) = match self.state.lock() {
            Ok(guard) => (guard.frequency, guard.level),
            Err(_) => return 0.0,
        };
        self.phase = (self.phase + frequency / sample_rate).fract();
        (self.phase * std::f32::consts::TAU).sin() * level
    }
}

/// Sine voices, one per panel.
pub struct ToneBank {
    voices: Vec<ToneVoice>,
}

impl ToneBank {
    pub fn new(states: Vec<Arc<Mutex<VoiceState>>>) -> Self {
        let voices = states
            .into_iter()
            .map(|state| ToneVoice { state, phase: 0.0 })
            .collect();
        Self { voices }
    }

    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        self.voices
            .iter_mut()
            .map(|voice| voice.sample(sample_rate))
            .sum()
    }
}
