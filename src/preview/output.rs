use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::{
    SampleFormat, Stream,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

use super::voices::ToneBank;

pub type SharedPipeline = Arc<Mutex<TonePipeline>>;

pub struct TonePipeline {
    bank: ToneBank,
    gate: bool,
    master: f32,
    sample_rate: f32,
}

impl TonePipeline {
    pub fn new(bank: ToneBank) -> Self {
        Self {
            bank,
            gate: true,
            master: 0.7,
            sample_rate: 44_100.0,
        }
    }

    pub fn set_sample_rate(&mut self, rate: f32) {
        self.sample_rate = rate.max(1.0);
    }

    pub fn set_gate(&mut self, gate: bool) {
        self.gate = gate;
    }

    pub fn next_sample(&mut self) -> f32 {
        let sample = self.bank.next_sample(self.sample_rate);
        if self.gate { sample * self.master } else { 0.0 }
    }
}

pub struct AudioEngine {
    _stream: Stream,
}

impl AudioEngine {
    pub fn start(pipeline: SharedPipeline) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default audio output"))?;
        let supported = device.default_output_config()?;
        let config = supported.config();
        {
            let mut guard = pipeline
                .lock()
                .map_err(|_| anyhow!("tone pipeline lock poisoned"))?;
            guard.set_sample_rate(config.sample_rate.0 as f32);
        }
        let stream = match supported.sample_format() {
            SampleFormat::I16 => build_stream(&device, &config, pipeline, |sample| {
                (sample * i16::MAX as f32) as i16
            })?,
            SampleFormat::U16 => build_stream(&device, &config, pipeline, |sample| {
                let scaled = (sample * 0.5 + 0.5).clamp(0.0, 1.0);
                (scaled * u16::MAX as f32) as u16
            })?,
            _ => build_stream(&device, &config, pipeline, |sample| sample)?,
        };
        stream.play()?;
        Ok(Self { _stream: stream })
    }
}

fn build_stream<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    pipeline: SharedPipeline,
    convert: F,
) -> Result<Stream>
where
    T: cpal::SizedSample + Send + 'static,
    F: Fn(f32) -> T + Send + 'static,
{
    let channels = config.channels as usize;
    let stream = device.build_output_stream(
        config,
        move |output: &mut [T], _| {
            let Ok(mut pipe) = pipeline.lock() else {
                return;
            };
            for frame in output.chunks_mut(channels) {
                let value = convert(pipe.next_sample().clamp(-0.98, 0.98));
                for channel in frame {
                    *channel = value;
                }
            }
        },
        move |err| tracing::error!("audio stream error: {err}"),
        None,
    )?;
    Ok(stream)
}
