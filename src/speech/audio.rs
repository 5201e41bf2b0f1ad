//! Microphone capture for the local recognizer
//!
//! Captures the default input device as mono `f32` and resamples it to the
//! 16 kHz Whisper expects.

use crate::{FluentError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::Sender;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, info};

/// Sample rate Whisper consumes
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

const RESAMPLER_CHUNK: usize = 1024;

/// Default input device and its native stream format
pub struct Microphone {
    device: Device,
    config: StreamConfig,
}

impl Microphone {
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| FluentError::AudioDeviceError("No input device available".into()))?;

        let config: StreamConfig = device
            .default_input_config()
            .map_err(|e| FluentError::AudioDeviceError(format!("Failed to get input config: {}", e)))?
            .into();

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "Input device opened"
        );

        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Start streaming mono chunks into `audio_tx`.
    ///
    /// Stream errors are passed to `on_error`. The capture stops when the
    /// returned stream is dropped.
    pub fn stream<E>(&self, audio_tx: Sender<Vec<f32>>, on_error: E) -> Result<Stream>
    where
        E: FnMut(cpal::StreamError) + Send + 'static,
    {
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if audio_tx.try_send(downmix(data, channels)).is_err() {
                        debug!("Audio chunk dropped");
                    }
                },
                on_error,
                None,
            )
            .map_err(|e| FluentError::AudioDeviceError(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| FluentError::AudioDeviceError(format!("Failed to start input stream: {}", e)))?;

        Ok(stream)
    }
}

/// Average interleaved frames down to one channel
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Root mean square of a block of samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Streaming mono resampler to [`WHISPER_SAMPLE_RATE`]
pub struct MonoResampler {
    resampler: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
}

impl MonoResampler {
    pub fn new(input_rate: u32) -> Result<Self> {
        if input_rate == 0 {
            return Err(FluentError::AudioDeviceError(
                "Sample rate must be greater than 0".into(),
            ));
        }

        if input_rate == WHISPER_SAMPLE_RATE {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            WHISPER_SAMPLE_RATE as f64 / input_rate as f64,
            2.0,
            params,
            RESAMPLER_CHUNK,
            1,
        )
        .map_err(|e| FluentError::AudioDeviceError(format!("Failed to create resampler: {}", e)))?;

        debug!("Resampling {} Hz -> {} Hz", input_rate, WHISPER_SAMPLE_RATE);

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
        })
    }

    /// Feed captured samples; returns whatever full chunks could be converted
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.pending.extend_from_slice(samples);
        let mut output = Vec::new();

        while self.pending.len() >= RESAMPLER_CHUNK {
            let chunk: Vec<f32> = self.pending.drain(..RESAMPLER_CHUNK).collect();
            let converted = resampler
                .process(&[chunk], None)
                .map_err(|e| FluentError::AudioDeviceError(format!("Resampling failed: {}", e)))?;
            output.extend_from_slice(&converted[0]);
        }

        Ok(output)
    }
}
