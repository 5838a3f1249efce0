//! Audio device capture and stream management.
//!
//! Captures from system devices using cpal (inputs, or outputs for
//! loopback), downmixes to mono and keeps the most recent samples in a ring
//! buffer the frame loop reads without blocking the audio thread for long.
//! When no device can be opened the pipe stays silent instead of failing.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::utils::Config;

pub const BUFFER_SIZE: usize = 2048;
const FALLBACK_SAMPLE_RATE: f32 = 44100.0;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio devices found")]
    NoDevices,
    #[error("device config timed out after {0:?}")]
    ConfigTimeout(Duration),
    #[error("failed to get device config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to play stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

pub struct DeviceInfo {
    pub device: cpal::Device,
    pub name: String,
    pub is_input: bool,
}

pub struct SourcePipe {
    buffer: Arc<Mutex<VecDeque<f32>>>,
    devices: Vec<DeviceInfo>,
    current_device: Option<usize>,
    _stream: Option<Stream>,
    sample_rate: f32,
    timeout: Duration,
    // Auto-gain normalization state
    smoothed_peak: f32,
    target_level: f32,
}

impl SourcePipe {
    pub fn new(config: &Config) -> Self {
        let devices = Self::collect_devices();
        let buffer = Arc::new(Mutex::new(VecDeque::from(vec![0.0; BUFFER_SIZE])));
        let timeout = Duration::from_secs(config.device_timeout_secs());

        let mut pipe = Self {
            buffer,
            devices,
            current_device: None,
            _stream: None,
            sample_rate: FALLBACK_SAMPLE_RATE,
            timeout,
            smoothed_peak: 0.1,
            target_level: 0.5,
        };

        match pipe.open_preferred(config) {
            Ok(index) => {
                let info = &pipe.devices[index];
                log::info!(
                    "[{}] Selected: {} ({}, {} Hz)",
                    index,
                    info.name,
                    if info.is_input { "input" } else { "output" },
                    pipe.sample_rate
                );
            }
            Err(e) => log::warn!("Audio capture unavailable ({}), running silent", e),
        }
        pipe
    }

    fn open_preferred(&mut self, config: &Config) -> Result<usize, AudioError> {
        if self.devices.is_empty() {
            return Err(AudioError::NoDevices);
        }

        let devices = &self.devices;
        let start_index = config
            .last_device
            .as_ref()
            .and_then(|name| {
                let is_input = config.last_device_is_input.unwrap_or(false);
                devices
                    .iter()
                    .position(|d| d.name == *name && d.is_input == is_input)
            })
            // pipewire/pulse inputs are the most reliable on Linux
            .or_else(|| devices.iter().position(|d| d.is_input && d.name == "pipewire"))
            .or_else(|| devices.iter().position(|d| d.is_input && d.name == "pulse"))
            .or_else(|| {
                // Loopback capture of the default output
                let host = cpal::default_host();
                let default_output_name = host.default_output_device().and_then(|d| d.name().ok());
                default_output_name
                    .and_then(|name| devices.iter().position(|d| !d.is_input && d.name == name))
            })
            .unwrap_or(0);

        self.open(start_index)?;
        Ok(start_index)
    }

    fn open(&mut self, index: usize) -> Result<(), AudioError> {
        let info = self.devices.get(index).ok_or(AudioError::NoDevices)?;
        let (stream, sample_rate) = Self::build_stream(info, Arc::clone(&self.buffer), self.timeout)?;
        self._stream = Some(stream);
        self.sample_rate = sample_rate;
        self.current_device = Some(index);
        Ok(())
    }

    pub fn list_devices() {
        let host = cpal::default_host();
        println!("\n=== Audio Devices ===");

        let mut idx = 0;
        if let Ok(inputs) = host.input_devices() {
            for device in inputs {
                if let Ok(name) = device.name() {
                    println!("  [{}] {} (input)", idx, name);
                    idx += 1;
                }
            }
        }
        if let Ok(outputs) = host.output_devices() {
            for device in outputs {
                if let Ok(name) = device.name() {
                    println!("  [{}] {} (output)", idx, name);
                    idx += 1;
                }
            }
        }
        println!();
    }

    fn collect_devices() -> Vec<DeviceInfo> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        if let Ok(input_devices) = host.input_devices() {
            for device in input_devices {
                if let Ok(name) = device.name() {
                    devices.push(DeviceInfo {
                        device,
                        name,
                        is_input: true,
                    });
                }
            }
        }

        if let Ok(output_devices) = host.output_devices() {
            for device in output_devices {
                if let Ok(name) = device.name() {
                    devices.push(DeviceInfo {
                        device,
                        name,
                        is_input: false,
                    });
                }
            }
        }

        devices
    }

    /// Get device config with timeout (the config call often hangs on bad devices)
    fn get_config_with_timeout(
        device: &Device,
        is_input: bool,
        timeout: Duration,
    ) -> Result<StreamConfig, AudioError> {
        let device_clone = device.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let config = if is_input {
                device_clone.default_input_config()
            } else {
                device_clone.default_output_config()
            };
            let _ = tx.send(config);
        });

        match rx.recv_timeout(timeout) {
            Ok(config) => Ok(config?.into()),
            Err(_) => Err(AudioError::ConfigTimeout(timeout)),
        }
    }

    fn build_stream(
        device_info: &DeviceInfo,
        audio_buffer: Arc<Mutex<VecDeque<f32>>>,
        timeout: Duration,
    ) -> Result<(Stream, f32), AudioError> {
        let stream_config =
            Self::get_config_with_timeout(&device_info.device, device_info.is_input, timeout)?;
        let channels = (stream_config.channels as usize).max(1);
        let sample_rate = stream_config.sample_rate.0 as f32;

        let err_fn = |err| log::error!("Audio stream error: {}", err);

        let stream = device_info.device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let Ok(mut buffer) = audio_buffer.lock() else {
                    return;
                };
                for chunk in data.chunks(channels) {
                    let sample: f32 = chunk.iter().sum::<f32>() / channels as f32;
                    buffer.pop_front();
                    buffer.push_back(sample);
                }
            },
            err_fn,
            None,
        )?;
        stream.play()?;
        Ok((stream, sample_rate))
    }

    /// Switch to another device. The config remembers it on success.
    pub fn select_device(&mut self, index: usize, config: &mut Config) -> Result<String, AudioError> {
        let info = self.devices.get(index).ok_or(AudioError::NoDevices)?;
        let device_name = info.name.clone();
        let is_input = info.is_input;
        if self.current_device == Some(index) {
            return Ok(device_name);
        }
        log::info!("[{}] Selecting: {}", index, device_name);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.iter_mut().for_each(|x| *x = 0.0);
        }

        self.open(index)?;
        config.set_device(&device_name, is_input);
        Ok(device_name)
    }

    pub fn current_device_name(&self) -> Option<&str> {
        self.current_device
            .and_then(|i| self.devices.get(i))
            .map(|d| d.name.as_str())
    }

    /// Sample rate of the open stream, or 44.1 kHz while silent
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Get current audio samples with auto-gain normalization
    pub fn stream(&mut self) -> Vec<f32> {
        let buffer: Vec<f32> = match self.buffer.lock() {
            Ok(buf) => buf.iter().copied().collect(),
            Err(_) => return vec![0.0; BUFFER_SIZE],
        };

        let current_peak = buffer.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Fast attack, slow release
        if current_peak > self.smoothed_peak {
            self.smoothed_peak = self.smoothed_peak * 0.8 + current_peak * 0.2;
        } else {
            self.smoothed_peak = self.smoothed_peak * 0.995 + current_peak * 0.005;
        }

        let safe_peak = self.smoothed_peak.max(0.001);
        let gain = (self.target_level / safe_peak).clamp(0.5, 10.0);

        buffer.iter().map(|s| (s * gain).clamp(-1.0, 1.0)).collect()
    }
}
