use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, Stream};
use log::warn;

use crate::error::VmError;

const TONE_HZ: f32 = 440.0;

/// The looping beep tone behind a play/pause gate. The output stream is
/// built once, paused, and toggled by the timer gate thread, which must
/// own this value: cpal streams are not `Send`.
pub struct Beeper {
    stream: Stream,
}

impl Beeper {
    pub fn new() -> Result<Self, VmError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| VmError::HostInit("no audio output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|err| VmError::HostInit(err.to_string()))?;

        let stream = match config.sample_format() {
            cpal::SampleFormat::I8 => build_stream::<i8>(&device, &config.into()),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into()),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config.into()),
            cpal::SampleFormat::I64 => build_stream::<i64>(&device, &config.into()),
            cpal::SampleFormat::U8 => build_stream::<u8>(&device, &config.into()),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into()),
            cpal::SampleFormat::U32 => build_stream::<u32>(&device, &config.into()),
            cpal::SampleFormat::U64 => build_stream::<u64>(&device, &config.into()),
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into()),
            cpal::SampleFormat::F64 => build_stream::<f64>(&device, &config.into()),
            other => Err(VmError::HostInit(format!(
                "unsupported sample format {other}"
            ))),
        }?;

        // streams may start live; the gate decides when the tone plays
        stream
            .pause()
            .map_err(|err| VmError::HostInit(err.to_string()))?;
        Ok(Self { stream })
    }

    /// A failed toggle degrades to the wrong silence/noise for a frame,
    /// never to a dead machine.
    pub fn start(&self) {
        if let Err(err) = self.stream.play() {
            warn!("cannot start beep: {err}");
        }
    }

    pub fn stop(&self) {
        if let Err(err) = self.stream.pause() {
            warn!("cannot stop beep: {err}");
        }
    }
}

fn build_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig) -> Result<Stream, VmError>
where
    T: SizedSample + FromSample<f32>,
{
    let sample_rate = config.sample_rate.0 as f32;
    let channels = config.channels as usize;

    let mut clock = 0f32;
    let mut next_sample = move || {
        clock = (clock + 1.0) % sample_rate;
        (clock * TONE_HZ * 2.0 * std::f32::consts::PI / sample_rate).sin()
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = T::from_sample(next_sample());
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                }
            },
            |err| warn!("audio stream error: {err}"),
            None,
        )
        .map_err(|err| VmError::HostInit(err.to_string()))
}
