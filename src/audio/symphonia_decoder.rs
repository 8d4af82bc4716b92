//! Reference `Decoder`/`DecoderFactory` implementation (§10.2): `symphonia`
//! demuxes and decodes the container, `rubato` resamples to the mixer's
//! output rate. Nothing under `playback::` imports this module — it is a
//! consumer of the core, wired up by the CLI demo and exercised by
//! integration tests.

use std::collections::VecDeque;
use std::io::{Read, Seek};

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{Decoder as SymphoniaCodec, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::audio::decoder::{Decoder, DecoderFactory, Source, VideoFrame, VideoMode};
use crate::audio::types::clip_to_i16;
use crate::error::DecoderError;

/// Number of input frames fed to the resampler per chunk. Arbitrary but
/// matched to common device buffer sizes so resampling keeps up in
/// real-ish time even though it never runs on the audio thread.
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Adapts any `Read + Seek + Send` source to symphonia's `MediaSource`,
/// which additionally requires `Sync`. Safe here because a given handle is
/// only ever touched from one thread at a time (the application thread
/// while opening, later the audio thread while playing) — the same
/// single-owner discipline `Decoder` itself documents.
struct SourceBridge(Box<dyn Source>);

unsafe impl Sync for SourceBridge {}

impl Read for SourceBridge {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for SourceBridge {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.0.seek(pos)
    }
}

impl MediaSource for SourceBridge {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

/// Opens [`SymphoniaDecoder`] handles, resampling every stream to a single
/// fixed output rate (the mixer's own sample rate).
pub struct SymphoniaDecoderFactory {
    output_sample_rate: u32,
}

impl SymphoniaDecoderFactory {
    pub fn new(output_sample_rate: u32) -> Self {
        SymphoniaDecoderFactory { output_sample_rate }
    }
}

impl DecoderFactory for SymphoniaDecoderFactory {
    fn open(
        &self,
        source: Box<dyn Source>,
        ext: Option<&str>,
    ) -> Result<Box<dyn Decoder>, DecoderError> {
        let mss = MediaSourceStream::new(Box::new(SourceBridge(source)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = ext {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecoderError::Open(e.to_string()))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| DecoderError::UnsupportedFormat(ext.map(str::to_string)))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecoderError::UnsupportedFormat(Some(e.to_string())))?;

        let input_sample_rate = codec_params.sample_rate.unwrap_or(self.output_sample_rate);
        let channels = codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2)
            .max(1);
        let duration_s = codec_params
            .n_frames
            .map(|frames| frames as f64 / input_sample_rate as f64)
            .unwrap_or(0.0);

        Ok(Box::new(SymphoniaDecoder {
            format,
            decoder,
            track_id,
            input_sample_rate,
            output_sample_rate: self.output_sample_rate,
            input_channels: channels,
            resampler: None,
            resample_in_buf: vec![Vec::new(); channels],
            pending: VecDeque::new(),
            duration_s,
            end_of_stream: false,
            frames_budget: None,
            frames_emitted: 0,
            paused: false,
        }))
    }
}

pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaCodec>,
    track_id: u32,
    input_sample_rate: u32,
    output_sample_rate: u32,
    input_channels: usize,
    resampler: Option<SincFixedIn<f32>>,
    resample_in_buf: Vec<Vec<f32>>,
    /// Interleaved stereo i16 samples already produced and awaiting
    /// `read_audio`, so a caller's buffer size need not line up with
    /// symphonia's packet boundaries or rubato's chunk size.
    pending: VecDeque<i16>,
    duration_s: f64,
    end_of_stream: bool,
    /// Output-rate frames remaining before the configured window end, or
    /// `None` if the window runs to the stream's natural end (`end_s <= 0`).
    frames_budget: Option<u64>,
    frames_emitted: u64,
    paused: bool,
}

impl SymphoniaDecoder {
    fn ensure_resampler(&mut self) {
        if self.input_sample_rate == self.output_sample_rate || self.resampler.is_some() {
            return;
        }
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = self.output_sample_rate as f64 / self.input_sample_rate as f64;
        self.resampler = SincFixedIn::new(
            ratio,
            2.0,
            params,
            RESAMPLE_CHUNK_FRAMES,
            self.input_channels,
        )
        .ok();
    }

    /// Decode one more packet, resample it, and append interleaved stereo
    /// i16 samples to `pending`. Returns `false` at end-of-stream.
    fn decode_one_packet(&mut self) -> bool {
        let packet = loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => break packet,
                Ok(_) => continue,
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => {
                    return false
                }
                Err(_) => return false,
            }
        };

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(_) => return false,
        };

        let planar = to_planar_f32(&decoded);
        self.ensure_resampler();

        let output_planar = match self.resampler.as_mut() {
            Some(resampler) => {
                for (buf, chan) in self.resample_in_buf.iter_mut().zip(planar.iter()) {
                    buf.extend_from_slice(chan);
                }
                let mut out = Vec::new();
                while self
                    .resample_in_buf
                    .first()
                    .map(|c| c.len() >= RESAMPLE_CHUNK_FRAMES)
                    .unwrap_or(false)
                {
                    let chunk: Vec<Vec<f32>> = self
                        .resample_in_buf
                        .iter_mut()
                        .map(|c| c.drain(..RESAMPLE_CHUNK_FRAMES).collect())
                        .collect();
                    if let Ok(resampled) = resampler.process(&chunk, None) {
                        if out.is_empty() {
                            out = resampled;
                        } else {
                            for (dst, src) in out.iter_mut().zip(resampled.into_iter()) {
                                dst.extend(src);
                            }
                        }
                    }
                }
                out
            }
            None => planar,
        };

        if output_planar.is_empty() || output_planar[0].is_empty() {
            return true; // buffered for the next chunk boundary, not EOF
        }

        interleave_stereo_i16(&output_planar, &mut self.pending);
        true
    }
}

fn to_planar_f32(decoded: &AudioBufferRef) -> Vec<Vec<f32>> {
    let spec = *decoded.spec();
    let channels = spec.channels.count();
    let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    sample_buf.copy_interleaved_ref(decoded.clone());
    let interleaved = sample_buf.samples();

    let frames = interleaved.len() / channels.max(1);
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in 0..frames {
        for ch in 0..channels {
            planar[ch].push(interleaved[frame * channels + ch]);
        }
    }
    planar
}

/// Fold an arbitrary channel count down to interleaved stereo, duplicating
/// mono or averaging extra channels into left/right — the core only ever
/// asks for stereo PCM (§6.1).
fn interleave_stereo_i16(planar: &[Vec<f32>], out: &mut VecDeque<i16>) {
    if planar.is_empty() {
        return;
    }
    let frames = planar[0].len();
    for frame in 0..frames {
        let (left, right) = match planar.len() {
            1 => (planar[0][frame], planar[0][frame]),
            _ => (planar[0][frame], planar[1][frame]),
        };
        out.push_back(clip_to_i16(left));
        out.push_back(clip_to_i16(right));
    }
}

impl Decoder for SymphoniaDecoder {
    fn set_window(&mut self, start_s: f64, end_s: f64) {
        self.frames_budget = if end_s > 0.0 {
            let window_s = (end_s - start_s).max(0.0);
            Some((window_s * self.output_sample_rate as f64) as u64)
        } else {
            None
        };
        if start_s > 0.0 {
            let _ = self.format.seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(start_s),
                    track_id: Some(self.track_id),
                },
            );
        }
    }

    fn want_video(&mut self, _mode: VideoMode) {
        // No video track support in this adapter; audio-only streams are
        // the only ones exercised by the demo and integration tests.
    }

    fn start(&mut self) {
        self.end_of_stream = false;
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn read_audio(&mut self, out: &mut [i16]) -> usize {
        if self.paused {
            return 0;
        }

        let mut want = out.len();
        if let Some(budget) = self.frames_budget {
            let remaining_frames = budget.saturating_sub(self.frames_emitted);
            want = want.min((remaining_frames * 2) as usize);
        }

        while self.pending.len() < want && !self.end_of_stream {
            if !self.decode_one_packet() {
                self.end_of_stream = true;
            }
        }

        let take = want.min(self.pending.len());
        for slot in out.iter_mut().take(take) {
            *slot = self.pending.pop_front().unwrap();
        }
        self.frames_emitted += (take / 2) as u64;
        take / 2
    }

    fn read_video(&mut self) -> Option<VideoFrame> {
        None
    }

    fn video_ready(&self) -> bool {
        false
    }

    fn duration(&self) -> f64 {
        self.duration_s
    }

    fn wait_ready(&mut self) {
        // Demuxing/probing already happened synchronously in `open`, so the
        // first `read_audio` call never blocks on container parsing.
    }
}
