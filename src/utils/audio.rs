use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::time::Duration;

/// Sample rate of the raw PCM speech returned by the generation API.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

const WAV_HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const MONO: u16 = 1;

/// Decodes a base64 payload, tolerating a `data:...;base64,` prefix.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let body = match payload.split_once(',') {
        Some((meta, data)) if meta.starts_with("data:") => data,
        _ => payload,
    };
    general_purpose::STANDARD
        .decode(body.trim())
        .context("Invalid base64 audio payload")
}

/// Decoded audio ready to be handed to an output device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Back to little-endian i16 bytes. Exact for buffers built by `decode_for_playback`.
    pub fn to_pcm16(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            let v = (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn to_wav(&self) -> Result<Vec<u8>> {
        encode_wav_with_channels(&self.to_pcm16(), self.sample_rate, self.channels)
    }
}

/// Turns raw little-endian 16-bit PCM into normalized floats in [-1, 1].
/// A trailing odd byte is dropped.
pub fn decode_for_playback(pcm: &[u8], sample_rate: u32, channels: u16) -> AudioBuffer {
    let samples = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();
    AudioBuffer {
        samples,
        sample_rate,
        channels,
    }
}

/// Wraps mono 16-bit PCM into a 44-byte-header WAV container.
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    encode_wav_with_channels(pcm, sample_rate, MONO)
}

fn encode_wav_with_channels(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let riff_size = riff_size_for(pcm.len())?;
    let data_len = riff_size - 36;
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    Ok(out)
}

/// RIFF size field for a payload of `data_len` bytes; fails past the 32-bit limit.
fn riff_size_for(data_len: usize) -> Result<u32> {
    u32::try_from(data_len)
        .ok()
        .and_then(|n| n.checked_add(36))
        .ok_or_else(|| anyhow!("PCM payload too large for a WAV file: {} bytes", data_len))
}

/// Decodes a base64 speech payload straight into a downloadable WAV.
pub fn base64_pcm_to_wav(payload: &str, sample_rate: u32) -> Result<Vec<u8>> {
    let pcm = decode_base64(payload)?;
    encode_wav(&pcm, sample_rate)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavInfo {
    pub riff_size: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_offset: u64,
    pub data_size: u32,
}

/// Walks the RIFF chunks of an in-memory WAV file.
pub fn parse_wav(bytes: &[u8]) -> Result<WavInfo> {
    let mut f = Cursor::new(bytes);

    let mut id = [0u8; 4];
    f.read_exact(&mut id)?;
    if &id != b"RIFF" {
        return Err(anyhow!("Not a RIFF file"));
    }

    let mut size_buf = [0u8; 4];
    f.read_exact(&mut size_buf)?;
    let riff_size = u32::from_le_bytes(size_buf);

    f.read_exact(&mut id)?;
    if &id != b"WAVE" {
        return Err(anyhow!("Not a WAVE file"));
    }

    let mut fmt_content: Option<Vec<u8>> = None;
    let mut data: Option<(u64, u32)> = None;

    loop {
        let mut chunk_id = [0u8; 4];
        let n = f.read(&mut chunk_id)?;
        if n == 0 {
            break;
        }
        if n < 4 {
            return Err(anyhow!("Unexpected EOF reading chunk ID"));
        }

        f.read_exact(&mut size_buf)?;
        let chunk_size = u32::from_le_bytes(size_buf);

        let remaining = (bytes.len() as u64).saturating_sub(f.position());
        if u64::from(chunk_size) > remaining && &chunk_id != b"data" {
            return Err(anyhow!(
                "Chunk {:?} declares {} bytes but only {} remain",
                String::from_utf8_lossy(&chunk_id),
                chunk_size,
                remaining
            ));
        }

        if &chunk_id == b"fmt " {
            let mut buf = vec![0u8; chunk_size as usize];
            f.read_exact(&mut buf)?;
            fmt_content = Some(buf);
        } else if &chunk_id == b"data" {
            data = Some((f.stream_position()?, chunk_size));
            break;
        } else {
            f.seek(SeekFrom::Current(chunk_size as i64))?;
        }
    }

    let fmt = fmt_content.ok_or_else(|| anyhow!("Missing fmt chunk"))?;
    if fmt.len() < 16 {
        return Err(anyhow!("fmt chunk too short: {} bytes", fmt.len()));
    }
    let (data_offset, data_size) = data.ok_or_else(|| anyhow!("Missing data chunk"))?;

    let u16_at = |i: usize| u16::from_le_bytes([fmt[i], fmt[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([fmt[i], fmt[i + 1], fmt[i + 2], fmt[i + 3]]);

    Ok(WavInfo {
        riff_size,
        channels: u16_at(2),
        sample_rate: u32_at(4),
        byte_rate: u32_at(8),
        block_align: u16_at(12),
        bits_per_sample: u16_at(14),
        data_offset,
        data_size,
    })
}
