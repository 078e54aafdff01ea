use anyhow::{ensure, Context};

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const WAV_MIME: &str = "audio/wav";

pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Reads `rate=NNNN` out of a PCM mime type such as `audio/L16;codec=pcm;rate=24000`.
/// Rates outside 8 kHz..=192 kHz fall back to the default.
pub fn sample_rate_from_mime(mime: Option<&str>) -> u32 {
    mime.into_iter()
        .flat_map(|m| m.split(';'))
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse::<u32>().ok())
        .filter(|rate| (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(rate))
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

/// Wraps signed 16-bit little-endian mono PCM in a RIFF/WAVE container.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    ensure!(!pcm.is_empty(), "speech audio is empty");
    ensure!(pcm.len() % 2 == 0, "PCM16 audio has an odd byte count");
    ensure!(
        (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate),
        "unsupported sample rate: {sample_rate}"
    );
    let data_len = u32::try_from(pcm.len())?;
    ensure!(data_len <= u32::MAX - 36, "PCM16 audio too long for WAV");

    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate
        .checked_mul(u32::from(block_align))
        .context("sample rate too large")?;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    Ok(out)
}
