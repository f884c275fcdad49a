//! Best-effort container transform: probe and decode the fetched payload with
//! symphonia, then re-wrap the raw samples as an in-memory WAV with hound.
//! Decode-only; no resampling, no lossy encoding.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::domain::{AppError, Result};

/// Decode yields back to the executor after this many packets so large
/// payloads don't monopolize the thread.
const PACKETS_PER_YIELD: u32 = 16;

#[derive(Debug, Clone)]
pub struct TransformedAudio {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode `payload` to interleaved 16-bit PCM and re-wrap it as WAV.
///
/// Any failure is an `AppError::Decode`; callers treat it as non-fatal and
/// fall back to saving the original bytes.
pub async fn transform_to_wav(payload: &[u8]) -> Result<TransformedAudio> {
    let source = Box::new(Cursor::new(payload.to_vec()));
    let stream = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::Decode(format!("container probe failed: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::Decode("no decodable audio track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::Decode(format!("unsupported codec: {e}")))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut pcm: Vec<i16> = Vec::new();
    let mut packets_since_yield = 0u32;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // End of the in-memory payload.
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AppError::Decode(format!("packet read failed: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                pcm.extend_from_slice(buf.samples());
            }
            // Single-packet decode errors are usually recoverable; skip.
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("skipping undecodable packet: {e}");
            }
            Err(e) => return Err(AppError::Decode(format!("decode failed: {e}"))),
        }

        packets_since_yield += 1;
        if packets_since_yield >= PACKETS_PER_YIELD {
            packets_since_yield = 0;
            tokio::task::yield_now().await;
        }
    }

    if pcm.is_empty() {
        return Err(AppError::Decode("no audio frames decoded".to_string()));
    }

    write_wav(&pcm, sample_rate, channels).await
}

async fn write_wav(pcm: &[i16], sample_rate: u32, channels: u16) -> Result<TransformedAudio> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AppError::Decode(format!("wav writer init failed: {e}")))?;

        for chunk in pcm.chunks(64 * 1024) {
            for &sample in chunk {
                writer
                    .write_sample(sample)
                    .map_err(|e| AppError::Decode(format!("wav write failed: {e}")))?;
            }
            tokio::task::yield_now().await;
        }

        writer
            .finalize()
            .map_err(|e| AppError::Decode(format!("wav finalize failed: {e}")))?;
    }

    Ok(TransformedAudio {
        bytes: cursor.into_inner(),
        sample_rate,
        channels,
    })
}
