//! Audio duration probing
//!
//! Only the container headers are read; nothing is decoded.

use std::fs::File;
use std::path::Path;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Duration of an audio file in milliseconds, if the container declares it
pub fn duration_ms(path: &Path) -> anyhow::Result<Option<u64>> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("No default track"))?;
    let params = &track.codec_params;

    let Some(n_frames) = params.n_frames else {
        return Ok(None);
    };

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(n_frames);
        return Ok(Some(time.seconds * 1000 + (time.frac * 1000.0).round() as u64));
    }

    Ok(params
        .sample_rate
        .filter(|rate| *rate > 0)
        .map(|rate| n_frames * 1000 / u64::from(rate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Minimal 16-bit mono PCM WAV
    fn write_wav(path: &Path, sample_rate: u32, samples: u32) {
        let data_len = samples * 2;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.resize(wav.len() + data_len as usize, 0);
        std::fs::write(path, wav).unwrap();
    }

    #[test]
    fn test_wav_duration() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, 8000, 12_000);

        assert_eq!(duration_ms(&path).unwrap(), Some(1500));
    }

    #[test]
    fn test_not_audio() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.mp3");
        std::fs::write(&path, b"plain text, not audio").unwrap();

        assert!(duration_ms(&path).is_err());
        assert!(duration_ms(&tmp.path().join("missing.mp3")).is_err());
    }
}
