//! WAV loading, concatenation and export.

use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SILENCE_MS;
use crate::error::AssemblyError;

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let frames = reader.duration() as f64;
    Ok(frames / spec.sample_rate as f64)
}

#[derive(Debug, Clone, PartialEq)]
enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

/// A decoded WAV file held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    spec: WavSpec,
    samples: Samples,
}

impl AudioSegment {
    pub fn load(path: &Path) -> Result<Self, hound::Error> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let samples = match spec.sample_format {
            SampleFormat::Int => Samples::Int(reader.into_samples::<i32>().collect::<Result<_, _>>()?),
            SampleFormat::Float => {
                Samples::Float(reader.into_samples::<f32>().collect::<Result<_, _>>()?)
            }
        };
        Ok(Self { spec, samples })
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Number of sample frames (one sample per channel each).
    pub fn frames(&self) -> usize {
        let len = match &self.samples {
            Samples::Int(s) => s.len(),
            Samples::Float(s) => s.len(),
        };
        len / self.spec.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> f64 {
        self.frames() as f64 * 1000.0 / self.spec.sample_rate as f64
    }

    /// Interleaved sample count for `ms` of audio.
    fn sample_count(&self, ms: u32) -> usize {
        let frames = self.spec.sample_rate as u64 * ms as u64 / 1000;
        (frames * self.spec.channels as u64) as usize
    }

    /// Appends `other` after `pause_ms` of silence. A segment in a different
    /// format is handed back untouched and `self` is left as it was.
    fn append(&mut self, other: AudioSegment, pause_ms: u32) -> Result<(), AudioSegment> {
        if self.spec != other.spec {
            return Err(other);
        }
        let pause = self.sample_count(pause_ms);
        match (&mut self.samples, other.samples) {
            (Samples::Int(a), Samples::Int(b)) => {
                a.resize(a.len() + pause, 0);
                a.extend(b);
            }
            (Samples::Float(a), Samples::Float(b)) => {
                a.resize(a.len() + pause, 0.0);
                a.extend(b);
            }
            (_, samples) => {
                return Err(AudioSegment {
                    spec: other.spec,
                    samples,
                });
            }
        }
        Ok(())
    }

    /// Writes the segment to `path`. A file left half-written by a failed
    /// sample write or finalize is removed before the error is returned.
    pub fn export(&self, path: &Path) -> Result<(), hound::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = WavWriter::create(path, self.spec)?;
        if let Err(e) = self.write_samples(writer) {
            if let Err(rm) = fs::remove_file(path) {
                warn!("Failed to remove partial output {}: {}", path.display(), rm);
            }
            return Err(e);
        }
        Ok(())
    }

    fn write_samples<W: Write + Seek>(&self, mut writer: WavWriter<W>) -> Result<(), hound::Error> {
        match &self.samples {
            Samples::Int(s) => {
                for &sample in s {
                    writer.write_sample(sample)?;
                }
            }
            Samples::Float(s) => {
                for &sample in s {
                    writer.write_sample(sample)?;
                }
            }
        }
        writer.finalize()
    }
}

/// Joins per-line segments into one track with a pause between lines.
#[derive(Debug, Clone)]
pub struct AudioAssembler {
    silence_ms: u32,
}

impl Default for AudioAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_MS)
    }
}

impl AudioAssembler {
    pub fn new(silence_ms: u32) -> Self {
        Self { silence_ms }
    }

    pub fn silence_ms(&self) -> u32 {
        self.silence_ms
    }

    /// Concatenates `segments` in order into `output`.
    ///
    /// Missing, undecodable or format-mismatched segments are skipped; if none
    /// load, nothing is written and [`AssemblyError::NoAudio`] is returned. On
    /// success every segment file that existed is deleted, along with its
    /// directory once empty.
    pub fn assemble(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf, AssemblyError> {
        let mut combined: Option<AudioSegment> = None;
        let mut existing = Vec::new();

        for path in segments {
            if !path.exists() {
                warn!("Segment {} does not exist; skipping", path.display());
                continue;
            }
            existing.push(path.as_path());

            let segment = match AudioSegment::load(path) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Could not decode segment {}: {}; skipping", path.display(), e);
                    continue;
                }
            };
            debug!("Loaded {} ({:.0} ms)", path.display(), segment.duration_ms());

            if let Some(acc) = combined.as_mut() {
                if let Err(skipped) = acc.append(segment, self.silence_ms) {
                    warn!(
                        "Segment {} format {:?} differs from {:?}; skipping",
                        path.display(),
                        skipped.spec(),
                        acc.spec()
                    );
                }
            } else {
                combined = Some(segment);
            }
        }

        let Some(combined) = combined else {
            return Err(AssemblyError::NoAudio);
        };

        combined
            .export(output)
            .map_err(|source| AssemblyError::ExportFailure {
                path: output.to_path_buf(),
                source,
            })?;
        info!(
            "Combined audio ({:.2} s) written to {}",
            combined.duration_ms() / 1000.0,
            output.display()
        );

        remove_segments(&existing);
        Ok(output.to_path_buf())
    }
}

/// Deletes merged segment files and their directories once empty. Failures
/// are logged and otherwise ignored.
fn remove_segments(paths: &[&Path]) {
    let mut dirs: Vec<&Path> = Vec::new();
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove segment {}: {}", path.display(), e);
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !dirs.contains(&parent) {
                dirs.push(parent);
            }
        }
    }
    for dir in dirs {
        if let Err(e) = fs::remove_dir(dir) {
            debug!("Leaving directory {} in place: {}", dir.display(), e);
        }
    }
}
