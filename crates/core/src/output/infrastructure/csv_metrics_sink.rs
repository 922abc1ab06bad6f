use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::detection::domain::capabilities::{Capability, DetectionCapabilities};
use crate::output::domain::metrics_sink::{MetricsSink, SinkError};
use crate::shared::face::{DetectionResult, Face, FaceId};

const NAN: &str = "nan";
const BASE_COLUMNS: &[&str] = &[
    "timestamp",
    "face_id",
    "x",
    "y",
    "width",
    "height",
    "interocular_distance",
    "pitch",
    "yaw",
    "roll",
];

/// Writes one CSV row per face per frame.
///
/// Columns are the face geometry, then appearance and emoji columns when
/// those capabilities are enabled, then one column per enabled score. A
/// frame without faces still gets a row: its timestamp followed by `nan`.
pub struct CsvMetricsSink<W: Write + Send> {
    writer: csv::Writer<W>,
    capabilities: DetectionCapabilities,
    columns: usize,
}

impl CsvMetricsSink<File> {
    pub fn create(path: &Path, capabilities: DetectionCapabilities) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_writer(File::create(path)?, capabilities)
    }
}

impl<W: Write + Send> CsvMetricsSink<W> {
    pub fn from_writer(inner: W, capabilities: DetectionCapabilities) -> Result<Self, SinkError> {
        let mut writer = csv::WriterBuilder::new().delimiter(b',').from_writer(inner);
        let header = header(&capabilities);
        writer.write_record(&header)?;
        Ok(Self {
            writer,
            capabilities,
            columns: header.len(),
        })
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }

    fn face_record(&self, timestamp: Duration, id: FaceId, face: &Face) -> Vec<String> {
        let b = face.bounds;
        let o = face.orientation;
        let mut record = vec![
            format_timestamp(timestamp),
            id.to_string(),
            b.x.to_string(),
            b.y.to_string(),
            b.width.to_string(),
            b.height.to_string(),
            format!("{:.4}", face.interocular_distance),
            format!("{:.4}", o.pitch),
            format!("{:.4}", o.yaw),
            format!("{:.4}", o.roll),
        ];
        if self.capabilities.contains(Capability::Gender) {
            record.push(face.appearance.gender.to_string());
        }
        if self.capabilities.contains(Capability::Glasses) {
            record.push(u8::from(face.appearance.glasses).to_string());
        }
        if self.capabilities.contains(Capability::Emojis) {
            record.push(face.dominant_emoji.to_string());
        }
        for capability in self.capabilities.scored() {
            record.push(match face.score(capability) {
                Some(v) => format!("{v:.4}"),
                None => NAN.to_string(),
            });
        }
        record
    }
}

fn header(capabilities: &DetectionCapabilities) -> Vec<String> {
    let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for capability in [Capability::Gender, Capability::Glasses] {
        if capabilities.contains(capability) {
            columns.push(capability.name().to_string());
        }
    }
    if capabilities.contains(Capability::Emojis) {
        columns.push("dominant_emoji".to_string());
    }
    columns.extend(capabilities.scored().map(|c| c.name().to_string()));
    columns
}

fn format_timestamp(timestamp: Duration) -> String {
    format!("{:.4}", timestamp.as_secs_f64())
}

impl<W: Write + Send> MetricsSink for CsvMetricsSink<W> {
    fn append(&mut self, timestamp: Duration, faces: &DetectionResult) -> Result<(), SinkError> {
        if faces.is_empty() {
            let mut record = vec![format_timestamp(timestamp)];
            record.resize(self.columns, NAN.to_string());
            self.writer.write_record(&record)?;
            return Ok(());
        }
        for (id, face) in faces {
            let record = self.face_record(timestamp, *id, face);
            self.writer.write_record(&record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
