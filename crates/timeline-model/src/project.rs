//! Project container and export settings.
//!
//! A project file is the serialized form the editing layer persists and
//! restores. The core never reads storage itself; it only consumes the
//! validated in-memory structures after a load.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::caption::Caption;
use crate::timeline::Timeline;
use crate::track::AudioTrack;
use crate::{ModelError, ModelResult};

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Schema version.
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    /// Unique project identifier.
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// The visual timeline.
    pub timeline: Timeline,

    /// Independent audio layers (BGM, narrations).
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,

    /// Caption overlays.
    #[serde(default)]
    pub captions: Vec<Caption>,

    /// Export configuration.
    pub export: ExportSettings,
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output container/codec.
    pub format: ExportFormat,

    /// Output resolution in pixels.
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Audio sample rate.
    pub sample_rate: u32,
}

/// Output video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "mp4-h264")]
    Mp4H264,
    #[serde(rename = "mp4-h265")]
    Mp4H265,
    #[serde(rename = "webm")]
    Webm,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp4H264,
            width: 1920,
            height: 1080,
            fps: 30,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            sample_rate: 48000,
        }
    }
}

impl ProjectFile {
    /// Create a new empty project.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: "1".to_string(),
            name: name.into(),
            id: format!("playcut-{}", chrono::Utc::now().timestamp_millis()),
            created_at: now.clone(),
            modified_at: now,
            timeline: Timeline::new(),
            audio_tracks: Vec::new(),
            captions: Vec::new(),
            export: ExportSettings::default(),
        }
    }

    /// Load a project from a JSON file.
    pub fn load(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let project: ProjectFile = serde_json::from_str(&content)?;
        Ok(project)
    }

    /// Save the project to a JSON file, bumping `modified_at`.
    pub fn save(&mut self, path: &Path) -> ModelResult<()> {
        self.modified_at = chrono::Utc::now().to_rfc3339();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate the timeline, every track, and every caption.
    pub fn validate(&self) -> ModelResult<()> {
        self.timeline.validate()?;
        for track in &self.audio_tracks {
            track.validate()?;
        }
        for caption in &self.captions {
            caption.validate()?;
        }
        if self.export.fps == 0 {
            return Err(ModelError::InvalidProject {
                message: "export fps must be positive".to_string(),
            });
        }
        if self.export.width == 0 || self.export.height == 0 {
            return Err(ModelError::InvalidProject {
                message: "export resolution must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Clip, ClipId};
    use crate::track::{TrackId, TrackKind};

    #[test]
    fn project_round_trips_through_json() {
        let mut project = ProjectFile::new("demo");
        project.timeline.push(Clip::video(ClipId(1), "a.mp4", 10.0));
        project
            .audio_tracks
            .push(AudioTrack::new(TrackId(1), "bgm.mp3", TrackKind::Bgm, 60.0));
        project.captions.push(Caption::new(0.5, 2.5, "hi"));

        let json = serde_json::to_string(&project).unwrap();
        let restored: ProjectFile = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.timeline.len(), 1);
        assert_eq!(restored.audio_tracks.len(), 1);
        assert_eq!(restored.captions.len(), 1);
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_members() {
        let mut project = ProjectFile::new("demo");
        let mut clip = Clip::video(ClipId(1), "a.mp4", 10.0);
        clip.trim_end = 12.0;
        project.timeline.push(clip);
        assert!(project.validate().is_err());
    }

    #[test]
    fn restored_data_tolerates_missing_optional_fields() {
        // Older files may omit tracks/captions entirely.
        let json = r#"{
            "version": "1",
            "name": "legacy",
            "id": "x",
            "created_at": "2026-01-01T00:00:00Z",
            "modified_at": "2026-01-01T00:00:00Z",
            "timeline": { "clips": [] },
            "export": {
                "format": "mp4-h264",
                "width": 1280, "height": 720, "fps": 30,
                "video_bitrate_kbps": 4000, "audio_bitrate_kbps": 128,
                "sample_rate": 44100
            }
        }"#;
        let project: ProjectFile = serde_json::from_str(json).unwrap();
        assert!(project.audio_tracks.is_empty());
        assert!(project.captions.is_empty());
    }
}
