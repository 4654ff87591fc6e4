//! Show project information.

use std::path::PathBuf;

use playcut_timeline_model::{ClipKind, ProjectFile};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let project =
        ProjectFile::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    println!("Project: {}", project.name);
    println!("  ID: {}", project.id);
    println!("  Created: {}", project.created_at);
    println!("  Modified: {}", project.modified_at);
    println!();

    println!("Timeline ({:.2}s):", project.timeline.total_duration());
    for (index, clip) in project.timeline.clips.iter().enumerate() {
        let kind = match clip.kind {
            ClipKind::Video => "video",
            ClipKind::Image => "image",
        };
        println!(
            "  [{index}] {} ({kind}, {:.2}s, scale {}, volume {}{}{})",
            clip.source,
            clip.duration(),
            clip.scale,
            clip.volume,
            if clip.is_muted { ", muted" } else { "" },
            if clip.is_locked { ", locked" } else { "" },
        );
    }
    println!();

    println!("Audio tracks:");
    for track in &project.audio_tracks {
        println!(
            "  {} ({:?}, {:.1}s, delay {:.1}s, start point {:.1}s, volume {})",
            track.source, track.kind, track.duration, track.delay, track.start_point, track.volume
        );
    }
    println!();

    println!("Captions: {}", project.captions.len());
    for caption in &project.captions {
        println!(
            "  [{:.2}s - {:.2}s] {}",
            caption.start_time, caption.end_time, caption.text
        );
    }
    println!();

    println!("Export config:");
    println!("  Format: {:?}", project.export.format);
    println!(
        "  Output: {}x{} @ {}fps",
        project.export.width, project.export.height, project.export.fps
    );

    Ok(())
}
