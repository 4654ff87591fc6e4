//! Validate a PlayCut project file.

use std::path::PathBuf;

use playcut_timeline_model::ProjectFile;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let project =
        ProjectFile::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    println!("  Name: {}", project.name);
    println!("  Version: {}", project.version);
    println!("  Clips: {}", project.timeline.len());
    println!("  Audio tracks: {}", project.audio_tracks.len());
    println!("  Captions: {}", project.captions.len());
    println!(
        "  Total duration: {:.2}s",
        project.timeline.total_duration()
    );

    match project.validate() {
        Ok(()) => {
            println!("\nProject is valid.");
            Ok(())
        }
        Err(e) => {
            println!("\nValidation issue:");
            println!("  - {e}");
            anyhow::bail!("project failed validation");
        }
    }
}
