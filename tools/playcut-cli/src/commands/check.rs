//! Check engine capabilities.

use playcut_backend_core::synthetic::{
    synthetic_capabilities, SoftwareSurface, SyntheticAudioGraph,
};
use playcut_playback_engine::FfmpegEncoder;

pub fn run() -> anyhow::Result<()> {
    println!("PlayCut Engine Check");
    println!("{}", "=".repeat(50));

    // Encoder backend
    if FfmpegEncoder::is_available() {
        println!("[OK] ffmpeg encoder available");
    } else {
        println!("[WARN] ffmpeg not found in PATH; only dry-run export works");
    }

    // Capability report for the bundled synthetic backend.
    let audio = SyntheticAudioGraph::new(48000, 2);
    let surface = SoftwareSurface::new(1920, 1080);
    let caps = synthetic_capabilities(&audio, &surface);

    println!("[OK] Synthetic backend capabilities:");
    println!("     Readable mix bus: {}", caps.readable_mix_bus);
    println!("     Native blur: {}", caps.native_blur);
    println!("     Display refresh: {}Hz", caps.display_refresh_hz);
    println!(
        "     Audio: {}Hz, {} channels",
        caps.audio_sample_rate, caps.audio_channels
    );
    println!("     Audio capture strategy: {:?}", caps.audio_capture_strategy());
    println!("     Blur strategy: {:?}", caps.blur_strategy());

    println!();
    if FfmpegEncoder::is_available() {
        println!("All capabilities available. PlayCut is ready.");
    } else {
        println!("Install ffmpeg to enable encoded exports.");
    }

    Ok(())
}
