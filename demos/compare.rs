use std::time::Instant;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use view_capture::frame::PixelBuffer;
use view_capture::{
    CaptureOrchestrator, CaptureOptions, CaptureRegion, CaptureSuccess, CompareOptions,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Renders a gradient with a small square that moves a few pixels on every
/// frame, so consecutive snapshots differ slightly.
fn gradient_view() -> impl FnMut() -> view_capture::error::CaptureResult<PixelBuffer> + Send {
    let mut frame_index = 0u32;
    move || {
        let marker_x = 40 + frame_index * 6;
        frame_index += 1;
        let mut samples = Vec::with_capacity((WIDTH * HEIGHT) as usize);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let in_marker = (marker_x..marker_x + 24).contains(&x) && (40..64).contains(&y);
                let px = if in_marker {
                    0xFFFF_FFFF
                } else {
                    let r = x * 255 / WIDTH;
                    let g = y * 255 / HEIGHT;
                    0xFF00_0080 | (r << 16) | (g << 8)
                };
                samples.push(px);
            }
        }
        PixelBuffer::from_argb(WIDTH, HEIGHT, samples)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let storage_root = std::env::temp_dir().join("view-capture-demo");
    let orchestrator = CaptureOrchestrator::builder()
        .with_provider(gradient_view())
        .storage_root(&storage_root)
        .build()
        .context("failed to start capture orchestrator")?;

    let begin = Instant::now();
    let baseline = match orchestrator
        .capture(CaptureOptions::named("baseline"))?
        .wait()
        .into_result()
        .context("baseline capture failed")?
    {
        CaptureSuccess::Captured { location } => location,
        CaptureSuccess::Compared(_) => unreachable!("capture-only request"),
    };
    println!(
        "Captured baseline to {} in {:.3} ms",
        baseline.display(),
        begin.elapsed().as_secs_f64() * 1000.0
    );

    let compare = CompareOptions::new(baseline.to_string_lossy())
        .write_actual(true)
        .write_diff(true);
    let ticket = orchestrator.capture_and_compare(
        CaptureOptions::named("current").asynchronous(true),
        compare,
    )?;
    match ticket.wait().into_result().context("comparison failed")? {
        CaptureSuccess::Compared(result) => println!("Full view: {result}"),
        CaptureSuccess::Captured { .. } => unreachable!("compare request"),
    }

    // A sub-rect away from the moving marker matches regardless of frame.
    let still = CaptureOptions::named("corner").with_region(CaptureRegion::new(0, 200, 320, 260));
    let corner = orchestrator
        .capture(still.clone())?
        .wait()
        .into_result()
        .context("corner capture failed")?;
    if let CaptureSuccess::Captured { location } = corner {
        let result = orchestrator
            .capture_and_compare(
                still,
                CompareOptions::new(location.to_string_lossy()).tolerances(0.05, 0.0),
            )?
            .wait()
            .into_result()
            .context("corner comparison failed")?;
        if let CaptureSuccess::Compared(result) = result {
            println!("Corner region: {} differing pixels", result.differing_pixels);
        }
    }

    Ok(())
}
