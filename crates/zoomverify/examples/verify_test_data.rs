use std::error::Error;
use std::path::Path;

use zoomverify::{verify_zoom_data, VerifyConfig, ZoomTestData};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <test_data.json> <width> <height> [report.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let data: Vec<ZoomTestData> = serde_json::from_str(&std::fs::read_to_string(&args[1])?)?;
    let size = [args[2].parse()?, args[3].parse()?];

    let result = verify_zoom_data(&data, size, &VerifyConfig::default())?;
    println!(
        "{} frames, {} failures, max relative variation {:.4} at zoom {:.2}",
        result.frames.len(),
        result.failures.len(),
        result.stats.max_rel_variation,
        result.stats.max_rel_variation_zoom
    );
    for f in &result.failures {
        println!("  {f}");
    }

    if let Some(out_path) = args.get(4) {
        result.write_json(Path::new(out_path))?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
