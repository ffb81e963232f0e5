//! zoomverify CLI — zoom-ratio verification from chart captures.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use zoomverify::{
    annotate, collect_zoom_test_data, plot, preview_zoom_params, verify_preview_zoom_results,
    verify_zoom_data, verify_zoom_results, Capture, CircleDetectConfig, CircleDetector,
    MarkerColor, MarkerDetector, PhysicalCamera, ToleranceConfig, ToleranceTable, VerifyConfig,
    ZoomTestData, ZoomVerification,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "zoomverify")]
#[command(about = "Verify that chart markers scale with the reported camera zoom ratio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the center chart circle in one capture.
    Detect(CliDetectArgs),

    /// Detect markers over a capture manifest and verify the zoom sweep.
    Verify(CliVerifyArgs),

    /// Verify precomputed zoom test data (JSON list).
    VerifyData(CliVerifyDataArgs),

    /// Print per-focal-length tolerances for a test rig.
    Tolerances {
        /// Rig description (JSON).
        #[arg(long)]
        rig: PathBuf,

        /// Tolerance selection parameters (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to write the tolerance table (JSON).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the preview zoom sweep for a camera zoom range.
    PreviewParams {
        /// Minimum supported zoom ratio.
        #[arg(long)]
        min: f64,

        /// Maximum supported zoom ratio.
        #[arg(long)]
        max: f64,

        /// Number of zoom steps.
        #[arg(long, default_value = "100")]
        steps: usize,
    },
}

#[derive(Debug, Clone, Args)]
struct CliDetectorArgs {
    /// Circle detector parameters (JSON). Flags below override it.
    #[arg(long)]
    detector_config: Option<PathBuf>,

    /// Chart circles are light on a dark background.
    #[arg(long)]
    light_circles: bool,

    /// Minimum zoom ratio supported by the camera.
    #[arg(long)]
    min_zoom: Option<f64>,

    /// Sub-camera field of view over the logical camera's.
    #[arg(long)]
    fov_ratio: Option<f64>,
}

impl CliDetectorArgs {
    fn to_detector(&self) -> CliResult<CircleDetector> {
        let mut config = match &self.detector_config {
            Some(path) => load_json::<CircleDetectConfig>(path)?,
            None => CircleDetectConfig::default(),
        };
        if self.light_circles {
            config.color = MarkerColor::Light;
        }
        if let Some(z) = self.min_zoom {
            config.min_zoom_ratio = z;
        }
        if let Some(f) = self.fov_ratio {
            config.fov_ratio = f;
        }
        Ok(CircleDetector::new(config))
    }
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Zoom ratio the image was captured at.
    #[arg(long, default_value = "1.0")]
    zoom: f64,

    /// Path to write all circle candidates (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write the annotated image.
    #[arg(long)]
    annotate: Option<PathBuf>,

    #[command(flatten)]
    detector: CliDetectorArgs,
}

#[derive(Debug, Clone, Args)]
struct CliVerifyOptions {
    /// Verification parameters (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to write the verification report (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path stem for variation and offset plots (PNG).
    #[arg(long)]
    plots: Option<PathBuf>,
}

impl CliVerifyOptions {
    fn verify_config(&self) -> CliResult<VerifyConfig> {
        Ok(match &self.config {
            Some(path) => VerifyConfig::from_json_file(path)?,
            None => VerifyConfig::default(),
        })
    }
}

#[derive(Debug, Clone, Args)]
struct CliVerifyArgs {
    /// Capture manifest (JSON). Image paths are relative to its directory.
    #[arg(long)]
    manifest: PathBuf,

    /// Rig description (JSON) used to derive tolerances.
    #[arg(long)]
    rig: Option<PathBuf>,

    /// Tolerance selection parameters (JSON), applied with `--rig`.
    #[arg(long, requires = "rig")]
    tolerance_config: Option<PathBuf>,

    /// Directory for annotated captures.
    #[arg(long)]
    annotate_dir: Option<PathBuf>,

    #[command(flatten)]
    detector: CliDetectorArgs,

    #[command(flatten)]
    verify: CliVerifyOptions,
}

#[derive(Debug, Clone, Args)]
struct CliVerifyDataArgs {
    /// Zoom test data (JSON list).
    #[arg(long)]
    data: PathBuf,

    /// Image width in pixels.
    #[arg(long)]
    width: u32,

    /// Image height in pixels.
    #[arg(long)]
    height: u32,

    /// Expected maximum zoom ratio; enables the zoom range check.
    #[arg(long, requires = "z_min")]
    z_max: Option<f64>,

    /// Expected minimum zoom ratio.
    #[arg(long, requires = "z_max")]
    z_min: Option<f64>,

    #[command(flatten)]
    verify: CliVerifyOptions,
}

/// One capture listed in a manifest.
#[derive(Debug, Clone, Deserialize)]
struct ManifestCapture {
    image: PathBuf,
    requested_zoom: f64,
    #[serde(default)]
    result_zoom: Option<f64>,
    focal_length: f64,
    #[serde(default)]
    physical_id: Option<String>,
}

/// Capture manifest of one zoom sweep.
#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    captures: Vec<ManifestCapture>,
    #[serde(default)]
    z_min: Option<f64>,
    #[serde(default)]
    z_max: Option<f64>,
    /// Preview sweep step; enables the preview endpoint checks.
    #[serde(default)]
    z_step: Option<f64>,
}

/// Test rig: chart distance plus the physical cameras behind the logical one.
#[derive(Debug, Clone, Deserialize)]
struct Rig {
    chart_distance_cm: f64,
    cameras: Vec<PhysicalCamera>,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("Failed to read {}: {}", path.display(), e).into() })?;
    Ok(serde_json::from_str(&data)?)
}

fn load_gray(path: &Path) -> CliResult<image::GrayImage> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    Ok(img.to_luma8())
}

fn load_tolerance_config(path: Option<&Path>) -> CliResult<ToleranceConfig> {
    Ok(match path {
        Some(path) => ToleranceConfig::from_json_file(path)?,
        None => ToleranceConfig::default(),
    })
}

fn build_tolerances(rig_path: &Path, config: &ToleranceConfig) -> CliResult<ToleranceTable> {
    let rig: Rig = load_json(rig_path)?;
    Ok(ToleranceTable::build(&rig.cameras, rig.chart_distance_cm, config)?)
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Verify(args) => run_verify(&args),
        Commands::VerifyData(args) => run_verify_data(&args),
        Commands::Tolerances { rig, config, out } => {
            run_tolerances(&rig, config.as_deref(), out.as_deref())
        }
        Commands::PreviewParams { min, max, steps } => run_preview_params(min, max, steps),
    }
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let gray = load_gray(&args.image)?;
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let detector = args.detector.to_detector()?;
    let candidates = detector.find_circles(&gray, args.zoom);
    tracing::info!("{} circle candidates", candidates.len());

    let marker = detector.locate(&gray, args.zoom)?;
    match &marker {
        Some(m) => {
            let [cx, cy] = m.center();
            let [dx, dy] = m.offset_xy([w, h]);
            println!(
                "center: ({:.2}, {:.2})  radius: {:.2}  offset: ({:.2}, {:.2})",
                cx,
                cy,
                m.size(),
                dx,
                dy
            );
        }
        None => println!("no usable circle at zoom {:.2}", args.zoom),
    }

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&candidates)?;
        std::fs::write(out, &json)?;
        tracing::info!("Candidates written to {}", out.display());
    }
    if let Some(path) = &args.annotate {
        annotate::save_annotated(&gray, marker.as_ref(), path)?;
        tracing::info!("Annotated image written to {}", path.display());
    }
    Ok(())
}

// ── verify ─────────────────────────────────────────────────────────────

fn run_verify(args: &CliVerifyArgs) -> CliResult<()> {
    let manifest: Manifest = load_json(&args.manifest)?;
    if manifest.captures.is_empty() {
        return Err("manifest lists no captures".into());
    }
    let base_dir = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let tolerances = match &args.rig {
        Some(rig) => {
            let config = load_tolerance_config(args.tolerance_config.as_deref())?;
            build_tolerances(rig, &config)?
        }
        None => ToleranceTable::default(),
    };
    let detector = args.detector.to_detector()?;

    let mut size: Option<[u32; 2]> = None;
    let mut captures = Vec::with_capacity(manifest.captures.len());
    for entry in &manifest.captures {
        let path = base_dir.join(&entry.image);
        let gray = load_gray(&path)?;
        let dims = [gray.width(), gray.height()];
        match size {
            None => size = Some(dims),
            Some(s) if s != dims => {
                return Err(format!(
                    "{} is {}x{}, expected {}x{}",
                    path.display(),
                    dims[0],
                    dims[1],
                    s[0],
                    s[1]
                )
                .into())
            }
            Some(_) => {}
        }
        captures.push(Capture {
            image: gray,
            requested_zoom: entry.requested_zoom,
            result_zoom: entry.result_zoom.unwrap_or(entry.requested_zoom),
            focal_length: entry.focal_length,
            physical_id: entry.physical_id.clone(),
        });
    }
    let size = size.ok_or("manifest lists no captures")?;

    let collected = collect_zoom_test_data(&captures, &detector, &tolerances);
    if let Some(dir) = &args.annotate_dir {
        // Results line up with captures; those past the first miss have no marker.
        let markers = collected.as_ref().map(Vec::as_slice).unwrap_or_default();
        write_annotations(dir, &manifest.captures, &captures, markers)?;
    }
    let data = match collected {
        Ok(data) => data,
        Err(e) if e.is_marker_miss() => {
            tracing::error!("marker lost inside the detector range: {e}");
            if args.annotate_dir.is_none() {
                tracing::info!("rerun with --annotate-dir to inspect chart placement");
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(
        "{} of {} captures have a usable marker",
        data.len(),
        manifest.captures.len()
    );

    let config = args.verify.verify_config()?;
    let result = match (manifest.z_min, manifest.z_max, manifest.z_step) {
        (Some(z_min), Some(z_max), Some(z_step)) => {
            verify_preview_zoom_results(&data, size, z_max, z_min, z_step, &config)?
        }
        (Some(z_min), Some(z_max), None) => {
            verify_zoom_results(&data, size, z_max, z_min, &config)?
        }
        _ => verify_zoom_data(&data, size, &config)?,
    };
    finish(&result, &args.verify)
}

fn write_annotations(
    dir: &Path,
    entries: &[ManifestCapture],
    captures: &[Capture],
    data: &[ZoomTestData],
) -> CliResult<()> {
    std::fs::create_dir_all(dir)?;
    for (i, (entry, cap)) in entries.iter().zip(captures).enumerate() {
        let name = entry
            .image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("zoom_{:.2}", cap.requested_zoom));
        let marker = data.get(i).map(|d| &d.marker);
        annotate::save_annotated(&cap.image, marker, &dir.join(format!("{name}.png")))?;
    }
    tracing::info!("Annotated captures written to {}", dir.display());
    Ok(())
}

fn run_verify_data(args: &CliVerifyDataArgs) -> CliResult<()> {
    let data: Vec<ZoomTestData> = load_json(&args.data)?;
    let size = [args.width, args.height];
    let config = args.verify.verify_config()?;
    let result = match (args.z_min, args.z_max) {
        (Some(z_min), Some(z_max)) => verify_zoom_results(&data, size, z_max, z_min, &config)?,
        _ => verify_zoom_data(&data, size, &config)?,
    };
    finish(&result, &args.verify)
}

fn finish(result: &ZoomVerification, opts: &CliVerifyOptions) -> CliResult<()> {
    println!(
        "{}: {} frames, {} failures",
        if result.passed { "PASS" } else { "FAIL" },
        result.frames.len(),
        result.failures.len()
    );
    println!("  max_rel_variation:      {:.4}", result.stats.max_rel_variation);
    println!("  max_rel_variation_zoom: {:.2}", result.stats.max_rel_variation_zoom);
    println!("  rms_z_variation:        {:.4}", result.stats.rms_z_variation);
    println!("  rms_rel_variation:      {:.4}", result.stats.rms_rel_variation);
    for f in &result.failures {
        println!("  - {f}");
    }

    if let Some(out) = &opts.out {
        result.write_json(out)?;
        tracing::info!("Report written to {}", out.display());
    }
    if let Some(stem) = &opts.plots {
        plot::write_plots(result, stem)?;
    }

    if result.passed {
        Ok(())
    } else {
        let n = result.failures.len();
        Err(format!("zoom verification failed with {n} failures").into())
    }
}

// ── tolerances ─────────────────────────────────────────────────────────

fn run_tolerances(rig: &Path, config: Option<&Path>, out: Option<&Path>) -> CliResult<()> {
    let table = build_tolerances(rig, &load_tolerance_config(config)?)?;

    println!("focal length  camera  radius_rtol  offset_rtol");
    for e in &table.entries {
        println!(
            "{:>12.2}  {:>6}  {:>11.2}  {:>11.2}{}",
            e.focal_length,
            e.camera_id,
            e.tolerance.radius_rtol,
            e.tolerance.offset_rtol,
            if e.loosened { "  (loosened)" } else { "" }
        );
    }
    match table.common_size {
        Some([w, h]) => println!("largest common size: {w}x{h}"),
        None => println!("largest common size: none"),
    }

    if let Some(out) = out {
        std::fs::write(out, serde_json::to_string_pretty(&table)?)?;
        tracing::info!("Tolerance table written to {}", out.display());
    }
    Ok(())
}

// ── preview-params ─────────────────────────────────────────────────────

fn run_preview_params(min: f64, max: f64, steps: usize) -> CliResult<()> {
    let p = preview_zoom_params([min, max], steps)?;
    println!("z_min:  {:.4}", p.min);
    println!("z_max:  {:.4}", p.max);
    println!("z_step: {:.4}", p.step);
    let ratios: Vec<String> = p.ratios().iter().map(|z| format!("{z:.2}")).collect();
    println!("ratios ({}): {}", ratios.len(), ratios.join(" "));
    Ok(())
}
