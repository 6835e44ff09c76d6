use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use spectra::config::SpectraConfig;
use spectra::guidance::{GuidanceEngine, Observations};
use spectra::inference::Query;
use spectra::pipeline::AssistantPipeline;
use spectra::remote_model::RemoteModel;
use spectra::replay::{RecordedObservations, ReplayInference};
use spectra::similarity::{ConfiguredRanker, HashEmbeddingRanker};
use spectra::vision::{BoundingBox, DepthMap, Detection, Frame, HandPose};

const CLI_SESSION: &str = "cli";

#[derive(Parser)]
#[command(name = "spectra")]
#[command(about = "Assistive vision backend: read, describe, and guide the hand to objects")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "spectra.toml")]
    config: PathBuf,

    /// Camera frame to process
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Recorded detector / hand tracker / depth outputs for the frame (JSON)
    #[arg(short, long)]
    observations: Option<PathBuf>,

    /// Spoken request, routed by intent (e.g. "where is the cup")
    #[arg(short, long)]
    query: Option<String>,

    /// Object to locate directly, skipping intent classification
    #[arg(short, long)]
    locate: Option<String>,

    /// Print the full reply as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run guidance benchmark on synthetic observations
    #[arg(long)]
    benchmark: bool,

    /// Number of benchmark iterations
    #[arg(long, default_value = "1000")]
    benchmark_iterations: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!("spectra={}", log_level))
        .try_init();

    let config = SpectraConfig::load(&args.config).await?;
    info!("Configuration loaded from {:?}", args.config);

    if args.benchmark {
        info!("Starting benchmark mode");
        return run_benchmark(args.benchmark_iterations, &config).await;
    }

    let observations_path = args
        .observations
        .as_ref()
        .ok_or_else(|| anyhow!("--observations is required unless --benchmark is set"))?;
    let observations = RecordedObservations::load(observations_path).await?;

    let frame = match &args.image {
        Some(path) => {
            let image = image::open(path).map_err(|e| anyhow!("Failed to open {:?}: {}", path, e))?;
            let frame = Frame::from_image(&image);
            if frame.dimensions() != (observations.width, observations.height) {
                return Err(anyhow!(
                    "Image is {}x{} but observations were recorded at {}x{}",
                    frame.width,
                    frame.height,
                    observations.width,
                    observations.height
                ));
            }
            frame
        }
        None => {
            warn!("No image given; using a blank frame (scene narration will see nothing)");
            observations.blank_frame()
        }
    };

    let replay = ReplayInference::new(&observations)?;
    let ranker = ConfiguredRanker::from_config(&config.similarity)?;
    let engine = GuidanceEngine::new(
        replay.clone(),
        replay.clone(),
        replay,
        ranker,
        config.guidance.clone(),
    );
    let narrator = config
        .narrator
        .clone()
        .map(|c| RemoteModel::new(c, config.performance.max_upload_side))
        .transpose()?;
    let pipeline = AssistantPipeline::new(engine, narrator, &config);

    let reply = match (&args.locate, &args.query) {
        (Some(object), _) => {
            let ack = pipeline.set_target(CLI_SESSION, object).await;
            info!("{}", ack.text);
            pipeline.locate_in_session(CLI_SESSION, &frame).await
        }
        (None, Some(query)) => pipeline.respond(query, Some(&frame)).await,
        (None, None) => return Err(anyhow!("Provide --query or --locate")),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("{}", reply.text);
    }

    Ok(())
}

const BENCH_POOL: usize = 64;
const BENCH_LABELS: [&str; 8] = ["cup", "bottle", "person", "laptop", "keys", "phone", "book", "remote"];

fn synthetic_observations(rng: &mut impl rand::Rng, width: u32, height: u32) -> Observations {
    let (w, h) = (width as f32, height as f32);

    let detections = (0..rng.gen_range(1..8))
        .map(|_| {
            let label = BENCH_LABELS[rng.gen_range(0..BENCH_LABELS.len())];
            let x = rng.gen_range(0.0..w);
            let y = rng.gen_range(0.0..h);
            let bbox = BoundingBox::new(x, y, x + rng.gen_range(10.0..120.0), y + rng.gen_range(10.0..120.0));
            Detection::new(label, rng.gen_range(0.3..1.0), bbox)
        })
        .collect();

    let hands = if rng.gen_bool(0.9) {
        vec![HandPose::new(rng.gen_range(-0.02..1.02), rng.gen_range(-0.02..1.02))]
    } else {
        Vec::new()
    };

    let mut depth = DepthMap::filled(width, height, rng.gen_range(0.0..255.0));
    for _ in 0..32 {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        depth.set(x, y, rng.gen_range(0.0..255.0));
    }

    Observations {
        frame_size: (width, height),
        detections,
        hands,
        depth,
    }
}

async fn run_benchmark(iterations: usize, config: &SpectraConfig) -> Result<()> {
    let (width, height) = (config.performance.benchmark_width, config.performance.benchmark_height);
    let mut rng = rand::thread_rng();

    let pool_size = iterations.clamp(1, BENCH_POOL);
    info!("Generating {} synthetic {}x{} frames", pool_size, width, height);
    let pool: Vec<Observations> = (0..pool_size)
        .map(|_| synthetic_observations(&mut rng, width, height))
        .collect();

    let idle = ReplayInference::from_parts(Vec::new(), Vec::new(), DepthMap::filled(width, height, 0.0));
    let engine = GuidanceEngine::new(
        idle.clone(),
        idle.clone(),
        idle,
        HashEmbeddingRanker::new(config.similarity.embedding_dimension),
        config.guidance.clone(),
    );
    let query = Query::text("cup");

    let start = Instant::now();
    let mut guided = 0usize;
    for (i, obs) in pool.iter().cycle().take(iterations).enumerate() {
        if engine.fuse(obs, &query).await.is_ok() {
            guided += 1;
        }
        if i % 250 == 0 {
            info!("Benchmark progress: {}/{}", i + 1, iterations);
        }
    }

    let duration = start.elapsed();
    let per_sec = iterations as f64 / duration.as_secs_f64();

    info!("✅ Benchmark completed!");
    info!("📊 Performance: {:.2} frames/second", per_sec);
    info!("⚡ Frames with guidance: {}/{}", guided, iterations);

    Ok(())
}
