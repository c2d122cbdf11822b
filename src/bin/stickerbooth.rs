use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stickerbooth::{
    BoardScene, BoothConfig, CancelToken, ClipBlob, ClipRecorder, DirObjectStore, EntityStore,
    FfmpegFacility, FilePort, FixedFootprint, FixedStepClock, FrameClock, FrameCompositor,
    FrameTarget, FsImageLoader, GestureOutcome, HttpUpload, ImageCache, InMemoryFacility,
    LogNavigator, ObjectStoreUpload, PersistencePort, Point, RealtimeClock, RecorderOpts,
    RecordingFacility, Slideshow, SlideshowClock, StickerBoard, UploadFlow, UploadPort,
    clear_sticker_state, compose_live_frame,
};

#[derive(Parser, Debug)]
#[command(name = "stickerbooth", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a single frame of the decorated canvas as a PNG.
    Frame(FrameArgs),
    /// Record a clip of the decorated canvas, optionally uploading it.
    Record(RecordArgs),
    /// Replay a pointer-event script against the sticker board.
    Gestures(GestureArgs),
    /// Remove the persisted sticker state.
    ClearState(ClearArgs),
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Booth config JSON (stock defaults when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Background photos, in slideshow order.
    #[arg(long = "photo")]
    photos: Vec<String>,

    /// Persisted sticker state file.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Root for relative image references (defaults to the config's directory).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Canvas width in logical pixels.
    #[arg(long)]
    width: f64,

    /// Canvas height in logical pixels.
    #[arg(long)]
    height: f64,

    /// Device pixel ratio.
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Background index.
    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output clip path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Upload target: `http` (config endpoint) or `dir:<path>`.
    #[arg(long)]
    upload: Option<String>,

    /// Public base URL for `dir:` uploads.
    #[arg(long)]
    base_url: Option<String>,

    /// Use the deterministic in-memory encoder instead of ffmpeg.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Tick as fast as possible instead of in real time.
    #[arg(long, default_value_t = false)]
    fast: bool,
}

#[derive(Parser, Debug)]
struct GestureArgs {
    /// Booth config JSON (stock defaults when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persisted sticker state file.
    #[arg(long)]
    state: PathBuf,

    /// JSON array of pointer events.
    #[arg(long)]
    script: PathBuf,
}

#[derive(Parser, Debug)]
struct ClearArgs {
    /// Persisted sticker state file.
    #[arg(long)]
    state: PathBuf,
}

#[derive(serde::Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PointerEvent {
    Down { id: u64, x: f64, y: f64 },
    ResizeDown { id: u64, x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Record(args) => cmd_record(args),
        Command::Gestures(args) => cmd_gestures(args),
        Command::ClearState(args) => cmd_clear_state(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BoothConfig> {
    match path {
        Some(p) => Ok(BoothConfig::from_path(p)?),
        None => Ok(BoothConfig::default()),
    }
}

fn load_board(cfg: &BoothConfig, state: Option<&Path>) -> StickerBoard {
    let store = EntityStore::from_tray(&cfg.tray, cfg.sticker_size);
    let mut board = StickerBoard::new(store, cfg.tuning());
    if let Some(state) = state {
        board = board.with_persistence(Arc::new(FilePort::at(state)));
        board.hydrate();
    }
    board
}

struct Scene {
    cfg: BoothConfig,
    board: StickerBoard,
    cache: Arc<ImageCache>,
    footprint: FixedFootprint,
    photos: Vec<String>,
}

fn load_scene(args: &SceneArgs) -> anyhow::Result<Scene> {
    let cfg = load_config(args.config.as_deref())?;
    let board = load_board(&cfg, args.state.as_deref());
    let root = args.assets.clone().unwrap_or_else(|| {
        args.config
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    Ok(Scene {
        cfg,
        board,
        cache: Arc::new(ImageCache::new(Arc::new(FsImageLoader::new(root)))),
        footprint: FixedFootprint::new(args.width, args.height).with_dpr(args.dpr),
        photos: args.photos.clone(),
    })
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;
    let opts = RecorderOpts::from_config(&scene.cfg)?;
    let target = FrameTarget::from_footprint(args.scene.width, args.scene.height, args.scene.dpr);

    let mut compositor = FrameCompositor::new();
    let frame = compose_live_frame(
        &mut compositor,
        &scene.cache,
        target,
        &opts,
        &scene.photos,
        args.index,
        &scene.board.placed_stickers(),
    )?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba8(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// Keeps a local copy of the clip before handing it on.
struct TeeUpload {
    out: Option<PathBuf>,
    inner: Option<Arc<dyn UploadPort>>,
}

impl UploadPort for TeeUpload {
    fn upload(&self, clip: &ClipBlob) -> stickerbooth::BoothResult<String> {
        if let Some(out) = &self.out {
            write_clip(out, clip)?;
        }
        match &self.inner {
            Some(inner) => inner.upload(clip),
            None => Ok(self
                .out
                .as_ref()
                .map(|p| format!("file://{}", p.display()))
                .unwrap_or_default()),
        }
    }
}

fn write_clip(out: &Path, clip: &ClipBlob) -> stickerbooth::BoothResult<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(out, &clip.bytes).with_context(|| format!("write clip '{}'", out.display()))?;
    Ok(())
}

fn upload_port(args: &RecordArgs, cfg: &BoothConfig) -> anyhow::Result<Option<Arc<dyn UploadPort>>> {
    let Some(spec) = args.upload.as_deref() else {
        return Ok(None);
    };
    if spec == "http" {
        return Ok(Some(Arc::new(HttpUpload::new(&cfg.upload)?)));
    }
    if let Some(dir) = spec.strip_prefix("dir:") {
        let mut store = DirObjectStore::new(dir);
        if let Some(base) = &args.base_url {
            store = store.with_base_url(base.clone());
        }
        return Ok(Some(Arc::new(ObjectStoreUpload::new(store))));
    }
    anyhow::bail!("unknown upload target '{spec}' (expected `http` or `dir:<path>`)")
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    if args.out.is_none() && args.upload.is_none() {
        anyhow::bail!("nothing to do: pass --out and/or --upload");
    }
    let scene = load_scene(&args.scene)?;
    let opts = RecorderOpts::from_config(&scene.cfg)?;

    let facility: Arc<dyn RecordingFacility> = if args.dry_run {
        Arc::new(InMemoryFacility::permissive().with_default_mime("video/webm"))
    } else {
        Arc::new(FfmpegFacility::new())
    };
    let recorder = Arc::new(ClipRecorder::new(facility, scene.cache.clone(), opts));

    let slideshow = Slideshow::new(scene.photos.len());
    let live = BoardScene::new(Arc::new(RwLock::new(scene.board)), slideshow.clone());
    let interval = scene.cfg.slide_interval_ms;
    let mut clock: Box<dyn FrameClock> = if args.fast {
        Box::new(SlideshowClock::new(FixedStepClock::new(60.0), slideshow, interval))
    } else {
        Box::new(SlideshowClock::new(
            RealtimeClock::new(60.0, CancelToken::new()),
            slideshow,
            interval,
        ))
    };

    let tee = TeeUpload {
        out: args.out.clone(),
        inner: upload_port(&args, &scene.cfg)?,
    };
    let navigator = Arc::new(LogNavigator::new());
    let flow = UploadFlow::new(recorder, Arc::new(tee), navigator.clone(), scene.cfg.qr_route.clone());

    match flow.record_upload_and_go(&scene.footprint, &scene.photos, &live, clock.as_mut())? {
        Some(url) => {
            if let Some(out) = &args.out {
                eprintln!("wrote {}", out.display());
            }
            println!("{url}");
            Ok(())
        }
        None => anyhow::bail!("no clip was recorded"),
    }
}

fn cmd_gestures(args: GestureArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let mut board = load_board(&cfg, Some(&args.state));
    let canvas = cfg.canvas.map(|c| c.to_rect());

    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("read script '{}'", args.script.display()))?;
    let events: Vec<PointerEvent> = serde_json::from_str(&text)
        .with_context(|| format!("parse script '{}'", args.script.display()))?;

    for (i, ev) in events.into_iter().enumerate() {
        match ev {
            PointerEvent::Down { id, x, y } => {
                if !board.begin_gesture(id, Point::new(x, y)) {
                    eprintln!("event {i}: drag on {id} ignored");
                }
            }
            PointerEvent::ResizeDown { id, x, y } => {
                if !board.begin_resize(id, Point::new(x, y)) {
                    eprintln!("event {i}: resize on {id} ignored");
                }
            }
            PointerEvent::Move { x, y } => board.on_pointer_move(Point::new(x, y)),
            PointerEvent::Up { x, y } => match board.end_gesture(Point::new(x, y), canvas) {
                GestureOutcome::Ignored => eprintln!("event {i}: release ignored"),
                outcome => eprintln!("event {i}: {outcome:?}"),
            },
        }
    }

    println!("{}", board.store().snapshot().to_json()?);
    Ok(())
}

fn cmd_clear_state(args: ClearArgs) -> anyhow::Result<()> {
    let port = FilePort::at(&args.state);
    clear_sticker_state(&port);
    if port.load()?.is_none() {
        eprintln!("cleared {}", args.state.display());
    }
    Ok(())
}
