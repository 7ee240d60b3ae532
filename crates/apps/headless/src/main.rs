use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use camera::{InputEvent, Key};
use clap::Parser;
use foundation::time::SystemClock;
use globe::{FetchDisposition, GlobeConfig, GlobeEvent, GlobeSession, UiEvent};
use streaming::{BoundsQuery, FetchError, FetchRequest, RequestId, SnapshotPayload, SyntheticFleet};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs a globe session against a replayed or synthetic flight feed")]
struct Args {
    /// JSON config file; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot JSON file (one payload or an array), or a directory of them replayed in name order
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Target frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Synthetic fleet size when no replay is given
    #[arg(long, default_value_t = 2000)]
    aircraft: usize,

    /// Simulated fetch latency in milliseconds
    #[arg(long, default_value_t = 150)]
    latency_ms: u64,

    /// Snap to the nearest aircraft after this many seconds, release it ten seconds later
    #[arg(long)]
    demo_chase_s: Option<f64>,
}

type FetchResult = (RequestId, Result<SnapshotPayload, FetchError>);

enum Feed {
    Replay {
        snapshots: Vec<SnapshotPayload>,
        next: usize,
    },
    Synthetic {
        fleet: SyntheticFleet,
        started: Instant,
    },
}

impl Feed {
    fn fetch(&mut self, query: &BoundsQuery) -> Result<SnapshotPayload, FetchError> {
        let payload = match self {
            Feed::Replay { snapshots, next } => {
                if snapshots.is_empty() {
                    return Err(FetchError::Transport("replay has no snapshots".to_string()));
                }
                let payload = snapshots[*next % snapshots.len()].clone();
                *next += 1;
                payload
            }
            Feed::Synthetic { fleet, started } => {
                let unix_s = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .map_err(|e| FetchError::Transport(e.to_string()))?;
                fleet.snapshot(started.elapsed().as_secs_f64(), unix_s)
            }
        };
        Ok(filter_to_query(payload, query))
    }
}

/// Keep the rows inside the query box, as the upstream API would.
fn filter_to_query(mut payload: SnapshotPayload, query: &BoundsQuery) -> SnapshotPayload {
    payload.aircraft.retain(|row| match (row.lat, row.lon) {
        (Some(lat), Some(lon)) => {
            let lat_ok = (query.min_lat..=query.max_lat).contains(&lat);
            let lon_ok = if query.crosses_antimeridian() {
                lon >= query.min_lon || lon <= query.max_lon
            } else {
                (query.min_lon..=query.max_lon).contains(&lon)
            };
            lat_ok && lon_ok
        }
        // Malformed rows pass through; the session drops them.
        _ => true,
    });
    payload
}

async fn serve_feed(
    mut feed: Feed,
    mut requests: mpsc::Receiver<FetchRequest>,
    results: mpsc::Sender<FetchResult>,
    latency: Duration,
) {
    while let Some(request) = requests.recv().await {
        debug!("fetch {} ?{}", request.id.0, request.query.query_string());
        tokio::time::sleep(latency).await;
        let result = feed.fetch(&request.query);
        if results.send((request.id, result)).await.is_err() {
            break;
        }
    }
}

async fn load_replay(path: &Path) -> Result<Vec<SnapshotPayload>, Box<dyn std::error::Error>> {
    let meta = tokio::fs::metadata(path).await?;
    let mut files = Vec::new();
    if meta.is_dir() {
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let p = entry.path();
            if p.extension().is_some_and(|ext| ext == "json") {
                files.push(p);
            }
        }
        files.sort();
    } else {
        files.push(path.to_path_buf());
    }

    let mut snapshots = Vec::new();
    for file in files {
        let bytes = tokio::fs::read(&file).await?;
        match serde_json::from_slice::<Vec<SnapshotPayload>>(&bytes) {
            Ok(many) => snapshots.extend(many),
            Err(_) => snapshots.push(SnapshotPayload::from_json(&bytes)?),
        }
    }
    Ok(snapshots)
}

fn load_config(path: Option<&Path>) -> GlobeConfig {
    let mut config = match path {
        Some(path) => GlobeConfig::load(path).unwrap_or_else(|err| {
            warn!("{err}; using default config");
            GlobeConfig::default()
        }),
        None => GlobeConfig::default(),
    };
    config.apply_env();
    config
}

fn log_event(event: &GlobeEvent) {
    match event {
        GlobeEvent::SnapshotApplied(s) => info!(
            inserted = s.inserted,
            updated = s.updated,
            unchanged = s.unchanged,
            pruned = s.pruned,
            rejected = s.rejected,
            "snapshot applied"
        ),
        GlobeEvent::Deloaded(entity) => debug!(%entity, "deloaded"),
        GlobeEvent::DetailLevelChanged(level) => info!("detail level now {level:?}"),
        GlobeEvent::CameraModeChanged(mode) => info!("camera mode {mode:?}"),
        GlobeEvent::ViewportChanged(b) => debug!(
            "viewport lat {:.1}..{:.1} lon {:.1}..{:.1} zoom {:.2}",
            b.min_lat, b.max_lat, b.min_lon, b.max_lon, b.zoom_level
        ),
        GlobeEvent::Selected(Some(entity)) => info!(%entity, "selected"),
        GlobeEvent::Selected(None) => info!("selection cleared"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !(args.fps.is_finite() && args.fps > 0.0) {
        return Err(format!("--fps must be positive, got {}", args.fps).into());
    }

    let config = load_config(args.config.as_deref());
    let feed = match &args.replay {
        Some(path) => {
            let snapshots = load_replay(path).await?;
            info!("replaying {} snapshots from {}", snapshots.len(), path.display());
            Feed::Replay { snapshots, next: 0 }
        }
        None => {
            info!("no replay given; using {} synthetic aircraft", args.aircraft);
            Feed::Synthetic {
                fleet: SyntheticFleet::new(args.aircraft, config.polling.placeholder_seed),
                started: Instant::now(),
            }
        }
    };

    let (request_tx, request_rx) = mpsc::channel::<FetchRequest>(8);
    let (result_tx, mut result_rx) = mpsc::channel::<FetchResult>(8);
    let feed_task = tokio::spawn(serve_feed(
        feed,
        request_rx,
        result_tx,
        Duration::from_millis(args.latency_ms),
    ));

    let mut session = GlobeSession::new(SystemClock::new(), config);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / args.fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let summary_every = (args.fps.round() as u64).max(1);
    let mut chase_started = false;
    let mut chase_released = false;

    for frame in 0..args.frames {
        ticker.tick().await;

        while let Ok((id, result)) = result_rx.try_recv() {
            match session.complete_fetch(id, result) {
                FetchDisposition::Queued { records, rejected } => {
                    debug!(records, rejected, "fetch {} accepted", id.0)
                }
                FetchDisposition::Placeholder { records } => {
                    info!(records, "showing placeholder traffic")
                }
                FetchDisposition::Failed { retry_in_s } => {
                    debug!("fetch {} failed; retry in {retry_in_s:.1}s", id.0)
                }
                FetchDisposition::Ignored => debug!("fetch {} superseded", id.0),
            }
        }
        while let Some(request) = session.next_fetch() {
            if request_tx.send(request).await.is_err() {
                warn!("feed task stopped");
                break;
            }
        }

        let drawn = session.tick().len();

        if let Some(at) = args.demo_chase_s {
            let t = session.frame().time.0;
            if !chase_started && t >= at {
                chase_started = true;
                session.handle(UiEvent::Input(InputEvent::KeyDown(Key::Left)));
                session.handle(UiEvent::Input(InputEvent::KeyUp(Key::Left)));
            } else if chase_started && !chase_released && t >= at + 10.0 {
                chase_released = true;
                session.handle(UiEvent::Select(None));
            }
        }

        for event in session.drain_events() {
            log_event(&event.payload);
        }

        if frame % summary_every == 0 {
            info!(
                frame,
                aircraft = session.store().aircraft_count(),
                drawn,
                "level {:?}, camera {:?}",
                session.detail_level(),
                session.camera().mode()
            );
        }
    }

    session.shutdown();
    drop(request_tx);
    drop(result_rx);
    let _ = feed_task.await;
    Ok(())
}
