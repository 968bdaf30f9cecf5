use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use geometry::{Feature, FeatureId, Geometry, Position, Viewport, boundary_clip};
use history::{FileSnapshotSink, HistoryError, HistoryStore, PersistError};
use polyedit::{ConfigError, Editor, EditorConfig, EditorError, ImportError, ShakeAnimation, parse_features, to_feature_collection};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid GeoJSON: {0}")]
    Import(#[from] ImportError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("invalid cut line: {0}")]
    Line(serde_json::Error),
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feature {0:?} not found")]
    MissingFeature(FeatureId),
    #[error("missing snapshot path; pass --snapshot-path or set POLYEDIT_SNAPSHOT_PATH")]
    MissingSnapshotPath,
    #[error("no history snapshot at {0}")]
    MissingSnapshot(PathBuf),
}

#[derive(Parser, Debug)]
#[command(name = "polyedit", about = "Polygon editing operations over GeoJSON files")]
struct Cli {
    #[arg(long, env = "POLYEDIT_SNAP_THRESHOLD_PX")]
    snap_threshold_px: Option<String>,

    #[arg(long, env = "POLYEDIT_SHAKE_THRESHOLD_PX")]
    shake_threshold_px: Option<String>,

    #[arg(long, env = "POLYEDIT_SHAKE_STEPS")]
    shake_steps: Option<String>,

    #[arg(long, env = "POLYEDIT_SHAKE_INTERVAL_MS")]
    shake_interval_ms: Option<String>,

    /// Durable history file; operations are recorded into it when set.
    #[arg(long, env = "POLYEDIT_SNAPSHOT_PATH")]
    snapshot_path: Option<PathBuf>,

    /// Pixels per degree used for pixel-space snapping.
    #[arg(long, default_value_t = 10_000.0)]
    zoom: f64,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> Result<EditorConfig, ConfigError> {
        EditorConfig::from_lookup(|key| match key {
            "POLYEDIT_SNAP_THRESHOLD_PX" => self.snap_threshold_px.clone(),
            "POLYEDIT_SHAKE_THRESHOLD_PX" => self.shake_threshold_px.clone(),
            "POLYEDIT_SHAKE_STEPS" => self.shake_steps.clone(),
            "POLYEDIT_SHAKE_INTERVAL_MS" => self.shake_interval_ms.clone(),
            "POLYEDIT_SNAPSHOT_PATH" => self.snapshot_path.as_ref().map(|p| p.display().to_string()),
            _ => None,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clip every feature to a boundary; features left empty are dropped.
    Clip {
        input: PathBuf,
        #[arg(long)]
        boundary: PathBuf,
    },
    /// Split one feature along a polyline given as `[[lng,lat],...]`.
    Split {
        input: PathBuf,
        #[arg(long)]
        id: FeatureId,
        #[arg(long)]
        line: String,
    },
    /// Merge features into one; all of them when no ids are given.
    Merge {
        input: PathBuf,
        #[arg(long, value_delimiter = ',')]
        ids: Vec<FeatureId>,
    },
    /// Snap one feature to its neighbours, animating the move.
    Shake {
        input: PathBuf,
        #[arg(long)]
        id: FeatureId,
    },
    /// Print the unsaved changes recorded in the history snapshot.
    State,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let config = cli.config()?;
    info!(
        snap_threshold_px = config.snap_threshold_px,
        shake_threshold_px = config.shake_threshold_px,
        snapshot = config.snapshot_path.is_some(),
        "polyedit configured"
    );
    let viewport = Viewport { zoom: cli.zoom, ..Viewport::default() };

    match cli.command {
        Command::Clip { input, boundary } => run_clip(&input, &boundary),
        Command::Split { input, id, line } => run_split(config, &input, id, &line),
        Command::Merge { input, ids } => run_merge(config, &input, ids),
        Command::Shake { input, id } => run_shake(config, &viewport, &input, id).await,
        Command::State => run_state(&config),
    }
}

fn run_clip(input: &Path, boundary: &Path) -> Result<(), CliError> {
    let features = read_features(input)?;
    let fence = Geometry::new(
        read_features(boundary)?
            .into_iter()
            .filter_map(|f| f.geometry)
            .flat_map(|g| g.coordinates)
            .collect(),
    );

    let clipped: Vec<Feature> =
        features.iter().map(|f| boundary_clip(f, Some(&fence))).filter(Feature::has_geometry).collect();
    if clipped.len() < features.len() {
        info!(dropped = features.len() - clipped.len(), "features outside the boundary dropped");
    }
    print_json(&to_feature_collection(&clipped))
}

fn run_split(config: EditorConfig, input: &Path, id: FeatureId, line: &str) -> Result<(), CliError> {
    let line: Vec<Position> = serde_json::from_str(line).map_err(CliError::Line)?;
    let mut editor = open_editor(config, input)?;
    select_one(&mut editor, id)?;
    if editor.split_selected(&line)?.is_none() {
        warn!("cut line does not split the feature");
    }
    editor.clear_selection();
    print_json(&editor.export())
}

fn run_merge(config: EditorConfig, input: &Path, ids: Vec<FeatureId>) -> Result<(), CliError> {
    let mut editor = open_editor(config, input)?;
    let ids = if ids.is_empty() { editor.layer().ids().cloned().collect() } else { ids };
    if let Some(missing) = ids.iter().find(|id| !editor.layer().contains(id)) {
        return Err(CliError::MissingFeature(missing.clone()));
    }
    editor.select(&ids);
    if editor.merge_selected()?.is_none() {
        warn!("selected features produced no geometry");
    }
    editor.clear_selection();
    print_json(&editor.export())
}

async fn run_shake(config: EditorConfig, viewport: &Viewport, input: &Path, id: FeatureId) -> Result<(), CliError> {
    let animation = ShakeAnimation::from_config(&config);
    let mut editor = open_editor(config, input)?;
    select_one(&mut editor, id)?;

    let Some((original, snapped)) = editor.plan_shake(viewport)?.into_iter().next() else {
        warn!("nothing within the shake threshold");
        editor.clear_selection();
        return print_json(&editor.export());
    };

    let (preview, _frames) = watch::channel(original.clone());
    let (_cancel, mut cancelled) = watch::channel(false);
    if let Some(shaken) = animation.run(viewport, &original, &snapped, &preview, &mut cancelled).await {
        editor.apply_shake(shaken)?;
    }
    editor.clear_selection();
    print_json(&editor.export())
}

fn run_state(config: &EditorConfig) -> Result<(), CliError> {
    let path = config.snapshot_path.clone().ok_or(CliError::MissingSnapshotPath)?;
    let sink = FileSnapshotSink::new(&path);
    let snapshot = sink.load()?.ok_or(CliError::MissingSnapshot(path))?;
    let store = HistoryStore::restore(snapshot)?;
    print_json(&serde_json::to_value(store.current_state()?)?)
}

fn open_editor(config: EditorConfig, input: &Path) -> Result<Editor, CliError> {
    let features = read_features(input)?;
    let mut editor = Editor::open(config)?;
    editor.load(features, false)?;
    Ok(editor)
}

fn select_one(editor: &mut Editor, id: FeatureId) -> Result<(), CliError> {
    if !editor.layer().contains(&id) {
        return Err(CliError::MissingFeature(id));
    }
    editor.select(&[id]);
    Ok(())
}

fn read_features(path: &Path) -> Result<Vec<Feature>, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_owned(), source })?;
    Ok(parse_features(&text)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
