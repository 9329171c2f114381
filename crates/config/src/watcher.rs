use crate::schema::MeterConfig;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Watches the config file and emits the freshly parsed [`MeterConfig`]
/// whenever its contents change.
///
/// Writes that fail to parse are logged and skipped; the previous config
/// stays in effect.
///
/// # Example
/// ```no_run
/// # async fn demo() {
/// let (_watcher, mut rx) = meter_config::ConfigWatcher::spawn(
///     "/home/user/.config/cpumeter/cpumeter.toml",
///     meter_config::MeterConfig::default(),
/// );
/// while let Some(cfg) = rx.recv().await {
///     println!("interval is now {} ms", cfg.interval_ms);
/// }
/// # }
/// ```
pub struct ConfigWatcher {
    path: PathBuf,
}

impl ConfigWatcher {
    /// Spawn a filesystem watcher for `path`, seeded with the config already
    /// in use so identical reloads are not reported.
    pub fn spawn(
        path: impl AsRef<Path>,
        current: MeterConfig,
    ) -> (Self, mpsc::Receiver<MeterConfig>) {
        let (tx, rx) = mpsc::channel(1);
        let path = path.as_ref().to_path_buf();
        let watcher = Self { path: path.clone() };

        tokio::spawn(watch_loop(path, current, tx));

        (watcher, rx)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn watch_loop(path: PathBuf, mut current: MeterConfig, tx: mpsc::Sender<MeterConfig>) {
    use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
    use std::time::Duration;

    let (sync_tx, mut sync_rx) = mpsc::channel::<notify::Result<Event>>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = sync_tx.blocking_send(res);
        },
        Config::default().with_poll_interval(Duration::from_secs(2)),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create filesystem watcher: {e}");
            return;
        }
    };

    if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        error!("Failed to watch '{}': {e}", path.display());
        return;
    }

    info!("Watching config file: {}", path.display());

    while let Some(event) = sync_rx.recv().await {
        let event = match event {
            Ok(e) => e,
            Err(e) => {
                warn!("Watcher error: {e}");
                continue;
            }
        };

        use notify::EventKind::*;
        if !matches!(event.kind, Modify(_) | Create(_)) {
            continue;
        }

        match crate::load(&path) {
            Ok(cfg) if cfg == current => debug!("Config rewritten without changes"),
            Ok(cfg) => {
                current = cfg.clone();
                if tx.send(cfg).await.is_err() {
                    break; // receiver dropped
                }
            }
            Err(e) => warn!("Ignoring config change: {e}"),
        }
    }
}
