use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

/// Events closer together than this collapse into one reload.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches the directory of the config file and reports changes to the file.
///
/// The directory is watched rather than the file so editors that save by
/// replacing the file keep triggering reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    // Dropping the watcher stops the notifications.
    _watcher: RecommendedWatcher,
    events: UnboundedReceiver<()>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> notify::Result<Self> {
        let file_name = path.file_name().map(OsString::from);
        let watch_path = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, events) = unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event, file_name.as_deref()) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Config watcher error: {}", e),
            })?;
        watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;

        log::info!("Watching {} for changes", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            events,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next change, swallowing the burst of events that follows
    /// it. Returns `None` once the watcher has shut down.
    pub async fn changed(&mut self) -> Option<()> {
        self.events.recv().await?;
        while let Ok(Some(())) = tokio::time::timeout(DEBOUNCE, self.events.recv()).await {}
        Some(())
    }
}

/// Create, modify and remove events that touch the config file.
fn is_relevant(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches
        && event
            .paths
            .iter()
            .any(|path| file_name.is_some_and(|name| path.file_name() == Some(name)))
}
