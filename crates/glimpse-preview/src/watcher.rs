//! File watching for live resubmission.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use crate::error::PipelineError;

/// Extensions treated as component sources or generator responses.
pub const SOURCE_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "md", "mdx"];

/// Events emitted by the source watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Source was created or modified
    Changed(PathBuf),

    /// Source was deleted
    Removed(PathBuf),
}

impl SourceEvent {
    pub fn path(&self) -> &Path {
        match self {
            SourceEvent::Changed(path) | SourceEvent::Removed(path) => path,
        }
    }
}

/// Watches source files so edits can be resubmitted.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Watch the given files or directories.
    ///
    /// Returns the watcher and a channel of debounced source events. Events
    /// stop when the watcher is dropped.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<SourceEvent>), PipelineError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })?;

        for path in paths {
            if path.exists() {
                watcher.watch(path, RecursiveMode::Recursive)?;
            }
        }

        std::thread::spawn(move || {
            let debounce = Duration::from_millis(100);
            let mut last_sent: Option<(PathBuf, Instant)> = None;

            while let Ok(event) = sync_rx.recv() {
                for path in event.paths {
                    let Some(source_event) = classify_event(&path, &event.kind) else {
                        continue;
                    };

                    // Editors write a file in several steps; report it once.
                    let now = Instant::now();
                    if let Some((last_path, at)) = &last_sent {
                        if *last_path == path && now.duration_since(*at) < debounce {
                            continue;
                        }
                    }
                    last_sent = Some((path, now));

                    if async_tx.blocking_send(source_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event, ignoring files that are not sources.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<SourceEvent> {
    use notify::EventKind;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !SOURCE_EXTENSIONS.contains(&ext) {
        return None;
    }

    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(SourceEvent::Changed(path.to_path_buf())),
        EventKind::Remove(_) => Some(SourceEvent::Removed(path.to_path_buf())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::EventKind;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_only_sources() {
        let tsx = Path::new("Card.tsx");
        assert_eq!(
            classify_event(tsx, &EventKind::Modify(ModifyKind::Any)),
            Some(SourceEvent::Changed(tsx.to_path_buf()))
        );
        assert_eq!(
            classify_event(tsx, &EventKind::Remove(RemoveKind::File)),
            Some(SourceEvent::Removed(tsx.to_path_buf()))
        );
        assert_eq!(
            classify_event(Path::new("notes.txt"), &EventKind::Create(CreateKind::File)),
            None
        );
    }

    #[tokio::test]
    async fn watches_source_changes() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("Card.tsx");

        let (watcher, mut rx) = SourceWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give the backend time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&source, "const Card = () => <div />;").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for source event");
        let event = event.unwrap().expect("channel should not be closed");
        assert_eq!(event.path().file_name(), source.file_name());
    }
}
