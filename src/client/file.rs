//! Directory-tree client driven by filesystem notifications.

use super::Client;
use crate::context::Context;
use crate::core::DEFAULT_NAMESPACE;
use crate::error::{Result, SentinelError};
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// File extensions recognised as key files, in lookup order.
const EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

/// A registered watcher and the stream it feeds.
struct WatchStream {
    _watcher: RecommendedWatcher,
    tx: mpsc::UnboundedSender<String>,
}

/// Client that treats a directory tree as the key/value store.
///
/// The context for path `["sentinel", "web"]` lives in
/// `<root>/sentinel/web.yaml` (or `.yml`, `.toml`, `.json`). Creating,
/// modifying or removing a key file directly under `<root>/<namespace>`
/// emits its file stem as the changed key; files anywhere else are ignored.
/// Bursts of events for the same key are coalesced over a trailing debounce
/// window.
///
/// # Examples
///
/// ```rust,no_run
/// use keyward::client::{Client, FileClient};
/// use std::time::Duration;
///
/// # async fn example() -> keyward::Result<()> {
/// let client = FileClient::new("/etc/keyward")
///     .with_namespace("deploy")
///     .with_debounce(Duration::from_millis(200));
/// let mut changes = client.watch()?;
///
/// while let Some(key) = changes.recv().await {
///     let context = client.fetch(&["deploy", &key]).await?;
///     println!("{} changed: {:?}", key, context);
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileClient {
    root: PathBuf,
    namespace: String,
    debounce: Duration,
    watchers: Mutex<Vec<WatchStream>>,
}

impl FileClient {
    /// Create a client rooted at `root` with the default namespace and a
    /// 100ms debounce window.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            debounce: Duration::from_millis(100),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Set the namespace directory whose key files are watched.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the debounce window used to coalesce bursts of file events.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// The root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The watched namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the debounce window.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce
    }

    /// Number of watchers whose stream is still open.
    pub fn watcher_count(&self) -> usize {
        let mut watchers = self.watchers.lock();
        watchers.retain(|stream| !stream.tx.is_closed());
        watchers.len()
    }

    /// Stop every active watcher, ending their change streams.
    pub fn close(&self) {
        self.watchers.lock().clear();
    }
}

/// Locate the key file for `path` under `root`, if one exists.
fn resolve(root: &Path, path: &[String]) -> Result<Option<PathBuf>> {
    let (last, parents) = path
        .split_last()
        .ok_or_else(|| SentinelError::InvalidPath("cannot fetch an empty path".to_string()))?;

    for segment in path {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains(['/', '\\']) {
            return Err(SentinelError::InvalidPath(format!(
                "unsupported path segment '{}'",
                segment
            )));
        }
    }

    let mut dir = root.to_path_buf();
    for segment in parents {
        dir.push(segment);
    }

    Ok(EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", last, ext)))
        .find(|candidate| candidate.is_file()))
}

/// Map a filesystem path to the key it stores, if it is a key file.
fn key_for(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !EXTENSIONS.contains(&extension) {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

/// Map a path to its key only when it sits directly in one of `dirs`.
fn namespaced_key(path: &Path, dirs: &[PathBuf]) -> Option<String> {
    let parent = path.parent()?;
    if !dirs.iter().any(|dir| dir == parent) {
        return None;
    }
    key_for(path)
}

/// Load a key file into a context, keeping keys exactly as written.
fn load_file(path: &Path) -> Result<Context> {
    let contents = std::fs::read_to_string(path)?;
    let parse_error =
        |e: &dyn std::fmt::Display| SentinelError::ParseError(format!("Failed to parse {}: {}", path.display(), e));

    let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str::<Option<Value>>(&contents)
                .map_err(|e| parse_error(&e))?
                .unwrap_or_else(|| Value::Object(Map::new()))
        }
        Some("toml") => toml::from_str(&contents).map_err(|e| parse_error(&e))?,
        Some("json") => serde_json::from_str(&contents).map_err(|e| parse_error(&e))?,
        _ => {
            return Err(SentinelError::LoadError(format!(
                "Unsupported file format: {}",
                path.display()
            )));
        }
    };

    Context::try_from(value)
}

#[async_trait]
impl Client for FileClient {
    fn watch(&self) -> Result<mpsc::UnboundedReceiver<String>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SentinelError::Watch(format!("No tokio runtime available: {}", e)))?;

        // Events may report the path as given or canonicalized
        let namespace_dir = self.root.join(&self.namespace);
        let mut dirs = vec![namespace_dir.clone()];
        if let Ok(canonical) = std::fs::canonicalize(&self.root) {
            let canonical = canonical.join(&self.namespace);
            if canonical != namespace_dir {
                dirs.push(canonical);
            }
        }

        // Raw keys straight from the notify callback
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<String>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    for key in event.paths.iter().filter_map(|p| namespaced_key(p, &dirs)) {
                        let _ = raw_tx.send(key);
                    }
                }
            }
            Err(e) => warn!(error = %e, "file watcher error"),
        })
        .map_err(|e| SentinelError::Watch(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| {
                SentinelError::Watch(format!("Failed to watch {}: {}", self.root.display(), e))
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut watchers = self.watchers.lock();
            watchers.retain(|stream| !stream.tx.is_closed());
            watchers.push(WatchStream {
                _watcher: watcher,
                tx: tx.clone(),
            });
        }
        let debounce = self.debounce;

        // Coalesce bursts per key and forward them once the window closes
        runtime.spawn(async move {
            loop {
                let first = tokio::select! {
                    biased;
                    _ = tx.closed() => return,
                    first = raw_rx.recv() => match first {
                        Some(key) => key,
                        None => return,
                    },
                };

                let mut pending = vec![first];
                let window = sleep(debounce);
                tokio::pin!(window);

                let mut closed = false;
                loop {
                    tokio::select! {
                        _ = &mut window => break,
                        next = raw_rx.recv() => match next {
                            Some(key) => {
                                if !pending.contains(&key) {
                                    pending.push(key);
                                }
                            }
                            None => {
                                closed = true;
                                break;
                            }
                        },
                    }
                }

                for key in pending {
                    debug!(key = %key, "key file changed");
                    if tx.send(key).is_err() {
                        return;
                    }
                }
                if closed {
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn fetch(&self, path: &[&str]) -> Result<Option<Context>> {
        let root = self.root.clone();
        let path: Vec<String> = path.iter().map(|segment| segment.to_string()).collect();

        tokio::task::spawn_blocking(move || match resolve(&root, &path)? {
            Some(file) => load_file(&file).map(Some),
            None => Ok(None),
        })
        .await
        .map_err(|e| SentinelError::LoadError(format!("Fetch task failed: {}", e)))?
    }

    fn name(&self) -> String {
        format!("file:{}", self.root.join(&self.namespace).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn store() -> (TempDir, FileClient) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sentinel")).unwrap();
        let client = FileClient::new(temp_dir.path()).with_debounce(Duration::from_millis(50));
        (temp_dir, client)
    }

    #[test]
    fn test_key_for() {
        assert_eq!(key_for(Path::new("/tmp/a/web.yaml")), Some("web".to_string()));
        assert_eq!(key_for(Path::new("db.json")), Some("db".to_string()));
        assert_eq!(key_for(Path::new("/tmp/.web.yaml.swp")), None);
        assert_eq!(key_for(Path::new("/tmp/README")), None);
    }

    #[test]
    fn test_namespaced_key() {
        let dirs = vec![PathBuf::from("/store/sentinel")];
        assert_eq!(
            namespaced_key(Path::new("/store/sentinel/web.yaml"), &dirs),
            Some("web".to_string())
        );
        assert_eq!(namespaced_key(Path::new("/store/unrelated/web.yaml"), &dirs), None);
        assert_eq!(namespaced_key(Path::new("/store/sentinel/nested/web.yaml"), &dirs), None);
        assert_eq!(namespaced_key(Path::new("/store/keyward.yaml"), &dirs), None);
        assert_eq!(namespaced_key(Path::new("/store/sentinel/notes.txt"), &dirs), None);
    }

    #[tokio::test]
    async fn test_fetch_yaml() {
        let (temp_dir, client) = store();
        fs::write(
            temp_dir.path().join("sentinel/web.yaml"),
            "port: 8080\nupstream:\n  host: backend\n",
        )
        .unwrap();

        let context = client.fetch(&["sentinel", "web"]).await.unwrap().unwrap();
        assert_eq!(context.get("port"), Some(&json!(8080)));
        assert_eq!(context.lookup(&["upstream", "host"]), Some(&json!("backend")));
    }

    #[tokio::test]
    async fn test_fetch_json() {
        let (temp_dir, client) = store();
        fs::write(temp_dir.path().join("sentinel/db.json"), r#"{"replicas": 2}"#).unwrap();

        let context = client.fetch(&["sentinel", "db"]).await.unwrap().unwrap();
        assert_eq!(context.get("replicas"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_fetch_keeps_key_case() {
        let (temp_dir, client) = store();
        fs::write(
            temp_dir.path().join("sentinel/web.yaml"),
            "maxConnections: 5\nUpstream:\n  hostName: backend\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("sentinel/db.toml"),
            "poolSize = 4\n[Primary]\nHost = \"db1\"\n",
        )
        .unwrap();

        let web = client.fetch(&["sentinel", "web"]).await.unwrap().unwrap();
        assert_eq!(web.get("maxConnections"), Some(&json!(5)));
        assert_eq!(web.lookup(&["Upstream", "hostName"]), Some(&json!("backend")));
        assert!(web.get("maxconnections").is_none());

        let db = client.fetch(&["sentinel", "db"]).await.unwrap().unwrap();
        assert_eq!(db.get("poolSize"), Some(&json!(4)));
        assert_eq!(db.lookup(&["Primary", "Host"]), Some(&json!("db1")));
    }

    #[tokio::test]
    async fn test_fetch_empty_yaml() {
        let (temp_dir, client) = store();
        fs::write(temp_dir.path().join("sentinel/web.yaml"), "").unwrap();

        let context = client.fetch(&["sentinel", "web"]).await.unwrap().unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_object_root() {
        let (temp_dir, client) = store();
        fs::write(temp_dir.path().join("sentinel/list.json"), "[1, 2]").unwrap();
        assert!(client.fetch(&["sentinel", "list"]).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let (_temp_dir, client) = store();
        assert!(client.fetch(&["sentinel", "nope"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_rejects_traversal() {
        let (_temp_dir, client) = store();
        assert!(client.fetch(&["..", "etc"]).await.is_err());
        assert!(client.fetch(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_malformed_file() {
        let (temp_dir, client) = store();
        fs::write(temp_dir.path().join("sentinel/bad.json"), "{ not json").unwrap();
        assert!(client.fetch(&["sentinel", "bad"]).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_emits_changed_key() {
        let (temp_dir, client) = store();
        let mut changes = client.watch().unwrap();

        let path = temp_dir.path().join("sentinel/web.yaml");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&path, "port: 9090").unwrap();
        });

        let key = timeout(Duration::from_secs(2), changes.recv()).await.unwrap();
        assert_eq!(key.as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn test_watch_ignores_files_outside_namespace() {
        let (temp_dir, client) = store();
        fs::create_dir_all(temp_dir.path().join("unrelated")).unwrap();
        fs::create_dir_all(temp_dir.path().join("sentinel/nested")).unwrap();
        let mut changes = client.watch().unwrap();

        let root = temp_dir.path().to_path_buf();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(root.join("unrelated/web.yaml"), "port: 1").unwrap();
            fs::write(root.join("sentinel/nested/web.yaml"), "port: 2").unwrap();
            fs::write(root.join("keyward.yaml"), "namespace: sentinel").unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            fs::write(root.join("sentinel/db.json"), r#"{"replicas": 1}"#).unwrap();
        });

        // The first key to arrive must be the one written inside the namespace
        let key = timeout(Duration::from_secs(2), changes.recv()).await.unwrap();
        assert_eq!(key.as_deref(), Some("db"));
    }

    #[tokio::test]
    async fn test_watch_custom_namespace() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("deploy")).unwrap();
        fs::create_dir_all(temp_dir.path().join("sentinel")).unwrap();
        let client = FileClient::new(temp_dir.path())
            .with_namespace("deploy")
            .with_debounce(Duration::from_millis(20));
        assert_eq!(client.namespace(), "deploy");
        let mut changes = client.watch().unwrap();

        let root = temp_dir.path().to_path_buf();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(root.join("sentinel/web.yaml"), "port: 1").unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            fs::write(root.join("deploy/api.yaml"), "port: 2").unwrap();
        });

        let key = timeout(Duration::from_secs(2), changes.recv()).await.unwrap();
        assert_eq!(key.as_deref(), Some("api"));
    }

    #[tokio::test]
    async fn test_dropped_stream_prunes_watcher() {
        let (_temp_dir, client) = store();
        let first = client.watch().unwrap();
        let _second = client.watch().unwrap();
        assert_eq!(client.watcher_count(), 2);

        drop(first);
        assert_eq!(client.watcher_count(), 1);

        let _third = client.watch().unwrap();
        assert_eq!(client.watcher_count(), 2);
    }

    #[tokio::test]
    async fn test_watch_missing_root() {
        let client = FileClient::new("/nonexistent/keyward/root");
        assert!(client.watch().is_err());
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (_temp_dir, client) = store();
        let mut changes = client.watch().unwrap();
        client.close();

        let next = timeout(Duration::from_secs(2), changes.recv()).await.unwrap();
        assert!(next.is_none());
    }
}
