//! End-to-end transfers between in-process backends

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use ds_core::backends::{LocalConnector, MemoryConnector, MemoryStore};
use ds_core::{
    Capabilities, Connection, Connector, Credential, CredentialKind, Error, RangeReader,
    ResourcePath, Result, Session, Sink, Slice, Stat, TransferEngine, UploadCursor,
};

fn mem_session(connector: impl Connector + 'static) -> Session {
    Session::new(
        Arc::new(connector),
        Url::parse("mem://test").unwrap(),
        Credential::Anonymous,
    )
}

/// Wraps a memory backend to inject failures and record appended slices
struct Instrumented {
    inner: MemoryConnector,
    fail_on_read: Option<usize>,
    fail_on_append: Option<usize>,
    appended: Arc<Mutex<Vec<Vec<u8>>>>,
    commits: Arc<AtomicUsize>,
    read_only: bool,
}

impl Instrumented {
    fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            inner: MemoryConnector::new(store),
            fail_on_read: None,
            fail_on_append: None,
            appended: Arc::default(),
            commits: Arc::default(),
            read_only: false,
        }
    }
}

#[async_trait]
impl Connector for Instrumented {
    fn kind(&self) -> &'static str {
        "instrumented"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["inst"]
    }

    async fn connect(&self, uri: &Url, credential: &Credential) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(InstrumentedConnection {
            inner: self.inner.connect(uri, credential).await?,
            fail_on_read: self.fail_on_read,
            fail_on_append: self.fail_on_append,
            appended: self.appended.clone(),
            commits: self.commits.clone(),
            read_only: self.read_only,
        }))
    }
}

struct InstrumentedConnection {
    inner: Arc<dyn Connection>,
    fail_on_read: Option<usize>,
    fail_on_append: Option<usize>,
    appended: Arc<Mutex<Vec<Vec<u8>>>>,
    commits: Arc<AtomicUsize>,
    read_only: bool,
}

#[async_trait]
impl Connection for InstrumentedConnection {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn read_dir(&self, path: &ResourcePath) -> Result<Vec<Stat>> {
        self.inner.read_dir(path).await
    }

    async fn metadata(&self, path: &ResourcePath) -> Result<Stat> {
        self.inner.metadata(path).await
    }

    async fn reader(&self, path: &ResourcePath) -> Result<Box<dyn RangeReader>> {
        Ok(Box::new(FailingReader {
            inner: self.inner.reader(path).await?,
            calls: AtomicUsize::new(0),
            fail_on: self.fail_on_read,
        }))
    }

    async fn writer(&self, path: &ResourcePath) -> Result<Box<dyn Sink>> {
        if self.read_only {
            return Err(Error::unsupported("sink"));
        }
        Ok(Box::new(RecordingSink {
            inner: self.inner.writer(path).await?,
            appended: self.appended.clone(),
            commits: self.commits.clone(),
            calls: 0,
            fail_on: self.fail_on_append,
        }))
    }
}

struct FailingReader {
    inner: Box<dyn RangeReader>,
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

#[async_trait]
impl RangeReader for FailingReader {
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(Error::Network("connection reset".into()));
        }
        self.inner.read_range(offset, len).await
    }
}

struct RecordingSink {
    inner: Box<dyn Sink>,
    appended: Arc<Mutex<Vec<Vec<u8>>>>,
    commits: Arc<AtomicUsize>,
    calls: usize,
    fail_on: Option<usize>,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn open(&mut self) -> Result<String> {
        self.inner.open().await
    }

    async fn append(&mut self, cursor: &UploadCursor, slice: &Slice) -> Result<()> {
        self.calls += 1;
        if self.fail_on == Some(self.calls) {
            return Err(Error::Network("broken pipe".into()));
        }
        self.inner.append(cursor, slice).await?;
        self.appended.lock().unwrap().push(slice.as_bytes().to_vec());
        Ok(())
    }

    async fn commit(&mut self, cursor: &UploadCursor) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(cursor).await
    }
}

#[tokio::test]
async fn transfers_hello_world_in_slices() {
    let source_store = MemoryStore::new();
    source_store.put_file("/a.txt", "hello world").await.unwrap();
    let dest_store = MemoryStore::new();
    let dest = Instrumented::new(dest_store.clone());
    let appended = dest.appended.clone();

    let source = mem_session(MemoryConnector::new(source_store)).select("/a.txt");
    let destination = mem_session(dest).select("/b.txt");

    let report = TransferEngine::new(4)
        .transfer(&source, &destination)
        .await
        .unwrap();

    assert_eq!(report.bytes, 11);
    assert_eq!(report.slices, 3);
    assert_eq!(
        *appended.lock().unwrap(),
        vec![b"hell".to_vec(), b"o wo".to_vec(), b"rld".to_vec()]
    );

    let stat = destination.stat().await.unwrap();
    assert!(stat.is_file());
    assert_eq!(stat.size, 11);
    assert_eq!(
        dest_store.read_file("/b.txt").await.unwrap(),
        Bytes::from_static(b"hello world")
    );
}

#[tokio::test]
async fn read_failure_leaves_destination_unfinished() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello world").await.unwrap();

    let mut source_connector = Instrumented::new(store.clone());
    source_connector.fail_on_read = Some(2);
    let source = mem_session(source_connector).select("/a.txt");
    let destination = mem_session(MemoryConnector::new(store.clone())).select("/b.txt");

    let err = TransferEngine::new(4)
        .transfer(&source, &destination)
        .await
        .unwrap_err();

    match err {
        Error::TransferFailed {
            bytes_transferred,
            source,
        } => {
            assert_eq!(bytes_transferred, 4);
            assert!(matches!(*source, Error::Network(_)));
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
    assert_eq!(store.pending_uploads().await, 1);
    assert!(store.read_file("/b.txt").await.is_none());
}

#[tokio::test]
async fn append_failure_leaves_upload_pending() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello world").await.unwrap();

    let mut dest = Instrumented::new(store.clone());
    dest.fail_on_append = Some(2);
    let appended = dest.appended.clone();
    let commits = dest.commits.clone();

    let source = mem_session(MemoryConnector::new(store.clone())).select("/a.txt");
    let err = TransferEngine::new(4)
        .transfer(&source, &mem_session(dest).select("/b.txt"))
        .await
        .unwrap_err();

    match err {
        Error::TransferFailed {
            bytes_transferred,
            source,
        } => {
            assert_eq!(bytes_transferred, 4);
            assert!(matches!(*source, Error::Network(_)));
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
    assert_eq!(*appended.lock().unwrap(), vec![b"hell".to_vec()]);
    assert_eq!(commits.load(Ordering::SeqCst), 0);
    assert_eq!(store.pending_uploads().await, 1);
    assert!(store.read_file("/b.txt").await.is_none());
}

#[tokio::test]
async fn cancellation_between_slices_stops_the_pump() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello world").await.unwrap();

    let dest = Instrumented::new(store.clone());
    let appended = dest.appended.clone();
    let commits = dest.commits.clone();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let source = mem_session(MemoryConnector::new(store.clone())).select("/a.txt");
    let err = TransferEngine::new(4)
        .with_cancellation(token)
        .on_progress(move |_| trigger.cancel())
        .transfer(&source, &mem_session(dest).select("/b.txt"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { bytes_transferred: 4 }));
    assert_eq!(appended.lock().unwrap().len(), 1);
    assert_eq!(commits.load(Ordering::SeqCst), 0);
    assert_eq!(store.pending_uploads().await, 1);
    assert!(store.read_file("/b.txt").await.is_none());
}

#[tokio::test]
async fn file_onto_existing_directory_is_rejected() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello").await.unwrap();
    store.put_file("/d/x", "1").await.unwrap();
    let session = mem_session(MemoryConnector::new(store.clone()));

    let err = TransferEngine::new(4)
        .transfer(&session.select("/a.txt"), &session.select("/d"))
        .await
        .unwrap_err();

    match err {
        Error::TransferFailed { source, .. } => {
            assert!(matches!(*source, Error::InvalidPath(_)));
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
    assert!(session.select("/d").stat().await.unwrap().is_dir());
    assert_eq!(store.read_file("/d/x").await.unwrap(), Bytes::from_static(b"1"));
}

#[tokio::test]
async fn tree_failure_counts_bytes_of_earlier_files() {
    let store = MemoryStore::new();
    store.put_file("/src/a.txt", "hi").await.unwrap();
    store.put_file("/src/b.txt", "hello world").await.unwrap();

    let mut source_connector = Instrumented::new(store.clone());
    source_connector.fail_on_read = Some(2);
    let source = mem_session(source_connector).select("/src");
    let destination = mem_session(MemoryConnector::new(store.clone())).select("/dst");

    let err = TransferEngine::new(4)
        .transfer_tree(&source, &destination, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransferFailed { .. }));
    assert_eq!(err.bytes_transferred(), Some(6));
    assert!(store.read_file("/dst/a.txt").await.is_some());
    assert!(store.read_file("/dst/b.txt").await.is_none());
}

#[tokio::test]
async fn read_ahead_keeps_slice_order() {
    let store = MemoryStore::new();
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    store.put_file("/big.bin", data.clone()).await.unwrap();

    let mut dest = Instrumented::new(store.clone());
    dest.inner = MemoryConnector::new(store.clone()).with_capabilities(Capabilities {
        parallel_append: true,
    });
    let appended = dest.appended.clone();

    let source = mem_session(MemoryConnector::new(store.clone())).select("/big.bin");
    let destination = mem_session(dest).select("/copy.bin");

    let report = TransferEngine::new(1024)
        .transfer(&source, &destination)
        .await
        .unwrap();

    assert_eq!(report.slices, 10);
    assert_eq!(appended.lock().unwrap().concat(), data);
    assert_eq!(store.read_file("/copy.bin").await.unwrap().to_vec(), data);
}

#[tokio::test]
async fn empty_file_yields_no_slices() {
    let store = MemoryStore::new();
    store.put_file("/empty", Bytes::new()).await.unwrap();
    let session = mem_session(MemoryConnector::new(store.clone()));

    let report = TransferEngine::default()
        .transfer(&session.select("/empty"), &session.select("/copy"))
        .await
        .unwrap();

    assert_eq!(report.slices, 0);
    assert_eq!(report.bytes, 0);
    assert_eq!(store.read_file("/copy").await.unwrap().len(), 0);
}

#[tokio::test]
async fn progress_reports_every_slice() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello world").await.unwrap();
    let session = mem_session(MemoryConnector::new(store));

    let seen = Arc::new(AtomicU64::new(0));
    let counter = seen.clone();
    TransferEngine::new(4)
        .on_progress(move |n| {
            counter.fetch_add(n, Ordering::SeqCst);
        })
        .transfer(&session.select("/a.txt"), &session.select("/b.txt"))
        .await
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn cancelled_engine_stops_before_streaming() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello world").await.unwrap();
    let session = mem_session(MemoryConnector::new(store.clone()));

    let token = CancellationToken::new();
    token.cancel();
    let err = TransferEngine::new(4)
        .with_cancellation(token)
        .transfer(&session.select("/a.txt"), &session.select("/b.txt"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { bytes_transferred: 0 }));
    assert!(store.read_file("/b.txt").await.is_none());
}

#[tokio::test]
async fn unsupported_sink_fails_during_setup() {
    let store = MemoryStore::new();
    store.put_file("/a.txt", "hello").await.unwrap();
    let mut dest = Instrumented::new(store.clone());
    dest.read_only = true;

    let source = mem_session(MemoryConnector::new(store)).select("/a.txt");
    let err = TransferEngine::default()
        .transfer(&source, &mem_session(dest).select("/b.txt"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedOperation(op) if op == "sink"));
}

#[tokio::test]
async fn incompatible_credential_requires_authentication() {
    let connector = MemoryConnector::default().requiring(CredentialKind::OAuthToken);
    let resource = mem_session(connector).select("/a.txt");

    let err = resource.stat().await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired(kind) if kind == "memory"));
}

#[tokio::test]
async fn stat_reports_files_directories_and_missing_paths() {
    let store = MemoryStore::new();
    store.put_file("/docs/a.txt", "abc").await.unwrap();
    store.create_dir("/docs/sub").await.unwrap();
    let session = mem_session(MemoryConnector::new(store));

    let dir = session.select("/docs").stat().await.unwrap();
    assert!(dir.is_dir());
    assert_eq!(dir.time, 0);
    let children = dir.children.unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.time > 0));
    assert!(children.iter().all(|c| c.children.is_none()));

    let file = session.select("/docs/a.txt").stat().await.unwrap();
    assert!(file.is_file());
    assert_eq!(file.size, 3);
    assert!(file.children.is_none());

    let err = session.select("/nope").stat().await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let root = session.root().stat().await.unwrap();
    assert_eq!(root.name, "/");
    assert_eq!(root.children.unwrap().len(), 1);
}

#[tokio::test]
async fn list_is_lazy_and_yields_names() {
    let store = MemoryStore::new();
    store.put_file("/d/x", "1").await.unwrap();
    store.put_file("/d/y", "2").await.unwrap();

    let connector = MemoryConnector::new(store).requiring(CredentialKind::KeyPair);
    let session = mem_session(connector);
    // Building the stream must not touch the backend
    let stream = session.select("/d").list();
    drop(stream);

    let err = session
        .select("/d")
        .list()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired(_)));
}

#[tokio::test]
async fn list_names_in_order() {
    let store = MemoryStore::new();
    store.put_file("/d/x", "1").await.unwrap();
    store.put_file("/d/y", "2").await.unwrap();
    let session = mem_session(MemoryConnector::new(store));

    let names: Vec<String> = session.select("/d").list().try_collect().await.unwrap();
    assert_eq!(names, vec!["x", "y"]);
}

#[tokio::test]
async fn reselect_requires_equivalent_session() {
    let store = MemoryStore::new();
    let session = mem_session(MemoryConnector::new(store.clone()));
    let other = mem_session(MemoryConnector::new(store));
    let resource = session.select("/a/b");

    let moved = resource.reselect_on(&session.clone()).unwrap();
    assert_eq!(moved, resource);

    assert!(matches!(
        resource.reselect_on(&other),
        Err(Error::InvalidReselect)
    ));
}

#[tokio::test]
async fn mkdir_and_delete_round_trip() {
    let store = MemoryStore::new();
    let session = mem_session(MemoryConnector::new(store.clone()));

    let dir = session.select("/new/dir").mkdir().await.unwrap();
    assert_eq!(dir.path().as_str(), "/new/dir");
    assert!(store.exists("/new/dir").await);

    session.select("/new").delete().await.unwrap();
    assert!(!store.exists("/new/dir").await);

    assert!(matches!(
        session.root().delete().await,
        Err(Error::InvalidPath(_))
    ));
}

#[tokio::test]
async fn tree_transfer_respects_depth() {
    let store = MemoryStore::new();
    store.put_file("/src/top.txt", "top").await.unwrap();
    store.put_file("/src/one/mid.txt", "middle").await.unwrap();
    store.put_file("/src/one/two/low.txt", "low").await.unwrap();
    let session = mem_session(MemoryConnector::new(store.clone()));
    let engine = TransferEngine::new(2);

    let report = engine
        .transfer_tree(&session.select("/src"), &session.select("/shallow"), 0)
        .await
        .unwrap();
    assert_eq!(report.files, 1);
    assert!(store.read_file("/shallow/top.txt").await.is_some());
    assert!(!store.exists("/shallow/one").await);

    let report = engine
        .transfer_tree(&session.select("/src"), &session.select("/deep"), 2)
        .await
        .unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(report.directories, 3);
    assert_eq!(report.bytes, 12);
    assert_eq!(
        store.read_file("/deep/one/two/low.txt").await.unwrap(),
        Bytes::from_static(b"low")
    );
}

#[tokio::test]
async fn local_to_memory_and_back() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.txt"), b"hello world").unwrap();

    let local = Session::new(
        Arc::new(LocalConnector::rooted(dir.path())),
        Url::parse("file:///").unwrap(),
        Credential::Anonymous,
    );
    let store = MemoryStore::new();
    let memory = mem_session(MemoryConnector::new(store.clone()));
    let engine = TransferEngine::new(4);

    engine
        .transfer(&local.select("/in.txt"), &memory.select("/mid.txt"))
        .await
        .unwrap();
    assert_eq!(
        store.read_file("/mid.txt").await.unwrap(),
        Bytes::from_static(b"hello world")
    );

    engine
        .transfer(&memory.select("/mid.txt"), &local.select("/out/copy.txt"))
        .await
        .unwrap();
    assert_eq!(
        std::fs::read(dir.path().join("out/copy.txt")).unwrap(),
        b"hello world"
    );
}
