use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

const MEMORY_PATH: &str = ":memory:";

/// Owns the worker thread; the last `Database` clone to drop joins it. Inside
/// a tokio runtime the join runs on the blocking pool so no executor thread
/// waits on SQLite.
struct Worker {
    sender: mpsc::Sender<DbCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        if let Err(err) = self.sender.send(DbCommand::Shutdown) {
            error!("Failed to send shutdown to DB thread: {err}");
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || join_worker(handle));
            }
            Err(_) => join_worker(handle),
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(join_err) = handle.join() {
        error!("Failed to join DB thread: {join_err:?}");
    }
}

/// Handle to the record store. SQLite is only ever touched from one
/// dedicated thread; callers hand it closures and await the result.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        Self::spawn(path)
    }

    /// Throwaway store that lives as long as the handle.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(PathBuf::from(MEMORY_PATH))
    }

    fn spawn(path: PathBuf) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = path.clone();

        let handle = thread::Builder::new()
            .name("mokuso-db".into())
            .spawn(move || match open(&thread_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, command_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                sender: command_tx,
                handle: Mutex::new(Some(handle)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the database thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = DbCommand::Execute(Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("DB caller went away before its result arrived");
            }
        }));

        self.worker
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

fn open(path: &Path) -> Result<Connection> {
    let mut conn = if path == Path::new(MEMORY_PATH) {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    }
    .context("failed to open SQLite database")?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(mut conn: Connection, commands: mpsc::Receiver<DbCommand>) {
    while let Ok(command) = commands.recv() {
        match command {
            DbCommand::Execute(task) => task(&mut conn),
            DbCommand::Shutdown => break,
        }
    }
    info!("Database thread shutting down");
}
