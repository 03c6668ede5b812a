//! # Connection Pool
//!
//! Purpose: Bound how many server connections are borrowed at once and reuse
//! healthy ones across borrowers, from threads or from async tasks.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Idle connections sit in a lock-free queue and
//!    are created lazily when none is idle.
//! 2. **Single Gate**: One semaphore permit per borrowed connection. The
//!    permit lives in the guard and is released on every exit path.
//! 3. **Return Or Dispose**: A guard puts its connection back only when it is
//!    open, not poisoned and not mid-pipeline; otherwise it is closed.
//! 4. **No Blocked Workers**: The async acquire awaits the semaphore and
//!    moves blocking socket work onto the blocking thread pool.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use respool_proto::ReadLimits;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, trace};

use crate::config::{ClientConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS};
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Connector, TcpConnector};

const POOL_CLOSED: &str = "connection pool is closed";

/// Pool bounds and the per-connection setup applied to new connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum connections borrowed at once.
    pub max_connections: usize,
    /// Default wait bound for `acquire` / `acquire_async`.
    pub acquire_timeout: Duration,
    /// Sent with AUTH once on every new connection.
    pub password: Option<String>,
    /// Decoder limits for every connection.
    pub limits: ReadLimits,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            password: None,
            limits: ReadLimits::default(),
        }
    }
}

impl From<&ClientConfig> for PoolConfig {
    fn from(config: &ClientConfig) -> Self {
        PoolConfig {
            max_connections: config.max_connections,
            acquire_timeout: config.acquire_timeout,
            password: config.password.clone(),
            limits: config.read_limits(),
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    connector: Box<dyn Connector>,
    permits: Arc<Semaphore>,
    idle_tx: Sender<Connection>,
    idle_rx: Receiver<Connection>,
    // Wakes blocking acquirers when a permit is released.
    released: Mutex<()>,
    released_cv: Condvar,
    closed: AtomicBool,
    created: AtomicUsize,
}

/// Bounded pool of server connections.
///
/// Cheap to clone; every clone shares the same permits and idle set.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a TCP-backed pool from a client configuration.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        ConnectionPool::with_connector(PoolConfig::from(config), TcpConnector::from_config(config))
    }

    /// Creates a pool that opens connections through `connector`.
    pub fn with_connector(
        config: PoolConfig,
        connector: impl Connector + 'static,
    ) -> ClientResult<Self> {
        if config.max_connections == 0 {
            return Err(ClientError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if config.max_connections > Semaphore::MAX_PERMITS {
            return Err(ClientError::InvalidConfig(format!(
                "max_connections must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        let (idle_tx, idle_rx) = crossbeam_channel::unbounded();
        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.max_connections)),
                config,
                connector: Box::new(connector),
                idle_tx,
                idle_rx,
                released: Mutex::new(()),
                released_cv: Condvar::new(),
                closed: AtomicBool::new(false),
                created: AtomicUsize::new(0),
            }),
        })
    }

    /// Borrows a connection, waiting up to the configured acquire timeout.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        self.acquire_timeout(self.inner.config.acquire_timeout)
    }

    /// Borrows a connection, waiting up to `timeout` for a free permit.
    ///
    /// Fails with `ClientError::PoolExhausted` on timeout, leaving the pool
    /// untouched.
    pub fn acquire_timeout(&self, timeout: Duration) -> ClientResult<PooledConnection> {
        let permit = self.wait_for_permit(timeout)?;
        self.checkout(permit)
    }

    /// Async variant of [`ConnectionPool::acquire`].
    pub async fn acquire_async(&self) -> ClientResult<PooledConnection> {
        self.acquire_async_timeout(self.inner.config.acquire_timeout)
            .await
    }

    /// Async variant of [`ConnectionPool::acquire_timeout`]. Waiting for a
    /// permit suspends the task; connecting runs on the blocking pool.
    pub async fn acquire_async_timeout(&self, timeout: Duration) -> ClientResult<PooledConnection> {
        let permit = self.wait_for_permit_async(timeout).await?;
        let pool = self.clone();
        match tokio::task::spawn_blocking(move || pool.checkout(permit)).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(ClientError::Cancelled),
        }
    }

    /// Runs `op` on a borrowed connection and gives the connection back.
    ///
    /// The permit is released however `op` exits, including by panic. The
    /// connection rejoins the idle set only if it is still healthy.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<ClientError>,
    {
        let mut conn = self.acquire()?;
        op(&mut conn)
    }

    /// Async variant of [`ConnectionPool::run`]. `op` runs on the blocking
    /// thread pool; a panic inside it resumes on the awaiting task.
    pub async fn run_async<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<ClientError> + Send + 'static,
    {
        let permit = self
            .wait_for_permit_async(self.inner.config.acquire_timeout)
            .await?;
        let pool = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = pool.checkout(permit)?;
            op(&mut conn)
        });
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(ClientError::Cancelled.into()),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.inner.config.max_connections
    }

    /// Connections currently waiting in the idle set.
    pub fn idle_count(&self) -> usize {
        self.inner.idle_rx.len()
    }

    /// Permits currently held by borrowers.
    pub fn in_use(&self) -> usize {
        self.inner.config.max_connections - self.inner.permits.available_permits()
    }

    /// Connections opened over the pool's lifetime.
    pub fn created_count(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stops handing out connections and closes every idle one.
    ///
    /// Borrowed connections are left alone and closed when returned.
    /// Pending and future acquires fail with `ClientError::ConnectionState`.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();
        let disposed = self.inner.drain_idle();
        {
            let _guard = lock(&self.inner.released);
            self.inner.released_cv.notify_all();
        }
        info!(disposed, "Connection pool closed");
    }

    /// Blocks until a permit frees up. A timeout too large to express as an
    /// `Instant` waits without a deadline.
    fn wait_for_permit(&self, timeout: Duration) -> ClientResult<OwnedSemaphorePermit> {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = lock(&self.inner.released);
        loop {
            match self.inner.permits.clone().try_acquire_owned() {
                Ok(permit) => return Ok(permit),
                Err(TryAcquireError::Closed) => return Err(ClientError::ConnectionState(POOL_CLOSED)),
                Err(TryAcquireError::NoPermits) => {}
            }
            let cv = &self.inner.released_cv;
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(in_use = self.in_use(), "Timed out waiting for a pooled connection");
                        return Err(ClientError::PoolExhausted(timeout));
                    }
                    cv.wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => cv.wait(guard).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    async fn wait_for_permit_async(&self, timeout: Duration) -> ClientResult<OwnedSemaphorePermit> {
        let acquire = self.inner.permits.clone().acquire_owned();
        match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ClientError::ConnectionState(POOL_CLOSED)),
            Err(_) => {
                debug!(in_use = self.in_use(), "Timed out waiting for a pooled connection");
                Err(ClientError::PoolExhausted(timeout))
            }
        }
    }

    /// Turns a permit into a ready connection: an idle one if available,
    /// otherwise a freshly opened and authenticated one.
    fn checkout(&self, permit: OwnedSemaphorePermit) -> ClientResult<PooledConnection> {
        let permit = PermitGuard {
            pool: self.inner.clone(),
            permit: Some(permit),
        };
        let conn = match self.inner.pop_idle() {
            Some(conn) => {
                trace!(conn_id = conn.id(), "Reusing idle connection");
                conn
            }
            None => self.inner.open_connection()?,
        };
        Ok(PooledConnection {
            pool: self.inner.clone(),
            conn,
            discard: false,
            _permit: permit,
        })
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.max_connections())
            .field("in_use", &self.in_use())
            .field("idle", &self.idle_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PoolInner {
    fn pop_idle(&self) -> Option<Connection> {
        while let Ok(conn) = self.idle_rx.try_recv() {
            if conn.is_reusable() {
                return Some(conn);
            }
        }
        None
    }

    fn open_connection(&self) -> ClientResult<Connection> {
        let transport = self.connector.connect()?;
        let mut conn = Connection::with_transport(transport, self.config.limits);
        if let Some(password) = &self.config.password {
            conn.auth(password)?;
        }
        let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(conn_id = conn.id(), created, "Opened pooled connection");
        Ok(conn)
    }

    fn give_back(&self, conn: Connection) {
        trace!(conn_id = conn.id(), "Returning connection to idle set");
        if let Err(err) = self.idle_tx.send(conn) {
            drop(err.into_inner());
        }
        // A concurrent close may have drained the idle set before the send.
        if self.closed.load(Ordering::Acquire) {
            self.drain_idle();
        }
    }

    fn drain_idle(&self) -> usize {
        let mut disposed = 0;
        while let Ok(mut conn) = self.idle_rx.try_recv() {
            if let Err(err) = conn.close() {
                debug!(conn_id = conn.id(), "Error closing idle connection: {}", err);
            }
            disposed += 1;
        }
        disposed
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.permits.close();
        self.drain_idle();
    }
}

/// Semaphore permit that also wakes blocking acquirers when released.
struct PermitGuard {
    pool: Arc<PoolInner>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        drop(self.permit.take());
        let _guard = lock(&self.pool.released);
        self.pool.released_cv.notify_all();
    }
}

/// Exclusive borrow of a pooled connection.
///
/// Derefs to [`Connection`]. On drop the connection is returned to the idle
/// set or closed, then the permit is released.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Connection,
    discard: bool,
    // Declared last so it drops after the connection has been handed back.
    _permit: PermitGuard,
}

impl PooledConnection {
    /// Closes the connection on drop instead of returning it.
    pub fn discard(&mut self) {
        self.discard = true;
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = std::mem::take(&mut self.conn);
        let keep = !self.discard
            && !thread::panicking()
            && conn.is_reusable()
            && !self.pool.closed.load(Ordering::Acquire);

        if keep {
            self.pool.give_back(conn);
        } else {
            debug!(
                conn_id = conn.id(),
                broken = conn.is_broken(),
                pipelining = conn.is_pipelining(),
                "Disposing pooled connection"
            );
            drop(conn);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("discard", &self.discard)
            .finish()
    }
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::mpsc;

    use crate::commands;
    use crate::transport::mock::MockStream;
    use crate::transport::Transport;

    fn config(max: usize) -> PoolConfig {
        PoolConfig {
            max_connections: max,
            acquire_timeout: Duration::from_secs(5),
            ..PoolConfig::default()
        }
    }

    /// Pool whose n-th connection (from 0) replays `script(n)`.
    fn scripted_pool<S>(max: usize, script: S) -> ConnectionPool
    where
        S: Fn(usize) -> String + Send + Sync + 'static,
    {
        let opened = AtomicUsize::new(0);
        let connector = move || -> io::Result<Box<dyn Transport>> {
            let n = opened.fetch_add(1, Ordering::SeqCst);
            let (stream, _) = MockStream::new(script(n));
            Ok(Box::new(stream))
        };
        ConnectionPool::with_connector(config(max), connector).unwrap()
    }

    fn pongs(_: usize) -> String {
        "+PONG\r\n".repeat(1000)
    }

    #[derive(Debug)]
    enum AppError {
        Client(ClientError),
        Rejected,
    }

    impl From<ClientError> for AppError {
        fn from(err: ClientError) -> Self {
            AppError::Client(err)
        }
    }

    #[test]
    fn rejects_zero_capacity() {
        let connector = || -> io::Result<Box<dyn Transport>> {
            Err(io::Error::new(io::ErrorKind::Other, "unused"))
        };
        assert!(matches!(
            ConnectionPool::with_connector(config(0), connector),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn reuses_healthy_connections() {
        let pool = scripted_pool(2, pongs);
        for _ in 0..10 {
            let pong: String = pool.run(|conn| conn.execute(&commands::ping())).unwrap();
            assert_eq!(pong, "PONG");
        }
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn never_exceeds_max_connections() {
        const MAX: usize = 3;
        let pool = scripted_pool(MAX, pongs);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let active = active.clone();
                let peak = peak.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        pool.run(|conn| {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(1));
                            active.fetch_sub(1, Ordering::SeqCst);
                            conn.execute(&commands::ping())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= MAX);
        assert!(pool.created_count() <= MAX);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn second_acquire_waits_for_release() {
        let pool = scripted_pool(1, pongs);
        let (held_tx, held_rx) = mpsc::channel();

        let holder = {
            let pool = pool.clone();
            thread::spawn(move || {
                let conn = pool.acquire().unwrap();
                held_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(150));
                drop(conn);
            })
        };

        held_rx.recv().unwrap();
        let started = Instant::now();
        let mut conn = pool.acquire_timeout(Duration::from_secs(5)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(conn.execute(&commands::ping()).unwrap(), "PONG");
        holder.join().unwrap();
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn acquire_times_out_without_side_effects() {
        let pool = scripted_pool(1, pongs);
        let _held = pool.acquire().unwrap();

        let err = pool.acquire_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ClientError::PoolExhausted(d) if d == Duration::from_millis(50)));
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn unbounded_timeout_waits_for_release() {
        let pool = scripted_pool(1, pongs);
        let held = pool.acquire().unwrap();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || -> ClientResult<String> {
                let mut conn = pool.acquire_timeout(Duration::MAX)?;
                conn.execute(&commands::ping())
            })
        };
        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert_eq!(waiter.join().unwrap().unwrap(), "PONG");
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn pooled_connection_debug_shows_the_connection() {
        let pool = scripted_pool(1, pongs);
        let conn = pool.acquire().unwrap();
        let text = format!("{:?}", conn);
        assert!(text.starts_with("PooledConnection"));
        assert!(text.contains("Connection"));
    }

    #[test]
    fn poisoned_connections_are_never_reused() {
        let pool = scripted_pool(1, |n| if n == 0 { "?bad\r\n".into() } else { pongs(n) });

        let err = pool
            .run(|conn| conn.execute(&commands::ping()))
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.in_use(), 0);

        let mut conn = pool.acquire().unwrap();
        assert!(!conn.is_broken());
        assert_eq!(conn.execute(&commands::ping()).unwrap(), "PONG");
        assert_eq!(pool.created_count(), 2);
    }

    #[test]
    fn server_errors_return_the_connection() {
        let pool = scripted_pool(1, |_| "-ERR unknown command\r\n+PONG\r\n".into());
        let err = pool
            .run(|conn| conn.execute(&commands::ping()))
            .unwrap_err();
        assert!(err.is_server_error());
        assert_eq!(pool.idle_count(), 1);

        let pong = pool.run(|conn| conn.execute(&commands::ping())).unwrap();
        assert_eq!(pong, "PONG");
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn caller_errors_release_the_permit() {
        let pool = scripted_pool(1, pongs);
        let result: Result<(), AppError> = pool.run(|_| Err(AppError::Rejected));
        assert!(matches!(result, Err(AppError::Rejected)));
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle_count(), 1);

        let result: Result<String, AppError> =
            pool.run(|conn| Ok(conn.execute(&commands::ping())?));
        assert_eq!(result.unwrap(), "PONG");
    }

    #[test]
    fn panics_release_the_permit_and_dispose() {
        let pool = scripted_pool(1, pongs);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.run(|_| -> ClientResult<()> { panic!("operation blew up") })
        }));
        assert!(outcome.is_err());
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle_count(), 0);

        assert!(pool.acquire_timeout(Duration::from_millis(100)).is_ok());
        assert_eq!(pool.created_count(), 2);
    }

    #[test]
    fn abandoned_pipelines_are_disposed() {
        let pool = scripted_pool(1, pongs);
        pool.run(|conn| {
            let pipeline = conn.pipeline::<String>()?;
            std::mem::forget(pipeline);
            Ok::<_, ClientError>(())
        })
        .unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn discard_closes_instead_of_returning() {
        let pool = scripted_pool(2, pongs);
        let mut conn = pool.acquire().unwrap();
        conn.discard();
        drop(conn);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn connect_failures_release_the_permit() {
        let connector = || -> io::Result<Box<dyn Transport>> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        };
        let pool = ConnectionPool::with_connector(config(1), connector).unwrap();
        assert!(matches!(pool.acquire(), Err(ClientError::Io(_))));
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.created_count(), 0);
    }

    #[test]
    fn new_connections_authenticate_once() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let captured = sent.clone();
        let connector = move || -> io::Result<Box<dyn Transport>> {
            let (stream, handle) = MockStream::new("+OK\r\n+PONG\r\n+PONG\r\n");
            captured.lock().unwrap().push(handle);
            Ok(Box::new(stream))
        };
        let config = PoolConfig {
            password: Some("hunter2".into()),
            ..config(1)
        };
        let pool = ConnectionPool::with_connector(config, connector).unwrap();
        pool.run(|conn| conn.execute(&commands::ping())).unwrap();
        pool.run(|conn| conn.execute(&commands::ping())).unwrap();

        let handles = sent.lock().unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(
            handles[0].text(),
            "*2\r\n$4\r\nAUTH\r\n$7\r\nhunter2\r\n*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n"
        );
    }

    #[test]
    fn failed_auth_is_reported_and_released() {
        let pool = {
            let connector = || -> io::Result<Box<dyn Transport>> {
                let (stream, _) = MockStream::new("-WRONGPASS invalid username-password pair\r\n");
                Ok(Box::new(stream))
            };
            let config = PoolConfig {
                password: Some("wrong".into()),
                ..config(1)
            };
            ConnectionPool::with_connector(config, connector).unwrap()
        };
        assert!(pool.acquire().unwrap_err().is_server_error());
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn close_disposes_idle_and_refuses_new_borrowers() {
        let pool = scripted_pool(2, pongs);
        let held = pool.acquire().unwrap();
        pool.run(|conn| conn.execute(&commands::ping())).unwrap();
        assert_eq!(pool.idle_count(), 1);

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.idle_count(), 0);
        assert!(matches!(pool.acquire(), Err(ClientError::ConnectionState(_))));

        drop(held);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn close_wakes_blocked_acquirers() {
        let pool = scripted_pool(1, pongs);
        let held = pool.acquire().unwrap();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire_timeout(Duration::from_secs(5)).map(|_| ()))
        };
        thread::sleep(Duration::from_millis(50));
        pool.close();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(ClientError::ConnectionState(_))
        ));
        drop(held);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_async_executes_on_a_pooled_connection() {
        let pool = scripted_pool(2, pongs);
        let pong: String = pool
            .run_async(|conn| conn.execute(&commands::ping()))
            .await
            .unwrap();
        assert_eq!(pong, "PONG");
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn acquire_async_times_out() {
        let pool = scripted_pool(1, pongs);
        let _held = pool.acquire_async().await.unwrap();
        let err = pool
            .acquire_async_timeout(Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PoolExhausted(_)));
    }

    // A single-threaded runtime deadlocks if the waiting acquire blocks its
    // worker, because the holder never gets to run.
    #[tokio::test]
    async fn async_waiters_do_not_block_the_runtime() {
        let pool = scripted_pool(1, pongs);
        let held = pool.acquire_async().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.run_async(|conn| conn.execute(&commands::ping())).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(held);

        assert_eq!(waiter.await.unwrap().unwrap(), "PONG");
        assert_eq!(pool.created_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_async_resumes_panics() {
        let pool = scripted_pool(1, pongs);
        let task = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.run_async(|_| -> ClientResult<()> { panic!("inside blocking op") })
                    .await
            })
        };
        let err = task.await.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(pool.in_use(), 0);
    }
}
