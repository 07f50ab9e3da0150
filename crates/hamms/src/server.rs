//! Binding the behavior ports and running them.
//!
//! [`HammsServer`] is the blocking lifecycle API: `start` binds every port up front and hands
//! the listeners to a single-threaded tokio runtime on its own thread, `stop` cancels the accept
//! loops and joins that thread. Callers that already own a runtime use [`serve`] instead.

use std::net::{IpAddr, SocketAddr, TcpListener as StdTcpListener};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use hamms_http::connection::HttpConnection;
use hamms_http::protocol::ConnectionInfo;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::HammsConfig;
use crate::error::StartError;
use crate::raw;
use crate::registry::{BEHAVIORS, BehaviorId, Binding, MAX_OFFSET};
use crate::retry_store::RetryStore;

/// State shared by every behavior of one server instance.
#[derive(Debug)]
pub(crate) struct Engine {
    config: HammsConfig,
    store: RetryStore,
    rng: Arc<Mutex<StdRng>>,
}

impl Engine {
    pub(crate) fn new(config: HammsConfig, store: RetryStore) -> Self {
        let rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, store, rng: Arc::new(Mutex::new(rng)) }
    }

    pub(crate) fn config(&self) -> &HammsConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &RetryStore {
        &self.store
    }

    pub(crate) fn rng(&self) -> Arc<Mutex<StdRng>> {
        Arc::clone(&self.rng)
    }
}

/// A bound port and what serves the connections it accepts.
#[derive(Debug)]
struct Listener {
    behavior: BehaviorId,
    port: u16,
    listener: StdTcpListener,
    binding: Binding,
}

#[derive(Debug)]
struct Running {
    base_port: u16,
    shutdown: CancellationToken,
    reactor: JoinHandle<()>,
}

/// Owns the listeners of every behavior and the thread they run on.
///
/// Dropping the server stops it.
#[derive(Debug)]
pub struct HammsServer {
    config: HammsConfig,
    store: RetryStore,
    running: Mutex<Option<Running>>,
}

impl HammsServer {
    pub fn new(config: HammsConfig) -> Self {
        Self { config, store: RetryStore::new(), running: Mutex::new(None) }
    }

    /// The retry counters, shared with the running behaviors.
    pub fn store(&self) -> &RetryStore {
        &self.store
    }

    /// Binds `base_port + offset` for every behavior and starts serving them.
    ///
    /// Does nothing if the server is already running. When any port can't be bound, nothing
    /// stays bound and the error names the behavior and port.
    pub fn start(&self, base_port: u16) -> Result<(), StartError> {
        let mut running = self.lock();
        if let Some(running) = running.as_ref() {
            debug!(base_port = running.base_port, "already running");
            return Ok(());
        }

        let engine = Engine::new(self.config.clone(), self.store.clone());
        let listeners = bind(&engine, self.config.host(), base_port)?;

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let reactor = thread::Builder::new()
            .name("hamms-reactor".to_owned())
            .spawn(move || runtime.block_on(run_listeners(listeners, token)))?;

        info!(host = %self.config.host(), base_port, "hamms started");
        *running = Some(Running { base_port, shutdown, reactor });
        Ok(())
    }

    /// Stops accepting, drops every open connection and waits for the event loop to exit.
    ///
    /// Does nothing if the server is not running.
    pub fn stop(&self) {
        let Some(Running { base_port, shutdown, reactor }) = self.lock().take() else {
            return;
        };

        shutdown.cancel();
        if reactor.join().is_err() {
            error!(base_port, "event loop thread panicked");
        }
        info!(base_port, "hamms stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HammsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serves every behavior on the current runtime until `shutdown` is cancelled.
///
/// Ports are taken from [`HammsConfig::base_port`].
pub async fn serve(config: HammsConfig, store: RetryStore, shutdown: CancellationToken) -> Result<(), StartError> {
    let base_port = config.base_port();
    let host = config.host();
    let engine = Engine::new(config, store);
    let listeners = bind(&engine, host, base_port)?;

    info!(%host, base_port, "hamms listening");
    run_listeners(listeners, shutdown).await;
    Ok(())
}

fn bind(engine: &Engine, host: IpAddr, base_port: u16) -> Result<Vec<Listener>, StartError> {
    if base_port.checked_add(MAX_OFFSET).is_none() {
        return Err(StartError::PortOutOfRange { base_port, offset: MAX_OFFSET });
    }

    let mut listeners = Vec::with_capacity(BEHAVIORS.len());
    for spec in &BEHAVIORS {
        let port = spec.port(base_port).ok_or(StartError::PortOutOfRange { base_port, offset: spec.offset })?;

        // returning early drops the listeners bound so far
        let listener = StdTcpListener::bind(SocketAddr::new(host, port))
            .and_then(|listener| listener.set_nonblocking(true).map(|()| listener))
            .map_err(|e| StartError::bind(spec.id, port, e))?;

        let binding = spec.id.binding(engine)?;
        debug!(behavior = %spec.id, port, "bound");
        listeners.push(Listener { behavior: spec.id, port, listener, binding });
    }
    Ok(listeners)
}

async fn run_listeners(listeners: Vec<Listener>, shutdown: CancellationToken) {
    let tracker = TaskTracker::new();

    for Listener { behavior, port, listener, binding } in listeners {
        let listener = match TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                error!(%behavior, port, cause = %e, "can't register listener with the event loop");
                continue;
            }
        };
        tracker.spawn(accept_loop(behavior, listener, binding, shutdown.clone(), tracker.clone()));
    }

    shutdown.cancelled().await;
    tracker.close();
    tracker.wait().await;
}

async fn accept_loop(
    behavior: BehaviorId,
    listener: TcpListener,
    binding: Binding,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let stream = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _remote_addr)) => stream,
                Err(e) => {
                    warn!(%behavior, cause = %e, "failed to accept");
                    continue;
                }
            },
        };

        let shutdown = shutdown.clone();
        let connection = serve_connection(behavior, stream, binding.clone());
        tracker.spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = connection => {}
            }
        });
    }
    debug!(%behavior, "accept loop stopped");
}

async fn serve_connection(behavior: BehaviorId, stream: TcpStream, binding: Binding) {
    let info = ConnectionInfo::of(&stream);
    match binding {
        Binding::Raw(factory) => raw::serve_connection(stream, info, factory()).await,
        Binding::Http(site) => {
            let (reader, writer) = stream.into_split();
            if let Err(e) = HttpConnection::new(reader, writer, info).process(site).await {
                debug!(%behavior, cause = %e, "http connection ended with an error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn seeded_engines_agree() {
        let config = HammsConfig::builder().seed(42).build();
        let a = Engine::new(config.clone(), RetryStore::new());
        let b = Engine::new(config, RetryStore::new());

        let roll = |engine: &Engine| engine.rng().lock().unwrap().random::<f64>();
        assert_eq!(roll(&a).to_bits(), roll(&b).to_bits());
    }

    #[test]
    fn out_of_range_base_port() {
        let engine = Engine::new(HammsConfig::default(), RetryStore::new());
        let result = bind(&engine, IpAddr::from([127, 0, 0, 1]), u16::MAX - 5);
        assert!(matches!(result, Err(StartError::PortOutOfRange { offset: MAX_OFFSET, .. })));
    }

    #[test]
    fn stop_without_start() {
        let server = HammsServer::new(HammsConfig::default());
        assert!(!server.is_running());
        server.stop();
        assert!(!server.is_running());
    }
}
