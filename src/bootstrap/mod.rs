//! Bootstrap protocol for the compiled wasm module.
//!
//! The browser-side startup sequence is a strict ordering problem: the
//! module must be instantiated and its worker-thread pool attached to
//! shared linear memory before any user-triggered computation may run.
//! The original wiring armed the file-input handler independently of the
//! init chain, which left the trigger reachable after a failed init.
//!
//! This module makes the ordering structural. `Bootstrap` owns a
//! [`BootstrapState`] machine and only reports the trigger as armed in the
//! `Armed` state; `run_entry` refuses in every other state. The compiled
//! module itself is an opaque collaborator behind [`ModuleHost`], exposing
//! exactly the three operations the artifact exports: instantiate,
//! thread-pool init, and the file-processing entry point.
//!
//! All of this is single-threaded cooperative: the async operations
//! suspend the bootstrap sequence without blocking the interface thread,
//! and the state machine enforces at-most-one in-flight init.

use thiserror::Error;

use crate::log;

/// Error reported by the opaque module host.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The compiled module's exported operations.
///
/// Implementations suspend until the underlying operation resolves:
/// `instantiate` until linear memory and exports are available,
/// `init_thread_pool` until every worker has attached to shared memory.
#[allow(async_fn_in_trait)]
pub trait ModuleHost {
    /// Fetch and instantiate the compiled module.
    async fn instantiate(&mut self) -> Result<(), HostError>;

    /// Initialize the worker-thread pool with the given worker count.
    async fn init_thread_pool(&mut self, workers: usize) -> Result<(), HostError>;

    /// Invoke the module's file-processing entry point.
    async fn run_entry(&mut self, input: &[u8]) -> Result<(), HostError>;
}

/// Why a bootstrap session failed. Terminal for the page session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// Fetch or instantiation was rejected, commonly because the isolation
    /// headers were absent and shared-memory support is disabled.
    Instantiation(String),
    /// Shared memory unavailable or a worker failed to attach.
    ThreadPool(String),
    /// The entry point reported an error.
    Entry(String),
}

impl FailReason {
    /// Short label surfaced to the interface layer.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Instantiation(_) => "instantiation",
            Self::ThreadPool(_) => "thread-pool",
            Self::Entry(_) => "entry",
        }
    }

    /// Detail message from the host.
    pub fn detail(&self) -> &str {
        match self {
            Self::Instantiation(m) | Self::ThreadPool(m) | Self::Entry(m) => m,
        }
    }
}

/// Bootstrap lifecycle. Transitions only move forward, except into
/// `Failed`, which is terminal and keeps the trigger disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Uninitialized,
    ModuleReady,
    PoolReady,
    Armed,
    Running,
    Failed(FailReason),
}

/// Bootstrap-level errors, mirrored into [`BootstrapState::Failed`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("bootstrap already started")]
    AlreadyStarted,

    #[error("module instantiation failed: {0}")]
    Instantiation(String),

    #[error("thread pool initialization failed: {0}")]
    ThreadPool(String),

    #[error("entry point failed: {0}")]
    Entry(String),

    #[error("user trigger is not armed")]
    NotArmed,
}

/// Worker-thread pool handle, created only after instantiation succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPoolHandle {
    workers: usize,
    ready: bool,
}

impl ThreadPoolHandle {
    pub const fn workers(&self) -> usize {
        self.workers
    }

    pub const fn is_ready(&self) -> bool {
        self.ready
    }
}

/// Detected hardware concurrency, the default worker count.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
}

/// State machine driving module instantiation, pool init, and the
/// user-facing trigger.
pub struct Bootstrap<H: ModuleHost> {
    host: H,
    state: BootstrapState,
    pool: Option<ThreadPoolHandle>,
    workers: usize,
}

impl<H: ModuleHost> Bootstrap<H> {
    /// Create an uninitialized bootstrap with the default worker count.
    pub fn new(host: H) -> Self {
        Self {
            host,
            state: BootstrapState::Uninitialized,
            pool: None,
            workers: default_workers(),
        }
    }

    /// Override the worker count (must be non-zero).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    /// Whether the user-facing trigger may be reached.
    ///
    /// True only in `Armed`; the interface layer must keep the trigger
    /// disabled whenever this is false.
    pub fn trigger_armed(&self) -> bool {
        self.state == BootstrapState::Armed
    }

    /// Pool handle, present from `PoolReady` onward.
    pub fn pool(&self) -> Option<&ThreadPoolHandle> {
        self.pool.as_ref()
    }

    /// Failure reason, present only in the terminal `Failed` state.
    pub fn failure(&self) -> Option<&FailReason> {
        match &self.state {
            BootstrapState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Run the init sequence: instantiate the module, then attach the
    /// worker pool, then arm the trigger.
    ///
    /// Refuses unless the machine is `Uninitialized`, enforcing at most
    /// one in-flight init per page session. Any failure moves the machine
    /// into terminal `Failed` and the trigger stays disabled.
    pub async fn initialize(&mut self) -> Result<(), BootstrapError> {
        if self.state != BootstrapState::Uninitialized {
            return Err(BootstrapError::AlreadyStarted);
        }

        if let Err(e) = self.host.instantiate().await {
            self.state = BootstrapState::Failed(FailReason::Instantiation(e.0.clone()));
            return Err(BootstrapError::Instantiation(e.0));
        }
        self.state = BootstrapState::ModuleReady;

        if let Err(e) = self.host.init_thread_pool(self.workers).await {
            self.state = BootstrapState::Failed(FailReason::ThreadPool(e.0.clone()));
            return Err(BootstrapError::ThreadPool(e.0));
        }
        self.pool = Some(ThreadPoolHandle {
            workers: self.workers,
            ready: true,
        });
        self.state = BootstrapState::PoolReady;

        // Arming is part of the same transition chain; there is no path
        // to Armed that skips the two awaits above.
        self.state = BootstrapState::Armed;
        Ok(())
    }

    /// Hand one unit of work to the module.
    ///
    /// Only legal in `Armed`. Returns to `Armed` on completion so repeated
    /// invocations are possible; an entry failure is terminal.
    pub async fn run_entry(&mut self, input: &[u8]) -> Result<(), BootstrapError> {
        if self.state != BootstrapState::Armed {
            return Err(BootstrapError::NotArmed);
        }

        self.state = BootstrapState::Running;
        log!("bootstrap"; "processing {} byte(s)", input.len());

        match self.host.run_entry(input).await {
            Ok(()) => {
                log!("bootstrap"; "done");
                self.state = BootstrapState::Armed;
                Ok(())
            }
            Err(e) => {
                self.state = BootstrapState::Failed(FailReason::Entry(e.0.clone()));
                Err(BootstrapError::Entry(e.0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Scriptable host for exercising every transition.
    #[derive(Default)]
    struct MockHost {
        fail_instantiate: bool,
        fail_pool: bool,
        fail_entry: bool,
        pool_delay: Option<Duration>,
        seen_workers: Option<usize>,
        entries_run: usize,
    }

    impl ModuleHost for MockHost {
        async fn instantiate(&mut self) -> Result<(), HostError> {
            if self.fail_instantiate {
                return Err(HostError::new("isolation headers missing"));
            }
            Ok(())
        }

        async fn init_thread_pool(&mut self, workers: usize) -> Result<(), HostError> {
            if let Some(delay) = self.pool_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_pool {
                return Err(HostError::new("shared memory unavailable"));
            }
            self.seen_workers = Some(workers);
            Ok(())
        }

        async fn run_entry(&mut self, _input: &[u8]) -> Result<(), HostError> {
            if self.fail_entry {
                return Err(HostError::new("unparseable ontology"));
            }
            self.entries_run += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn happy_path_arms_trigger() {
        let mut bs = Bootstrap::new(MockHost::default()).with_workers(4);
        assert_eq!(bs.state(), &BootstrapState::Uninitialized);
        assert!(!bs.trigger_armed());
        assert!(bs.pool().is_none());

        bs.initialize().await.unwrap();
        assert!(bs.trigger_armed());
        let pool = bs.pool().unwrap();
        assert_eq!(pool.workers(), 4);
        assert!(pool.is_ready());
        assert_eq!(bs.host.seen_workers, Some(4));
    }

    #[tokio::test]
    async fn instantiation_failure_is_terminal() {
        let mut bs = Bootstrap::new(MockHost {
            fail_instantiate: true,
            ..Default::default()
        });

        let err = bs.initialize().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Instantiation(_)));
        assert!(!bs.trigger_armed());
        assert!(bs.pool().is_none());
        assert_eq!(bs.failure().unwrap().label(), "instantiation");

        // The trigger must stay unreachable.
        assert_eq!(
            bs.run_entry(b"file").await.unwrap_err(),
            BootstrapError::NotArmed
        );
        // And no second init may start.
        assert_eq!(
            bs.initialize().await.unwrap_err(),
            BootstrapError::AlreadyStarted
        );
    }

    #[tokio::test]
    async fn pool_failure_is_terminal() {
        let mut bs = Bootstrap::new(MockHost {
            fail_pool: true,
            ..Default::default()
        });

        let err = bs.initialize().await.unwrap_err();
        assert!(matches!(err, BootstrapError::ThreadPool(_)));
        assert!(!bs.trigger_armed());
        assert!(bs.pool().is_none());
        assert_eq!(bs.failure().unwrap().label(), "thread-pool");
        assert_eq!(
            bs.run_entry(b"file").await.unwrap_err(),
            BootstrapError::NotArmed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_stays_disabled_while_pool_init_pends() {
        let mut bs = Bootstrap::new(MockHost {
            pool_delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });

        // Abandon the init mid-suspension, before the pool attaches.
        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), bs.initialize()).await;
        assert!(timed_out.is_err());

        assert_eq!(bs.state(), &BootstrapState::ModuleReady);
        assert!(!bs.trigger_armed());
        assert_eq!(
            bs.run_entry(b"file").await.unwrap_err(),
            BootstrapError::NotArmed
        );
    }

    #[tokio::test]
    async fn running_returns_to_armed_for_repeat_invocations() {
        let mut bs = Bootstrap::new(MockHost::default());
        bs.initialize().await.unwrap();

        bs.run_entry(b"first.owl").await.unwrap();
        assert!(bs.trigger_armed());
        bs.run_entry(b"second.owl").await.unwrap();
        assert_eq!(bs.host.entries_run, 2);
    }

    #[tokio::test]
    async fn entry_failure_disables_trigger() {
        let mut bs = Bootstrap::new(MockHost {
            fail_entry: true,
            ..Default::default()
        });
        bs.initialize().await.unwrap();

        let err = bs.run_entry(b"bad.owl").await.unwrap_err();
        assert!(matches!(err, BootstrapError::Entry(_)));
        assert!(!bs.trigger_armed());
        assert_eq!(bs.failure().unwrap().label(), "entry");
        assert_eq!(
            bs.run_entry(b"again.owl").await.unwrap_err(),
            BootstrapError::NotArmed
        );
    }

    #[tokio::test]
    async fn run_before_initialize_is_refused() {
        let mut bs = Bootstrap::new(MockHost::default());
        assert_eq!(
            bs.run_entry(b"early").await.unwrap_err(),
            BootstrapError::NotArmed
        );
    }

    #[test]
    fn worker_floor_is_one() {
        let bs = Bootstrap::new(MockHost::default()).with_workers(0);
        assert_eq!(bs.workers, 1);
        assert!(default_workers() >= 1);
    }
}
