//! Per-source circuit breaker.
//!
//! Tracks consecutive failures per key (a source name, or `synthesizer`)
//! and temporarily stops calling keys that fail repeatedly. After a
//! cooldown period, a tripped key enters a half-open state where a single
//! probe request decides whether to restore or re-trip the circuit.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └───▲────┘             └────┬─────┘
//!     │                        │      probe failure    │
//!     │                        └───────────────────────┤
//!     │                 probe success                  │
//!     └────────────────────────────────────────────────┘
//! ```
//!
//! Each key owns its own lock. The key table is only locked to look up or
//! insert an entry, never while an operation runs, so calls to different
//! sources never serialise on each other.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Circuit state for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy: all requests are allowed through.
    Closed,
    /// Failed too many times: requests are blocked until the retry time.
    Open,
    /// Retry time reached: one probe request tests recovery.
    HalfOpen,
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before tripping the circuit to Open.
    pub failure_threshold: u32,
    /// Seconds to wait in Open state before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    next_retry_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            next_retry_at: None,
            probe_in_flight: false,
        }
    }
}

impl Circuit {
    fn retry_due(&self, now: Instant) -> bool {
        self.next_retry_at.is_none_or(|at| now >= at)
    }
}

/// Point-in-time view of one key's circuit, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    /// The circuit key.
    pub key: String,
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Time left until a probe is allowed, for open circuits.
    pub retry_in: Option<Duration>,
}

enum Admission {
    Rejected,
    Allowed { probe: bool },
}

/// Clears the half-open probe flag if the guarded call never completes
/// (its future was dropped by a deadline or an abort).
struct ProbeGuard {
    circuit: Arc<Mutex<Circuit>>,
    armed: bool,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.circuit).probe_in_flight = false;
        }
    }
}

fn lock(circuit: &Mutex<Circuit>) -> MutexGuard<'_, Circuit> {
    circuit.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed circuit breaker that guards calls and controls request flow.
///
/// Every key has independent health tracking. When a key accumulates
/// enough consecutive failures it is blocked (Open). Once the cooldown
/// elapses one probe is allowed (HalfOpen); success closes the circuit,
/// failure re-opens it with a fresh cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<String, Arc<Mutex<Circuit>>>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` for `key` under `timeout`, returning `fallback` when
    /// the circuit is open or the operation fails.
    ///
    /// Errors and timeouts are never returned to the caller: they are
    /// counted against `key` and replaced by `fallback`.
    pub async fn execute<T, F, Fut>(&self, key: &str, operation: F, fallback: T, timeout: Duration) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SearchError>>,
    {
        self.execute_with_cancel(key, operation, fallback, timeout, &CancellationToken::new())
            .await
    }

    /// Like [`CircuitBreaker::execute`], but also stops when `cancel` fires.
    ///
    /// A cancelled call returns `fallback` and is not counted as a failure:
    /// the caller gave up, the source did nothing wrong.
    pub async fn execute_with_cancel<T, F, Fut>(
        &self,
        key: &str,
        operation: F,
        fallback: T,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let circuit = self.circuit(key);
        let probe = match self.admit(&circuit, key) {
            Admission::Rejected => {
                tracing::debug!(key, "circuit open, skipping call");
                return fallback;
            }
            Admission::Allowed { probe } => probe,
        };
        let mut guard = ProbeGuard {
            circuit: Arc::clone(&circuit),
            armed: probe,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, operation()) => Some(result),
        };

        let value = match outcome {
            None => {
                tracing::debug!(key, "call cancelled by caller");
                fallback
            }
            Some(Ok(Ok(value))) => {
                self.on_success(&circuit, key, probe);
                value
            }
            Some(Ok(Err(err))) => {
                tracing::warn!(key, error = %err, "guarded call failed");
                self.on_failure(&circuit, key);
                fallback
            }
            Some(Err(_)) => {
                tracing::warn!(key, timeout_ms = timeout.as_millis() as u64, "guarded call timed out");
                self.on_failure(&circuit, key);
                fallback
            }
        };

        if probe {
            lock(&circuit).probe_in_flight = false;
            guard.armed = false;
        }
        value
    }

    /// Whether a call for `key` would currently be attempted.
    ///
    /// Read-only: never changes state. Used to plan fan-out membership.
    pub fn is_available(&self, key: &str) -> bool {
        let Some(circuit) = self.lookup(key) else {
            return true;
        };
        let c = lock(&circuit);
        match c.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !c.probe_in_flight,
            CircuitState::Open => c.retry_due(Instant::now()),
        }
    }

    /// Force `key` back to Closed with zero failures.
    pub fn reset(&self, key: &str) {
        if let Some(circuit) = self.lookup(key) {
            *lock(&circuit) = Circuit::default();
            tracing::info!(key, "circuit manually reset");
        }
    }

    /// Forget every tracked key.
    pub fn reset_all(&self) {
        self.circuits
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Current state of `key`. Unknown keys are Closed.
    pub fn state(&self, key: &str) -> CircuitState {
        self.lookup(key)
            .map_or(CircuitState::Closed, |c| lock(&c).state)
    }

    /// Snapshot of one key.
    pub fn snapshot(&self, key: &str) -> CircuitSnapshot {
        match self.lookup(key) {
            Some(circuit) => Self::snapshot_of(key, &lock(&circuit)),
            None => Self::snapshot_of(key, &Circuit::default()),
        }
    }

    /// Snapshots of every tracked key, sorted by key.
    pub fn health_report(&self) -> Vec<CircuitSnapshot> {
        let circuits: Vec<(String, Arc<Mutex<Circuit>>)> = self
            .circuits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, c)| (k.clone(), Arc::clone(c)))
            .collect();
        let mut report: Vec<CircuitSnapshot> = circuits
            .iter()
            .map(|(key, circuit)| Self::snapshot_of(key, &lock(circuit)))
            .collect();
        report.sort_by(|a, b| a.key.cmp(&b.key));
        report
    }

    fn snapshot_of(key: &str, c: &Circuit) -> CircuitSnapshot {
        let retry_in = match c.state {
            CircuitState::Open => c
                .next_retry_at
                .map(|at| at.saturating_duration_since(Instant::now())),
            _ => None,
        };
        CircuitSnapshot {
            key: key.to_owned(),
            state: c.state,
            consecutive_failures: c.consecutive_failures,
            retry_in,
        }
    }

    fn lookup(&self, key: &str) -> Option<Arc<Mutex<Circuit>>> {
        self.circuits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn circuit(&self, key: &str) -> Arc<Mutex<Circuit>> {
        if let Some(existing) = self.lookup(key) {
            return existing;
        }
        let mut map = self.circuits.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(key.to_owned()).or_default())
    }

    fn admit(&self, circuit: &Mutex<Circuit>, key: &str) -> Admission {
        let mut c = lock(circuit);
        match c.state {
            CircuitState::Closed => Admission::Allowed { probe: false },
            CircuitState::HalfOpen if c.probe_in_flight => Admission::Rejected,
            CircuitState::HalfOpen => {
                c.probe_in_flight = true;
                Admission::Allowed { probe: true }
            }
            CircuitState::Open if c.retry_due(Instant::now()) => {
                c.state = CircuitState::HalfOpen;
                c.probe_in_flight = true;
                tracing::info!(key, "circuit half-open, probing");
                Admission::Allowed { probe: true }
            }
            CircuitState::Open => Admission::Rejected,
        }
    }

    /// Only a probe may close the circuit. A straggler admitted while Closed
    /// that finishes after the circuit opened changes nothing.
    fn on_success(&self, circuit: &Mutex<Circuit>, key: &str, probe: bool) {
        let mut c = lock(circuit);
        let state = c.state;
        match state {
            CircuitState::HalfOpen if probe => {
                c.state = CircuitState::Closed;
                c.consecutive_failures = 0;
                c.next_retry_at = None;
                tracing::info!(key, "probe succeeded, circuit closed");
            }
            CircuitState::Closed => c.consecutive_failures = 0,
            CircuitState::HalfOpen | CircuitState::Open => {
                tracing::debug!(key, ?state, "late success ignored");
            }
        }
    }

    fn on_failure(&self, circuit: &Mutex<Circuit>, key: &str) {
        let mut c = lock(circuit);
        let now = Instant::now();
        c.consecutive_failures = c.consecutive_failures.saturating_add(1);
        c.last_failure_at = Some(now);

        let trip = match c.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => c.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            c.state = CircuitState::Open;
            c.next_retry_at = Some(now + Duration::from_secs(self.config.cooldown_secs));
            tracing::warn!(
                key,
                failures = c.consecutive_failures,
                cooldown_secs = self.config.cooldown_secs,
                "circuit opened"
            );
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
