//! Single-flight coordination of difficulty computations.
//!
//! The first caller for a key registers a flight and spawns its computation;
//! every later caller joins that flight and receives the same result. The
//! check-or-insert is one `DashMap::entry` call, the computation never runs
//! under a shard lock.
//!
//! Flight lifecycle:
//! - `Pending` while the spawned task runs. Callers that stop waiting do not
//!   cancel it.
//! - `Resolved` once it succeeded. The flight stays registered, so the key is
//!   computed at most once until it is purged.
//! - `Failed` is transient: the task removes its own entry before publishing
//!   the error, so the next caller starts a fresh flight. Panics are handled
//!   the same way.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::difficulty::CalcError;
use crate::error::DifficultyError;

pub type FlightResult<V> = Result<V, DifficultyError>;

type FlightFuture<V> = Shared<BoxFuture<'static, FlightResult<V>>>;
type FlightMap<K, V> = Arc<DashMap<K, Flight<V>>>;

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Pending,
    Resolved,
    Failed,
}

struct Flight<V> {
    /// Distinguishes this flight from a later one registered under the same key.
    id: u64,
    future: FlightFuture<V>,
}

pub struct SingleFlight<K, V>
where
    K: Eq + Hash,
{
    flights: FlightMap<K, V>,
    next_id: AtomicU64,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Returns the result of the flight for `key`, starting it with `compute`
    /// if none is registered.
    ///
    /// `compute` is only called by the caller that registers the flight. The
    /// future it returns runs on its own task.
    pub async fn resolve_or_join<F, Fut>(&self, key: K, compute: F) -> FlightResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult<V>> + Send + 'static,
    {
        let future = match self.flights.entry(key) {
            Entry::Occupied(entry) => entry.get().future.clone(),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let guard = FailureGuard {
                    flights: Arc::clone(&self.flights),
                    key: entry.key().clone(),
                    id,
                    armed: true,
                };

                let task = tokio::spawn(run_flight(guard, compute()));
                let future = task
                    .map(|joined| {
                        joined.unwrap_or_else(|e| {
                            Err(DifficultyError::Calculation(CalcError::Other(format!(
                                "computation task failed: {}",
                                e
                            ))))
                        })
                    })
                    .boxed()
                    .shared();

                entry.insert(Flight {
                    id,
                    future: future.clone(),
                });
                future
            }
        };

        future.await
    }

    /// Reports the state of the flight registered for `key`, if any.
    #[cfg(test)]
    pub fn state(&self, key: &K) -> Option<FlightState> {
        self.flights.get(key).map(|flight| match flight.future.peek() {
            None => FlightState::Pending,
            Some(Ok(_)) => FlightState::Resolved,
            Some(Err(_)) => FlightState::Failed,
        })
    }

    /// Forgets every flight whose key matches, returning how many were removed.
    ///
    /// Running computations are not interrupted; their current waiters still
    /// get the result, later callers start over.
    pub fn purge_where(&self, mut matches: impl FnMut(&K) -> bool) -> usize {
        let mut removed = 0;
        self.flights.retain(|key, _| {
            if matches(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

async fn run_flight<K, V, Fut>(mut guard: FailureGuard<K, V>, work: Fut) -> FlightResult<V>
where
    K: Eq + Hash,
    Fut: Future<Output = FlightResult<V>>,
{
    let result = work.await;
    if result.is_ok() {
        guard.armed = false;
    }
    result
}

/// Removes the flight on drop unless disarmed: covers both an `Err` result
/// and a panic unwinding out of the computation.
struct FailureGuard<K, V>
where
    K: Eq + Hash,
{
    flights: FlightMap<K, V>,
    key: K,
    id: u64,
    armed: bool,
}

impl<K, V> Drop for FailureGuard<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if self.armed {
            self.flights
                .remove_if(&self.key, |_, flight| flight.id == self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn failure(msg: &str) -> DifficultyError {
        DifficultyError::Calculation(CalcError::CalculationFailed(msg.to_string()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_computation() {
        let flights = Arc::new(SingleFlight::<&'static str, f64>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .resolve_or_join("abc123", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(5.25)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 5.25);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.state(&"abc123"), Some(FlightState::Resolved));
    }

    #[tokio::test]
    async fn test_resolved_flight_is_reused() {
        let flights = SingleFlight::<u32, u32>::new();
        assert_eq!(flights.resolve_or_join(1, || async { Ok(10) }).await.unwrap(), 10);
        assert_eq!(flights.resolve_or_join(1, || async { Ok(20) }).await.unwrap(), 10);
        assert_eq!(flights.resolve_or_join(2, || async { Ok(20) }).await.unwrap(), 20);
        assert_eq!(flights.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_cleared_for_retry() {
        let flights = SingleFlight::<u32, u32>::new();

        let err = flights
            .resolve_or_join(1, || async { Err(failure("boom")) })
            .await
            .unwrap_err();
        assert!(matches!(err, DifficultyError::Calculation(_)));
        assert_eq!(flights.state(&1), None);

        assert_eq!(flights.resolve_or_join(1, || async { Ok(3) }).await.unwrap(), 3);
        assert_eq!(flights.state(&1), Some(FlightState::Resolved));
    }

    #[tokio::test]
    async fn test_panic_is_cleared_for_retry() {
        let flights = SingleFlight::<u32, u32>::new();

        let result = flights
            .resolve_or_join(1, || async {
                if true {
                    panic!("calculator exploded");
                }
                Ok(0)
            })
            .await;
        assert!(result.is_err());
        assert!(flights.is_empty());

        assert_eq!(flights.resolve_or_join(1, || async { Ok(4) }).await.unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiters_of_a_failed_flight_all_see_the_error() {
        let flights = Arc::new(SingleFlight::<u32, u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .resolve_or_join(9, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(failure("unavailable"))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_purge_forces_recomputation() {
        let flights = SingleFlight::<(u32, u8), u32>::new();
        flights.resolve_or_join((1, 0), || async { Ok(1) }).await.unwrap();
        flights.resolve_or_join((1, 1), || async { Ok(1) }).await.unwrap();
        flights.resolve_or_join((2, 0), || async { Ok(1) }).await.unwrap();

        assert_eq!(flights.purge_where(|(id, _)| *id == 1), 2);
        assert_eq!(flights.resolve_or_join((1, 0), || async { Ok(2) }).await.unwrap(), 2);
        assert_eq!(flights.resolve_or_join((2, 0), || async { Ok(2) }).await.unwrap(), 1);
    }
}
