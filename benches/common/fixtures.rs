use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Test data structure for benchmarks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub score: u32,
}

impl BenchUser {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            score: (id % 1000) as u32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("user {0} not found")]
pub struct NotInDatabase(pub u64);

/// Simulated database with configurable latency
#[derive(Clone)]
pub struct FakeDatabase {
    data: Arc<HashMap<u64, BenchUser>>,
    latency_ms: u64,
    query_count: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn new(num_users: usize, latency_ms: u64) -> Self {
        let data = (0..num_users as u64)
            .map(|id| (id, BenchUser::new(id)))
            .collect();

        Self {
            data: Arc::new(data),
            latency_ms,
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn get(&self, id: u64) -> Result<BenchUser, NotInDatabase> {
        self.query_count.fetch_add(1, Ordering::Relaxed);

        // Simulate database latency
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        self.data.get(&id).cloned().ok_or(NotInDatabase(id))
    }

    #[allow(dead_code)]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }
}

/// Generate user ids for different workload patterns
pub struct KeyGenerator {
    num_keys: u64,
}

impl KeyGenerator {
    pub fn new(num_keys: u64) -> Self {
        Self { num_keys }
    }

    /// Every id once, in order (for cold cache tests)
    pub fn sequential(&self) -> Vec<u64> {
        (0..self.num_keys).collect()
    }

    /// Ids with a simplified Zipf distribution: 80% of requests go to 20% of ids
    pub fn zipf_random(&self, count: usize) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        let hot = (self.num_keys / 5).max(1);

        (0..count)
            .map(|_| {
                if rng.gen_bool(0.8) {
                    rng.gen_range(0..hot)
                } else {
                    rng.gen_range(hot..self.num_keys.max(hot + 1))
                }
            })
            .collect()
    }
}
