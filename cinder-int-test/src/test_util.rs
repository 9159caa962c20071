use cinder::collection::Document;
use cinder::common::Clock;
use cinder::doc;
use cinder::errors::CinderResult;
use cinder::governor::RateLimits;
use cinder::Cinder;
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test between its setup and teardown, retrying on failure.
///
/// `after` runs even when the test fails so journal files are always removed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> CinderResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> CinderResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> CinderResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx)
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();
        let failure = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, _))) => e,
            Err(panic_err) => {
                if let Some(s) = panic_err.downcast_ref::<&str>() {
                    format!("Panic: {}", s)
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    format!("Panic: {}", s)
                } else {
                    "Panic: unknown payload".to_string()
                }
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", failure);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(failure);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    journal: Option<PathBuf>,
    clock: Clock,
    db: Cinder,
}

impl TestContext {
    pub fn new(journal: Option<PathBuf>, clock: Clock, db: Cinder) -> Self {
        Self { journal, clock, db }
    }

    pub fn db(&self) -> Cinder {
        self.db.clone()
    }

    /// The manual clock driving the store's rate windows.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn journal(&self) -> Option<&Path> {
        self.journal.as_deref()
    }

    /// Closes the store and opens a fresh one on the same journal.
    pub fn reopen(&self) -> CinderResult<TestContext> {
        self.db.close()?;
        let journal = self.journal.clone();
        let mut builder = Cinder::builder()
            .rate_limits(RateLimits::unlimited())
            .clock(self.clock.clone());
        if let Some(path) = &journal {
            builder = builder.journal(path);
        }
        Ok(TestContext::new(journal, self.clock.clone(), builder.open()?))
    }
}

/// A unique journal location under the OS temp directory.
pub fn random_path() -> PathBuf {
    env::temp_dir().join(format!("cinder-{}.journal", uuid::Uuid::new_v4()))
}

/// In-memory store without rate limits, on a manual clock.
pub fn create_test_context() -> CinderResult<TestContext> {
    create_limited_context(RateLimits::unlimited())
}

/// In-memory store with the given limits, on a manual clock.
pub fn create_limited_context(limits: RateLimits) -> CinderResult<TestContext> {
    let clock = Clock::manual(1_000_000);
    let db = Cinder::builder()
        .rate_limits(limits)
        .clock(clock.clone())
        .open()?;
    Ok(TestContext::new(None, clock, db))
}

/// Journal-backed store without rate limits.
pub fn create_journal_context() -> CinderResult<TestContext> {
    let path = random_path();
    if path.exists() {
        let _ = fs::remove_file(&path);
    }
    let clock = Clock::manual(1_000_000);
    let db = Cinder::builder()
        .rate_limits(RateLimits::unlimited())
        .clock(clock.clone())
        .journal(&path)
        .sync_writes(true)
        .open()?;
    Ok(TestContext::new(Some(path), clock, db))
}

pub fn cleanup(ctx: TestContext) -> CinderResult<()> {
    if let Err(e) = ctx.db().close() {
        eprintln!("Warning: Failed to close store: {:?}", e);
    }

    if let Some(path) = ctx.journal() {
        if path.exists() {
            fs::remove_file(path)?;
        }
        let mut compacted = path.to_path_buf().into_os_string();
        compacted.push(".compact");
        let _ = fs::remove_file(PathBuf::from(compacted));
    }
    Ok(())
}

pub fn create_test_docs() -> Vec<(String, Document)> {
    vec![
        (
            "ann".to_string(),
            doc! {
                name: "Ann",
                age: 34,
                team: "core",
                tags: ["admin", "ops"],
                address: { city: "Paris", zip: "75001" },
            },
        ),
        (
            "bob".to_string(),
            doc! {
                name: "Bob",
                age: 27,
                team: "web",
                tags: ["dev"],
                address: { city: "Berlin", zip: "10115" },
            },
        ),
        (
            "cid".to_string(),
            doc! {
                name: "Cid",
                age: 41,
                team: "core",
                tags: ["dev", "ops"],
                address: { city: "Paris", zip: "75002" },
            },
        ),
        (
            "dee".to_string(),
            doc! {
                name: "Dee",
                age: 27,
                team: "data",
                tags: [],
                address: { city: "Lisbon", zip: "1100" },
            },
        ),
    ]
}

/// Writes [create_test_docs] into `collection`.
pub fn insert_test_documents(db: &Cinder, collection: &str) -> CinderResult<()> {
    for (id, document) in create_test_docs() {
        db.set(&format!("{}/{}", collection, id), document, false)?;
    }
    Ok(())
}

pub fn ids(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|d| d.id().map(str::to_string))
        .collect()
}

pub fn is_sorted<T: Ord>(iterable: impl IntoIterator<Item = T>, ascending: bool) -> bool {
    let items: Vec<T> = iterable.into_iter().collect();
    items.windows(2).all(|pair| {
        if ascending {
            pair[0] <= pair[1]
        } else {
            pair[0] >= pair[1]
        }
    })
}
