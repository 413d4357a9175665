//! SimpleStore Cache Probe
//!
//! Fills a cached-only store with repeated upserts of one key, deletes it,
//! closes the store, and prints how many heap bytes were live at each step.

use std::alloc::{GlobalAlloc, Layout, System};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use simplestore::Store;
use tracing_subscriber::{fmt, EnvFilter};

/// Key every iteration overwrites
const PROXY_KEY: &[u8] = b"WebProxy";

/// Default iteration count
const DEFAULT_ITERATIONS: i64 = 10_000;

// =============================================================================
// Counting Allocator
// =============================================================================

/// Wraps the system allocator and tracks live heap bytes
struct CountingAllocator;

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            ALLOCATED.fetch_add(new_size, Ordering::Relaxed);
        }
        new_ptr
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn allocated_bytes() -> usize {
    ALLOCATED.load(Ordering::Relaxed)
}

// =============================================================================
// CLI
// =============================================================================

/// SimpleStore cache probe
#[derive(Parser, Debug)]
#[command(name = "cache-probe")]
#[command(about = "Measure heap growth of a cached-only store across repeated upserts")]
#[command(version)]
struct Args {
    /// Number of upserts (non-positive values fall back to 10000)
    #[arg(default_value_t = DEFAULT_ITERATIONS, allow_negative_numbers = true)]
    iterations: i64,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let iterations = if args.iterations > 0 {
        args.iterations
    } else {
        DEFAULT_ITERATIONS
    };

    tracing::info!("SimpleStore cache probe v{}", simplestore::VERSION);

    let store = Store::create_cached_only();
    let before = allocated_bytes();

    for i in 0..iterations {
        let mut value = format!("http://proxy-{}:8080", i).into_bytes();
        value.push(0);
        if let Err(e) = store.put(PROXY_KEY, &value) {
            tracing::error!("Put failed at iteration {}: {}", i, e);
            return ExitCode::FAILURE;
        }
    }

    let after_put = allocated_bytes();

    if let Err(e) = store.delete(PROXY_KEY) {
        tracing::error!("Delete failed: {}", e);
        return ExitCode::FAILURE;
    }
    let after_delete = allocated_bytes();

    if let Err(e) = store.close() {
        tracing::error!("Close failed: {}", e);
        return ExitCode::FAILURE;
    }

    println!(
        "iterations={} allocated_before={} allocated_after_put={} allocated_after_delete={}",
        iterations, before, after_put, after_delete
    );
    println!(
        "delta_put={} delta_delete={}",
        after_put as i64 - before as i64,
        after_delete as i64 - before as i64
    );

    ExitCode::SUCCESS
}
