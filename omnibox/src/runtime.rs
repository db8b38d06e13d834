//! Runtime plumbing for provider tasks.
//!
//! The engine may be driven from inside a tokio runtime (tests, async hosts)
//! or from plain threads (the REPL, FFI-style embedders). Providers spawn on
//! whichever runtime is current, else on a shared fallback runtime that lives
//! for the whole process.

use std::sync::Once;

use once_cell::sync::Lazy;

static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("omnibox-fallback")
        .build()
        .expect("Failed to create fallback tokio runtime")
});

static RAYON_INIT: Once = Once::new();

/// Current runtime if there is one, otherwise the global fallback
pub fn handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// Size the global rayon pool used for candidate scoring, leaving two cores to tokio.
pub fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let num_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let rayon_threads = num_threads.saturating_sub(2).max(1);

        // Fails if the host already built the global pool; theirs wins.
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(rayon_threads)
            .thread_name(|i| format!("omnibox-rayon-{}", i))
            .build_global();
    });
}
