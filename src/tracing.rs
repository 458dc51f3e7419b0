//! # Observability & Tracing
//!
//! The mapper reports through the `tracing` crate; [`setup_tracing`] installs a
//! subscriber for binaries and demos that have none of their own.
//!
//! ## Configuration
//!
//! Verbosity comes from `RUST_LOG`. The output uses the compact format with
//! the module prefix hidden (`with_target(false)`).
//!
//! ```bash
//! # Only lenient coercions and wiring failures
//! RUST_LOG=warn cargo run
//!
//! # One line per resource and per override rule
//! RUST_LOG=debug cargo run
//!
//! # Also cycle hits, converter matches and field-cache fills
//! RUST_LOG=trace cargo run
//! ```
//!
//! ## What Gets Traced
//!
//! | Level | Event |
//! |-------|-------|
//! | `error` | collaborator token with no registered instance |
//! | `warn` | collection field whose raw value is not a sequence |
//! | `debug` | resource mapped, override rule applied, converter registered |
//! | `trace` | visited handle reused, converter matched, declared fields cached |
//!
//! `ResourceMapper::map` opens a span carrying the kind of the top-level value,
//! so every event of one pass nests under it:
//!
//! ```text
//! DEBUG map: Mapping resource class="PostResource" fields=3 rules=1 kind="object"
//! DEBUG map: Override rule applied class="PostResource" fields=1 kind="object"
//! ```

/// Installs the global fmt subscriber, filtered by `RUST_LOG`.
///
/// Panics if a global subscriber is already set.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
