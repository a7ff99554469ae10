//! tddlive external test runner entry point
//!
//! Run with: tddlive-runner <ENTRY>.tdi --where <Namespace.Type.method>
//!
//! The report goes to stdout; logs go to stderr so the report stays parseable.

fn main() {
    // Initialize structured logging with env-based filter, defaulting to warn
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    tddlive::runner::run();
}
