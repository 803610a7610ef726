//! Tracing subscriber setup for the `docqa` binary.
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
//! overrides the level chosen from the command-line flags.

use tracing_subscriber::EnvFilter;

/// Level from flags: `quiet` → warn, default → info, `-v` → debug, `-vv` → trace.
pub fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    EnvFilter::new(format!("{level},sqlx=warn,hyper=warn,reqwest=warn"))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbose: u8, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
