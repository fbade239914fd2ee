//! Diagnostic tracing for the game and its collaborators.
//!
//! Tracing goes to stderr so it never interleaves with the board on stdout.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset, by `-v` count.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "catchmaster=info,warn",
        2 => "catchmaster=debug,warn",
        _ => "catchmaster=trace,info",
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `verbose` when set. Output is compact, to stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=catchmaster::narrator=debug catchmaster play --seed 7
/// ```
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_only_widens_our_own_targets() {
        assert_eq!(default_directive(0), "warn");
        assert!(default_directive(1).starts_with("catchmaster=info"));
        assert!(default_directive(9).starts_with("catchmaster=trace"));
        for level in 0..4 {
            assert!(EnvFilter::try_new(default_directive(level)).is_ok());
        }
    }
}
