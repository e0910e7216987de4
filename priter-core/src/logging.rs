use tracing::Level;

/// Initializes the process-wide tracing subscriber the same way the
/// teacher's `kvs-server` binary does: pretty-printed, written to
/// stderr so stdout stays free for any data the process itself emits.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_logging(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .pretty()
        .with_max_level(level)
        .try_init();
}
