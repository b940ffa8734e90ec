/// Exit with status 130 on Ctrl+C.
///
/// The mirror index is written after every mutation, so the next run picks
/// up where this one stopped.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        tracing::warn!("Interrupted, stopping sync");
        std::process::exit(130);
    });
}
