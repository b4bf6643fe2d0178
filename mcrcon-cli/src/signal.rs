use log::warn;

/// Signals that end a session: Ctrl-C everywhere, plus SIGTERM on Unix.
pub struct Shutdown {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl Shutdown {
    /// Register the handlers. Must be called from inside the runtime.
    pub fn new() -> Self {
        Shutdown {
            #[cfg(unix)]
            terminate: {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(terminate) => Some(terminate),
                    Err(err) => {
                        warn!("Could not listen for SIGTERM: {}", err);
                        None
                    }
                }
            },
        }
    }

    /// Resolves once a shutdown signal arrives. Never resolves if no handler could be registered.
    pub async fn recv(&mut self) {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {}
            () = self.terminate() => {}
        }
    }

    #[cfg(unix)]
    async fn terminate(&mut self) {
        match &mut self.terminate {
            Some(terminate) => {
                if terminate.recv().await.is_none() {
                    std::future::pending::<()>().await
                }
            }
            None => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn terminate(&mut self) {
        std::future::pending().await
    }
}
