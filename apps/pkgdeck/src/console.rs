use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use package_core::ProgressReporter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit status for an interrupt outside a cancellable operation (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

type Scope = Arc<Mutex<Option<CancellationToken>>>;

/// Progress printed to stdout.
///
/// Each cancellable scope gets its own token. Once the first such scope
/// starts, Ctrl-C cancels whichever scope is open and exits the process when
/// none is; before that the default interrupt handling applies.
#[derive(Default)]
pub struct ConsoleProgress {
    scope: Scope,
    interrupt: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleProgress {
    fn open_scope(&self) {
        if let Ok(mut scope) = self.scope.lock() {
            *scope = Some(CancellationToken::new());
        }
    }

    fn close_scope(&self) {
        if let Ok(mut scope) = self.scope.lock() {
            scope.take();
        }
    }

    fn listen_for_interrupt(&self) {
        let Ok(mut slot) = self.interrupt.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }

        let scope = Arc::clone(&self.scope);
        *slot = Some(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let open = scope.lock().ok().and_then(|scope| scope.clone());
                match open {
                    Some(token) if !token.is_cancelled() => {
                        warn!("interrupt received; stopping after the current package");
                        token.cancel();
                    }
                    _ => {
                        warn!("interrupt received; exiting");
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            }
        }));
    }
}

fn percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[async_trait]
impl ProgressReporter for ConsoleProgress {
    async fn start_loading(&self, title: &str, cancellable: bool) -> Result<()> {
        if cancellable {
            println!("{title} (Ctrl-C to stop)");
            self.open_scope();
            self.listen_for_interrupt();
        } else {
            println!("{title}");
            self.close_scope();
        }
        Ok(())
    }

    async fn write_message(&self, text: &str) {
        println!("  {text}");
    }

    /// Token of the open cancellable scope. Outside one, a token nothing cancels.
    fn cancellation_token(&self) -> CancellationToken {
        self.scope
            .lock()
            .ok()
            .and_then(|scope| scope.clone())
            .unwrap_or_default()
    }

    async fn report(&self, fraction: f64) {
        println!("[{:>3}%]", percent(fraction));
    }

    async fn stop_loading(&self) -> Result<()> {
        self.close_scope();
        Ok(())
    }

    async fn show_message(&self, title: &str, body: &str) -> Result<()> {
        println!();
        println!("== {title} ==");
        println!("{body}");
        Ok(())
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.interrupt.lock() {
            if let Some(listener) = slot.take() {
                listener.abort();
            }
        }
    }
}
