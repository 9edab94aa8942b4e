use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::watch;

/// Why the process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupted,
    Quit { save_config: bool },
}

/// Process-wide cancellation token. The first trigger wins.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            log::info!("Shutdown requested: {:?}", reason);
            *current = Some(reason);
            true
        });
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of [`Shutdown`], one per task.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&mut self) {
        // An Err means every Shutdown handle is gone; treat that as a trigger.
        let _ = self.rx.wait_for(Option::is_some).await;
    }
}

/// Trigger shutdown on Ctrl-C.
pub async fn watch_interrupt(shutdown: Shutdown) {
    let mut signal = shutdown.signal();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            shutdown.trigger(ShutdownReason::Interrupted);
        }
        _ = signal.triggered() => {}
    }
}

pub fn parse_command(line: &str) -> Option<ShutdownReason> {
    match line.trim() {
        "q" | "Q" => Some(ShutdownReason::Quit { save_config: true }),
        "x" | "X" => Some(ShutdownReason::Quit { save_config: false }),
        _ => None,
    }
}

/// Read console commands from stdin on a dedicated thread.
///
/// `q` saves the session config and quits, `x` quits without saving. The
/// thread is detached; it ends with the process.
pub fn spawn_console(shutdown: Shutdown) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(reason) => {
                        shutdown.trigger(reason);
                        break;
                    }
                    None if !line.trim().is_empty() => {
                        log::warn!(
                            "Unknown command '{}' (q = save and quit, x = quit)",
                            line.trim()
                        );
                    }
                    None => {}
                }
            }
        })?;
    Ok(())
}
