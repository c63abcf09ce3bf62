/*
 *     Copyright 2025 The Netpulse Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use netpulse_core::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;

/// Shutdown is a cooperative cancellation signal shared by clones.
#[derive(Debug)]
pub struct Shutdown {
    /// is_shutdown is true once the signal has been observed by this handle.
    is_shutdown: bool,

    /// sender is used to send the shutdown signal.
    sender: broadcast::Sender<()>,

    /// receiver is used to receive the shutdown signal.
    receiver: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Creates a new Shutdown.
    pub fn new() -> Shutdown {
        let (sender, receiver) = broadcast::channel(1);
        Self {
            is_shutdown: false,
            sender,
            receiver,
        }
    }

    /// Returns true if the shutdown signal has been observed by this handle.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// is_triggered checks for a pending signal without waiting.
    pub fn is_triggered(&mut self) -> bool {
        if self.is_shutdown {
            return true;
        }

        match self.receiver.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Lagged(_)) | Err(TryRecvError::Closed) => {
                self.is_shutdown = true;
            }
        }

        self.is_shutdown
    }

    /// trigger sends the shutdown signal to every clone.
    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }

    /// recv waits for the shutdown signal.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        let _ = self.receiver.recv().await;
        self.is_shutdown = true;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Clone subscribes a new receiver, so a clone only observes signals sent
/// after it was created unless the source had already observed one.
impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            is_shutdown: self.is_shutdown,
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// shutdown_signal resolves when a SIGINT, SIGTERM or SIGQUIT signal is
/// received by the process.
pub async fn shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        },
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigquit.recv() => {
            info!("received SIGQUIT, shutting down");
        }
    }

    Ok(())
}
