//! View-facing handle to a running session.

use murmur_core::{SessionError, SessionSnapshot};
use tokio::sync::{mpsc, oneshot, watch};

/// Requests from handles to the runtime.
#[derive(Debug)]
pub(crate) enum Command {
    Connect { username: String, reply: oneshot::Sender<Result<(), SessionError>> },
    SendMessage { text: String, reply: oneshot::Sender<Result<(), SessionError>> },
    SetTyping { is_typing: bool },
    Disconnect { reply: oneshot::Sender<()> },
    Shutdown,
}

/// Cloneable handle used by the view layer.
///
/// Actions are validated by the session before this returns, so a
/// [`SessionError::Validation`] arrives synchronously with respect to the
/// call. Transport outcomes are never reported here; watch
/// [`SessionSnapshot::status`] instead.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self { commands, snapshots }
    }

    /// Log in and start connecting as `username`.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` if `username` is blank
    /// - `SessionError::AlreadyActive` if a connection is up or pending
    /// - `SessionError::IdentityLocked` if reconnecting under another name
    /// - `SessionError::RuntimeClosed` if the runtime has stopped
    pub async fn connect(&self, username: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Connect { username: username.into(), reply }).await?;
        rx.await.map_err(|_| SessionError::RuntimeClosed)?
    }

    /// Post a chat message. It appears in the log once the server echoes it.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` if `text` is blank
    /// - `SessionError::NotConnected` if not connected
    /// - `SessionError::RuntimeClosed` if the runtime has stopped
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::SendMessage { text: text.into(), reply }).await?;
        rx.await.map_err(|_| SessionError::RuntimeClosed)?
    }

    /// Report typing activity. Call with `true` on every keystroke.
    ///
    /// # Errors
    ///
    /// - `SessionError::RuntimeClosed` if the runtime has stopped
    pub async fn set_typing(&self, is_typing: bool) -> Result<(), SessionError> {
        self.request(Command::SetTyping { is_typing }).await
    }

    /// Close the connection, keeping identity and history.
    ///
    /// # Errors
    ///
    /// - `SessionError::RuntimeClosed` if the runtime has stopped
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Disconnect { reply }).await?;
        rx.await.map_err(|_| SessionError::RuntimeClosed)
    }

    /// Tear the session down and stop the runtime.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    async fn request(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::RuntimeClosed)
    }
}
