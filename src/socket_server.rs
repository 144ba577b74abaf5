use crate::ipc::{IpcCommand, IpcRequest, IpcResponse, get_socket_path};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Guard that removes the socket file when dropped
pub struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if self.path.exists() {
                error!("Failed to remove socket file: {}", e);
            }
        } else {
            info!("Removed socket file at {}", self.path.display());
        }
    }
}

/// Start the IPC socket server at the default path.
pub async fn start_server<E>(tx: mpsc::UnboundedSender<E>) -> Result<SocketGuard>
where
    E: From<IpcRequest> + Send + 'static,
{
    start_server_at(&get_socket_path()?, tx).await
}

/// Requests are posted on `tx`; the returned guard cleans up the socket.
pub async fn start_server_at<E>(socket_path: &Path, tx: mpsc::UnboundedSender<E>) -> Result<SocketGuard>
where
    E: From<IpcRequest> + Send + 'static,
{
    // Remove stale socket if it exists
    if socket_path.exists() {
        info!("Removing stale socket at {}", socket_path.display());
        fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

    info!("IPC socket listening at {}", socket_path.display());

    let guard = SocketGuard {
        path: socket_path.to_path_buf(),
    };

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let tx_clone = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, tx_clone).await {
                            debug!("Client connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    });

    Ok(guard)
}

/// Handle a single client connection
async fn handle_client<E>(stream: UnixStream, tx: mpsc::UnboundedSender<E>) -> Result<()>
where
    E: From<IpcRequest>,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Read one command per connection
    reader.read_line(&mut line).await?;

    let response = match line.parse::<IpcCommand>() {
        Ok(command) => {
            debug!("Received IPC command: {:?}", command);
            dispatch(command, &tx).await
        }
        Err(_) => {
            warn!("Unknown IPC command: {}", line.trim());
            IpcResponse::Error(format!("Unknown command: {}", line.trim()))
        }
    };

    let response_json = serde_json::to_string(&response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

/// Hand the command to the daemon loop and wait for its answer.
async fn dispatch<E>(command: IpcCommand, tx: &mpsc::UnboundedSender<E>) -> IpcResponse
where
    E: From<IpcRequest>,
{
    let (reply, response) = oneshot::channel();
    if tx.send(E::from(IpcRequest { command, reply })).is_err() {
        return IpcResponse::Error("Daemon is shutting down".to_string());
    }
    response
        .await
        .unwrap_or_else(|_| IpcResponse::Error("Daemon dropped the request".to_string()))
}
