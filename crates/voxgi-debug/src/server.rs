//! TCP debug server

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::protocol::{DebugCommand, DebugResponse};

/// Trait that the application implements to handle debug commands
pub trait DebugHandler: Send + Sync + 'static {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse;
}

/// Debug server handle - keep this alive to keep the server running
pub struct DebugServer {
    handle: tokio::task::JoinHandle<()>,
    local_addr: Option<SocketAddr>,
}

impl DebugServer {
    /// Start the debug server on the given localhost port.
    /// The handler is called for each incoming command.
    /// Returns immediately -- server runs in background.
    pub fn start(handler: Arc<Mutex<dyn DebugHandler>>, port: u16) -> Self {
        let handle = tokio::spawn(async move {
            let addr = format!("127.0.0.1:{}", port);
            let listener = match TcpListener::bind(&addr).await {
                Ok(l) => {
                    log::info!("voxgi-debug: serving inspectors on {}", addr);
                    l
                }
                Err(e) => {
                    log::error!("voxgi-debug: cannot listen on {}: {}", addr, e);
                    return;
                }
            };
            accept_loop(listener, handler).await;
        });

        Self {
            handle,
            local_addr: None,
        }
    }

    /// Bind first, then serve in the background. Use port 0 to let the OS
    /// pick one; [`local_addr`](Self::local_addr) reports it.
    pub async fn bind(handler: Arc<Mutex<dyn DebugHandler>>, addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        log::info!("voxgi-debug: serving inspectors on {}", local_addr);
        let handle = tokio::spawn(accept_loop(listener, handler));
        Ok(Self {
            handle,
            local_addr: Some(local_addr),
        })
    }

    /// Bound address, known only for servers created with [`bind`](Self::bind)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting connections
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn accept_loop(listener: TcpListener, handler: Arc<Mutex<dyn DebugHandler>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("voxgi-debug: accept failed: {}", e);
                continue;
            }
        };
        log::info!("voxgi-debug: inspector {} attached", peer);
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_inspector(stream, handler).await {
                log::warn!("voxgi-debug: inspector {} dropped: {}", peer, e);
            }
            log::info!("voxgi-debug: inspector {} detached", peer);
        });
    }
}

/// Answer one JSON command per line until the inspector hangs up
async fn serve_inspector(
    stream: tokio::net::TcpStream,
    handler: Arc<Mutex<dyn DebugHandler>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        let mut reply = respond(request, &handler).await;
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// JSON reply for one request line, without the trailing newline
async fn respond(request: &str, handler: &Mutex<dyn DebugHandler>) -> String {
    let response = match serde_json::from_str::<DebugCommand>(request) {
        Ok(cmd) => {
            log::debug!("voxgi-debug: {:?}", cmd);
            handler.lock().await.handle_command(cmd)
        }
        Err(e) => DebugResponse::error(format!("unrecognized command: {}", e)),
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        serde_json::json!({ "status": "error", "message": format!("reply not encodable: {}", e) })
            .to_string()
    })
}
