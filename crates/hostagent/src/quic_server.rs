//! QUIC server for send-text clients
//!
//! Each bidirectional stream carries one client session: `Hello` with the
//! host token first, then any number of `SendText` chunks applied in order.
//! Failures come back as `Error` messages; successful chunks get no reply.

use anyhow::{Context, Result};
use quinn::{Endpoint, TokioRuntime};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use textcast_core::{
    protocol::{FrameBuffer, MessageCodec},
    transport::configure_server,
    AuthToken, CoreError, NetworkMessage,
};

use crate::control::HostHandle;

/// QUIC server for send-text connections
pub struct QuicServer {
    endpoint: Endpoint,
}

impl QuicServer {
    /// Bind the endpoint with the host certificate
    pub fn bind(
        bind_addr: SocketAddr,
        cert: CertificateDer<'static>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self> {
        let cfg = configure_server(vec![cert], key).context("Failed to configure server")?;

        let socket = std::net::UdpSocket::bind(bind_addr)
            .with_context(|| format!("Failed to bind UDP socket on {}", bind_addr))?;

        let runtime = Arc::new(TokioRuntime);
        let endpoint = Endpoint::new(Default::default(), Some(cfg), socket, runtime)
            .context("Failed to create QUIC endpoint")?;

        Ok(Self { endpoint })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr().context("Failed to read local address")
    }

    /// Accept connections until the endpoint closes
    pub async fn serve(&self, token: AuthToken, host: HostHandle) -> Result<()> {
        tracing::info!("QUIC server listening on {}", self.local_addr()?);

        while let Some(incoming) = self.endpoint.accept().await {
            let host = host.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(incoming, token, host).await {
                    tracing::warn!("Connection error: {}", e);
                }
            });
        }

        tracing::warn!("Endpoint closed");
        Ok(())
    }

    /// Handle single connection
    async fn handle_connection(incoming: quinn::Incoming, token: AuthToken, host: HostHandle) -> Result<()> {
        let connection = incoming.accept()?.await?;

        let remote_addr = connection.remote_address();
        tracing::info!("Connection from {}", remote_addr);

        loop {
            match connection.accept_bi().await {
                Ok((send, recv)) => {
                    let host = host.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_stream(send, recv, token, host, remote_addr).await {
                            tracing::warn!("Stream error: {}", e);
                        }
                    });
                }
                Err(quinn::ConnectionError::ApplicationClosed(_)) | Err(quinn::ConnectionError::LocallyClosed) => {
                    tracing::info!("Connection closed: {}", remote_addr);
                    break;
                }
                Err(e) => {
                    tracing::debug!("Accept stream error from {}: {}", remote_addr, e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle single bi-directional stream
    async fn handle_stream(
        mut send: quinn::SendStream,
        mut recv: quinn::RecvStream,
        token: AuthToken,
        host: HostHandle,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        let mut authenticated = false;
        let mut frames = FrameBuffer::new();
        let mut read_buf = [0u8; 8192];

        loop {
            let n = match recv.read(&mut read_buf).await {
                Ok(Some(n)) => n,
                Ok(None) => {
                    tracing::debug!("Stream finished by {}", peer_addr);
                    break;
                }
                Err(e) => {
                    tracing::debug!("Read error from {}: {}", peer_addr, e);
                    break;
                }
            };
            frames.extend(&read_buf[..n]);

            loop {
                let msg = match frames.next_message() {
                    Ok(Some(msg)) => msg,
                    Ok(None) => break,
                    Err(e @ CoreError::MessageTooLarge { .. }) => {
                        // The stream can't be resynchronized past a bad length prefix
                        Self::send_message(&mut send, &NetworkMessage::error(e.to_string())).await?;
                        let _ = send.finish();
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!("Undecodable message from {}: {}", peer_addr, e);
                        Self::send_message(&mut send, &NetworkMessage::error(e.to_string())).await?;
                        continue;
                    }
                };

                match msg {
                    NetworkMessage::Hello { ref app_version, auth_token, .. } => {
                        tracing::debug!("Client hello from {}, app_version={}", peer_addr, app_version);

                        if let Err(e) = msg.validate_handshake() {
                            tracing::warn!("Handshake validation failed for {}: {}", peer_addr, e);
                            Self::send_message(&mut send, &NetworkMessage::error(e.to_string())).await?;
                            let _ = send.finish();
                            return Ok(());
                        }

                        let token_valid = auth_token.map(|t| token.verify(&t)).unwrap_or(false);
                        if !token_valid {
                            tracing::warn!("Auth failed for {}", peer_addr);
                            let err = CoreError::AuthFailed.to_string();
                            Self::send_message(&mut send, &NetworkMessage::error(err)).await?;
                            let _ = send.finish();
                            return Ok(());
                        }

                        authenticated = true;
                        tracing::info!("Client authenticated: {}", peer_addr);
                        Self::send_message(&mut send, &NetworkMessage::hello(None)).await?;
                    }
                    NetworkMessage::SendText(request) => {
                        if !authenticated {
                            tracing::warn!("SendText before authentication from {}", peer_addr);
                            let err = NetworkMessage::error("Not authenticated");
                            Self::send_message(&mut send, &err).await?;
                            let _ = send.finish();
                            return Ok(());
                        }

                        if let Err(e) = host.send_text(request).await {
                            Self::send_message(&mut send, &NetworkMessage::error(e.to_string())).await?;
                        }
                    }
                    NetworkMessage::Ping { timestamp } => {
                        Self::send_message(&mut send, &NetworkMessage::pong(timestamp)).await?;
                    }
                    NetworkMessage::Pong { .. } => {}
                    NetworkMessage::Error { message } => {
                        tracing::warn!("Client {} reported: {}", peer_addr, message);
                    }
                    NetworkMessage::Close => {
                        tracing::debug!("Received Close from {}", peer_addr);
                        Self::send_message(&mut send, &NetworkMessage::Close).await?;
                        let _ = send.finish();
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }

    async fn send_message(send: &mut quinn::SendStream, msg: &NetworkMessage) -> Result<()> {
        let buf = MessageCodec::encode(msg)?;
        send.write_all(&buf).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::DEFAULT_EXPIRY;
    use crate::control::HostLoop;
    use crate::registry::mock::MockRegistry;
    use textcast_core::transport::{configure_client, fingerprint, PinnedCertVerifier, SERVER_NAME};
    use textcast_core::{SendData, SendTextRequest};
    use tokio::sync::mpsc;

    struct Client {
        send: quinn::SendStream,
        recv: quinn::RecvStream,
        frames: FrameBuffer,
        _endpoint: Endpoint,
    }

    impl Client {
        async fn connect(addr: SocketAddr, fp: &str) -> Self {
            let mut endpoint = Endpoint::client("127.0.0.1:0".parse().unwrap()).unwrap();
            endpoint.set_default_client_config(
                configure_client(Arc::new(PinnedCertVerifier::new(fp))).unwrap(),
            );
            let connection = endpoint.connect(addr, SERVER_NAME).unwrap().await.unwrap();
            let (send, recv) = connection.open_bi().await.unwrap();
            Self {
                send,
                recv,
                frames: FrameBuffer::new(),
                _endpoint: endpoint,
            }
        }

        async fn send(&mut self, msg: &NetworkMessage) {
            self.send.write_all(&MessageCodec::encode(msg).unwrap()).await.unwrap();
        }

        async fn recv(&mut self) -> NetworkMessage {
            let mut buf = [0u8; 4096];
            loop {
                if let Some(msg) = self.frames.next_message().unwrap() {
                    return msg;
                }
                let n = self.recv.read(&mut buf).await.unwrap().expect("stream ended");
                self.frames.extend(&buf[..n]);
            }
        }
    }

    async fn start_host(
        reg: MockRegistry,
    ) -> (SocketAddr, String, AuthToken, tokio::task::JoinHandle<MockRegistry>, tokio::task::JoinHandle<()>) {
        let generated = rcgen::generate_simple_self_signed([SERVER_NAME.to_string()]).unwrap();
        let cert = CertificateDer::from(generated.cert);
        let key = PrivateKeyDer::Pkcs8(generated.key_pair.serialize_der().into());
        let fp = fingerprint(&cert);

        let server = QuicServer::bind("127.0.0.1:0".parse().unwrap(), cert, key).unwrap();
        let addr = server.local_addr().unwrap();
        let token = AuthToken::generate();

        let (_closed_tx, closed_rx) = mpsc::unbounded_channel();
        let (host, handle) = HostLoop::new(reg, DEFAULT_EXPIRY, closed_rx);
        let host_task = tokio::spawn(host.run());
        let server_task = tokio::spawn(async move {
            let _ = server.serve(token, handle).await;
        });
        (addr, fp, token, host_task, server_task)
    }

    #[tokio::test]
    async fn test_send_text_over_quic() {
        let reg = MockRegistry::with_tabs(&[("main", &["a", "b"])]);
        let (addr, fp, token, host_task, server_task) = start_host(reg).await;

        let mut client = Client::connect(addr, &fp).await;
        client.send(&NetworkMessage::hello(Some(token))).await;
        assert!(matches!(client.recv().await, NetworkMessage::Hello { auth_token: None, .. }));

        let base = SendTextRequest {
            match_spec: Some("title:b".to_string()),
            ..Default::default()
        };
        for chunk in ["echo ", "hi\r"] {
            let msg = NetworkMessage::SendText(base.with_data(&SendData::Text(chunk.to_string())));
            client.send(&msg).await;
        }
        let bad_tab = SendTextRequest {
            match_tab: Some("title:none".to_string()),
            ..base.with_data(&SendData::Text("x".to_string()))
        };
        client.send(&NetworkMessage::SendText(bad_tab)).await;
        match client.recv().await {
            NetworkMessage::Error { message } => assert!(message.contains("title:none")),
            other => panic!("Expected Error, got {:?}", other),
        }

        client.send(&NetworkMessage::Close).await;
        assert_eq!(client.recv().await, NetworkMessage::Close);

        // Every HostHandle clone must go before the loop hands back the registry
        drop(client);
        server_task.abort();
        let reg = host_task.await.unwrap();
        assert_eq!(reg.written(2), b"echo hi\r");
        assert!(reg.written(1).is_empty());
    }

    #[tokio::test]
    async fn test_bad_token_rejected() {
        let reg = MockRegistry::with_tabs(&[("main", &["a"])]);
        let (addr, fp, _token, _host_task, _server_task) = start_host(reg).await;

        let mut client = Client::connect(addr, &fp).await;
        client.send(&NetworkMessage::hello(Some(AuthToken::generate()))).await;
        match client.recv().await {
            NetworkMessage::Error { message } => assert!(message.contains("Authentication failed")),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_text_requires_hello() {
        let reg = MockRegistry::with_tabs(&[("main", &["a"])]);
        let (addr, fp, _token, _host_task, _server_task) = start_host(reg).await;

        let mut client = Client::connect(addr, &fp).await;
        let msg = NetworkMessage::SendText(SendTextRequest::default().with_data(&SendData::Text("x".to_string())));
        client.send(&msg).await;
        assert!(matches!(client.recv().await, NetworkMessage::Error { .. }));
    }
}
