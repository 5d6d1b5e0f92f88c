use crate::config::ServerConfig;
use crate::connection::{ConnectionInfo, Protocol, WSConnection};
use crate::dispatch;
use crate::encryptor::EncryptorRegistry;
use crate::error::Error;
use crate::event::{EventHandler, EventStream};
use crate::handler::Handler;
use crate::handshake::Negotiator;
use crate::heartbeat::Heartbeat;
use crate::read::ReadStream;
use crate::request::HttpRequest;
use crate::stream::PipeStream;
use crate::write::Writer;
use log::{debug, error, info};
use std::future::{self, Future};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;

const HTTP_BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request\r\n\
        Connection: close\r\n\
        Content-Length: 0\r\n\
        \r\n";

pub struct Server<H: Handler> {
    config: Arc<ServerConfig>,
    negotiator: Arc<Negotiator<H>>,
    // Every piped connection is tracked here, the heartbeat sweeper only runs when configured
    tracker: Arc<Heartbeat>,
}

impl<H: Handler> Server<H> {
    pub fn new(handler: H, encryptors: EncryptorRegistry, config: ServerConfig) -> Self {
        let tracker = Arc::new(Heartbeat::new(config.heartbeat.clone().unwrap_or_default()));
        let negotiator =
            Negotiator::new(Arc::new(handler), encryptors, &config).with_tracker(tracker.clone());

        Self {
            config: Arc::new(config),
            negotiator: Arc::new(negotiator),
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<Heartbeat> {
        &self.tracker
    }

    pub async fn run(self, listener: TcpListener) -> io::Result<()> {
        self.run_with_shutdown(listener, future::pending()).await
    }

    /// Accepts connections until `shutdown` completes, then closes every live connection, which
    /// unblocks their loops and fires their cleanup.
    pub async fn run_with_shutdown<F: Future<Output = ()>>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> io::Result<()> {
        let _sweeper = self
            .config
            .heartbeat
            .as_ref()
            .map(|_| self.tracker.start());
        let tls_acceptor = self.config.tls_config.clone().map(TlsAcceptor::from);

        tokio::pin!(shutdown);

        loop {
            let (socket, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("shutting down, closing {} connections", self.tracker.len());
                    self.tracker.close_all();
                    return Ok(());
                }
            };
            debug!("accepted connection from {}", peer);

            let negotiator = self.negotiator.clone();
            let config = self.config.clone();
            let tls_acceptor = tls_acceptor.clone();

            tokio::spawn(async move {
                let stream = match tls_acceptor {
                    Some(acceptor) => match acceptor.accept(socket).await {
                        Ok(stream) => PipeStream::Secure(Box::new(stream)),
                        Err(err) => {
                            error!("TLS handshake with {} failed: {}", peer, err);
                            return;
                        }
                    },
                    None => PipeStream::Plain(socket),
                };

                if let Err(err) = serve_connection(stream, Some(peer), &negotiator, &config).await {
                    error!("error serving connection from {}: {}", peer, err);
                }
            });
        }
    }
}

/// Takes a freshly accepted stream through the upgrade and, when accepted, serves it until it
/// closes.
pub async fn serve_connection<S, H>(
    stream: S,
    peer_addr: Option<SocketAddr>,
    negotiator: &Negotiator<H>,
    config: &ServerConfig,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: Handler,
{
    let (reader, mut writer) = split(stream);
    let mut buf_reader = BufReader::new(reader);

    let parsed = timeout(
        config.handshake_timeout,
        HttpRequest::parse_http_request(&mut buf_reader),
    )
    .await?;

    let (protocol, request) = match parsed {
        Ok(request) => (Protocol::Http, request),
        // Bytes that don't look like HTTP at all belong to some other protocol
        Err(Error::HttpParseError { .. }) => (Protocol::Unknown, HttpRequest::default()),
        Err(err) => return Err(err),
    };

    let result = negotiator.negotiate(protocol, ConnectionInfo { peer_addr, request });

    let mut connection = match result.connection {
        Some(connection) if result.accepted && result.pipe => connection,
        _ => {
            debug!("upgrade rejected for {:?}", peer_addr);
            if protocol == Protocol::Http {
                writer.write_all(HTTP_BAD_REQUEST.as_bytes()).await?;
            }
            writer.shutdown().await?;
            return Ok(());
        }
    };

    let write_rx = match connection.take_outgoing() {
        Some(write_rx) => write_rx,
        None => {
            abort(&connection);
            return Err(Error::ConnectionClosed);
        }
    };

    if let Err(err) = writer.write_all(&result.response).await {
        abort(&connection);
        return Err(err.into());
    }

    let id = connection.id();
    tokio::spawn(async move {
        if let Err(err) = Writer::new(writer).run(write_rx).await {
            debug!("writer for connection {} stopped: {}", id, err);
        }
    });

    let decoder = ReadStream::new(buf_reader, config.web_socket_config.clone());
    dispatch::run(connection, decoder, negotiator.handler().clone()).await;

    Ok(())
}

fn abort(connection: &WSConnection) {
    connection.handle().close();
    connection.handle().cleanup().fire();
}

pub async fn start_server(port: u16) -> Result<EventStream, Error> {
    start_server_with_config(port, ServerConfig::default(), EncryptorRegistry::new()).await
}

// Binds the port and spawns the server in the background, every connection event is handed
// back through the returned stream
pub async fn start_server_with_config(
    port: u16,
    config: ServerConfig,
    encryptors: EncryptorRegistry,
) -> Result<EventStream, Error> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let (handler, events) = EventHandler::new();
    let server = Server::new(handler, encryptors, config);

    tokio::spawn(async move {
        if let Err(err) = server.run(listener).await {
            error!("server stopped accepting connections: {}", err);
        }
    });

    Ok(events)
}
