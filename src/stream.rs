use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

/// Duplex byte stream accepted by the server, either plain TCP or TLS over TCP.
/// Everything above this layer only sees `AsyncRead + AsyncWrite`.
pub enum PipeStream {
    Plain(TcpStream),
    Secure(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PipeStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            PipeStream::Secure(stream) => Pin::new(&mut **stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        match self.get_mut() {
            PipeStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            PipeStream::Secure(stream) => Pin::new(&mut **stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        match self.get_mut() {
            PipeStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            PipeStream::Secure(stream) => Pin::new(&mut **stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        match self.get_mut() {
            PipeStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            PipeStream::Secure(stream) => Pin::new(&mut **stream).poll_shutdown(cx),
        }
    }
}
