use crate::connection::{ConnectionHandle, WSConnection};
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::handler::{call_guarded, Handler};
use crate::message::Message;
use crate::read::FrameDecoder;
use log::{debug, warn};
use std::sync::Arc;

enum Flow {
    Continue,
    Stop,
}

/// Serves a piped connection until the peer goes away, a Close frame arrives, the stream breaks,
/// or someone calls [`ConnectionHandle::close`].
///
/// Frames are handled one at a time, in the order they were read. Whatever the exit path, the
/// connection ends up closed and its cleanup hook fired.
pub async fn run<D: FrameDecoder, H: Handler>(connection: WSConnection, mut decoder: D, handler: Arc<H>) {
    let handle = connection.handle().clone();
    let id = handle.id();

    call_guarded("ready", id, || handler.ready(&handle));

    loop {
        // A local close wins over frames already buffered, nothing is routed once it's Closed
        let result = tokio::select! {
            biased;
            _ = handle.closed() => {
                debug!("connection {} closed locally", id);
                break;
            }
            result = decoder.read_frame() => result,
        };

        let frame = match result {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("connection {} closed by peer", id);
                break;
            }
            Err(err) => {
                warn!("failed to read from connection {}: {}", id, err);
                report_failure(&handle, handler.as_ref(), err);
                break;
            }
        };

        match process_frame(&handle, handler.as_ref(), frame) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => {
                debug!("connection {} terminated by peer", id);
                break;
            }
            Err(err) => {
                warn!("protocol error on connection {}: {}", id, err);
                report_failure(&handle, handler.as_ref(), err);
                break;
            }
        }
    }

    handle.close();
    handle.cleanup().fire();
    drop(connection);
}

fn process_frame<H: Handler>(
    handle: &ConnectionHandle,
    handler: &H,
    mut frame: Frame,
) -> Result<Flow, Error> {
    if handle.smart_keepalive() {
        handle.keepalive();
    }

    if frame.opcode.is_content() && !frame.payload.is_empty() && handle.has_encryptors() {
        frame.payload = handle.decrypt(&frame.payload)?;
    }

    match frame.opcode {
        OpCode::Text | OpCode::Binary => {
            let message = Message::from_frame(frame)?;
            call_guarded("received", handle.id(), || handler.received(handle, message));
        }
        OpCode::Close => return Ok(Flow::Stop),
        OpCode::Ping => handle.send_frame(Frame::new(true, OpCode::Pong, frame.payload))?,
        OpCode::Pong => handle.keepalive(),
        // Continuations never leave a decoder, and reserved codes mean nothing to us yet
        OpCode::Continue | OpCode::Reserved(_) => {}
    }

    Ok(Flow::Continue)
}

fn report_failure<H: Handler>(handle: &ConnectionHandle, handler: &H, err: Error) {
    call_guarded("failed", handle.id(), || {
        handler.failed(handle, err);
        Ok(())
    });
}
