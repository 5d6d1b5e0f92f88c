use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use std::future::Future;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Turns a byte stream into discrete WebSocket frames.
///
/// `Ok(None)` means the peer is gone, and no more frames will come. Any `Err` is a broken
/// stream, the dispatch loop treats both cases as the end of the connection.
///
/// Implementations are expected to reassemble fragmented messages, so the only opcodes a
/// caller should see are Text, Binary, Close, Ping, Pong and reserved codes.
pub trait FrameDecoder: Send {
    fn read_frame(&mut self) -> impl Future<Output = Result<Option<Frame>, Error>> + Send;
}

/// Default RFC6455 decoder, reading frames sent by a client straight from the socket.
pub struct ReadStream<R: AsyncRead + Unpin + Send> {
    read: R,
    fragmented_message: Option<(OpCode, Vec<u8>)>,
    config: WebSocketConfig,
}

impl<R: AsyncRead + Unpin + Send> ReadStream<R> {
    pub fn new(read: R, config: WebSocketConfig) -> Self {
        Self {
            read,
            fragmented_message: None,
            config,
        }
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            let frame = match self.read_raw_frame().await {
                Ok(frame) => frame,
                // The peer closed the socket, in the middle of a frame or not, there is nothing
                // else to read
                Err(Error::IOError { source }) if source.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                Err(err) => return Err(err),
            };

            match frame.opcode {
                OpCode::Continue => {
                    let (opcode, mut buffer) = self
                        .fragmented_message
                        .take()
                        .ok_or(Error::InvalidContinuationFrame)?;

                    buffer.extend_from_slice(&frame.payload);
                    if buffer.len() > self.config.max_message_size.unwrap_or(usize::MAX) {
                        return Err(Error::MaxMessageSize);
                    }

                    if frame.final_fragment {
                        return Ok(Some(Frame::new(true, opcode, buffer)));
                    }
                    self.fragmented_message = Some((opcode, buffer));
                }
                OpCode::Text | OpCode::Binary => {
                    // A new data frame can't start while a fragmented one is still open
                    if self.fragmented_message.is_some() {
                        return Err(Error::FragmentedInProgress);
                    }
                    if frame.final_fragment {
                        return Ok(Some(frame));
                    }
                    self.fragmented_message = Some((frame.opcode, frame.payload));
                }
                // Control frames may be injected in the middle of a fragmented message, they are
                // handed out right away, keeping the partial message buffered
                _ => return Ok(Some(frame)),
            }
        }
    }

    async fn read_raw_frame(&mut self) -> Result<Frame, Error> {
        let mut header = [0u8; 2];

        self.read.read_exact(&mut header).await?;

        // The first bit in the first byte in the frame tells us whether the current frame is the final fragment of a message
        let final_fragment = (header[0] & 0b10000000) != 0;

        // RSV1-3 would only be set by a negotiated extension, and this server doesn't negotiate any
        if header[0] & 0b01110000 != 0 {
            return Err(Error::RSVNotZero);
        }

        // The opcode is the last 4 bits of the first byte in a websockets frame
        let opcode = OpCode::from(header[0] & 0b00001111)?;

        // As a rule in websockets protocol, if your opcode is a control opcode(ping,pong,close), your message can't be fragmented(split between multiple frames)
        if !final_fragment && opcode.is_control() {
            return Err(Error::ControlFramesFragmented);
        }

        // Per RFC6455, the first bit of the second byte of each frame is the "Mask bit",
        // every frame coming from a client has to be masked
        if (header[1] & 0b10000000) == 0 {
            return Err(Error::UnmaskedClientFrame);
        }

        // The next 7 bits are used to represent the payload length, with 126 and 127 meaning
        // that the real length comes in the next 2 or 8 bytes
        let mut length = (header[1] & 0b01111111) as usize;

        if length > 125 && opcode.is_control() {
            return Err(Error::ControlFramePayloadSize);
        }

        if length == 126 {
            let mut be_bytes = [0u8; 2];
            self.read.read_exact(&mut be_bytes).await?;
            length = u16::from_be_bytes(be_bytes) as usize;
        } else if length == 127 {
            let mut be_bytes = [0u8; 8];
            self.read.read_exact(&mut be_bytes).await?;
            let extended = u64::from_be_bytes(be_bytes);
            // The most significant bit must be 0, checked before anything gets allocated
            if extended >> 63 != 0 {
                return Err(Error::InvalidPayloadLength);
            }
            length = usize::try_from(extended).map_err(|_| Error::MaxFrameSize)?;
        }

        if length > self.config.max_frame_size.unwrap_or(usize::MAX) {
            return Err(Error::MaxFrameSize);
        }

        let mut mask = [0u8; 4];
        self.read.read_exact(&mut mask).await?;

        let mut payload = vec![0u8; length];
        self.read.read_exact(&mut payload).await?;

        // Unmasking
        // Every frame sent from a client is masked by a four-byte key, each byte of the payload
        // is XOR'd with the corresponding byte (modulo 4) of the key
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }

        Ok(Frame::new(final_fragment, opcode, payload))
    }
}

impl<R: AsyncRead + Unpin + Send> FrameDecoder for ReadStream<R> {
    async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.next_frame().await
    }
}
