use crate::error::Error;
use crate::frame::{Frame, OpCode};
use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;

/// Writes server frames, which are never masked, into the write half of a stream.
pub struct Writer<W: AsyncWrite + Unpin + Send> {
    write_half: W,
}

impl<W: AsyncWrite + Unpin + Send> Writer<W> {
    pub fn new(write_half: W) -> Self {
        Self { write_half }
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        // The first byte of a websockets frame contains the final fragment bit, and the OpCode
        // in (frame.final_fragment as u8) << 7 we are doing a left bitwise shift, if final_fragment is true
        // it will be converted from 00000001 to 10000000
        // after that it will perform a bitwise OR operation with OpCode, so if Opcode is text(0x1)
        // the final result will be 10000001, which is 129 decimal
        let first_byte = (frame.final_fragment as u8) << 7 | frame.opcode.as_u8();
        let payload_len = frame.payload.len();

        let mut header = Vec::with_capacity(10);
        header.push(first_byte);

        // According to Websockets RFC, if the payload length is less or equal 125, it's written as a 8-bit unsigned integer
        // if it's between 126 and 65535, it's represented by additional 2 bytes, otherwise by additional 8 bytes.
        if payload_len <= 125 {
            header.push(payload_len as u8);
        } else if payload_len <= 65535 {
            header.extend_from_slice(&[126, (payload_len >> 8) as u8, payload_len as u8]);
        } else {
            header.push(127);
            header.extend_from_slice(&(payload_len as u64).to_be_bytes());
        }

        self.write_half.write_all(&header).await?;
        self.write_half.write_all(&frame.payload).await?;
        self.write_half.flush().await?;

        Ok(())
    }

    // Drains the outgoing queue of a connection into the socket.
    // It stops after writing a Close frame, or when every sender was dropped, shutting down
    // the write half in both cases
    pub async fn run(mut self, mut write_rx: UnboundedReceiver<Frame>) -> Result<(), Error> {
        while let Some(frame) = write_rx.recv().await {
            let closing = frame.opcode == OpCode::Close;
            self.write_frame(frame).await?;
            if closing {
                debug!("close frame written, shutting down the write half");
                break;
            }
        }

        self.write_half.shutdown().await?;
        Ok(())
    }
}
