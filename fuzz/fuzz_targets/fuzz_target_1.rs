#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio::runtime::Runtime;
use ws_pipe::config::WebSocketConfig;
use ws_pipe::encryptor::{Encryptor, EncryptorRegistry};
use ws_pipe::error::Error;
use ws_pipe::read::{FrameDecoder, ReadStream};

#[derive(Clone)]
struct Identity;

impl Encryptor for Identity {
    fn id(&self) -> u8 {
        0
    }

    fn encrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(payload.to_vec())
    }

    fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(payload.to_vec())
    }

    fn box_clone(&self) -> Box<dyn Encryptor> {
        Box::new(self.clone())
    }
}

// Feeds arbitrary bytes to the decoder, and every content frame it produces through the
// decrypt path, neither of them should ever panic
fuzz_target!(|data: &[u8]| {
    let runtime = Runtime::new().unwrap();

    runtime.block_on(async move {
        let config = WebSocketConfig {
            max_frame_size: Some(1 << 16),
            max_message_size: Some(1 << 18),
        };
        let mut decoder = ReadStream::new(data, config);
        let mut registry = EncryptorRegistry::new().with(Identity).unwrap();

        while let Ok(Some(frame)) = decoder.read_frame().await {
            if frame.opcode.is_content() {
                let _ = registry.decrypt_payload(&frame.payload);
            }
        }
    });
});
