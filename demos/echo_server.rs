use log::*;
use ws_pipe::config::ServerConfig;
use ws_pipe::connection::{ConnectionHandle, ConnectionInfo};
use ws_pipe::encryptor::{Encryptor, EncryptorRegistry};
use ws_pipe::error::{Error, HandlerError};
use ws_pipe::handler::Handler;
use ws_pipe::message::Message;
use ws_pipe::server::Server;
use tokio::net::TcpListener;

// Toy cipher, good enough for showing how payloads get prefixed and routed
#[derive(Clone)]
struct XorEncryptor {
    key: u8,
}

impl Encryptor for XorEncryptor {
    fn id(&self) -> u8 {
        1
    }

    fn encrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(payload.iter().map(|byte| byte ^ self.key).collect())
    }

    fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(payload.iter().map(|byte| byte ^ self.key).collect())
    }

    fn box_clone(&self) -> Box<dyn Encryptor> {
        Box::new(self.clone())
    }
}

struct Echo;

impl Handler for Echo {
    fn connected(&self, info: &ConnectionInfo) -> bool {
        info!("Upgrade requested by {:?} on {}", info.peer_addr, info.request.path);
        true
    }

    fn received(&self, connection: &ConnectionHandle, message: Message) -> Result<(), HandlerError> {
        connection.send_encrypted(1, message)?;
        Ok(())
    }

    fn disconnected(&self, connection: &ConnectionHandle) {
        info!("Client {} disconnected", connection.id());
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr = "127.0.0.1:9002";
    let listener = TcpListener::bind(&addr).await.expect("Can't listen");
    info!("Listening on: {}", addr);

    let encryptors = EncryptorRegistry::new()
        .with(XorEncryptor { key: 0x5A })
        .expect("encryptor ids are unique");

    let server = Server::new(Echo, encryptors, ServerConfig::default());
    if let Err(err) = server.run(listener).await {
        error!("Server stopped: {}", err);
    }
}
