use futures::StreamExt;
use log::*;
use std::collections::HashMap;
use ws_pipe::config::{HeartbeatConfig, ServerConfig};
use ws_pipe::connection::{ConnectionHandle, ID};
use ws_pipe::encryptor::EncryptorRegistry;
use ws_pipe::event::Event;
use ws_pipe::server::start_server_with_config;

#[tokio::main]
async fn main() {
    env_logger::init();

    let port: u16 = 8080;
    let config = ServerConfig {
        heartbeat: Some(HeartbeatConfig::default()),
        ..Default::default()
    };

    match start_server_with_config(port, config, EncryptorRegistry::new()).await {
        Ok(mut event_receiver) => {
            let mut clients: HashMap<ID, ConnectionHandle> = HashMap::new();
            info!("Server started on address 0.0.0.0:{}", port);
            while let Some(event) = event_receiver.next().await {
                match event {
                    Event::NewClient(id, client_conn) => {
                        info!("New client {} connected", id);
                        clients.insert(id, client_conn);
                    }
                    Event::NewMessage(client_id, message) => {
                        info!("Message from client {}: {:?}", client_id, message);
                        // broadcast to everyone
                        for connection in clients.values() {
                            if let Err(err) = connection.send_message(message.clone()) {
                                warn!("Couldn't send to {}: {}", connection.id(), err);
                            }
                        }
                    }
                    Event::Disconnect(client_id) => {
                        info!("Client {} disconnected", client_id);
                        clients.remove(&client_id);
                    }
                    Event::Error(client_id, error) => {
                        error!("Error occurred for client {}: {:?}", client_id, error);
                    }
                }
            }
        }
        Err(err) => {
            eprintln!("Could not start the server due to: {:?}", err);
        }
    }
}
