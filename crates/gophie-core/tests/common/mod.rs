// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Test server

#![allow(dead_code)]

use async_channel::Receiver;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Minimal Gopher server answering every request with the same bytes
pub struct TestServer {
    pub port: u16,
    pub requests: Receiver<String>,
}

impl TestServer {
    /// Reply and close the connection
    pub async fn start(response: &[u8]) -> Self {
        Self::spawn(response.to_vec(), false).await
    }

    /// Reply, then keep the connection open without sending more
    pub async fn stalling(response: &[u8]) -> Self {
        Self::spawn(response.to_vec(), true).await
    }

    async fn spawn(response: Vec<u8>, stall: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (request_tx, requests) = async_channel::unbounded();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let response = response.clone();
                let request_tx = request_tx.clone();

                tokio::spawn(async move {
                    let mut stream = BufReader::new(stream);
                    let mut line = String::new();
                    if stream.read_line(&mut line).await.is_err() {
                        return;
                    }
                    let _ = request_tx.send(line).await;

                    let mut stream = stream.into_inner();
                    let _ = stream.write_all(&response).await;
                    let _ = stream.flush().await;
                    if stall {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                });
            }
        });

        Self { port, requests }
    }
}

/// Port on 127.0.0.1 with nothing listening
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll until `condition` holds, failing after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
