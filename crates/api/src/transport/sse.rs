//! Server-sent events side channel (§6): `GET /events?types=a,b&heartbeatMs=n`
//! subscribes to a comma-separated list of event types, emits `connected`,
//! then pass-through events matching those types, then periodic
//! `heartbeat` events when nothing else is pending.

use super::http::read_request;
use claudebench_primitives::EventBus;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

const DEFAULT_HEARTBEAT_MS: u64 = 15_000;
const POLL_INTERVAL_MS: u64 = 100;

/// Serve the SSE side channel on `addr` until the process exits.
pub async fn serve_sse(addr: SocketAddr, events: EventBus) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "sse endpoint listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let events = events.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, events).await {
                tracing::debug!(%peer, %err, "sse connection error");
            }
        });
    }
}

fn parse_query(path: &str) -> (Vec<String>, u64) {
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
    let mut types = Vec::new();
    let mut heartbeat_ms = DEFAULT_HEARTBEAT_MS;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "types" => {
                types = value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            }
            "heartbeatMs" => heartbeat_ms = value.parse().unwrap_or(DEFAULT_HEARTBEAT_MS),
            _ => {}
        }
    }
    (types, heartbeat_ms)
}

async fn handle_connection(mut stream: TcpStream, events: EventBus) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    if request.method != "GET" {
        return super::http::write_response(&mut stream, 404, "text/plain", b"not found").await;
    }

    let (types, heartbeat_ms) = parse_query(&request.path);
    let subscriptions: Vec<_> = types.iter().map(|t| events.subscribe_to(t.clone())).collect();

    let header = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n";
    stream.write_all(header.as_bytes()).await?;
    write_event(&mut stream, "connected", "{}").await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(heartbeat_ms));
    ticker.tick().await;
    loop {
        let mut delivered_any = false;
        for sub in &subscriptions {
            if let Some(event) = sub.try_recv() {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                write_event(&mut stream, &event.event_type, &payload).await?;
                delivered_any = true;
            }
        }
        if delivered_any {
            continue;
        }
        tokio::select! {
            _ = ticker.tick() => {
                write_event(&mut stream, "heartbeat", "{}").await?;
            }
            _ = tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)) => {}
        }
    }
}

async fn write_event(stream: &mut TcpStream, event: &str, data: &str) -> std::io::Result<()> {
    let frame = format!("event: {event}\ndata: {data}\n\n");
    stream.write_all(frame.as_bytes()).await?;
    stream.flush().await
}
