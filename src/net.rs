use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::destination::Destination;
use crate::normalize::RawResponse;
use crate::request::QuerySpec;
use tracing::{debug, error, info};

#[derive(Clone, Debug)]
pub struct PendingQuery {
    pub destination: Destination,
    pub query: QuerySpec,
}

/// All due queries of one poll cycle.
#[derive(Clone, Debug)]
pub struct FetchBatch {
    pub instance_id: String,
    pub seq: u64,
    pub queries: Vec<PendingQuery>,
}

#[derive(Clone, Debug)]
pub struct FetchReply {
    pub instance_id: String,
    pub seq: u64,
    pub results: Vec<(Destination, RawResponse)>,
}

#[derive(Clone, Debug)]
pub enum FetchMessage {
    Reply(FetchReply),
    Error(String),
}

/// Runs batches on a worker thread. Every query of a batch is issued
/// concurrently and the reply is sent once the whole batch has resolved.
pub fn spawn_fetcher(
    timeout: Duration,
    insecure: bool,
    tx: Sender<FetchMessage>,
    rx: Receiver<FetchBatch>,
) {
    thread::spawn(move || {
        info!("fetcher started");
        let client = match reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                error!("client error: {err}");
                let _ = tx.send(FetchMessage::Error(format!("Client error: {err}")));
                return;
            }
        };

        while let Ok(batch) = rx.recv() {
            if batch.queries.is_empty() {
                debug!("fetch skipped (empty batch {})", batch.seq);
                continue;
            }
            let started = Instant::now();
            let results = fetch_batch(&client, &batch.queries);
            debug!(
                "batch {} resolved: {} queries in {:?}",
                batch.seq,
                results.len(),
                started.elapsed()
            );
            let reply = FetchReply {
                instance_id: batch.instance_id,
                seq: batch.seq,
                results,
            };
            if tx.send(FetchMessage::Reply(reply)).is_err() {
                debug!("receiver dropped, exiting fetcher");
                break;
            }
        }
    });
}

fn fetch_batch(
    client: &reqwest::blocking::Client,
    queries: &[PendingQuery],
) -> Vec<(Destination, RawResponse)> {
    thread::scope(|scope| {
        let handles: Vec<_> = queries
            .iter()
            .map(|pending| scope.spawn(move || fetch_once(client, &pending.query)))
            .collect();
        handles
            .into_iter()
            .zip(queries)
            .map(|(handle, pending)| {
                let raw = handle
                    .join()
                    .unwrap_or_else(|_| RawResponse::Transport("fetch thread panicked".to_string()));
                (pending.destination.clone(), raw)
            })
            .collect()
    })
}

fn fetch_once(client: &reqwest::blocking::Client, query: &QuerySpec) -> RawResponse {
    debug!(
        "GET {} ({})",
        query.redacted_url(),
        query.param("mode").unwrap_or("driving")
    );
    let resp = match client.get(query.url()).send() {
        Ok(resp) => resp,
        Err(err) => return RawResponse::Transport(err.to_string()),
    };

    let status = resp.status();
    if !status.is_success() {
        return RawResponse::Status(status.as_u16());
    }

    match resp.text() {
        Ok(body) => RawResponse::Body(body),
        Err(err) => RawResponse::Transport(err.to_string()),
    }
}
