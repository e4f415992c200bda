use super::transfer::{transfer_timeout, RateSampler, TransferProgress, TransferResult};
use crate::error::TestError;
use futures::StreamExt;
use std::time::Instant;
use tokio::sync::mpsc;

/// Streams `url` to the end, reporting throughput as it goes.
///
/// `expected_bytes` stands in for the total when the server sends no length.
pub async fn run(
    client: &reqwest::Client,
    url: &str,
    expected_bytes: u64,
    progress_tx: mpsc::Sender<TransferProgress>,
) -> Result<TransferResult, TestError> {
    let response = client
        .get(url)
        .timeout(transfer_timeout(expected_bytes))
        .send()
        .await?
        .error_for_status()?;
    let total = response.content_length().unwrap_or(expected_bytes);
    let mut stream = response.bytes_stream();
    let mut sampler = RateSampler::new(total, Instant::now());

    while let Some(chunk) = stream.next().await {
        if let Some(progress) = sampler.add(chunk?.len() as u64, Instant::now()) {
            let _ = progress_tx.send(progress).await;
        }
    }

    if sampler.bytes() == 0 {
        return Err(TestError::Other(format!("{} returned no data", url)));
    }

    Ok(sampler.finish(Instant::now()))
}
