use super::transfer::{transfer_timeout, RateSampler, TransferProgress, TransferResult};
use crate::error::TestError;
use rand::Rng;
use std::time::Instant;
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 1_000_000; // 1MB per POST

/// Random bytes, so nothing on the path can compress them.
pub fn payload(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill(&mut data[..]);
    data
}

/// POSTs `data` to `url` chunk by chunk, reporting throughput as it goes.
pub async fn run(
    client: &reqwest::Client,
    url: &str,
    data: &[u8],
    progress_tx: mpsc::Sender<TransferProgress>,
) -> Result<TransferResult, TestError> {
    let mut sampler = RateSampler::new(data.len() as u64, Instant::now());

    for chunk in data.chunks(CHUNK_SIZE) {
        client
            .post(url)
            .timeout(transfer_timeout(chunk.len() as u64))
            .body(chunk.to_vec())
            .send()
            .await?
            .error_for_status()?;

        if let Some(progress) = sampler.add(chunk.len() as u64, Instant::now()) {
            let _ = progress_tx.send(progress).await;
        }
    }

    Ok(sampler.finish(Instant::now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_has_requested_size() {
        let data = payload(4096);
        assert_eq!(data.len(), 4096);
        assert!(data.iter().any(|&b| b != 0));
    }
}
