use chrono::Local;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;

pub fn build_client() -> Client {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .expect("failed to build http client")
}

/// Keep a rejected reschedule response around for postmortem inspection.
pub async fn dump_failure_body(
    dir: &Path,
    facility_id: &str,
    body: &str,
) -> anyhow::Result<PathBuf> {
    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let path = dir.join(format!("{facility_id}_failed_{timestamp}.html"));
    fs::write(&path, body).await?;
    Ok(path)
}
