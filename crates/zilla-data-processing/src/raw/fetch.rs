use std::fs;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use super::Result;
use crate::record::fields;

/// Query string asking a feature service for every district attribute and
/// no geometry.
pub fn feature_query_url(service_url: &str) -> String {
    let base = service_url.trim_end_matches('/');
    let base = base.strip_suffix("/query").unwrap_or(base);
    format!(
        "{base}/query?where=1%3D1&outFields={}&returnGeometry=false&f=json",
        fields::ALL.join(",")
    )
}

/// Download the district feature set from a feature-service layer URL into a
/// temporary file under `<DATA_DIR>/raw`.
#[instrument(name = "Download feature set", skip_all, level = "info")]
pub fn download_feature_set(service_url: &str) -> Result<NamedTempFile> {
    let rt = tokio::runtime::Runtime::new()?;
    let url = feature_query_url(service_url);

    let raw_dir = crate::DATA_DIR.join("raw");
    fs::create_dir_all(&raw_dir)?;

    rt.block_on(async {
        let client = Client::new();
        download_to_temp_file(&client, &url, &raw_dir).await
    })
}

async fn download_to_temp_file(
    client: &Client,
    url: &str,
    dir: &std::path::Path,
) -> Result<NamedTempFile> {
    info!(url, "Starting download");
    let response = client.get(url).send().await?.error_for_status()?;

    let total_size = response.content_length().unwrap_or(0);
    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let temp_file = NamedTempFile::new_in(dir)?;
    let mut file = tokio::fs::File::create(temp_file.path()).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush().await?;
    pb.finish_and_clear();

    info!(url, bytes = downloaded, "Download complete");
    Ok(temp_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_query_url() {
        let url = feature_query_url("https://example.com/arcgis/rest/services/Districts/FeatureServer/0/");
        assert!(url.starts_with(
            "https://example.com/arcgis/rest/services/Districts/FeatureServer/0/query?where=1%3D1"
        ));
        assert!(url.contains("outFields=DISTRICT,total_population,ST_NM,censuscode"));
        assert!(url.ends_with("&returnGeometry=false&f=json"));
    }

    #[test]
    fn test_feature_query_url_accepts_query_endpoint() {
        let url = feature_query_url("https://example.com/FeatureServer/0/query");
        assert!(url.starts_with("https://example.com/FeatureServer/0/query?"));
        assert_eq!(url.matches("/query").count(), 1);
    }
}
