use crate::{api_client::ApiClient, settings::Settings};
use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const DELIMITER: &str = "/";
const ENCODING_TYPE: &str = "url";

#[derive(Debug)]
pub struct Runner {
    client: ApiClient,
}

impl Runner {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Issues the listing call described by `settings` and prints the number
    /// of entries it returned.
    pub fn list_objects(&self, settings: &Settings) -> Result<usize> {
        let found = self
            .count_objects(
                &settings.bucket,
                &settings.prefix,
                settings.limit,
                settings.timeout,
            )
            .context("failed to listObjects")?;

        println!("done. found {} files", found);
        Ok(found)
    }

    /// Performs exactly one `ListObjects` request bounded by `timeout` and
    /// returns the number of `Contents` entries in the response.
    pub fn count_objects(
        &self,
        bucket: &str,
        prefix: &str,
        limit: u32,
        timeout: Duration,
    ) -> Result<usize> {
        let url = self.list_url(bucket, prefix, limit)?;
        let response = self
            .client
            .get(&url, timeout)
            .context("failed to list objects")?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ApiClient::transport_error(err, timeout))
            .context("failed to list objects")?;
        log::debug!("<-- {}", body);

        if !status.is_success() {
            return Err(match quick_xml::de::from_str::<ErrorResponse>(&body) {
                Ok(error) => anyhow!(
                    "failed to list objects: {} {}: {}",
                    status,
                    error.code,
                    error.message
                ),
                Err(_) => anyhow!("failed to list objects: {}", status),
            });
        }

        let result = quick_xml::de::from_str::<ListBucketResult>(&body)
            .context("failed to decode listObjects response")?;
        log::debug!(
            "{} contents, {} common prefixes, truncated: {}",
            result.contents.len(),
            result.common_prefixes.len(),
            result.is_truncated
        );

        Ok(result.contents.len())
    }

    fn list_url(&self, bucket: &str, prefix: &str, limit: u32) -> Result<Url> {
        let mut url = self.client.bucket_url(bucket)?;
        url.query_pairs_mut()
            .append_pair("delimiter", DELIMITER)
            .append_pair("encoding-type", ENCODING_TYPE)
            .append_pair("max-keys", &limit.to_string())
            .append_pair("prefix", prefix);
        Ok(url)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    contents: Vec<ObjectEntry>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
}

/// Only counted, so the children of each entry are skipped.
#[derive(Deserialize, Debug)]
struct ObjectEntry {}

#[derive(Deserialize, Debug)]
struct CommonPrefix {}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    code: String,
    #[serde(default)]
    message: String,
}
