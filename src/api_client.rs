use crate::settings::Settings;
use anyhow::{anyhow, bail, Context, Result};
use aws_credential_types::Credentials;
use aws_sigv4::{
    http_request::{
        sign, PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest,
        SigningSettings, UriPathNormalizationMode,
    },
    sign::v4,
};
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::{
    blocking::{Client, Response},
    header, redirect, Url,
};
use std::{fmt, time::Duration, time::SystemTime};

const SIGNING_SERVICE: &str = "s3";

/// Client for a single S3-compatible endpoint, addressed path-style and signed
/// with a static key pair.
pub struct ApiClient {
    client: Client,
    endpoint: Url,
    identity: Identity,
    region: String,
    debug: bool,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint)
            .with_context(|| format!("invalid endpoint {:?}", settings.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!("endpoint {} must use http or https", endpoint);
        }

        let credentials = Credentials::new(
            settings.key.clone(),
            settings.secret.clone(),
            None,
            None,
            "s3test",
        );

        Ok(Self {
            client: ApiClient::build_client()?,
            endpoint,
            identity: credentials.into(),
            region: settings.region.clone(),
            debug: settings.debug,
        })
    }

    /// Path-style URL of `bucket`: `<endpoint>/<bucket>`.
    pub fn bucket_url(&self, bucket: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("endpoint {} cannot carry a bucket path", self.endpoint))?
            .pop_if_empty()
            .push(bucket);
        Ok(url)
    }

    /// Sends one signed GET request which must complete within `timeout`.
    pub fn get(&self, url: &Url, timeout: Duration) -> Result<Response> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        let signed_headers = self.sign("GET", url)?;
        for (name, value) in &signed_headers {
            request = request.header(name, value);
        }

        if self.debug {
            log::debug!("--> GET {}", url);
            for (name, value) in &signed_headers {
                let shown = if name.eq_ignore_ascii_case(header::AUTHORIZATION.as_str()) {
                    "<redacted>"
                } else {
                    value.as_str()
                };
                log::debug!("--> {}: {}", name, shown);
            }
        }

        let response = request
            .send()
            .map_err(|err| ApiClient::transport_error(err, timeout))?;

        if self.debug {
            log::debug!("<-- {} {}", response.status(), url);
            for (name, value) in response.headers() {
                log::debug!("<-- {}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
        }

        Ok(response)
    }

    /// Wraps a transport failure, calling out an expired deadline explicitly.
    pub fn transport_error(err: reqwest::Error, timeout: Duration) -> anyhow::Error {
        if err.is_timeout() {
            anyhow::Error::new(err)
                .context(format!("request timed out after {}s", timeout.as_secs()))
        } else {
            anyhow::Error::new(err)
        }
    }

    fn sign(&self, method: &str, url: &Url) -> Result<Vec<(String, String)>> {
        let mut signing_settings = SigningSettings::default();
        signing_settings.percent_encoding_mode = PercentEncodingMode::Single;
        signing_settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        signing_settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

        let signing_params = v4::SigningParams::builder()
            .identity(&self.identity)
            .region(&self.region)
            .name(SIGNING_SERVICE)
            .time(SystemTime::now())
            .settings(signing_settings)
            .build()
            .context("failed to build signing parameters")?
            .into();

        let signable = SignableRequest::new(
            method,
            url.as_str(),
            std::iter::empty(),
            SignableBody::Bytes(&[]),
        )
        .context("failed to prepare request for signing")?;

        let (instructions, _signature) = sign(signable, &signing_params)
            .context("failed to sign request")?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    fn build_client() -> Result<Client> {
        // One call, one exchange: no redirects are followed.
        Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(None)
            .build()
            .map_err(Into::into)
    }
}
