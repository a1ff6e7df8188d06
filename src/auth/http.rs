//! HTTP plumbing shared by the device, token, and refresh requests.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};

use super::provider::RequestEncoding;

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("grant/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// POST `params` to `url` in the body encoding the provider expects.
pub fn post_params(
    client: &reqwest::Client,
    url: &str,
    encoding: RequestEncoding,
    params: &[(&str, &str)],
) -> reqwest::RequestBuilder {
    let request = client.post(url).header(ACCEPT, "application/json");
    match encoding {
        RequestEncoding::Form => request
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(params),
        RequestEncoding::Json => {
            let body = params
                .iter()
                .map(|(key, value)| ((*key).to_string(), serde_json::Value::from(*value)))
                .collect::<serde_json::Map<_, _>>();
            request.json(&body)
        }
    }
}
