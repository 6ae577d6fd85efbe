use std::time::Duration;

use anyhow::Context;
use reqwest::redirect::Policy;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoffBuilder;
use reqwest_retry::RetryTransientMiddleware;
use retry::strategy::CustomRetryStrategy;

use crate::pipeline::{FetchedPage, Fetcher, HeaderList};
use crate::resolve;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

const MAX_REDIRECTS: u32 = 10;
const REDIRECT_CODES: [u16; 5] = [301, 308, 302, 303, 307];

/// Fetches pages over HTTP, retrying transient failures with exponential
/// backoff.
#[derive(Clone)]
pub struct HttpFetcher {
    client: ClientWithMiddleware,
}

impl HttpFetcher {
    /// `max_retries` of `None` retries forever.
    pub fn new(user_agent: Option<&str>, max_retries: Option<u32>) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .connect_timeout(Duration::from_secs(20))
            .redirect(Policy::none()) // redirects handled in fetch
            .build()
            .context("failed to build http client")?;

        let retry_policy = ExponentialBackoffBuilder::default()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(10))
            .build_with_max_retries(max_retries.unwrap_or(u32::MAX));

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                CustomRetryStrategy,
            ))
            .build();

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, headers: &HeaderList) -> Result<FetchedPage, anyhow::Error> {
        // We need to handle redirects ourself, because reqwest changes the Referer
        // header on redirection
        let mut last_url = url.to_string();
        let mut redirect_count = 0u32;

        loop {
            let mut request = self
                .client
                .get(last_url.as_str())
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.5");

            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request.send().await.context("failed to request url")?;

            let is_redirect_code = REDIRECT_CODES.contains(&response.status().as_u16());
            let redirect_url = match response.headers().get(reqwest::header::LOCATION) {
                Some(location) if is_redirect_code => Some(
                    location
                        .to_str()
                        .context("redirect url could not be converted to string")?
                        .to_string(),
                ),
                _ => None,
            };

            if let Some(redirect_url) = redirect_url {
                if redirect_count >= MAX_REDIRECTS {
                    anyhow::bail!("more than {} redirects", MAX_REDIRECTS);
                }

                redirect_count += 1;
                last_url = resolve::resolve(&last_url, &redirect_url).context("invalid redirect url")?;
                log::debug!("Following redirect to {}", last_url);
                continue;
            }

            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let body = response
                .text()
                .await
                .context("failed to parse response body as text")?;

            return Ok(FetchedPage { status, body, final_url });
        }
    }
}

mod retry {
    // Based on reqwest_retry::DefaultRetryableStrategy
    pub(crate) mod strategy {
        use reqwest::StatusCode;
        use reqwest_retry::{Retryable, RetryableStrategy};

        pub struct CustomRetryStrategy;

        impl RetryableStrategy for CustomRetryStrategy {
            fn handle(&self, res: &Result<reqwest::Response, reqwest_middleware::Error>) -> Option<Retryable> {
                match res {
                    Ok(success) => default_on_request_success(success),
                    Err(error) => default_on_request_failure(error),
                }
            }
        }

        /// Retries on 5XX, 408 (request timeout) and 429 (too many requests).
        /// Redirects are passed through, since they are followed by the caller.
        pub fn default_on_request_success(success: &reqwest::Response) -> Option<Retryable> {
            let status = success.status();
            if status.is_server_error() {
                Some(Retryable::Transient)
            } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
                Some(Retryable::Transient)
            } else if status.is_client_error() {
                Some(Retryable::Fatal)
            } else if status.is_success() || status.is_redirection() {
                None
            } else {
                Some(Retryable::Fatal)
            }
        }

        /// Retries timeouts, failed connects and connections reset by the peer.
        pub fn default_on_request_failure(error: &reqwest_middleware::Error) -> Option<Retryable> {
            match error {
                reqwest_middleware::Error::Middleware(_) => Some(Retryable::Fatal),
                reqwest_middleware::Error::Reqwest(error) => {
                    if error.is_timeout() || error.is_connect() {
                        Some(Retryable::Transient)
                    } else if error.is_body() || error.is_decode() || error.is_builder() || error.is_redirect() {
                        Some(Retryable::Fatal)
                    } else if error.is_request() {
                        match get_source_error_type::<std::io::Error>(error) {
                            Some(io_error) => Some(classify_io_error(io_error)),
                            None => Some(Retryable::Fatal),
                        }
                    } else {
                        None
                    }
                }
            }
        }

        fn classify_io_error(error: &std::io::Error) -> Retryable {
            match error.kind() {
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => Retryable::Transient,
                _ => Retryable::Fatal,
            }
        }

        /// Downcasts the given err source into T.
        fn get_source_error_type<T: std::error::Error + 'static>(err: &dyn std::error::Error) -> Option<&T> {
            let mut source = err.source();

            while let Some(err) = source {
                if let Some(err) = err.downcast_ref::<T>() {
                    return Some(err);
                }

                source = err.source();
            }
            None
        }
    }
}
