use std::{ops::Deref, sync::Arc, time::Duration};

use reqwest::{Client, ClientBuilder};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};

use crate::{config::HttpOptions, error::KinedlResult};

/// `reqwest` client sharing one cookie jar between manifest, license and segment
/// requests of every job.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> KinedlResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder.cookie_provider(cookies_store).build()?;

        Ok(Self { client })
    }

    pub fn from_options(options: &HttpOptions) -> KinedlResult<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(options.timeout));
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent);
        }
        Self::new(builder)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        // Same failure mode as `Client::new()`: only a broken TLS backend can make this
        // fail.
        Self::new(Client::builder()).expect("failed to initialise HTTP client")
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
