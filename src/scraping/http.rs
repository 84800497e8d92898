use crate::core::error::FetchError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    Get,
    Head,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: FetchMethod,
    pub follow_redirects: bool,
    pub validate_certificate: bool,
}

impl FetchRequest {
    /// Certificate-validated GET that follows redirects.
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: FetchMethod::Get,
            follow_redirects: true,
            validate_certificate: true,
        }
    }

    pub fn head(url: &str) -> Self {
        Self {
            method: FetchMethod::Head,
            ..Self::get(url)
        }
    }

    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    pub fn without_certificate_check(mut self) -> Self {
        self.validate_certificate = false;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchedResponse {
    pub status: u16,
    /// Header names are lower-cased; repeated headers keep the first value.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// Where the transport actually ended up after redirects, when it reports one.
    pub final_url: Option<String>,
}

impl FetchedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchedResponse, FetchError>;
}

/// reqwest-backed fetcher. Redirect policy and certificate checking are client-level
/// settings in reqwest, so one client is built per combination. The pair that skips
/// certificate checks is built on first use.
pub struct ReqwestFetch {
    opts: ReqwestFetchOptions,
    following: Client,
    no_redirect: Client,
    insecure: OnceCell<InsecureClients>,
}

struct InsecureClients {
    following: Client,
    no_redirect: Client,
}

#[derive(Debug, Clone)]
pub struct ReqwestFetchOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ReqwestFetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("beacon-resolver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ReqwestFetch {
    pub fn new(opts: &ReqwestFetchOptions) -> Result<Self, FetchError> {
        Ok(Self {
            following: build_client(opts, true, true)?,
            no_redirect: build_client(opts, false, true)?,
            insecure: OnceCell::new(),
            opts: opts.clone(),
        })
    }

    async fn client_for(&self, req: &FetchRequest) -> Result<&Client, FetchError> {
        if req.validate_certificate {
            return Ok(if req.follow_redirects {
                &self.following
            } else {
                &self.no_redirect
            });
        }
        let insecure = self
            .insecure
            .get_or_try_init(|| async {
                Ok::<_, FetchError>(InsecureClients {
                    following: build_client(&self.opts, true, false)?,
                    no_redirect: build_client(&self.opts, false, false)?,
                })
            })
            .await?;
        Ok(if req.follow_redirects {
            &insecure.following
        } else {
            &insecure.no_redirect
        })
    }
}

fn build_client(
    opts: &ReqwestFetchOptions,
    follow_redirects: bool,
    validate_certificate: bool,
) -> Result<Client, FetchError> {
    let policy = if follow_redirects {
        Policy::limited(10)
    } else {
        Policy::none()
    };
    Client::builder()
        .timeout(opts.timeout)
        .connect_timeout(opts.connect_timeout)
        .user_agent(opts.user_agent.clone())
        .redirect(policy)
        .danger_accept_invalid_certs(!validate_certificate)
        .build()
        .map_err(|e| FetchError::Transport(format!("failed to build http client: {e}")))
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchedResponse, FetchError> {
        let url = reqwest::Url::parse(&req.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", req.url, e)))?;
        let method = match req.method {
            FetchMethod::Get => Method::GET,
            FetchMethod::Head => Method::HEAD,
        };

        debug!(url = %url, method = %method, "outbound fetch");
        let client = self.client_for(req).await?;
        let response = client.request(method, url).send().await?;

        let status = response.status().as_u16();
        let final_url = Some(response.url().to_string());
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_insert_with(|| v.to_string());
            }
        }
        let body = match req.method {
            FetchMethod::Head => Vec::new(),
            FetchMethod::Get => response.bytes().await?.to_vec(),
        };

        Ok(FetchedResponse {
            status,
            headers,
            body,
            final_url,
        })
    }
}

/// Scripted `HttpFetch` for unit tests: answers from a route table and counts calls.
#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Route = (FetchMethod, String);

    #[derive(Default)]
    pub(crate) struct ScriptedFetch {
        routes: Mutex<HashMap<Route, Result<FetchedResponse, FetchError>>>,
        calls: Mutex<Vec<Route>>,
    }

    impl ScriptedFetch {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(
            &self,
            method: FetchMethod,
            url: &str,
            outcome: Result<FetchedResponse, FetchError>,
        ) {
            self.routes
                .lock()
                .unwrap()
                .insert((method, url.to_string()), outcome);
        }

        pub(crate) fn calls_to(&self, method: FetchMethod, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, u)| *m == method && u == url)
                .count()
        }

        pub(crate) fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl FetchedResponse {
        pub(crate) fn with_content_type(status: u16, content_type: &str) -> Self {
            let mut headers = BTreeMap::new();
            headers.insert("content-type".to_string(), content_type.to_string());
            Self {
                status,
                headers,
                ..Self::default()
            }
        }

        pub(crate) fn html(body: &str) -> Self {
            Self {
                body: body.as_bytes().to_vec(),
                ..Self::with_content_type(200, "text/html")
            }
        }

        pub(crate) fn redirect(status: u16, location: &str) -> Self {
            let mut headers = BTreeMap::new();
            headers.insert("location".to_string(), location.to_string());
            Self {
                status,
                headers,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedFetch {
        async fn fetch(&self, req: &FetchRequest) -> Result<FetchedResponse, FetchError> {
            let route = (req.method, req.url.clone());
            self.calls.lock().unwrap().push(route.clone());
            let outcome = self.routes.lock().unwrap().get(&route).cloned();
            match outcome {
                Some(Ok(mut resp)) => {
                    if resp.final_url.is_none() && req.follow_redirects {
                        resp.final_url = Some(req.url.clone());
                    }
                    Ok(resp)
                }
                Some(Err(e)) => Err(e),
                None => Err(FetchError::Transport(format!("no route for {}", req.url))),
            }
        }
    }
}
