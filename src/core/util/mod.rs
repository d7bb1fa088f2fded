use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{header, Request, Response};
use serde_json::Value as Json;
use url::Url;

/// Generic HTTP client used to fetch remote JSON-LD documents.
///
/// A trait is used here so that embedding agents can bring their own HTTP/TLS stack.
#[async_trait]
pub trait AsyncHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

const JSON_LD_ACCEPT: &str = "application/ld+json, application/json;q=0.9";

/// GET `url` and parse the body as JSON, requesting a JSON-LD representation.
pub(crate) async fn get_json<C>(client: &C, url: &Url) -> Result<Json>
where
    C: AsyncHttpClient + ?Sized,
{
    let request = Request::get(url.as_str())
        .header(header::ACCEPT, JSON_LD_ACCEPT)
        .body(Vec::new())
        .context("unable to build document request")?;

    let response = client.execute(request).await?;
    let status = response.status();
    if !status.is_success() {
        bail!("fetching `{url}` returned {status}")
    }

    serde_json::from_slice(response.body()).with_context(|| format!("`{url}` is not JSON"))
}

#[derive(Debug)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}
