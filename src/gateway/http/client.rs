use std::{sync::Arc, time::Instant};

use futures::future::BoxFuture;
use reqwest::{
    Client, Method, RequestBuilder,
    header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION},
    multipart::{Form, Part},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::gateway::{
    ApiGateway, ApiRequest, FormPart, FormValue, GatewayError, GatewayResult, HttpMethod,
    RequestBody,
};

use super::config::HttpGatewayConfig;

/// [`ApiGateway`] backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    locale: Option<Arc<str>>,
}

impl HttpGateway {
    /// Build a client for the API described by `config`.
    pub fn new(config: HttpGatewayConfig) -> GatewayResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|source| GatewayError::ClientBuilder {
                reason: source.to_string(),
            })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let auth = config
            .token
            .map(|token| (Arc::<str>::from(config.auth_scheme), Arc::<str>::from(token)));
        let locale = config.locale.map(Arc::<str>::from);

        Ok(Self {
            client,
            base_url,
            auth,
            locale,
        })
    }

    /// API root, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some((ref scheme, ref token)) = self.auth {
            builder = builder.header(AUTHORIZATION, format!("{scheme} {token}"));
        }
        if let Some(ref locale) = self.locale {
            builder = builder.header(ACCEPT_LANGUAGE, locale.as_ref());
        }
        builder
    }

    async fn execute(&self, request: ApiRequest) -> GatewayResult<Value> {
        let ApiRequest {
            method,
            path,
            query,
            body,
        } = request;

        let mut builder = self.request(to_reqwest_method(method), &path);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(&path, parts)?),
        };

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|source| send_error(&path, source))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| send_error(&path, source))?;

        debug!(
            %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "API request completed"
        );

        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes)
                .map_err(|source| GatewayError::Decode { path, source });
        }

        let body = serde_json::from_slice::<Value>(&bytes).ok();
        let err = GatewayError::from_status(path, status.as_u16(), body);
        if status.is_server_error() {
            warn!(error = %err, "API request failed");
        }
        Err(err)
    }
}

impl ApiGateway for HttpGateway {
    fn send(&self, request: ApiRequest) -> BoxFuture<'static, GatewayResult<Value>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.execute(request).await })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn send_error(path: &str, source: reqwest::Error) -> GatewayError {
    if source.is_timeout() {
        GatewayError::Timeout {
            path: path.to_string(),
        }
    } else {
        GatewayError::Transport {
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

fn build_form(path: &str, parts: Vec<FormPart>) -> GatewayResult<Form> {
    let mut form = Form::new();
    for FormPart { name, value } in parts {
        form = match value {
            FormValue::Text(text) => form.text(name, text),
            FormValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let mut part = Part::bytes(bytes).file_name(file_name);
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(&content_type)
                        .map_err(|source| GatewayError::InvalidBody {
                            path: path.to_string(),
                            reason: source.to_string(),
                        })?;
                }
                form.part(name, part)
            }
        };
    }
    Ok(form)
}
