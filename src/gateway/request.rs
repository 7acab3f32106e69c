use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// HTTP verbs used against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Read a resource or listing.
    Get,
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Partially update a resource.
    Patch,
    /// Delete a resource.
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart form body.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Plain text field.
    Text(String),
    /// Uploaded file.
    File {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Named multipart field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    /// Field name.
    pub name: String,
    /// Field content.
    pub value: FormValue,
}

impl FormPart {
    /// Text field `name`.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    /// File field `name`, sent as `file_name`.
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                content_type,
                bytes,
            },
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// Transport-independent description of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path relative to the API base URL, starting with `/`.
    pub path: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Payload.
    pub body: RequestBody,
}

impl ApiRequest {
    /// Request without query or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// `PUT path`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// `PATCH path`.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Replace a query parameter, appending it when absent.
    pub fn set_query(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.query.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.query.push((key.to_string(), value)),
        }
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> serde_json::Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach a multipart form body.
    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_query_replaces_existing_parameter() {
        let mut request = ApiRequest::get("/games").query("page", 1).query("page_size", 20);
        request.set_query("page", 2);
        request.set_query("ordering", "-added");
        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("page_size".to_string(), "20".to_string()),
                ("ordering".to_string(), "-added".to_string()),
            ]
        );
    }

    #[test]
    fn json_body_is_serialized() {
        #[derive(Serialize)]
        struct Body {
            rating: u8,
        }
        let request = ApiRequest::post("/games/3/reviews").json(&Body { rating: 4 }).unwrap();
        assert_eq!(request.body, RequestBody::Json(serde_json::json!({"rating": 4})));
        assert_eq!(request.to_string(), "POST /games/3/reviews");
    }
}
