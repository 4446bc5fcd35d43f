// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTML error page for the browser-facing flow endpoints.

use axum::{
    http::{header::CACHE_CONTROL, StatusCode},
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;

use crate::error::ErrorKind;

/// A failed flow step, rendered as a small self-contained HTML page.
#[derive(Debug)]
pub struct FlowError {
    status: StatusCode,
    message: String,
    retry_url: Option<String>,
    request_id: String,
}

impl FlowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::with_status(kind.status(), message, request_id)
    }

    pub fn with_status(
        status: StatusCode,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            retry_url: None,
            request_id: request_id.into(),
        }
    }

    pub fn invalid_parameters(request_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, "invalid parameters", request_id)
    }

    /// Offer a "try again" link to `url`, if any.
    pub fn retry(mut self, url: Option<&str>) -> Self {
        self.retry_url = url.filter(|u| !u.is_empty()).map(str::to_string);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retry_url(&self) -> Option<&str> {
        self.retry_url.as_deref()
    }

    fn render(&self) -> String {
        let code = format!("{}-{}", self.request_id, Utc::now().format("%Y%m%dT%H%M%SZ"));
        let retry = self
            .retry_url
            .as_deref()
            .map(|url| format!("<p><a href=\"{}\">Try again</a></p>\n", escape_html(url)))
            .unwrap_or_default();
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"robots\" content=\"noindex, nofollow\">\n\
             <title>Authentication failed</title>\n</head>\n<body>\n\
             <h1>Authentication failed</h1>\n<p>{}</p>\n<p>Error code: <code>{}</code></p>\n{}\
             </body>\n</html>\n",
            escape_html(&self.message),
            escape_html(&code),
            retry
        )
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        (self.status, [(CACHE_CONTROL, "no-store")], Html(self.render())).into_response()
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
