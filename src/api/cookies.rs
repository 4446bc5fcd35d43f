// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie construction.
//!
//! Cookies are `Secure`, `HttpOnly` and `SameSite=Strict` unless the
//! `security.cors` development switches relax them.

use axum_extra::extract::cookie::{Cookie, Expiration, SameSite};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::config::{ApplicationConfig, CorsConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
        }
    }
}

impl CookiePolicy {
    pub fn from_config(cors: &CorsConfig) -> Self {
        let mut policy = Self::default();
        if cors.disable {
            warn!("CORS disabled: issuing SameSite=None cookies, do not use in production");
            policy.same_site = SameSite::None;
        }
        if cors.insecure_cookies {
            warn!("Insecure cookies enabled: cookies are sent over plain HTTP, do not use in production");
            policy.secure = false;
        }
        if cors.disable_http_only_cookies {
            warn!("HttpOnly disabled: cookies are readable from scripts, do not use in production");
            policy.http_only = false;
        }
        policy
    }

    /// Cookie scoped to `app`, living for the application's cookie expiry.
    pub fn session_cookie(
        &self,
        name: &str,
        value: &str,
        app: &ApplicationConfig,
    ) -> Cookie<'static> {
        let mut cookie = self.scoped(name.to_string(), value.to_string(), app);
        cookie.set_max_age(Duration::seconds(app.cookie_expiry_seconds));
        cookie
    }

    /// Cookie instructing the browser to drop `name` for `app`'s domain and path.
    pub fn expired_cookie(&self, name: &str, app: &ApplicationConfig) -> Cookie<'static> {
        let mut cookie = self.scoped(name.to_string(), String::new(), app);
        cookie.set_max_age(Duration::ZERO);
        cookie.set_expires(Expiration::DateTime(OffsetDateTime::UNIX_EPOCH));
        cookie
    }

    fn scoped(&self, name: String, value: String, app: &ApplicationConfig) -> Cookie<'static> {
        Cookie::build((name, value))
            .domain(app.cookie_domain.clone())
            .path(app.cookie_path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site)
            .build()
    }
}
