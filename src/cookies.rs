//! Cookies pasted by the user to get past YouTube's bot check.
//!
//! The accepted payload is the JSON array most browser cookie-export extensions produce.
//! It is validated up front and rendered as a Netscape `cookies.txt`, which is what
//! yt-dlp's `--cookies` option reads.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n";

/// A single validated cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub domain: String,
    pub name: String,
    pub value: String,
    pub path: String,
    pub secure: bool,
    /// Whether subdomains of `domain` receive the cookie as well.
    pub include_subdomains: bool,
    /// Expiry as a unix timestamp, `0` for a session cookie.
    pub expires: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedCookie {
    domain: String,
    name: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    host_only: Option<bool>,
    #[serde(default, alias = "expires")]
    expiration_date: Option<f64>,
}

/// A validated set of cookies for one session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Validates a pasted JSON cookie export.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCookies`] when the text is empty, is not a JSON array of
    /// cookie objects, or holds a cookie without a domain or name.
    pub fn parse(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(Error::InvalidCookies("nothing was pasted".to_string()));
        }

        let exported: Vec<ExportedCookie> = serde_json::from_str(payload)
            .map_err(|e| Error::InvalidCookies(format!("expected a JSON array of cookies ({e})")))?;
        if exported.is_empty() {
            return Err(Error::InvalidCookies("the cookie list is empty".to_string()));
        }

        let cookies = exported
            .into_iter()
            .enumerate()
            .map(|(index, cookie)| Self::validate(index, cookie))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { cookies })
    }

    /// Reads and validates a JSON cookie export from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let payload = std::fs::read_to_string(path)?;
        Self::parse(&payload)
    }

    fn validate(index: usize, cookie: ExportedCookie) -> Result<Cookie> {
        let domain = cookie.domain.trim().to_string();
        let name = cookie.name.trim().to_string();
        if domain.is_empty() || name.is_empty() {
            return Err(Error::InvalidCookies(format!(
                "cookie #{} has no domain or name",
                index + 1
            )));
        }
        if [&domain, &name, &cookie.value]
            .iter()
            .any(|field| field.contains(['\t', '\n', '\r']))
        {
            return Err(Error::InvalidCookies(format!(
                "cookie #{} contains tabs or line breaks",
                index + 1
            )));
        }

        let include_subdomains = match cookie.host_only {
            Some(host_only) => !host_only,
            None => domain.starts_with('.'),
        };
        let expires = cookie
            .expiration_date
            .filter(|date| date.is_finite() && *date > 0.0)
            .map(|date| date as u64)
            .unwrap_or(0);

        Ok(Cookie {
            domain,
            name,
            value: cookie.value,
            path: cookie.path.filter(|p| !p.is_empty()).unwrap_or_else(|| "/".to_string()),
            secure: cookie.secure,
            include_subdomains,
            expires,
        })
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the jar in the Netscape `cookies.txt` format.
    pub fn to_netscape(&self) -> String {
        let mut out = String::from(NETSCAPE_HEADER);
        for cookie in &self.cookies {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                cookie.domain,
                flag(cookie.include_subdomains),
                cookie.path,
                flag(cookie.secure),
                cookie.expires,
                cookie.name,
                cookie.value
            );
        }
        out
    }

    /// Writes the jar as `cookies.txt` to the given path.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(path, self.to_netscape()).await?;
        Ok(())
    }

    /// Writes the jar to a temporary file that is removed when the handle is dropped.
    pub fn to_temp_file(&self) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("ytdownhub-cookies-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(self.to_netscape().as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

fn flag(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}
