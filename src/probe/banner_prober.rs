//! Prober for Ellucian Banner "Browse Classes" registration sites.

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use serde_json::Value;
use wreq::header::CONTENT_TYPE;
use wreq::header::COOKIE;
use wreq::header::SET_COOKIE;

use crate::probe::Availability;
use crate::probe::Prober;
use crate::probe::error::ProbeError;

/// Looks up a section by CRN through the Banner search endpoints.
pub struct BannerProber {
    /// e.g. `https://host/StudentRegistration/ssb`
    pub base_url: String,
    pub term: String,
    client: wreq::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
}

impl BannerProber {
    /// Creates a prober limited to `probes_per_minute` probes.
    pub fn new(
        base_url: impl Into<String>,
        term: impl Into<String>,
        probes_per_minute: u32,
    ) -> Result<Self, ProbeError> {
        let client = wreq::Client::builder()
            .emulation(wreq_util::Emulation::Chrome137)
            .build()?;
        // Each probe is two requests: session setup and search
        let limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(probes_per_minute).unwrap_or(NonZeroU32::MIN),
        ));

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            term: term.into(),
            client,
            limiter,
        })
    }

    fn validate_code(code: &str) -> Result<(), ProbeError> {
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProbeError::InvalidCode {
                code: code.to_string(),
            });
        }
        Ok(())
    }

    async fn send(&self, request: wreq::RequestBuilder) -> Result<wreq::Response, ProbeError> {
        let req = request.build()?;
        debug!("Making request to: {}", req.url());
        let response = self.client.execute(req).await?;
        if !response.status().is_success() {
            return Err(ProbeError::BadStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Selects the term. Banner keys the search results to the session, so the
    /// returned cookie header has to accompany the search request.
    async fn open_session(&self) -> Result<String, ProbeError> {
        let request = self
            .client
            .post(format!("{}/term/search?mode=search", self.base_url))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!(
                "term={}&studyPath=&studyPathText=&startDatepicker=&endDatepicker=",
                self.term
            ));
        let response = self.send(request).await?;

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>();
        Ok(cookies.join("; "))
    }

    async fn search(&self, code: &str, cookie: &str) -> Result<Value, ProbeError> {
        let mut request = self.client.get(format!(
            "{}/searchResults/searchResults?txt_term={}&txt_keywordlike={code}&pageOffset=0&pageMaxSize=10",
            self.base_url, self.term
        ));
        if !cookie.is_empty() {
            request = request.header(COOKIE, cookie);
        }
        let response = self.send(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Extracts seats and title of the section matching `code`.
    fn parse_section(code: &str, resp: &Value) -> Result<Availability, ProbeError> {
        let data = resp.get("data").ok_or_else(|| ProbeError::MissingField {
            field: "data".to_string(),
        })?;

        // Banner answers `"data": null` when nothing matched
        let sections = match data.as_array() {
            Some(sections) => sections,
            None => {
                return Err(ProbeError::NotFound {
                    code: code.to_string(),
                });
            }
        };

        let section = sections
            .iter()
            .find(|s| {
                s.get("courseReferenceNumber")
                    .and_then(|v| v.as_str())
                    .is_some_and(|crn| crn == code)
            })
            .ok_or_else(|| ProbeError::NotFound {
                code: code.to_string(),
            })?;

        let seats = section
            .get("seatsAvailable")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ProbeError::MissingField {
                field: "data.seatsAvailable".to_string(),
            })?;
        let title = decode_entities(
            section
                .get("courseTitle")
                .and_then(|v| v.as_str())
                .unwrap_or_default(),
        );

        Ok(Availability {
            // Overenrolled sections report negative seats
            seats: seats.clamp(0, u32::MAX as i64) as u32,
            title,
        })
    }
}

/// Decodes the HTML entities Banner leaves in course titles. Unknown
/// entities and bare `&` are kept as they are.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| Some((decode_entity(&tail[1..semi])?, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[async_trait]
impl Prober for BannerProber {
    async fn probe(&self, code: &str) -> Result<Availability, ProbeError> {
        Self::validate_code(code)?;

        if self.limiter.check().is_err() {
            info!("Prober is ratelimited. Waiting...");
        }
        self.limiter.until_ready().await;

        debug!("Probing {code} for term {}", self.term);
        let cookie = self.open_session().await?;
        let resp = self.search(code, &cookie).await?;
        Self::parse_section(code, &resp)
    }
}
