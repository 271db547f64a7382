// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use fleetdash_app::{
    EnrollSecret, EnrollSecretsResponse, HostSummary, MacAdminsAggregate, MacAdminsResponse,
    MdmSummary, Platform, QueryKey, QueryPayload, SoftwareQuery, SoftwareResponse, Team, TeamId,
    TeamsResponse,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_PREFIX: &str = "api/latest/fleet/";

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("server.base_url `{trimmed}` is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "server.base_url must use http or https, got `{}`",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token: token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Runs the remote operation a cache key describes.
    pub fn fetch(&self, key: &QueryKey) -> Result<QueryPayload> {
        let payload = match key {
            QueryKey::HostSummary {
                team,
                platform,
                low_disk_space_gb,
            } => QueryPayload::HostSummary(self.host_summary(
                *team,
                *platform,
                *low_disk_space_gb,
            )?),
            QueryKey::Teams => QueryPayload::Teams(self.teams()?),
            QueryKey::GlobalEnrollSecrets => {
                QueryPayload::GlobalEnrollSecrets(self.global_enroll_secrets()?)
            }
            QueryKey::TeamEnrollSecrets { team } => {
                QueryPayload::TeamEnrollSecrets(self.team_enroll_secrets(*team)?)
            }
            QueryKey::Software(query) => QueryPayload::Software(self.software(query)?),
            QueryKey::MdmSummary { platform, team } => {
                QueryPayload::MdmSummary(self.mdm_summary(*platform, *team)?)
            }
            QueryKey::MacAdmins { team } => QueryPayload::MacAdmins(self.macadmins(*team)?),
        };
        Ok(payload)
    }

    pub fn host_summary(
        &self,
        team: Option<TeamId>,
        platform: Platform,
        low_disk_space_gb: Option<u32>,
    ) -> Result<HostSummary> {
        let mut params = team_param(team);
        push_platform(&mut params, platform);
        if let Some(threshold) = low_disk_space_gb {
            params.push(("low_disk_space", threshold.to_string()));
        }
        self.get_json("host_summary", &params)
            .context("load host summary")
    }

    pub fn teams(&self) -> Result<Vec<Team>> {
        let response: TeamsResponse = self.get_json("teams", &[]).context("load teams")?;
        Ok(response.teams)
    }

    pub fn global_enroll_secrets(&self) -> Result<Vec<EnrollSecret>> {
        let response: GlobalEnrollSecretResponse = self
            .get_json("spec/enroll_secret", &[])
            .context("load global enroll secrets")?;
        Ok(response.spec.secrets)
    }

    pub fn team_enroll_secrets(&self, team: TeamId) -> Result<Vec<EnrollSecret>> {
        let response: EnrollSecretsResponse = self
            .get_json(&format!("teams/{team}/secrets"), &[])
            .with_context(|| format!("load enroll secrets for team {team}"))?;
        Ok(response.secrets)
    }

    pub fn software(&self, query: &SoftwareQuery) -> Result<SoftwareResponse> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("per_page", query.per_page.to_string()),
            ("order_key", query.order_key.to_owned()),
            ("order_direction", query.order_direction.as_str().to_owned()),
        ];
        if query.vulnerable {
            params.push(("vulnerable", "true".to_owned()));
        }
        params.extend(team_param(query.team));
        self.get_json("software", &params)
            .context("load software inventory")
    }

    pub fn mdm_summary(&self, platform: Platform, team: Option<TeamId>) -> Result<MdmSummary> {
        let mut params = Vec::new();
        push_platform(&mut params, platform);
        params.extend(team_param(team));
        self.get_json("hosts/summary/mdm", &params)
            .context("load MDM summary")
    }

    pub fn macadmins(&self, team: Option<TeamId>) -> Result<MacAdminsAggregate> {
        let response: MacAdminsResponse = self
            .get_json("macadmins", &team_param(team))
            .context("load macadmins aggregate")?;
        Ok(response.macadmins)
    }

    /// Cheapest authenticated call; used by `--check`.
    pub fn ping(&self) -> Result<()> {
        self.get_json::<serde_json::Value>("version", &[])
            .map(|_| ())
            .context("check server connection")
    }

    pub fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(API_PREFIX)
            .and_then(|url| url.join(path))
            .with_context(|| format!("build URL for `{path}`"))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(name, value)| (*name, value.as_str())));
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path, params)?;
        debug!(%url, "GET");
        let response = self
            .authorize(self.http.get(url))
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response
            .json()
            .with_context(|| format!("decode `{path}` response"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GlobalEnrollSecretResponse {
    spec: EnrollSecretsResponse,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

fn team_param(team: Option<TeamId>) -> Vec<(&'static str, String)> {
    team.map(|team| ("team_id", team.to_string()))
        .into_iter()
        .collect()
}

/// `all` is expressed by leaving the parameter off.
fn push_platform(params: &mut Vec<(&'static str, String)>, platform: Platform) {
    if platform != Platform::All {
        params.push(("platform", platform.as_str().to_owned()));
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out -- raise server.timeout ({error})");
    }
    anyhow!("cannot reach {base_url} -- check server.base_url ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let reason = parsed
            .errors
            .into_iter()
            .map(|detail| detail.reason)
            .find(|reason| !reason.is_empty());
        if let Some(reason) = reason {
            return anyhow!("HTTP {}: {reason}", status.as_u16());
        }
        if !parsed.message.is_empty() {
            return anyhow!("HTTP {}: {}", status.as_u16(), parsed.message);
        }
    }

    if status == StatusCode::UNAUTHORIZED {
        return anyhow!("HTTP 401: set server.token or FLEETDASH_API_TOKEN");
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("HTTP {}: {trimmed}", status.as_u16());
    }

    anyhow!("HTTP {}", status.as_u16())
}
