// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use fleetdash_api::Client;
use fleetdash_app::{Completion, DashboardError, QueryKey, QueryPayload};
use fleetdash_testkit::FixtureBackend;
use fleetdash_tui::{DashboardRuntime, InternalEvent};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Talks to a live server. Every fetch runs on its own thread so a slow
/// source never blocks the frame loop.
pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DashboardRuntime for ApiRuntime {
    fn fetch(&mut self, key: &QueryKey) -> Result<QueryPayload> {
        self.client.fetch(key)
    }

    fn spawn_fetch(&mut self, key: QueryKey, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        let name = format!("fetch-{}", key.source().label().replace(' ', "-"));
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                debug!(source = key.source().label(), "fetch started");
                let result = client
                    .fetch(&key)
                    .map_err(|error| DashboardError::fetch(key.source(), format!("{error:#}")));
                // The UI may already have exited; nothing is waiting for this.
                let _ = tx.send(InternalEvent::Fetched(Completion { key, result }));
            })
            .map_err(|error| anyhow!("spawn fetch thread: {error}"))?;
        Ok(())
    }
}

/// Serves deterministic fixture payloads for `--demo`.
#[derive(Debug, Default)]
pub struct DemoRuntime {
    backend: FixtureBackend,
}

impl DemoRuntime {
    pub fn new(backend: FixtureBackend) -> Self {
        Self { backend }
    }
}

impl DashboardRuntime for DemoRuntime {
    fn fetch(&mut self, key: &QueryKey) -> Result<QueryPayload> {
        self.backend.fetch(key)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiRuntime, DemoRuntime};
    use anyhow::{Result, anyhow};
    use fleetdash_api::Client;
    use fleetdash_app::{DashboardError, Platform, QueryKey, QueryPayload, QuerySource, TeamId};
    use fleetdash_tui::{DashboardRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn demo_runtime_reports_fixture_payload() -> Result<()> {
        let mut runtime = DemoRuntime::default();
        let (tx, rx) = mpsc::channel();
        runtime.spawn_fetch(QueryKey::Teams, tx)?;

        let InternalEvent::Fetched(completion) = rx.recv()? else {
            return Err(anyhow!("expected a fetch completion"));
        };
        assert_eq!(completion.key, QueryKey::Teams);
        assert!(matches!(completion.result, Ok(QueryPayload::Teams(ref teams)) if teams.len() == 3));
        Ok(())
    }

    #[test]
    fn demo_runtime_turns_unknown_team_into_fetch_error() -> Result<()> {
        let mut runtime = DemoRuntime::default();
        let (tx, rx) = mpsc::channel();
        runtime.spawn_fetch(QueryKey::MacAdmins { team: Some(TeamId::new(99)) }, tx)?;

        let InternalEvent::Fetched(completion) = rx.recv()? else {
            return Err(anyhow!("expected a fetch completion"));
        };
        let error = completion
            .result
            .expect_err("unknown team should fail");
        assert_eq!(
            error,
            DashboardError::fetch(QuerySource::MacAdmins, "HTTP 404: team 99 not found")
        );
        Ok(())
    }

    #[test]
    fn api_runtime_reports_unreachable_server_from_worker_thread() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1", None, Duration::from_millis(50))?;
        let mut runtime = ApiRuntime::new(client);
        let (tx, rx) = mpsc::channel();
        let key = QueryKey::MdmSummary {
            platform: Platform::Windows,
            team: None,
        };
        runtime.spawn_fetch(key.clone(), tx)?;

        let InternalEvent::Fetched(completion) = rx.recv_timeout(Duration::from_secs(10))? else {
            return Err(anyhow!("expected a fetch completion"));
        };
        assert_eq!(completion.key, key);
        let message = completion
            .result
            .expect_err("unreachable server should fail")
            .to_string();
        assert!(message.starts_with("MDM summary request failed"));
        assert!(message.contains("127.0.0.1:1"));
        Ok(())
    }
}
