// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use fleetdash_api::Client;
use fleetdash_app::{
    Platform, QueryKey, QueryPayload, SOFTWARE_ORDER_DIRECTION, SOFTWARE_ORDER_KEY,
    SOFTWARE_PAGE_SIZE, SoftwareQuery, TeamId,
};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

fn mock_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    Ok((server, addr))
}

fn respond_json(request: Request, status: u16, body: &str) {
    let response = Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        );
    request.respond(response).expect("response should succeed");
}

fn authorization(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Authorization"))
        .map(|header| header.value.as_str().to_owned())
}

#[test]
fn unreachable_server_error_names_base_url() {
    let client = Client::new("http://127.0.0.1:1", None, Duration::from_millis(50))
        .expect("client should initialize");

    let error = client.teams().expect_err("teams should fail for unreachable endpoint");
    let message = format!("{error:#}");
    assert!(message.contains("http://127.0.0.1:1"));
    assert!(message.contains("server.base_url"));
}

#[test]
fn host_summary_sends_scope_params_and_bearer_token() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(
            request.url(),
            "/api/latest/fleet/host_summary?team_id=3&platform=darwin&low_disk_space=32"
        );
        assert_eq!(authorization(&request).as_deref(), Some("Bearer s3cret"));
        respond_json(
            request,
            200,
            r#"{"totals_hosts_count":4,"platforms":[{"platform":"darwin","hosts_count":4}],"all_linux_count":0,"missing_30_days_count":1,"low_disk_space_count":2,"builtin_labels":[{"id":7,"name":"macOS","label_type":"builtin"}]}"#,
        );
    });

    let client = Client::new(&addr, Some("s3cret"), Duration::from_secs(1))?;
    let payload = client.fetch(&QueryKey::HostSummary {
        team: Some(TeamId::new(3)),
        platform: Platform::Darwin,
        low_disk_space_gb: Some(32),
    })?;
    let QueryPayload::HostSummary(summary) = payload else {
        return Err(anyhow!("expected host summary payload"));
    };
    assert_eq!(summary.platform_count("darwin"), 4);
    assert_eq!(summary.low_disk_space_count, Some(2));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn global_host_summary_omits_platform_and_threshold() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/api/latest/fleet/host_summary");
        assert_eq!(authorization(&request), None);
        respond_json(request, 200, r#"{"totals_hosts_count":0}"#);
    });

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let summary = client.host_summary(None, Platform::All, None)?;
    assert_eq!(summary.totals_hosts_count, 0);
    assert!(summary.platforms.is_none());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn software_page_request_matches_key() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(
            request.url(),
            "/api/latest/fleet/software?page=1&per_page=8&order_key=hosts_count&order_direction=desc&vulnerable=true"
        );
        respond_json(
            request,
            200,
            r#"{"software":[{"id":1,"name":"openssl","version":"1.1.1","source":"deb_packages","hosts_count":9,"vulnerabilities":[{"cve":"CVE-2026-0001"}]}],"counts_updated_at":"2026-02-19T12:34:56Z"}"#,
        );
    });

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let listing = client.software(&SoftwareQuery {
        page: 1,
        per_page: SOFTWARE_PAGE_SIZE,
        order_key: SOFTWARE_ORDER_KEY,
        order_direction: SOFTWARE_ORDER_DIRECTION,
        vulnerable: true,
        team: None,
    })?;
    assert_eq!(listing.rows().len(), 1);
    assert!(listing.counts_updated_at.is_some());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn enroll_secrets_unwrap_their_envelopes() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        for _ in 0..2 {
            let request = server.recv().expect("request expected");
            let url = request.url().to_owned();
            match url.as_str() {
                "/api/latest/fleet/spec/enroll_secret" => respond_json(
                    request,
                    200,
                    r#"{"spec":{"secrets":[{"secret":"global-abc"}]}}"#,
                ),
                "/api/latest/fleet/teams/5/secrets" => {
                    respond_json(request, 200, r#"{"secrets":[{"secret":"team-five"}]}"#)
                }
                other => panic!("unexpected request {other}"),
            }
        }
    });

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let global = client.global_enroll_secrets()?;
    assert_eq!(global[0].secret, "global-abc");
    let team = client.team_enroll_secrets(TeamId::new(5))?;
    assert_eq!(team[0].secret, "team-five");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn mdm_and_macadmins_requests_carry_team_scope() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(
            request.url(),
            "/api/latest/fleet/hosts/summary/mdm?platform=windows&team_id=2"
        );
        respond_json(
            request,
            200,
            r#"{"counts_updated_at":null,"mobile_device_management_enrollment_status":{"enrolled_manual_hosts_count":0,"enrolled_automated_hosts_count":0,"unenrolled_hosts_count":0,"hosts_count":0},"mobile_device_management_solution":null}"#,
        );

        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/api/latest/fleet/macadmins?team_id=2");
        respond_json(
            request,
            200,
            r#"{"macadmins":{"counts_updated_at":null,"munki_versions":null,"munki_issues":null}}"#,
        );
    });

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let mdm = client.mdm_summary(Platform::Windows, Some(TeamId::new(2)))?;
    assert!(mdm.mobile_device_management_solution.is_none());
    let macadmins = client.macadmins(Some(TeamId::new(2)))?;
    assert!(macadmins.munki_versions.is_none());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn non_success_status_surfaces_server_reason() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        respond_json(
            request,
            403,
            r#"{"message":"Authorization header required","errors":[{"name":"base","reason":"forbidden"}]}"#,
        );
    });

    let client = Client::new(&addr, Some("token"), Duration::from_secs(1))?;
    let error = client
        .teams()
        .expect_err("teams should fail with forbidden status");
    let message = format!("{error:#}");
    assert!(message.contains("load teams"));
    assert!(message.contains("HTTP 403: forbidden"));

    handle.join().expect("server thread should join");
    Ok(())
}
