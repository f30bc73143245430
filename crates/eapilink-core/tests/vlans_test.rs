#![allow(clippy::unwrap_used)]
// Integration tests for the VLAN resource against a wiremock device.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eapilink_api::{Error, Session, TransportConfig, TransportKind};
use eapilink_core::{Collection, Node, Vlans};

const RUNNING_CONFIG: &str = "\
hostname sw01
vlan 1
   name default
   state active
vlan 100
   name production
   state active
   trunk group tg1
vlan 200
   name lab
   state suspend
interface Ethernet1
   no shutdown
";

// ── Helpers ─────────────────────────────────────────────────────────

async fn vlans_for(server: &MockServer) -> Vlans {
    let url = url::Url::parse(&server.uri()).unwrap();
    let config = TransportConfig::new(TransportKind::Http, url.host_str().unwrap())
        .with_port(url.port());
    let node = Arc::new(Node::new(Session::from_config(&config, None).unwrap()));
    Vlans::new(node)
}

fn success_envelope(results: serde_json::Value) -> serde_json::Value {
    json!({ "jsonrpc": "2.0", "id": "1", "result": results })
}

async fn mount_running_config(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .and(body_partial_json(json!({ "params": { "format": "text" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_envelope(json!([
            {},
            { "output": RUNNING_CONFIG }
        ]))))
        .mount(server)
        .await;
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn get_reads_attributes_from_the_config_block() {
    let server = MockServer::start().await;
    mount_running_config(&server).await;

    let vlans = vlans_for(&server).await;
    let vlan = vlans.get("100").await.unwrap().expect("vlan 100 exists");

    assert_eq!(vlan.vlan_id, "100");
    assert_eq!(vlan.name.as_deref(), Some("production"));
    assert_eq!(vlan.state.as_deref(), Some("active"));
    assert_eq!(vlan.trunk_groups, vec!["tg1".to_owned()]);
}

#[tokio::test]
async fn get_reports_absence_for_an_unknown_vlan() {
    let server = MockServer::start().await;
    mount_running_config(&server).await;

    let vlans = vlans_for(&server).await;
    assert!(vlans.get("999").await.unwrap().is_none());
}

#[tokio::test]
async fn getall_finds_every_top_level_vlan_statement() {
    let server = MockServer::start().await;
    mount_running_config(&server).await;

    let vlans = vlans_for(&server).await;
    let all = vlans.getall().await.unwrap();

    assert_eq!(
        all.keys().cloned().collect::<Vec<_>>(),
        vec!["1".to_owned(), "100".into(), "200".into()]
    );
    assert_eq!(all["200"].state.as_deref(), Some("suspend"));
}

#[tokio::test]
async fn collection_semantics_are_derived_from_getall() {
    let server = MockServer::start().await;
    mount_running_config(&server).await;

    let vlans = vlans_for(&server).await;
    let all = vlans.getall().await.unwrap();

    assert_eq!(vlans.len().await.unwrap(), all.len());
    assert!(!vlans.is_empty().await.unwrap());
    for name in vlans.names().await.unwrap() {
        assert!(all.contains_key(&name));
        assert!(vlans.contains(&name).await.unwrap());
    }
    assert!(!vlans.contains("999").await.unwrap());
}

#[tokio::test]
async fn getall_makes_one_fetch_even_with_autorefresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/command-api"))
        .and(body_partial_json(json!({ "params": { "format": "text" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_envelope(json!([
            {},
            { "output": RUNNING_CONFIG }
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let url = url::Url::parse(&server.uri()).unwrap();
    let config = TransportConfig::new(TransportKind::Http, url.host_str().unwrap())
        .with_port(url.port());
    let node = Arc::new(Node::new(Session::from_config(&config, None).unwrap()));
    let vlans = Vlans::with_autorefresh(node, true);

    // The whole enumeration parses one config snapshot.
    assert_eq!(vlans.getall().await.unwrap().len(), 3);
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_sends_the_vlan_command_in_config_mode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/command-api"))
        .and(body_partial_json(json!({
            "params": { "cmds": [
                {"cmd": "enable", "input": ""}, "configure", "vlan 300", "end"
            ] }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(json!([{}, {}, {}, {}]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let vlans = vlans_for(&server).await;
    assert!(vlans.create("300").await.unwrap());
    assert!(vlans.last_error().is_none());
}

#[tokio::test]
async fn rejected_command_yields_false_and_records_the_fault() {
    let server = MockServer::start().await;

    // Wire frame: enable, configure, "vlan 5000" -- failure at caller index 0.
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {
                "code": 1002,
                "message": "CLI command 3 of 4 'vlan 5000' failed: invalid command",
                "data": [ {}, {}, { "errors": ["Invalid input (at token 1: '5000')"] } ]
            }
        })))
        .mount(&server)
        .await;

    let vlans = vlans_for(&server).await;
    assert!(!vlans.create("5000").await.unwrap());

    let fault = vlans.last_error().expect("fault should be recorded");
    assert_eq!(fault.index, 0);
    assert_eq!(fault.command, "vlan 5000");
    assert!(fault.message.contains("Invalid input"));
}

#[tokio::test]
async fn applying_the_same_batch_twice_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/command-api"))
        .and(body_partial_json(json!({ "params": { "format": "json" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_envelope(json!([{}, {}, {}, {}]))),
        )
        .expect(2)
        .mount(&server)
        .await;

    let vlans = vlans_for(&server).await;
    assert!(vlans.create("300").await.unwrap());
    assert!(vlans.create("300").await.unwrap());
    assert!(vlans.last_error().is_none());
}

#[tokio::test]
async fn set_name_enters_the_vlan_context_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/command-api"))
        .and(body_partial_json(json!({
            "params": { "cmds": [
                {"cmd": "enable", "input": ""}, "configure", "vlan 100", "name staging", "end"
            ] }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_envelope(json!([{}, {}, {}, {}, {}]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let vlans = vlans_for(&server).await;
    assert!(vlans.set_name("100", Some("staging"), false).await.unwrap());
}

#[tokio::test]
async fn set_state_validates_the_value_before_touching_the_device() {
    let server = MockServer::start().await;
    // No mock mounted: an invalid state must never reach the wire.

    let vlans = vlans_for(&server).await;
    let err = vlans.set_state("100", Some("bogus"), false).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }), "got: {err:?}");
}
