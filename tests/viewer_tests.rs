//! Integration tests for the viewer registry over a full capability context.

use std::time::Duration;

use serde_json::{json, Value};

use issueview::models::Issue;
use issueview::ViewerRegistry;

mod fixtures;
use fixtures::{test_host, ScriptedResponse};

fn sample_issue() -> Issue {
    serde_json::from_value(json!({
        "id": "AB-17",
        "subject": "Door <broken>",
        "created": "2026-08-29T10:00:00Z",
        "priority": 2
    }))
    .unwrap()
}

#[tokio::test]
async fn valid_code_is_invocable_with_viewer_signature() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("return str(value)");
    let result = viewer
        .invoke(json!(2), &sample_issue(), "priority")
        .unwrap();
    assert_eq!(result, json!("2"));
}

#[tokio::test]
async fn syntax_error_surfaces_on_invocation_not_registration() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    // Registration must not fail.
    let viewer = registry.get_viewer("if (");

    let err = viewer
        .invoke(json!(null), &sample_issue(), "subject")
        .unwrap_err();
    assert_eq!(err.kind, issueview::error::ScriptErrorKind::Parse);
}

#[tokio::test]
async fn viewer_reads_issue_and_capability_helpers() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer(
        "if (field == 'subject') { return escape_html(value) } return str(value)",
    );
    let rendered = viewer
        .invoke(json!("Door <broken>"), &sample_issue(), "subject")
        .unwrap();
    assert_eq!(rendered, json!("Door &lt;broken&gt;"));
}

#[tokio::test]
async fn viewer_formats_dates_through_capability() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("format_date(issue.created, '%d.%m.%Y')");
    let rendered = viewer
        .invoke(json!(null), &sample_issue(), "created")
        .unwrap();
    assert_eq!(rendered, json!("29.08.2026"));
}

#[tokio::test]
async fn viewer_reads_store_state() {
    let host = test_host();
    let project = host.store.project_by_acronym("AB").unwrap();
    host.store.set_project(Some(project));
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("project().acronym + '/' + filter_label('open')");
    let rendered = viewer
        .invoke(json!(null), &sample_issue(), "subject")
        .unwrap();
    assert_eq!(rendered, json!("AB/Open Issues"));
}

#[tokio::test]
async fn viewer_reads_session_and_map() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("session().login");
    assert_eq!(
        viewer.invoke(json!(null), &sample_issue(), "x").unwrap(),
        json!("admin")
    );

    let viewer = registry.get_viewer("map_link(value)");
    assert_eq!(
        viewer
            .invoke(json!("Main St 5"), &sample_issue(), "address")
            .unwrap(),
        json!({"map": "Main St 5"})
    );
}

#[tokio::test]
async fn alert_builtin_fires_and_forgets() {
    let host = test_host();
    let alerts = std::sync::Arc::clone(&host.alerts);
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("alert('field rendered: ' + field); return value");
    let result = viewer
        .invoke(json!(1), &sample_issue(), "priority")
        .unwrap();

    // The script's own result is unaffected by the side effect.
    assert_eq!(result, json!(1));
    assert_eq!(
        alerts.alerts.lock().unwrap().as_slice(),
        ["field rendered: priority"]
    );
}

#[tokio::test]
async fn modal_builtin_records_message_without_changing_result() {
    let host = test_host();
    let alerts = std::sync::Arc::clone(&host.alerts);
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("modal('details for ' + issue.id); return value");
    let result = viewer
        .invoke(json!("ok"), &sample_issue(), "subject")
        .unwrap();

    assert_eq!(result, json!("ok"));
    assert_eq!(
        alerts.modals.lock().unwrap().as_slice(),
        ["details for AB-17"]
    );
}

#[tokio::test]
async fn auto_link_builtin_wraps_value_in_anchor() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("auto_link(value)");
    let result = viewer
        .invoke(json!("http://example.test"), &sample_issue(), "homepage")
        .unwrap();

    assert_eq!(
        result,
        json!("<a href=\"http://example.test\">http://example.test</a>")
    );
}

#[tokio::test]
async fn http_get_builtin_spawns_without_blocking_invocation() {
    let host = test_host();
    let http = std::sync::Arc::clone(&host.http);
    http.enqueue(ScriptedResponse::ok(json!({})));
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("http_get('tt/ping'); return 'done'");
    let result = viewer
        .invoke(json!(null), &sample_issue(), "x")
        .unwrap();

    // Invocation returns before (and regardless of) the spawned request.
    assert_eq!(result, json!("done"));

    // The spawned task lands shortly after.
    for _ in 0..50 {
        if http.request_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(http.requests()[0].path, "tt/ping");
}

#[tokio::test]
async fn repeated_get_viewer_is_behaviorally_equivalent() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);
    let issue = sample_issue();

    let results: Vec<Value> = (0..3)
        .map(|_| {
            registry
                .get_viewer("nl2br('a\\nb') + str(value)")
                .invoke(json!(7), &issue, "subject")
                .unwrap()
        })
        .collect();
    assert_eq!(results[0], json!("a<br>b7"));
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn runtime_fault_propagates_to_caller() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 8);

    let viewer = registry.get_viewer("value.missing.deeper");
    let err = viewer
        .invoke(json!(null), &sample_issue(), "x")
        .unwrap_err();
    assert_eq!(err.kind, issueview::error::ScriptErrorKind::Eval);
}

#[tokio::test]
async fn cache_is_bounded_and_recency_keyed() {
    let host = test_host();
    let registry = ViewerRegistry::new(host.ctx, 2);

    registry.get_viewer("1");
    registry.get_viewer("2");
    registry.get_viewer("3");
    assert_eq!(registry.cached_count(), 2);

    // Evicted code still works; it is simply recompiled on demand.
    let result = registry
        .get_viewer("1")
        .invoke(json!(null), &sample_issue(), "x")
        .unwrap();
    assert_eq!(result, json!(1));
}
