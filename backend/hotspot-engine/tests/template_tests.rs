use std::sync::atomic::Ordering;

use axum::http::{Method, StatusCode};
use serde_json::json;

use hotspot_engine::{
    models::{draft::AuthoringSurface, template::TemplateOrigin, MediaRef},
    services::{canvas_editor::EditorCommand, draft_store::DraftStore},
};

mod common;

use common::{sample_template, send_json};

async fn author_layout(ctx: &common::TestContext) {
    let workspace = ctx.state.workspace(AuthoringSurface::TeacherAuthoring);
    let image = ctx.state.registry.register(vec![3u8; 16], "image/png", "fatiha.png");
    workspace.attach_image(MediaRef::Local(image)).await.unwrap();
    let placed = workspace.dispatch(EditorCommand::ConfirmCrosshair).await.unwrap();
    let hotspot_id = placed.snapshot.session.selected.unwrap();
    let audio = ctx.state.registry.register(vec![1u8, 1], "audio/webm", "h1.webm");
    workspace.attach_audio(&hotspot_id, MediaRef::Local(audio)).await.unwrap();
}

#[tokio::test]
async fn test_save_requires_name_and_image() {
    let ctx = common::create_test_context();

    let (status, body) = send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "  " })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"],
        json!([
            "Give the template a name.",
            "Upload a worksheet image before saving a template."
        ])
    );
}

#[tokio::test]
async fn test_overlong_template_name_is_rejected() {
    let ctx = common::create_test_context();
    author_layout(&ctx).await;

    let (status, body) = send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "x".repeat(121) })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0], "Template names are limited to 120 characters.");
}

#[tokio::test]
async fn test_saved_template_keeps_layout_but_not_audio() {
    let ctx = common::create_test_context();
    author_layout(&ctx).await;

    let (status, saved) = send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "Fatiha page 1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", saved);
    assert_eq!(saved["origin"], "local");
    assert_eq!(saved["hotspotCount"], 1);

    let templates = ctx.state.templates.list().await.unwrap();
    assert_eq!(templates.len(), 1);
    let template = &templates[0];
    assert_eq!(template.origin, TemplateOrigin::Local);
    assert!(template.hotspots.iter().all(|hotspot| hotspot.audio.is_none()));

    let authored = ctx
        .state
        .workspace(AuthoringSurface::TeacherAuthoring)
        .session()
        .await;
    assert_ne!(template.hotspots[0].id, authored.hotspots[0].id);
    assert_eq!(
        template.image.as_local().unwrap().bytes(),
        authored.image.as_ref().and_then(MediaRef::as_local).unwrap().bytes()
    );
}

#[tokio::test]
async fn test_apply_template_replaces_canvas_and_keeps_details() {
    let ctx = common::create_test_context();
    ctx.api.seed_template(sample_template("api-fatiha"));
    send_json(
        &ctx.app,
        Method::PUT,
        "/api/v1/surfaces/qaidah/details",
        Some(json!({ "title": "Week 4 reading" })),
    )
    .await;

    let (status, body) = send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates/api-fatiha/apply",
        Some(json!({ "surface": "qaidah" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["mode"], "idle");
    assert_eq!(body["session"]["details"]["title"], "Week 4 reading");
    assert_eq!(body["session"]["image"]["url"], "/templates/fatiha.png");

    let hotspots = body["session"]["hotspots"].as_array().unwrap();
    assert_eq!(hotspots.len(), 2);
    assert!(hotspots.iter().all(|hotspot| hotspot["audio"].is_null()));
    assert!(hotspots.iter().all(|hotspot| hotspot["id"] != "t-h1" && hotspot["id"] != "t-h2"));
    assert_eq!(hotspots[0]["order"], 1);
    assert_eq!(hotspots[1]["order"], 2);
}

#[tokio::test]
async fn test_catalog_failure_still_lists_local_templates() {
    let ctx = common::create_test_context();
    ctx.api.seed_template(sample_template("api-fatiha"));
    author_layout(&ctx).await;
    send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "Local copy" })),
    )
    .await;

    let (_, both) = send_json(&ctx.app, Method::GET, "/api/v1/templates", None).await;
    assert_eq!(both.as_array().unwrap().len(), 2);
    assert_eq!(both[0]["origin"], "api");

    ctx.api.fail_catalog.store(true, Ordering::SeqCst);
    let (status, local_only) = send_json(&ctx.app, Method::GET, "/api/v1/templates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(local_only.as_array().unwrap().len(), 1);
    assert_eq!(local_only[0]["name"], "Local copy");
}

#[tokio::test]
async fn test_delete_local_template() {
    let ctx = common::create_test_context();
    author_layout(&ctx).await;
    let (_, saved) = send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "Disposable" })),
    )
    .await;
    let uri = format!("/api/v1/templates/{}", saved["id"].as_str().unwrap());

    let (status, _) = send_json(&ctx.app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&ctx.app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_local_templates_survive_restart() {
    let ctx = common::create_test_context();
    author_layout(&ctx).await;
    send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "Persistent" })),
    )
    .await;

    let restarted = common::create_test_context_with(ctx.store.clone(), false);
    let templates = restarted.state.templates.list().await.unwrap();

    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, "Persistent");
    assert_eq!(templates[0].image.as_local().unwrap().bytes(), &[3u8; 16]);
}

#[tokio::test]
async fn test_store_outage_still_lists_catalog() {
    let ctx = common::create_test_context();
    ctx.api.seed_template(sample_template("api-fatiha"));
    author_layout(&ctx).await;
    send_json(
        &ctx.app,
        Method::POST,
        "/api/v1/templates",
        Some(json!({ "surface": "teacher-authoring", "name": "Local copy" })),
    )
    .await;
    ctx.store_down(true);

    let (status, body) = send_json(&ctx.app, Method::GET, "/api/v1/templates", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["origin"], "api");
}

#[tokio::test]
async fn test_unreadable_local_template_is_skipped() {
    let ctx = common::create_test_context();
    let stored = json!([
        {
            "id": "local-broken",
            "name": "Broken",
            "image": { "kind": "inline", "mime": "image/png", "name": "a.png", "data": "***" },
            "hotspots": []
        },
        {
            "id": "local-good",
            "name": "Good",
            "image": { "kind": "remote", "url": "/uploads/good.png" },
            "hotspots": []
        }
    ]);
    ctx.store
        .save("assignment-drafts:templates", &stored.to_string())
        .await
        .unwrap();

    let templates = ctx.state.templates.list().await.unwrap();

    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, "Good");
    assert_eq!(templates[0].origin, TemplateOrigin::Local);
}
