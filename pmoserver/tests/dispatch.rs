use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode, header},
};
use pmomount::{MediaBackend, MediaItem, MediaResource, MountBuilder, ResourceReader};
use pmoserver::{ConnectionInfo, LogState, Server, log_dump};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Debug)]
struct Text(&'static str);

#[async_trait]
impl MediaResource for Text {
    fn content_type(&self) -> &str {
        "audio/mpeg"
    }

    fn size(&self) -> Option<u64> {
        Some(self.0.len() as u64)
    }

    async fn open(&self) -> std::io::Result<Box<dyn ResourceReader>> {
        Ok(Box::new(std::io::Cursor::new(self.0.as_bytes().to_vec())))
    }
}

#[derive(Debug)]
struct Song;

impl MediaItem for Song {
    fn id(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        "Song"
    }

    fn content(&self) -> Option<Arc<dyn MediaResource>> {
        Some(Arc::new(Text("la la la")))
    }
}

struct OneSong {
    name: &'static str,
    uuid: Uuid,
}

impl MediaBackend for OneSong {
    fn friendly_name(&self) -> &str {
        self.name
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn get_item(&self, id: &str) -> Option<Arc<dyn MediaItem>> {
        (id == "1").then(|| Arc::new(Song) as Arc<dyn MediaItem>)
    }
}

async fn app_with_two_mounts() -> (Router, Vec<Arc<pmomount::Mount>>) {
    let mut server = Server::new("test", "127.0.0.1", 0);
    let mut mounts = Vec::new();
    for name in ["First", "Second"] {
        let backend = Arc::new(OneSong {
            name,
            uuid: Uuid::new_v4(),
        });
        let mount = Arc::new(MountBuilder::new(backend).build().unwrap());
        server.add_mount(mount.clone());
        mounts.push(mount);
    }

    let conn = ConnectionInfo {
        remote: "10.0.0.9:40000".parse().unwrap(),
        local: "10.0.0.1:8080".parse().unwrap(),
    };
    let app = server.app().await.layer(MockConnectInfo(conn));
    (app, mounts)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_requests_reach_their_own_mount() {
    let (app, mounts) = app_with_two_mounts().await;

    for mount in &mounts {
        let response = app
            .clone()
            .oneshot(get(&mount.descriptor_uri()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains(&format!("uuid:{}", mount.uuid())));
        assert!(body.contains(&format!("{}control", mount.prefix())));
    }
}

#[tokio::test]
async fn test_redirect_and_streaming_through_listener() {
    let (app, mounts) = app_with_two_mounts().await;
    let prefix = mounts[0].prefix().to_string();

    let response = app.clone().oneshot(get(&prefix)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        &format!("{}index/0", prefix)
    );

    let response = app
        .clone()
        .oneshot(get(&format!("{}file/1", prefix)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "la la la");
}

#[tokio::test]
async fn test_unknown_paths_are_not_found() {
    let (app, mounts) = app_with_two_mounts().await;

    let response = app.clone().oneshot(get("/nothing/here")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let inside = format!("{}whatever", mounts[1].prefix());
    let response = app.clone().oneshot(get(&inside)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soap_body_is_forwarded() {
    let (app, mounts) = app_with_two_mounts().await;
    let envelope = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body><u:GetSystemUpdateID xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"/></s:Body>
</s:Envelope>"#;

    let request = Request::builder()
        .method("POST")
        .uri(format!("{}control", mounts[0].prefix()))
        .header(header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
        .body(Body::from(envelope))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<Id>1</Id>"));
}

#[tokio::test]
async fn test_info_lists_mounts() {
    let (app, mounts) = app_with_two_mounts().await;

    let response = app.oneshot(get("/info")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    let infos: serde_json::Value = serde_json::from_str(&body).unwrap();
    let infos = infos.as_array().unwrap();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0]["name"], "First");
    assert_eq!(infos[0]["prefix"], mounts[0].prefix());
    assert_eq!(infos[1]["descriptor"], mounts[1].descriptor_uri());
    assert_eq!(infos[1]["revision"], 1);
}

#[tokio::test]
async fn test_extra_routes_sit_beside_mounts() {
    let mut server = Server::new("test", "127.0.0.1", 0);
    server
        .add_handler_with_state("/log-dump", log_dump, LogState::new(4))
        .await;
    server
        .add_router(
            "api",
            Router::new().route("/ping", axum::routing::get(|| async { "pong" })),
        )
        .await;
    let conn = ConnectionInfo {
        remote: "10.0.0.9:40000".parse().unwrap(),
        local: "10.0.0.1:8080".parse().unwrap(),
    };
    let app = server.app().await.layer(MockConnectInfo(conn));

    let response = app.clone().oneshot(get("/api/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "pong");

    let response = app.clone().oneshot(get("/log-dump")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "[]");

    let response = app.oneshot(get("/mm-unknown/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
