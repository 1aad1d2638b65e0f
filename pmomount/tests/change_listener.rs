mod common;

use axum::http::{HeaderValue, Method, StatusCode, header};
use common::*;
use pmomount::{MountBuilder, MountResponse};
use std::sync::{Arc, OnceLock};

fn soap(prefix: &str, action: &str, args: &[(&str, &str)]) -> pmomount::MountRequest {
    request(Method::POST, &format!("{}control", prefix))
        .with_header(header::HOST, HeaderValue::from_static("192.168.1.5:8080"))
        .with_body(soap_envelope(action, args))
}

fn xml_body(response: MountResponse) -> (StatusCode, String) {
    match response {
        MountResponse::Xml { status, body } => (status, body),
        other => panic!("expected XML, got {:?}", other),
    }
}

const BROWSE_ROOT: &[(&str, &str)] = &[
    ("ObjectID", "0"),
    ("BrowseFlag", "BrowseDirectChildren"),
    ("Filter", "*"),
    ("StartingIndex", "0"),
    ("RequestedCount", "0"),
    ("SortCriteria", ""),
];

#[tokio::test]
async fn test_revision_follows_notifications() {
    let backend = Arc::new(library());
    let mount = MountBuilder::new(backend.clone()).build().unwrap();
    assert_eq!(mount.revision(), 1);

    let notifier = backend.notifier.as_ref().unwrap();
    for _ in 0..5 {
        notifier.notify();
    }
    assert_eq!(mount.revision(), 6);
}

#[tokio::test]
async fn test_concurrent_notifications_count_exactly() {
    let backend = Arc::new(library());
    let mount = Arc::new(MountBuilder::new(backend.clone()).build().unwrap());

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let backend = backend.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    backend.notifier.as_ref().unwrap().notify();
                }
            })
        })
        .collect();

    // Requêtes en parallèle des notifications
    for _ in 0..20 {
        let path = format!("{}file/7", mount.prefix());
        assert!(mount.handle(get(&path)).await.is_ok());
    }

    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(mount.revision(), 1 + 8 * 50);
}

#[tokio::test]
async fn test_backend_without_notifier_is_not_watched() {
    let mut backend = library();
    backend.notifier = None;
    let mount = MountBuilder::new(Arc::new(backend)).build().unwrap();
    assert!(!mount.is_attached());
    assert_eq!(mount.revision(), 1);
}

#[tokio::test]
async fn test_detach_stops_revision_updates() {
    let backend = Arc::new(library());
    let mount = MountBuilder::new(backend.clone()).build().unwrap();
    let notifier = backend.notifier.as_ref().unwrap();

    notifier.notify();
    assert_eq!(mount.revision(), 2);

    mount.detach();
    assert!(!mount.is_attached());
    notifier.notify();
    assert_eq!(mount.revision(), 2);
    assert_eq!(notifier.listener_count(), 0);
}

#[tokio::test]
async fn test_detach_during_notification_is_final() {
    let backend = Arc::new(library());
    let notifier = backend.notifier.as_ref().unwrap();

    // Abonné placé avant le montage : il détache pendant la même notification
    let slot: Arc<OnceLock<Arc<pmomount::Mount>>> = Arc::new(OnceLock::new());
    let detacher = slot.clone();
    let _earlier = notifier.subscribe(move || {
        if let Some(mount) = detacher.get() {
            mount.detach();
        }
    });

    let mount = Arc::new(MountBuilder::new(backend.clone()).build().unwrap());
    slot.set(mount.clone()).unwrap();
    assert_eq!(notifier.listener_count(), 2);

    notifier.notify();
    assert!(!mount.is_attached());
    assert_eq!(mount.revision(), 1);
    assert_eq!(notifier.listener_count(), 1);
}

#[tokio::test]
async fn test_dropping_mount_unsubscribes() {
    let backend = Arc::new(library());
    let mount = MountBuilder::new(backend.clone()).build().unwrap();
    assert_eq!(backend.notifier.as_ref().unwrap().listener_count(), 1);
    drop(mount);
    assert_eq!(backend.notifier.as_ref().unwrap().listener_count(), 0);
}

#[tokio::test]
async fn test_system_update_id_reports_revision() {
    let backend = Arc::new(library());
    let mount = MountBuilder::new(backend.clone()).build().unwrap();

    let (status, body) = xml_body(
        mount
            .handle(soap(mount.prefix(), "GetSystemUpdateID", &[]))
            .await
            .unwrap(),
    );
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Id>1</Id>"));

    backend.notifier.as_ref().unwrap().notify();
    let (_, body) = xml_body(
        mount
            .handle(soap(mount.prefix(), "GetSystemUpdateID", &[]))
            .await
            .unwrap(),
    );
    assert!(body.contains("<Id>2</Id>"));
    assert_eq!(mount.state().cached_len(), 0);
}

#[tokio::test]
async fn test_browse_is_cached_until_change() {
    let backend = Arc::new(library());
    let mount = MountBuilder::new(backend.clone()).build().unwrap();

    let (status, first) = xml_body(
        mount
            .handle(soap(mount.prefix(), "Browse", BROWSE_ROOT))
            .await
            .unwrap(),
    );
    assert_eq!(status, StatusCode::OK);
    assert!(first.contains("<NumberReturned>2</NumberReturned>"));
    assert!(first.contains("<TotalMatches>2</TotalMatches>"));
    assert!(first.contains("<UpdateID>1</UpdateID>"));
    assert!(first.contains("Track seven"));
    assert!(first.contains(&format!("http://192.168.1.5:8080{}file/7", mount.prefix())));
    assert_eq!(mount.state().cached_len(), 1);

    let lookups = backend.lookups();
    let (_, second) = xml_body(
        mount
            .handle(soap(mount.prefix(), "Browse", BROWSE_ROOT))
            .await
            .unwrap(),
    );
    assert_eq!(first, second);
    assert_eq!(backend.lookups(), lookups);

    backend.notifier.as_ref().unwrap().notify();
    assert_eq!(mount.state().cached_len(), 0);

    let (_, third) = xml_body(
        mount
            .handle(soap(mount.prefix(), "Browse", BROWSE_ROOT))
            .await
            .unwrap(),
    );
    assert!(third.contains("<UpdateID>2</UpdateID>"));
    assert_eq!(backend.lookups(), lookups + 1);
}

#[tokio::test]
async fn test_browse_paging_and_metadata() {
    let mount = MountBuilder::new(Arc::new(library())).build().unwrap();

    let (_, page) = xml_body(
        mount
            .handle(soap(
                mount.prefix(),
                "Browse",
                &[
                    ("ObjectID", "0"),
                    ("BrowseFlag", "BrowseDirectChildren"),
                    ("StartingIndex", "1"),
                    ("RequestedCount", "5"),
                ],
            ))
            .await
            .unwrap(),
    );
    assert!(page.contains("<NumberReturned>1</NumberReturned>"));
    assert!(page.contains("<TotalMatches>2</TotalMatches>"));
    assert!(page.contains("Movie"));
    assert!(!page.contains("Track seven"));

    let (_, meta) = xml_body(
        mount
            .handle(soap(
                mount.prefix(),
                "Browse",
                &[("ObjectID", "8"), ("BrowseFlag", "BrowseMetadata")],
            ))
            .await
            .unwrap(),
    );
    assert!(meta.contains("<NumberReturned>1</NumberReturned>"));
    assert!(meta.contains("cover/8"));
    assert!(meta.contains("subtitle/8"));
}

#[tokio::test]
async fn test_soap_faults() {
    let mount = MountBuilder::new(Arc::new(library())).build().unwrap();

    let (status, body) = xml_body(
        mount
            .handle(soap(mount.prefix(), "DestroyObject", &[("ObjectID", "7")]))
            .await
            .unwrap(),
    );
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<errorCode>401</errorCode>"));

    let (status, body) = xml_body(
        mount
            .handle(soap(
                mount.prefix(),
                "Browse",
                &[("ObjectID", "nope"), ("BrowseFlag", "BrowseMetadata")],
            ))
            .await
            .unwrap(),
    );
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<errorCode>701</errorCode>"));

    let garbage = request(Method::POST, &format!("{}control", mount.prefix())).with_body("not xml");
    let (status, body) = xml_body(mount.handle(garbage).await.unwrap());
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<errorCode>402</errorCode>"));
    assert_eq!(mount.state().cached_len(), 0);
}
