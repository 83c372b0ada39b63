mod common;

use common::signature_png;
use sigscan_lib::{
    capture::{accept_upload, UploadedFile},
    db::{Database, MemoryRepository, ReferenceRepository},
    models::{ImageSource, NewReference, ReferenceRecord},
};

fn new_reference(label: &str) -> ReferenceRecord {
    let image = accept_upload(UploadedFile {
        name: format!("{label}.png"),
        content_type: Some("image/png".into()),
        bytes: signature_png(32, 16),
    })
    .unwrap();

    NewReference {
        label: label.into(),
        category: "Cardiology".into(),
        reference_image: Some(image),
    }
    .into_record()
    .unwrap()
}

async fn exercise<R: ReferenceRepository>(repository: &R) {
    assert!(repository.list().await.unwrap().is_empty());

    let first = new_reference("Dr. Ada");
    let second = new_reference("Dr. Grace");
    let third = new_reference("Dr. Barbara");
    for record in [&first, &second, &third] {
        repository.append(record.clone()).await.unwrap();
    }

    let listed = repository.list().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str(), third.id.as_str()]);

    let stored = &listed[0];
    assert_eq!(stored.label, "Dr. Ada");
    assert_eq!(stored.category, "Cardiology");
    assert_eq!(stored.reference_image, first.reference_image);
    assert_eq!(stored.reference_image.dimensions(), Some((32, 16)));
    assert_eq!(stored.reference_image.source(), ImageSource::Uploaded);

    assert!(repository.remove(&second.id).await.unwrap());
    assert!(!repository.remove(&second.id).await.unwrap());

    let remaining: Vec<String> = repository
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![first.id.clone(), third.id.clone()]);
}

#[tokio::test]
async fn memory_repository_keeps_insertion_order() {
    exercise(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn sqlite_repository_keeps_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("refs.sqlite3")).unwrap();
    exercise(&db).await;
}

#[tokio::test]
async fn sqlite_repository_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("refs.sqlite3");

    let record = new_reference("Dr. Ada");
    {
        let db = Database::new(path.clone()).unwrap();
        db.append(record.clone()).await.unwrap();
    }

    let reopened = Database::new(path).unwrap();
    let listed = reopened.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(
        listed[0].created_at.timestamp_millis(),
        record.created_at.timestamp_millis()
    );
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("refs.sqlite3")).unwrap();
    let memory = MemoryRepository::new();

    let record = new_reference("Dr. Ada");
    db.append(record.clone()).await.unwrap();
    memory.append(record.clone()).await.unwrap();

    assert!(db.append(record.clone()).await.is_err());
    assert!(memory.append(record).await.is_err());
}

#[test]
fn incomplete_references_are_rejected() {
    let incomplete = NewReference {
        label: "Dr. Ada".into(),
        category: String::new(),
        reference_image: None,
    };
    let err = incomplete.into_record().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Please fill in all fields and upload a signature"
    );
}
