use legacy_qb::common::{RuntimeContext, install_runtime, runtime};
use legacy_qb::prelude::*;
use legacy_qb::upload::UNSUPPORTED_KEYS;
use serde_json::json;
use tempfile::tempdir;

fn staged_file(dir: &std::path::Path, bytes: usize) -> std::path::PathBuf {
    let path = dir.join(format!("upload_{bytes}.tmp"));
    std::fs::write(&path, vec![7u8; bytes]).expect("write staged file");
    path
}

#[test]
fn legacy_upload_keys_are_refused_before_any_io() {
    let root = tempdir().expect("tempdir");
    let target = root.path().join("never-created");
    for key in UNSUPPORTED_KEYS {
        let mut config = json!({ "upload_path": target });
        config[key] = json!(true);
        let err = Upload::new(config).unwrap_err();
        assert!(matches!(err, BridgeError::NotSupported(_)), "{key}");
    }
    assert!(!target.exists());

    // explicit nulls are treated as absent
    assert!(Upload::new(json!({ "upload_path": target, "overwrite": null })).is_ok());
}

#[tokio::test]
async fn rejected_upload_keeps_the_file_in_place() -> Result<(), Box<dyn std::error::Error>> {
    let src = tempdir()?;
    let dest = tempdir()?;
    let tmp = staged_file(src.path(), 64);

    let mut upload = Upload::new(json!({
        "upload_path": dest.path(),
        "allowed_types": ["png", ".GIF"],
    }))?;
    let mut request =
        FileBag::new().with_file("avatar", UploadedFile::new(&tmp, "me.jpg", "image/jpeg", 64));
    assert!(!upload.do_upload(&mut request, "avatar").await?);
    assert_eq!(
        upload.display_errors("<li>", "</li>"),
        "<li>avatar does not have a valid file extension.</li>"
    );
    assert!(tmp.is_file());
    assert!(matches!(upload.data(), Err(BridgeError::Precondition(_))));

    assert!(!upload.do_upload(&mut request, "missing").await?);
    assert_eq!(upload.errors().len(), 1);
    Ok(())
}

#[tokio::test]
async fn oversized_and_too_wide_files_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let src = tempdir()?;
    let dest = tempdir()?;
    let big = staged_file(src.path(), 3 * 1024);

    let mut upload = Upload::new(json!({
        "upload_path": dest.path(),
        "max_size": 2,
        "max_width": 100,
        "max_height": 100,
    }))?;
    let mut request =
        FileBag::new().with_file("doc", UploadedFile::new(&big, "big.png", "image/png", 3 * 1024));
    assert!(!upload.do_upload(&mut request, "doc").await?);
    assert_eq!(upload.errors(), ["doc file is too large."]);

    let small = staged_file(src.path(), 16);
    let mut request = FileBag::new().with_file(
        "doc",
        UploadedFile::new(&small, "wide.png", "image/png", 16).with_dimensions(300, 50),
    );
    assert!(!upload.do_upload(&mut request, "doc").await?);
    assert_eq!(
        upload.errors(),
        ["doc is either not an image, or it is too wide or tall."]
    );
    Ok(())
}

#[tokio::test]
async fn stored_names_never_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let src = tempdir()?;
    let dest = tempdir()?;
    std::fs::write(dest.path().join("report.pdf"), b"existing")?;

    let mut upload = Upload::new(json!({ "upload_path": dest.path(), "allowed_types": "pdf" }))?;
    let tmp = staged_file(src.path(), 512);
    let mut request = FileBag::new()
        .with_file("report", UploadedFile::new(&tmp, "report.pdf", "application/pdf", 512));
    assert!(upload.do_upload(&mut request, "report").await?);

    let data = upload.data()?;
    assert_eq!(data.file_name, "report_1.pdf");
    assert_eq!(data.raw_name, "report_1");
    assert_eq!(data.orig_name, "report.pdf");
    assert!((data.file_size - 0.5).abs() < f64::EPSILON);
    assert_eq!(std::fs::read(dest.path().join("report.pdf"))?, b"existing");
    assert!(dest.path().join("report_1.pdf").is_file());
    assert!(!tmp.exists());
    Ok(())
}

#[tokio::test]
async fn encrypted_names_keep_the_extension() -> Result<(), Box<dyn std::error::Error>> {
    let src = tempdir()?;
    let dest = tempdir()?;
    let nested = dest.path().join("a").join("b");

    let mut upload = Upload::new(json!({ "upload_path": nested, "encrypt_name": true }))?;
    let tmp = staged_file(src.path(), 10);
    let mut request =
        FileBag::new().with_file("f", UploadedFile::new(&tmp, "Photo.JPG", "image/jpeg", 10));
    assert!(upload.do_upload(&mut request, "f").await?);

    let data = upload.data()?;
    assert_ne!(data.file_name, "Photo.JPG");
    assert!(data.file_name.ends_with(".jpg"));
    assert_eq!(data.file_ext, ".jpg");
    assert_eq!(data.client_name, "Photo.JPG");
    assert!(nested.join(&data.file_name).is_file());
    assert_eq!(
        upload.data_field("full_path")?,
        Some(json!(nested.join(&data.file_name).to_string_lossy()))
    );
    Ok(())
}

#[test]
fn global_helpers() {
    assert_eq!(
        html_escape(r#"<b class="x">Tom & Jerry's</b>"#, true).unwrap(),
        "&lt;b class=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/b&gt;"
    );
    assert!(matches!(html_escape("a", false), Err(BridgeError::NotSupported(_))));

    let err = show_error("database is down", 503, "");
    assert!(matches!(err, BridgeError::Runtime { status: 503, .. }));
    assert_eq!(err.to_string(), "database is down");
    assert!(matches!(
        show_error("x", 500, "Custom"),
        BridgeError::NotSupported(_)
    ));
    assert!(matches!(show_404("/nowhere", true), BridgeError::PageNotFound(_)));
}

#[test]
fn runtime_context_is_installed_once() {
    assert!(install_runtime(RuntimeContext { is_cli: true }).is_ok());
    assert!(runtime().is_cli);
    let err = install_runtime(RuntimeContext { is_cli: false }).unwrap_err();
    assert!(matches!(err, BridgeError::Precondition(_)));
    assert!(runtime().is_cli);
}

#[test]
fn escaping_values() {
    assert_eq!(escape(&RowValues::Text("O'Brien".into())), "'O''Brien'");
    assert_eq!(escape(&RowValues::Bool(true)), "1");
    assert_eq!(escape(&RowValues::Null), "NULL");
    assert_eq!(escape(&RowValues::Blob(vec![0xAB, 0x01])), "X'AB01'");
    assert_eq!(escape_str("50%_off", true), "50!%!_off");
    assert_eq!(remove_invisible_characters("ab\u{7}c", false), "abc");
}
