//! Validation rules enforced when entries are added or loaded.

use crudearch_format::{
    Archive, ArchiveConfig, Category, Error, TypeDescriptor, TypeRegistry, ValidationError,
};

fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn validation_error(result: crudearch_format::Result<impl Sized>) -> ValidationError {
    match result {
        Err(Error::Validation(e)) => e,
        Err(other) => panic!("expected a validation error, got {:?}", other),
        Ok(_) => panic!("expected a validation error"),
    }
}

#[test]
fn restricted_types_always_fail() {
    init();
    let mut archive = Archive::default();
    for name in ["virus.exe", "lib.dll", "run.bat", "setup.sh", "index.php", "LOUD.EXE"] {
        for payload in [b"MZ\x90\x00".as_slice(), b"".as_slice(), b"hello".as_slice()] {
            let err = validation_error(archive.add_file(name, payload, None));
            assert!(
                matches!(err, ValidationError::RestrictedType { .. }),
                "{} was not restricted: {:?}",
                name,
                err
            );
        }
    }
    assert!(archive.is_empty());
}

#[test]
fn unknown_types_are_unsupported() {
    init();
    let mut archive = Archive::default();
    let err = validation_error(archive.add_file("thing.xyz", "data", None));
    assert_eq!(
        err,
        ValidationError::UnsupportedType {
            extension: "xyz".into()
        }
    );
}

#[test]
fn mp4_size_limit() {
    init();
    let limit = 64;
    let registry = TypeRegistry::builder().size_limit("mp4", limit).build();
    let mut archive = Archive::new(ArchiveConfig::default().with_registry(registry));

    let mut at_limit = vec![0u8; limit as usize];
    at_limit[4..8].copy_from_slice(b"ftyp");
    archive.add_file("clip.mp4", at_limit.clone(), None).unwrap();

    let mut over = at_limit;
    over.push(0);
    let err = validation_error(archive.add_file("big.mp4", over, None));
    assert_eq!(
        err,
        ValidationError::OversizeFile {
            extension: "mp4".into(),
            size: limit + 1,
            limit,
        }
    );
    assert_eq!(archive.list_files(), vec!["clip.mp4"]);
}

#[test]
fn png_signature_is_checked() {
    init();
    let mut archive = Archive::default();
    let err = validation_error(archive.add_file("x.png", b"GIF89a....".to_vec(), None));
    assert!(matches!(err, ValidationError::SignatureMismatch { .. }));

    archive
        .add_file("x.png", b"\x89PNG\r\n\x1a\n".to_vec(), None)
        .unwrap();
}

#[test]
fn explicit_type_overrides_extension() {
    init();
    let mut archive = Archive::default();
    let err = validation_error(archive.add_file("harmless.txt", "echo", Some("sh")));
    assert!(matches!(err, ValidationError::RestrictedType { .. }));
}

#[test]
fn load_revalidates_with_the_active_registry() {
    init();
    let registry = TypeRegistry::builder()
        .with_type(TypeDescriptor::new("dat", Category::Other, "application/x-dat", None))
        .build();
    let permissive = ArchiveConfig::default().with_registry(registry);

    let mut archive = Archive::new(permissive.clone());
    archive.add_file("table.dat", "1 2 3", None).unwrap();
    let data = archive.to_bytes().unwrap();

    assert!(Archive::from_bytes(&data, permissive).is_ok());
    let err = validation_error(Archive::from_bytes(&data, ArchiveConfig::default()));
    assert!(matches!(err, ValidationError::UnsupportedType { .. }));
}
