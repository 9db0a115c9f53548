use trips::config::{
    AppConfig, DatabaseSection, S3StorageSection, StorageBackendKind, StorageSection,
    UploadSection,
};
use trips::storage::StorageConfig;

#[test]
fn defaults_use_local_storage() {
    let mut config = AppConfig::default();
    config.normalize().expect("default configuration should be valid");

    assert_eq!(config.upload.folder, "trips/");
    assert_eq!(config.database.table, "trips_db");
    assert_eq!(config.logging.level, "info");
    assert_eq!(
        config.storage_runtime().unwrap(),
        StorageConfig::Local {
            root_path: "./data".to_string()
        }
    );
}

#[test]
fn s3_backend_requires_bucket() {
    let config = AppConfig {
        storage: StorageSection {
            backend: StorageBackendKind::S3,
            local: None,
            s3: Some(S3StorageSection {
                bucket: " ".into(),
                region: "eu-west-1".into(),
                endpoint: None,
            }),
        },
        ..Default::default()
    };

    assert!(
        config.storage_runtime().is_err(),
        "Expected s3 without bucket to fail validation"
    );
}

#[test]
fn s3_backend_drops_blank_endpoint() {
    let config = AppConfig {
        storage: StorageSection {
            backend: StorageBackendKind::S3,
            local: None,
            s3: Some(S3StorageSection {
                bucket: "bucket".into(),
                region: "eu-west-1".into(),
                endpoint: Some("".into()),
            }),
        },
        ..Default::default()
    };

    match config.storage_runtime().expect("S3 configuration should be valid") {
        StorageConfig::S3 { endpoint, .. } => assert_eq!(endpoint, None),
        other => panic!("Unexpected storage config: {other:?}"),
    }
}

#[test]
fn upload_folder_is_normalized() {
    let mut config = AppConfig {
        upload: UploadSection {
            folder: "/incoming/trips".into(),
        },
        ..Default::default()
    };
    config.normalize().unwrap();

    assert_eq!(config.upload.folder, "incoming/trips/");
}

#[test]
fn upload_folder_cannot_overlap_table() {
    let mut config = AppConfig {
        upload: UploadSection {
            folder: "trips_db".into(),
        },
        database: DatabaseSection {
            table: "trips_db".into(),
        },
        ..Default::default()
    };

    assert!(config.normalize().is_err());

    // Nested either way round
    for (folder, table) in [("trips_db/uploads", "trips_db"), ("data", "data/trips_db")] {
        let mut nested = AppConfig {
            upload: UploadSection {
                folder: folder.into(),
            },
            database: DatabaseSection {
                table: table.into(),
            },
            ..Default::default()
        };
        assert!(nested.normalize().is_err(), "{folder} vs {table}");
    }

    // Sharing only a name prefix is fine
    let mut sibling = AppConfig {
        upload: UploadSection {
            folder: "trips_db_uploads".into(),
        },
        database: DatabaseSection {
            table: "trips_db".into(),
        },
        ..Default::default()
    };
    sibling.normalize().unwrap();

    let mut blank = AppConfig {
        database: DatabaseSection { table: "/".into() },
        ..Default::default()
    };
    assert!(blank.normalize().is_err());
}
