/// 文件注册表与配置加载测试
///
/// 在临时目录中读写 beacon-config.json，验证重新打开后数据仍在。

#[cfg(test)]
mod tests {
    use shopnav::algorithms::{BeaconKey, BeaconReading, PathLossModel};
    use shopnav::complexity::ScoringConfig;
    use shopnav::config::{AppConfig, ConfigError};
    use shopnav::error::RegistryError;
    use shopnav::positioning::BeaconPositioningService;
    use shopnav::registry::{BeaconRepository, JsonFileBeaconRepository};
    use std::fs;

    #[test]
    fn test_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FloorPlan").join("beacon-config.json");

        {
            let repo = JsonFileBeaconRepository::open(&path).unwrap();
            let svc = BeaconPositioningService::new(repo);
            svc.register_beacon(10, 1, "Entrance", 0.0, 0.0, Some(45.0), Some(9.0))
                .unwrap();
            svc.register_beacon(10, 2, "Saw", 12.5, 3.0, None, None).unwrap();
            svc.set_uuid("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0").unwrap();
            svc.set_model(PathLossModel::log_distance(-61.0, 2.2)).unwrap();
        }
        assert!(path.exists());

        let reopened = JsonFileBeaconRepository::open(&path).unwrap();
        let doc = reopened.snapshot().unwrap();
        println!("✓ 重新加载 {} 个信标", doc.beacons.len());

        assert_eq!(doc.beacons.len(), 2);
        assert_eq!(doc.uuid.as_deref(), Some("e2c56db5-dffb-48d2-b060-d0f5a71096e0"));
        assert_eq!(doc.model(), PathLossModel::log_distance(-61.0, 2.2));
        let entrance = reopened.get(BeaconKey::new(10, 1)).unwrap().unwrap();
        assert_eq!(entrance.geo(), Some((45.0, 9.0)));
        assert!(doc.updated_at.is_some());
    }

    #[test]
    fn test_remove_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon-config.json");

        let svc = BeaconPositioningService::new(JsonFileBeaconRepository::open(&path).unwrap());
        svc.register_beacon(1, 1, "A", 1.0, 1.0, None, None).unwrap();
        svc.register_beacon(1, 2, "B", 2.0, 2.0, None, None).unwrap();
        svc.remove_beacon(1, 1).unwrap();
        svc.remove_beacon(1, 99).unwrap();

        let repo = JsonFileBeaconRepository::open(&path).unwrap();
        let reopened = BeaconPositioningService::new(repo);
        let beacons = reopened.beacons().unwrap();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].name, "B");
        assert!(reopened
            .calculate_position(&[BeaconReading::new(1, 1, -60.0)])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBeaconRepository::open(dir.path().join("absent.json")).unwrap();
        assert!(repo.all().unwrap().is_empty());
        assert_eq!(repo.model().unwrap(), PathLossModel::default());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon-config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileBeaconRepository::open(&path),
            Err(RegistryError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_persisted_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon-config.json");

        for body in [
            r#"{ "path_loss_exponent": -2.5 }"#,
            r#"{ "path_loss_exponent": 0 }"#,
            r#"{ "measured_power": 4 }"#,
        ] {
            fs::write(&path, body).unwrap();
            let result = JsonFileBeaconRepository::open(&path);
            println!("✓ {body} -> {:?}", result.as_ref().err());
            assert!(matches!(result, Err(RegistryError::InvalidModel(_))));
        }

        fs::write(&path, r#"{ "path_loss_exponent": 3.0, "measured_power": -65 }"#).unwrap();
        let repo = JsonFileBeaconRepository::open(&path).unwrap();
        assert_eq!(repo.model().unwrap(), PathLossModel::log_distance(-65.0, 3.0));
    }

    #[test]
    fn test_hand_edited_document_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon-config.json");
        fs::write(
            &path,
            r#"{
                "uuid": null,
                "beacons": {
                    "3:4": {
                        "major": 3, "minor": 4, "name": "Dock",
                        "floor_x": 5.0, "floor_y": 6.0
                    }
                }
            }"#,
        )
        .unwrap();

        let repo = JsonFileBeaconRepository::open(&path).unwrap();
        let beacon = repo.get(BeaconKey::new(3, 4)).unwrap().unwrap();
        assert_eq!(beacon.coordinates(), (5.0, 6.0));
        assert_eq!(repo.model().unwrap(), PathLossModel::default());
    }

    #[test]
    fn test_scoring_settings_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.json");
        let settings = ScoringConfig::default().to_settings();
        fs::write(&path, serde_json::to_string(&settings).unwrap()).unwrap();

        let config = AppConfig {
            scoring_settings_path: Some(path),
            ..AppConfig::default()
        };
        let loaded = tokio_test::block_on(config.load_scoring_config()).unwrap();
        assert_eq!(loaded, ScoringConfig::default());

        let defaults = tokio_test::block_on(AppConfig::default().load_scoring_config()).unwrap();
        assert_eq!(defaults, ScoringConfig::default());
    }

    #[test]
    fn test_invalid_scoring_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.json");
        let mut settings = ScoringConfig::default().to_settings();
        settings.score_thresholds.insert("complex".into(), 12.0);
        fs::write(&path, serde_json::to_string(&settings).unwrap()).unwrap();

        let config = AppConfig {
            scoring_settings_path: Some(path),
            ..AppConfig::default()
        };
        assert!(matches!(
            tokio_test::block_on(config.load_scoring_config()),
            Err(ConfigError::Scoring(_))
        ));

        let missing = AppConfig {
            scoring_settings_path: Some(dir.path().join("nope.json")),
            ..AppConfig::default()
        };
        assert!(matches!(
            tokio_test::block_on(missing.load_scoring_config()),
            Err(ConfigError::Read { .. })
        ));
    }
}
