#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use crate::backoff::BackoffPolicy;
    use crate::database::{registry_path, AddressPayload, Database};
    use crate::error::{ConnectError, DatabaseError};
    use crate::models::MatchedTransaction;

    const ADDR: &str = "0xAA00000000000000000000000000000000000001";
    const ADDR_CANON: &str = "0xaa00000000000000000000000000000000000001";

    fn payload(address: &str) -> AddressPayload {
        AddressPayload {
            address: address.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory().expect("Failed to create in-memory database");
        db.health_check().expect("health check");
        assert!(db.list_addresses().unwrap().is_empty());
        assert_eq!(db.transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_upsert_normalizes_and_lists() {
        let db = Database::new_in_memory().unwrap();

        let stored = db.upsert_address(&payload(ADDR)).unwrap();
        assert_eq!(stored, ADDR_CANON);

        // Same address in a different case is the same row
        db.upsert_address(&payload(ADDR_CANON)).unwrap();
        assert_eq!(db.list_addresses().unwrap(), vec![ADDR_CANON.to_string()]);
    }

    #[test]
    fn test_upsert_rejects_blank_and_malformed() {
        let db = Database::new_in_memory().unwrap();
        assert!(matches!(
            db.upsert_address(&payload("  ")),
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            db.upsert_address(&payload("0x1234")),
            Err(DatabaseError::Validation(_))
        ));
    }

    #[test]
    fn test_upsert_merges_missing_fields() {
        let db = Database::new_in_memory().unwrap();
        let first_seen = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        db.upsert_address(&AddressPayload {
            address: ADDR.to_string(),
            first_seen: Some(first_seen),
            last_seen: None,
            labels: Some(vec!["exchange".to_string()]),
        })
        .unwrap();

        // A later upsert without fields keeps what was stored
        db.upsert_address(&payload(ADDR)).unwrap();

        let record = db.get_address(ADDR).unwrap();
        assert_eq!(record.address, ADDR_CANON);
        assert_eq!(record.first_seen, Some(first_seen));
        assert_eq!(record.labels, Some(vec!["exchange".to_string()]));
        assert!(record.last_seen.is_none());
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_update_replaces_fields() {
        let db = Database::new_in_memory().unwrap();
        db.upsert_address(&AddressPayload {
            address: ADDR.to_string(),
            labels: Some(vec!["old".to_string()]),
            ..Default::default()
        })
        .unwrap();

        let last_seen = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        db.update_address(
            ADDR_CANON,
            &AddressPayload {
                last_seen: Some(last_seen),
                ..Default::default()
            },
        )
        .unwrap();

        let record = db.get_address(ADDR_CANON).unwrap();
        assert_eq!(record.last_seen, Some(last_seen));
        assert!(record.labels.is_none());
    }

    #[test]
    fn test_missing_address_is_not_found() {
        let db = Database::new_in_memory().unwrap();
        assert!(matches!(db.get_address(ADDR), Err(DatabaseError::NotFound(_))));
        assert!(matches!(
            db.update_address(ADDR, &AddressPayload::default()),
            Err(DatabaseError::NotFound(_))
        ));
        assert!(matches!(db.delete_address(ADDR), Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_delete_address() {
        let db = Database::new_in_memory().unwrap();
        db.upsert_address(&payload(ADDR)).unwrap();
        db.delete_address(ADDR).unwrap();
        assert!(db.list_addresses().unwrap().is_empty());
    }

    #[test]
    fn test_record_transaction_once_per_hash() {
        let db = Database::new_in_memory().unwrap();
        let tx = MatchedTransaction {
            hash: "0xabc".to_string(),
            from: ADDR_CANON.to_string(),
            to: "0x0000000000000000000000000000000000000000".to_string(),
            value: "1000000000000000000".to_string(),
            gas: 21000,
            gas_price: "30000000000".to_string(),
            block_num: 101,
            timestamp: 1_700_000_000,
            input: String::new(),
        };

        assert!(db.record_transaction(&tx).unwrap());
        assert!(!db.record_transaction(&tx).unwrap());
        assert_eq!(db.transaction_count().unwrap(), 1);

        let row = db.get_transaction("0xabc").unwrap();
        assert_eq!(row.block_num, 101);
        assert_eq!(row.value_wei, "1000000000000000000");
        assert_eq!(row.gas_used, 21000);
    }

    #[test]
    fn test_registry_path_strips_scheme() {
        assert_eq!(registry_path("sqlite:///var/lib/registry.db"), "/var/lib/registry.db");
        assert_eq!(registry_path("sqlite:registry.db"), "registry.db");
        assert_eq!(registry_path("registry.db"), "registry.db");
    }

    #[test]
    fn test_file_registry_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");
        let path = path.to_str().unwrap();

        Database::new(path).unwrap().upsert_address(&payload(ADDR)).unwrap();
        let reopened = Database::new(path).unwrap();
        assert_eq!(reopened.list_addresses().unwrap(), vec![ADDR_CANON.to_string()]);
    }

    #[tokio::test]
    async fn test_connect_with_backoff_opens_registry() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("registry.db").display());

        let db = Database::connect_with_backoff(&url, &BackoffPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(db.list_addresses().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_with_backoff_gives_up() {
        let dir = TempDir::new().unwrap();
        // A directory that does not exist cannot hold the database file
        let url = format!("sqlite://{}/missing/dir/registry.db", dir.path().display());
        let policy = BackoffPolicy {
            initial_delay: std::time::Duration::from_millis(5),
            max_delay: std::time::Duration::from_millis(10),
            max_wait: std::time::Duration::from_millis(30),
        };

        let result = Database::connect_with_backoff(&url, &policy, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ConnectError::Exhausted { .. })));
    }
}
