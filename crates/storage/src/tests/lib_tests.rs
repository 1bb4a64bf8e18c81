use super::*;
use shared::domain::{Client, CourierId, OrderNumber, OrderStatus, DEFAULT_BUSINESS_NAME};

fn courier(id: i64, name: &str) -> Courier {
    Courier {
        id: CourierId(id),
        name: name.into(),
        address: "Calle Falsa 123".into(),
        phone: "111".into(),
    }
}

#[tokio::test]
async fn missing_files_load_as_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");

    assert!(storage.couriers().load().await.is_empty());
    assert!(storage.orders().load().await.is_empty());
    let business = storage.business().load().await;
    assert_eq!(business.name, DEFAULT_BUSINESS_NAME);
    assert_eq!(business.phone, "000-0000");
}

#[tokio::test]
async fn blank_and_garbled_files_load_as_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    std::fs::write(dir.path().join(COURIERS_FILE), "   \n").expect("write");
    std::fs::write(dir.path().join(ORDERS_FILE), "[{ not json").expect("write");
    std::fs::write(dir.path().join(BUSINESS_FILE), "42").expect("write");

    assert!(storage.couriers().load().await.is_empty());
    assert!(storage.orders().load().await.is_empty());
    assert_eq!(storage.business().load().await, Business::default());
}

#[tokio::test]
async fn saved_couriers_load_back_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    let couriers = vec![courier(2, "María"), courier(1, "Juan")];

    storage
        .couriers()
        .lock()
        .await
        .save(&couriers)
        .await
        .expect("save");

    assert_eq!(storage.couriers().load().await, couriers);
}

#[tokio::test]
async fn save_writes_pretty_json_and_leaves_no_staging_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    storage
        .couriers()
        .lock()
        .await
        .save(&vec![courier(1, "Juan")])
        .await
        .expect("save");

    let raw = std::fs::read_to_string(dir.path().join(COURIERS_FILE)).expect("read");
    assert!(raw.contains("\n  {"), "expected indented output: {raw}");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn save_recreates_a_removed_data_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().join("Data");
    let storage = Storage::new(&data_dir).await.expect("storage");
    std::fs::remove_dir_all(&data_dir).expect("remove");

    storage
        .orders()
        .lock()
        .await
        .save(&Vec::new())
        .await
        .expect("save");
    assert!(data_dir.join(ORDERS_FILE).exists());
}

#[tokio::test]
async fn field_names_match_case_insensitively() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    std::fs::write(
        dir.path().join(ORDERS_FILE),
        r#"[
          {
            "Number": 3,
            "OBSERVATIONS": "ring twice",
            "Client": { "Name": "Ana", "Address": "Calle A", "Phone": "1", "AddressReference": "blue door" },
            "Courier_Id": 2,
            "Status": "delivered"
          }
        ]"#,
    )
    .expect("write");

    let orders = storage.orders().load().await;
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.number, OrderNumber(3));
    assert_eq!(order.observations, "ring twice");
    assert_eq!(order.client.address_reference.as_deref(), Some("blue door"));
    assert_eq!(order.courier_id, Some(CourierId(2)));
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn loads_files_written_with_spanish_field_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    std::fs::write(
        dir.path().join(ORDERS_FILE),
        r#"[
          {
            "Numero": 1,
            "Observaciones": "Dejar en portería",
            "Cliente": { "Nombre": "Cliente 1", "Direccion": "Calle A 123", "Telefono": "333", "DatosReferenciaDireccion": null },
            "IdCadete": null,
            "Estado": "Pendiente"
          }
        ]"#,
    )
    .expect("write");
    std::fs::write(
        dir.path().join(BUSINESS_FILE),
        r#"{ "Nombre": "Cadetería Express", "Telefono": "123456789", "Cadetes": [], "Pedidos": [] }"#,
    )
    .expect("write");

    let orders = storage.orders().load().await;
    assert_eq!(
        orders,
        vec![Order::new(
            OrderNumber(1),
            "Dejar en portería",
            Client {
                name: "Cliente 1".into(),
                address: "Calle A 123".into(),
                phone: "333".into(),
                address_reference: None,
            }
        )]
    );
    assert_eq!(storage.business().load().await.name, "Cadetería Express");
}

#[tokio::test]
async fn numeric_status_codes_load_and_are_rewritten_as_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    std::fs::write(
        dir.path().join(ORDERS_FILE),
        r#"[
          { "Numero": 1, "Observaciones": "", "Cliente": { "Nombre": "Ana" }, "IdCadete": 1, "Estado": 3 },
          { "Numero": 2, "Observaciones": "", "Cliente": { "Nombre": "Luis" }, "IdCadete": null, "Estado": 0 }
        ]"#,
    )
    .expect("write");

    let orders = storage.orders().load().await;
    let statuses: Vec<_> = orders.iter().map(|order| order.status).collect();
    assert_eq!(statuses, vec![OrderStatus::Delivered, OrderStatus::Pending]);

    storage.orders().lock().await.save(&orders).await.expect("save");
    let raw = std::fs::read_to_string(dir.path().join(ORDERS_FILE)).expect("read");
    assert!(raw.contains(r#""status": "delivered""#));
    assert!(raw.contains(r#""status": "pending""#));
}

#[tokio::test]
async fn writers_on_one_collection_are_serialized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");

    let mut tasks = Vec::new();
    for id in 1..=16 {
        let storage = storage.clone();
        tasks.push(tokio::spawn(async move {
            let guard = storage.couriers().lock().await;
            let mut couriers = guard.load().await;
            couriers.push(courier(id, "rider"));
            guard.save(&couriers).await.expect("save");
        }));
    }
    for task in tasks {
        task.await.expect("join");
    }

    let mut ids: Vec<i64> = storage
        .couriers()
        .load()
        .await
        .into_iter()
        .map(|c| c.id.0)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=16).collect::<Vec<_>>());
}

#[tokio::test]
async fn health_check_succeeds_for_writable_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    storage.health_check().await.expect("health check");
    assert!(!dir.path().join(".healthz").exists());
}
