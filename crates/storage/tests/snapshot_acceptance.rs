use shared::domain::{Business, Client, Courier, CourierId, Order, OrderNumber, OrderStatus};
use storage::{Storage, BUSINESS_FILE};

#[tokio::test]
async fn business_snapshot_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut delivered = Order::new(
        OrderNumber(1),
        "Llamar al llegar",
        Client {
            name: "Cliente 2".into(),
            address: "Calle B 456".into(),
            phone: "444".into(),
            address_reference: Some("timbre 2".into()),
        },
    );
    delivered.courier_id = Some(CourierId(1));
    delivered.status = OrderStatus::Delivered;

    let snapshot = Business {
        name: "Cadetería Express".into(),
        phone: "123456789".into(),
        couriers: vec![Courier {
            id: CourierId(1),
            name: "Juan Pérez".into(),
            address: "Calle Falsa 123".into(),
            phone: "111111111".into(),
        }],
        orders: vec![delivered],
    };

    {
        let storage = Storage::new(dir.path()).await.expect("storage");
        let guard = storage.business().lock().await;
        guard.save(&snapshot).await.expect("save");
    }

    let reopened = Storage::new(dir.path()).await.expect("reopen");
    assert_eq!(reopened.business().load().await, snapshot);

    let raw = std::fs::read_to_string(dir.path().join(BUSINESS_FILE)).expect("read");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["orders"][0]["status"], "delivered");
    assert_eq!(value["orders"][0]["courier_id"], 1);
}
