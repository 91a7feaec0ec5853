//! Service level tests: the composed router and the in-process pipeline.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use domain_receipts::{Receipt, ReceiptService};
use email::{MockEmailProvider, ReceiptNotifier};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{EventProducer, HealthResponse, MemoryBroker, ProducerConfig, StreamWorker, WorkerConfig};
use tokio::sync::watch;
use tower::ServiceExt;

async fn service(broker: &MemoryBroker) -> Arc<ReceiptService> {
    let producer = EventProducer::new(
        Arc::new(broker.admin()),
        Arc::new(broker.writer()),
        ProducerConfig::new("receipts"),
    );
    producer.init_topic(1, 1).await.unwrap();
    Arc::new(ReceiptService::new(producer, Duration::from_secs(3)))
}

fn receipt_body() -> String {
    json!({
        "number": 1234,
        "date": "2025-07-25T14:40:00+03:00",
        "organization": "ООО Ромашка",
        "payment_address": "г. Москва, ул. Правды, д. 1",
        "taxpayer_number": "7745123451234",
        "taxation_type": "ОСН",
        "calculation_sign": "приход",
        "products": [
            {"name": "тапочки синие размер 42", "quantity": 1, "unit_price": 23000, "total_price": 23000, "tax_rate": "", "tax_value": 0}
        ],
        "customer_email": "Happy_Customer@mail.ru",
        "fiscal_device_number": "7380440801479592",
        "cash_register_number": "0007768750034436",
        "fiscal_document": "16415",
        "fiscal_attribute": "1805600812"
    })
    .to_string()
}

#[tokio::test]
async fn test_health_is_served_next_to_intake() {
    let broker = MemoryBroker::new();
    let app = receipt_service::router(service(&broker).await, Duration::from_secs(5));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.name, "receipt_service");
}

#[tokio::test]
async fn test_accepted_receipt_is_mailed_by_worker() {
    let broker = MemoryBroker::new();
    let app = receipt_service::router(service(&broker).await, Duration::from_secs(5));

    let request = Request::post("/v1/receipt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(receipt_body()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let accepted: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(accepted["message"], "Accept");

    let provider = Arc::new(MockEmailProvider::new());
    let notifier = Arc::new(ReceiptNotifier::new(provider.clone(), "receipts@example.com"));
    let mut config = WorkerConfig::new("receipts", "receipt-notifiers");
    config.fetch_max_wait = Duration::from_millis(50);
    let mut worker: StreamWorker<Receipt, _> = StreamWorker::new(Box::new(broker.reader(&config)), notifier, config);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        worker.run(rx).await.unwrap();
        worker.close().await.unwrap();
    });

    let mut delivered = false;
    for _ in 0..50 {
        if provider.sent_count().await == 1 {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tx.send_replace(true);
    handle.await.unwrap();

    assert!(delivered);
    let mail = &provider.sent_emails().await[0];
    assert_eq!(mail.to, "Happy_Customer@mail.ru");
    assert_eq!(mail.subject, "Кассовый чек № 1234");
    assert!(mail.body_text.contains("happy_customer@mail.ru"));
}
