//! Integration test: the upload orchestration and text sends against a local service.

mod common;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{post, put};
use axum::{Json, Router};
use lib::session::Sender;
use lib::transcription::capture::{AudioSource, CaptureError};
use lib::transcription::upload::{MISSING_STORAGE_NOTICE, SEND_FAILED_NOTICE};
use lib::transcription::{
    Attachment, Recorder, TranscriptionBackend, TranscriptionClient, TranscriptionPanel,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Seen {
    upload_url: Arc<Mutex<Vec<Value>>>,
    puts: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    agent: Arc<Mutex<Vec<Value>>>,
}

#[derive(Clone)]
struct Service {
    base: String,
    seen: Seen,
    put_status: StatusCode,
    omit_s3_uri: bool,
}

async fn upload_url(State(s): State<Service>, Json(body): Json<Value>) -> Json<Value> {
    let name = body["filename"].as_str().unwrap_or_default().to_string();
    s.seen.upload_url.lock().unwrap().push(body);
    if s.omit_s3_uri {
        return Json(json!({"presigned_url": format!("{}/bucket/{}", s.base, name)}));
    }
    Json(json!({
        "presigned_url": format!("{}/bucket/{}", s.base, name),
        "s3_uri": format!("s3://ipeth-uploads/{}", name),
    }))
}

async fn bucket(
    State(s): State<Service>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let ct = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    s.seen.puts.lock().unwrap().push((key, ct, body.to_vec()));
    s.put_status
}

async fn agent(State(s): State<Service>, Json(body): Json<Value>) -> Json<Value> {
    s.seen.agent.lock().unwrap().push(body.clone());
    if body.get("s3_uri").is_some() {
        let inner = json!({"texto": "hola mundo"}).to_string();
        return Json(json!({"statusCode": 200, "body": inner}));
    }
    if body.get("s3_uri_docx").is_some() {
        return Json(json!({"message": "Audio generado", "audio_url": "https://cdn.example/out.mp3"}));
    }
    Json(json!({"respuesta": format!("eco: {}", body["mensaje"].as_str().unwrap_or_default())}))
}

async fn start(put_status: StatusCode, omit_s3_uri: bool) -> (String, Seen) {
    let seen = Seen::default();
    let seen_for_app = seen.clone();
    let base = common::spawn_server(move |base| {
        Router::new()
            .route("/upload-url", post(upload_url))
            .route("/bucket/:key", put(bucket))
            .route("/agent", post(agent))
            .with_state(Service {
                base,
                seen: seen_for_app,
                put_status,
                omit_s3_uri,
            })
    })
    .await;
    (base, seen)
}

struct NoMic;

impl AudioSource for NoMic {
    fn start(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::Open("no input device".into()))
    }
    fn stop(&mut self) -> Result<Vec<Vec<u8>>, CaptureError> {
        Ok(Vec::new())
    }
}

fn panel() -> TranscriptionPanel {
    TranscriptionPanel::new(Recorder::new(Box::new(NoMic)))
}

#[tokio::test]
async fn mp3_upload_goes_through_three_steps() {
    let (base, seen) = start(StatusCode::OK, false).await;
    let client = TranscriptionClient::new(base);
    let mut p = panel();
    assert!(p.select_attachment(Attachment::new("clase.mp3", "audio/mpeg", b"ID3fake".to_vec())));

    let job = p.begin_send().unwrap().unwrap();
    assert!(p.is_busy());
    let outcome = job.run(&client as &dyn TranscriptionBackend).await;
    assert!(p.complete(outcome));

    assert_eq!(
        seen.upload_url.lock().unwrap().as_slice(),
        [json!({"filename": "clase.mp3", "filetype": "mp3"})]
    );
    let puts = seen.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, "clase.mp3");
    assert_eq!(puts[0].1, "audio/mpeg");
    assert_eq!(puts[0].2, b"ID3fake");
    assert_eq!(
        seen.agent.lock().unwrap().as_slice(),
        [json!({"s3_uri": "s3://ipeth-uploads/clase.mp3"})]
    );

    let last = p.log().last().unwrap();
    assert_eq!(last.sender, Sender::Bot);
    assert_eq!(last.text, "✅ Tu transcripción está lista: hola mundo");
    assert_eq!(p.log().len(), 2);
    assert!(p.attachment().is_none());
    assert!(!p.is_busy());
}

#[tokio::test]
async fn docx_upload_uses_docx_discriminator_and_keeps_audio_url() {
    let (base, seen) = start(StatusCode::OK, false).await;
    let client = TranscriptionClient::new(base);
    let mut p = panel();
    p.select_attachment(Attachment::new("Ensayo.DOCX", "application/octet-stream", vec![0x50, 0x4b]));

    let outcome = p.begin_send().unwrap().unwrap().run(&client).await;
    p.complete(outcome);

    assert_eq!(
        seen.puts.lock().unwrap()[0].1,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(
        seen.agent.lock().unwrap().as_slice(),
        [json!({"s3_uri_docx": "s3://ipeth-uploads/Ensayo.DOCX"})]
    );
    let last = p.log().last().unwrap();
    assert_eq!(last.text, "Audio generado");
    assert_eq!(last.audio_url.as_deref(), Some("https://cdn.example/out.mp3"));
}

#[tokio::test]
async fn failed_put_status_still_reaches_agent() {
    let (base, seen) = start(StatusCode::FORBIDDEN, false).await;
    let client = TranscriptionClient::new(base);
    let mut p = panel();
    p.select_attachment(Attachment::new("nota.webm", "audio/webm", vec![1, 2, 3]));

    let outcome = p.begin_send().unwrap().unwrap().run(&client).await;
    assert!(outcome.result.is_ok());
    p.complete(outcome);
    assert_eq!(seen.agent.lock().unwrap().len(), 1);
    assert!(p.take_notice().is_none());
}

#[tokio::test]
async fn missing_s3_uri_aborts_before_put() {
    let (base, seen) = start(StatusCode::OK, true).await;
    let client = TranscriptionClient::new(base);
    let mut p = panel();
    p.select_attachment(Attachment::new("clase.mp3", "audio/mpeg", vec![1]));

    let outcome = p.begin_send().unwrap().unwrap().run(&client).await;
    p.complete(outcome);
    assert!(seen.puts.lock().unwrap().is_empty());
    assert!(seen.agent.lock().unwrap().is_empty());
    assert_eq!(p.take_notice().as_deref(), Some(MISSING_STORAGE_NOTICE));
    assert_eq!(p.attachment().map(|a| a.name.as_str()), Some("clase.mp3"));
    assert_eq!(p.log().len(), 1);
}

#[tokio::test]
async fn text_message_posts_mensaje() {
    let (base, seen) = start(StatusCode::OK, false).await;
    let client = TranscriptionClient::new(base);
    let mut p = panel();
    p.input = "  lee esto  ".into();

    let outcome = p.begin_send().unwrap().unwrap().run(&client).await;
    p.complete(outcome);
    assert_eq!(seen.agent.lock().unwrap().as_slice(), [json!({"mensaje": "lee esto"})]);
    assert_eq!(p.log().as_slice()[0].text, "lee esto");
    assert_eq!(p.log().last().unwrap().text, "eco: lee esto");
}

#[tokio::test]
async fn unreachable_service_shows_generic_notice() {
    let client = TranscriptionClient::new("http://127.0.0.1:1");
    let mut p = panel();
    p.input = "hola".into();
    let outcome = p.begin_send().unwrap().unwrap().run(&client).await;
    p.complete(outcome);
    assert_eq!(p.take_notice().as_deref(), Some(SEND_FAILED_NOTICE));
    assert_eq!(p.log().len(), 1);
    assert!(!p.is_busy());
}

#[tokio::test]
async fn png_is_rejected_without_network() {
    let (_base, seen) = start(StatusCode::OK, false).await;
    let mut p = panel();
    p.select_attachment(Attachment::new("foto.png", "image/png", vec![1]));
    let err = p.begin_send().unwrap_err();
    assert_eq!(err.to_string(), "Solo se aceptan archivos .mp3, .webm o .docx");
    assert!(seen.upload_url.lock().unwrap().is_empty());
    assert!(!p.is_busy());
}
