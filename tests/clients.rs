//! Remote client integration tests
//!
//! Each test points a client at a one-shot local HTTP server and checks both
//! the request it sends and how it handles the reply.

use base64::Engine;
use secrecy::SecretString;

use pivizion::vision::GoogleVision;
use pivizion::voice::TextToSpeech;
use pivizion::{CapturedImage, Error, ImageAnalyzer, SpeechSynthesizer, VoiceGender};

mod common;

use common::serve_once;

fn key() -> SecretString {
    SecretString::from("test-key".to_string())
}

fn image_in(dir: &tempfile::TempDir) -> CapturedImage {
    let path = dir.path().join("shot.jpg");
    std::fs::write(&path, b"jpeg bytes").unwrap();
    CapturedImage::new(path)
}

#[tokio::test]
async fn test_vision_label_request() {
    let body = r#"{"responses":[{"labelAnnotations":[{"description":"Cat","score":0.97}]}]}"#;
    let (url, server) = serve_once(200, body.to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let image = image_in(&dir);
    let vision = GoogleVision::new(key(), format!("{url}/v1/images:annotate"));

    let result = vision.analyze(&image, true, false).await.unwrap();
    assert_eq!(result.labels[0].description, "Cat");
    assert!(result.texts.is_empty());

    let request = server.await.unwrap();
    assert!(request.request_line.starts_with("POST /v1/images:annotate?key=test-key "));

    let json: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(json["requests"][0]["features"][0]["type"], "LABEL_DETECTION");
    let content = json["requests"][0]["image"]["content"].as_str().unwrap();
    assert_eq!(
        base64::engine::general_purpose::STANDARD.decode(content).unwrap(),
        b"jpeg bytes"
    );
}

#[tokio::test]
async fn test_vision_text_request() {
    let body = r#"{"responses":[{"textAnnotations":[{"description":"STOP\n","boundingPoly":{"vertices":[{"x":1,"y":1}]}}]}]}"#;
    let (url, server) = serve_once(200, body.to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let image = image_in(&dir);
    let vision = GoogleVision::new(key(), url);

    let result = vision.analyze(&image, false, true).await.unwrap();
    assert!(result.labels.is_empty());
    assert_eq!(result.spoken_text(), "No labels\nSTOP");

    let request = server.await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(json["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
}

#[tokio::test]
async fn test_vision_auth_failure() {
    let body = r#"{"error":{"code":403,"message":"API key not valid."}}"#;
    let (url, _server) = serve_once(403, body.to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let image = image_in(&dir);
    let vision = GoogleVision::new(key(), url);

    let err = vision.analyze(&image, true, true).await.unwrap_err();
    assert!(matches!(err, Error::Analysis(_)));
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_vision_transport_failure_hides_key() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let image = image_in(&dir);
    let vision = GoogleVision::new(key(), format!("http://{addr}"));

    let err = vision.analyze(&image, true, false).await.unwrap_err();
    assert!(matches!(err, Error::Analysis(_)));
    assert!(!err.to_string().contains("test-key"));
}

#[tokio::test]
async fn test_tts_writes_audio_file() {
    let audio = base64::engine::general_purpose::STANDARD.encode(b"ID3 fake mp3");
    let (url, server) = serve_once(200, format!(r#"{{"audioContent":"{audio}"}}"#)).await;

    let dir = tempfile::tempdir().unwrap();
    let tts = TextToSpeech::new(key(), format!("{url}/v1/text:synthesize"), dir.path().to_path_buf());

    let synthesized = tts
        .synthesize("cat\nSTOP", "en-US", VoiceGender::Female)
        .await
        .unwrap();
    assert_eq!(std::fs::read(synthesized.path()).unwrap(), b"ID3 fake mp3");
    assert!(synthesized.path().starts_with(dir.path()));

    let request = server.await.unwrap();
    assert!(request.request_line.starts_with("POST /v1/text:synthesize?key=test-key "));

    let json: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(json["input"]["text"], "cat\nSTOP");
    assert_eq!(json["voice"]["languageCode"], "en-US");
    assert_eq!(json["voice"]["ssmlGender"], "FEMALE");
    assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
}

#[tokio::test]
async fn test_tts_rejection_is_synthesis_error() {
    let body = r#"{"error":{"code":400,"message":"Voice 'en-UK' does not exist."}}"#;
    let (url, _server) = serve_once(400, body.to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let tts = TextToSpeech::new(key(), url, dir.path().to_path_buf());

    let err = tts
        .synthesize("hello", "en-UK", VoiceGender::Neutral)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Synthesis(_)));
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
