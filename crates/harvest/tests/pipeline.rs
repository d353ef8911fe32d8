use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use harvest_engine::{
    FetchResponse, HarvestConfig, MediaFetcher, MemorySink, PipelineRunner, ResolveError,
    TranscodeError, Transcoder,
};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Value, json};

const SEGMENTS: &str = "https://video-akpcw.spotifycdn.com/segments/v1/sources/5eed/profiles/3/";

/// Serves canned bodies by URL and answers 404 for everything else.
#[derive(Default)]
struct FakeCdn {
    routes: HashMap<String, (&'static str, Bytes)>,
    hits: Mutex<Vec<String>>,
}

impl FakeCdn {
    fn with(mut self, url: &str, content_type: &'static str, body: Vec<u8>) -> Self {
        self.routes.insert(url.to_string(), (content_type, Bytes::from(body)));
        self
    }
}

#[async_trait]
impl MediaFetcher for FakeCdn {
    async fn get(&self, url: &str, _headers: &HeaderMap) -> Result<FetchResponse, ResolveError> {
        self.hits.lock().push(url.to_string());
        let Some((content_type, body)) = self.routes.get(url) else {
            return Ok(FetchResponse {
                status: StatusCode::NOT_FOUND,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            });
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Ok(FetchResponse {
            status: StatusCode::OK,
            headers,
            body: body.clone(),
        })
    }
}

struct MissingFfmpeg {
    calls: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Transcoder for MissingFfmpeg {
    async fn transcode(&self, input: &Path) -> Result<PathBuf, TranscodeError> {
        self.calls.lock().push(input.to_path_buf());
        Err(TranscodeError::Unavailable {
            program: "ffmpeg".to_string(),
        })
    }
}

/// Pretends every conversion succeeds next to the input.
struct Mp4Converter;

#[async_trait]
impl Transcoder for Mp4Converter {
    async fn transcode(&self, input: &Path) -> Result<PathBuf, TranscodeError> {
        Ok(input.with_extension("mp4"))
    }
}

fn jpeg(len: usize) -> Vec<u8> {
    let mut body = vec![0xFF, 0xD8, 0xFF, 0xE0];
    body.resize(len, 0x11);
    body
}

fn capture(entries: Vec<Value>) -> Value {
    json!({"log": {"version": "1.2", "creator": {"name": "test"}, "entries": entries}})
}

fn embedded(url: &str, content_type: &str, data: &[u8]) -> Value {
    json!({
        "request": {"url": url, "method": "GET"},
        "response": {
            "status": 200,
            "headers": [{"name": "content-type", "value": content_type}],
            "content": {"text": STANDARD.encode(data), "encoding": "base64"}
        },
        "startedDateTime": "2025-03-01T10:00:00.000Z"
    })
}

fn plain(url: &str) -> Value {
    json!({"request": {"url": url}, "response": {"status": 200}})
}

fn runner(cdn: FakeCdn) -> (PipelineRunner, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let runner = PipelineRunner::new(&HarvestConfig::default(), Arc::new(cdn), sink.clone());
    (runner, sink)
}

#[tokio::test]
async fn image_host_entries_become_exactly_the_candidate_set() {
    let urls = [
        "https://i.scdn.co/image/ab67616d0000b273aaaa",
        "https://mosaic.scdn.co/640/ab67616d0000b273bbbb",
        "https://thisis-images.scdn.co/37i9dQZF1DZ06evO0auErC-default.jpg",
    ];
    let mut cdn = FakeCdn::default();
    for url in urls {
        cdn = cdn.with(url, "image/jpeg", jpeg(256));
    }
    let (runner, sink) = runner(cdn);

    let summary = runner
        .run(capture(urls.iter().map(|u| plain(u)).collect()))
        .await;

    assert!(summary.success);
    let found: BTreeSet<&str> = summary.candidates.iter().map(|c| c.url.as_str()).collect();
    let expected: BTreeSet<&str> = urls.into_iter().collect();
    assert_eq!(found, expected);
    assert_eq!(summary.stats.direct_images, 3);
    assert_eq!(summary.images().count(), 3);
    assert_eq!(sink.files().len(), 3);
    assert!(sink.get(Path::new("images").join("ab67616d0000b273aaaa.jpg")).is_some());
}

#[tokio::test]
async fn document_without_log_yields_empty_failed_summary() {
    let (runner, sink) = runner(FakeCdn::default());
    let summary = runner.run(json!({"entries": [plain("https://i.scdn.co/image/a")]})).await;

    assert!(!summary.success);
    assert!(summary.error.unwrap().contains("log"));
    assert!(summary.candidates.is_empty());
    assert!(sink.files().is_empty());
}

#[tokio::test]
async fn scrambled_fragments_are_reassembled_in_index_order() {
    let (runner, sink) = runner(FakeCdn::default());
    let summary = runner
        .run(capture(vec![
            embedded(&format!("{SEGMENTS}2.webm"), "video/webm", b"<two>"),
            embedded(&format!("{SEGMENTS}inits/init.webm"), "video/webm", b"<init>"),
            embedded(&format!("{SEGMENTS}0.webm"), "video/webm", b"<zero>"),
            embedded(&format!("{SEGMENTS}1.webm"), "video/webm", b"<one>"),
        ]))
        .await;

    assert!(summary.success);
    assert_eq!(summary.assembled_streams, 1);
    assert_eq!(summary.stats.direct_videos, 4);
    assert_eq!(summary.videos().count(), 4);

    let stream_path = Path::new("videos").join("spotify_canvas_5eed_profile_3.webm");
    assert_eq!(
        sink.get(&stream_path).as_deref(),
        Some(&b"<init><zero><one><two>"[..])
    );
    assert!(summary.output_files.contains(&stream_path));
}

#[tokio::test]
async fn group_without_init_is_reported_incomplete() {
    let (runner, _sink) = runner(FakeCdn::default());
    let summary = runner
        .run(capture(vec![
            embedded(&format!("{SEGMENTS}0.webm"), "video/webm", b"<zero>"),
            embedded(&format!("{SEGMENTS}1.webm"), "video/webm", b"<one>"),
        ]))
        .await;

    assert!(summary.success);
    assert_eq!(summary.assembled_streams, 0);
    assert_eq!(summary.stats.groups_incomplete, 1);
    assert_eq!(summary.incomplete_groups[0].key.source_id, "5eed");
}

#[tokio::test]
async fn transcoder_failure_keeps_the_stream() {
    let transcoder = Arc::new(MissingFfmpeg {
        calls: Mutex::new(Vec::new()),
    });
    let (runner, sink) = runner(FakeCdn::default());
    let runner = runner.with_transcoder(transcoder.clone());

    let summary = runner
        .run(capture(vec![
            embedded(&format!("{SEGMENTS}inits/init.webm"), "video/webm", b"I"),
            embedded(&format!("{SEGMENTS}0.webm"), "video/webm", b"M"),
        ]))
        .await;

    assert!(summary.success);
    assert_eq!(summary.stats.transcode_failures, 1);
    assert_eq!(transcoder.calls.lock().len(), 1);
    let stream_path = Path::new("videos").join("spotify_canvas_5eed_profile_3.webm");
    assert_eq!(sink.get(&stream_path).as_deref(), Some(&b"IM"[..]));
}

#[tokio::test]
async fn transcoded_file_joins_the_stream_in_outputs() {
    let (runner, _sink) = runner(FakeCdn::default());
    let runner = runner.with_transcoder(Arc::new(Mp4Converter));

    let summary = runner
        .run(capture(vec![
            embedded(&format!("{SEGMENTS}inits/init.webm"), "video/webm", b"I"),
            embedded(&format!("{SEGMENTS}0.webm"), "video/webm", b"M"),
        ]))
        .await;

    assert!(summary.success);
    assert_eq!(summary.stats.transcoded, 1);
    assert_eq!(summary.stats.transcode_failures, 0);
    let stream_path = Path::new("videos").join("spotify_canvas_5eed_profile_3.webm");
    let converted = Path::new("videos").join("spotify_canvas_5eed_profile_3.mp4");
    assert!(summary.output_files.contains(&stream_path));
    assert!(summary.output_files.contains(&converted));
}

#[tokio::test]
async fn api_references_are_promoted_and_fetched_once() {
    let direct = "https://i.scdn.co/image/ab67616d0000b273cccc";
    let discovered = "https://i.scdn.co/image/ab67616d0000b273dddd";
    let body = json!({
        "data": {
            "album": {"image": discovered},
            "related": [{"cover_art": direct}]
        }
    })
    .to_string();

    let cdn = FakeCdn::default()
        .with(direct, "image/jpeg", jpeg(300))
        .with(discovered, "image/webp", {
            let mut webp = b"RIFF\0\0\0\0WEBPVP8 ".to_vec();
            webp.resize(300, 0);
            webp
        });
    let cdn = Arc::new(cdn);
    let sink = Arc::new(MemorySink::new());
    let runner = PipelineRunner::new(&HarvestConfig::default(), cdn.clone(), sink.clone());

    let summary = runner
        .run(capture(vec![
            plain(direct),
            json!({
                "request": {"url": "https://gew4-spclient.spotify.com/color-lyrics/v2/track/1"},
                "response": {"status": 200, "content": {"text": "ignored"}}
            }),
            json!({
                "request": {"url": "https://api.spotify.com/v1/albums/1"},
                "response": {"status": 200, "content": {"text": body, "mimeType": "application/json"}}
            }),
        ]))
        .await;

    assert!(summary.success);
    assert_eq!(summary.stats.api_entries, 2);
    assert_eq!(summary.discovered_urls.len(), 2);
    assert_eq!(summary.stats.discovered_promoted, 1);
    assert_eq!(summary.candidates.len(), 2);

    // the direct candidate is not fetched a second time
    let hits = cdn.hits.lock();
    assert_eq!(hits.iter().filter(|u| u.as_str() == direct).count(), 1);
    assert_eq!(hits.iter().filter(|u| u.as_str() == discovered).count(), 1);
    drop(hits);

    assert!(sink.get(Path::new("images").join("ab67616d0000b273dddd.webp")).is_some());
}

#[tokio::test]
async fn runs_do_not_share_discoveries() {
    let body = json!({"image": "https://i.scdn.co/image/once"}).to_string();
    let doc = capture(vec![json!({
        "request": {"url": "https://api.spotify.com/v1/me"},
        "response": {"content": {"text": body}}
    })]);

    let (runner, _sink) = runner(FakeCdn::default());
    let first = runner.run(doc).await;
    let second = runner.run(capture(vec![])).await;

    assert_eq!(first.discovered_urls, vec!["https://i.scdn.co/image/once".to_string()]);
    assert!(second.discovered_urls.is_empty());
    assert_eq!(first.stats.fetch_failures, 1);
}
