use std::convert::Infallible;

use bytes::Bytes;
use futures_util::StreamExt;
use protostream::config::{parse_config, StreamConfig};
use protostream::observability::UsageTally;
use protostream::protocol::canonical::FrameEvent;
use protostream::stream::{chunk_stream, normalize_stream, StreamHooks};

fn split_body(body: &str, piece_len: usize) -> Vec<Result<Bytes, Infallible>> {
    body.as_bytes()
        .chunks(piece_len)
        .map(|piece| Ok(Bytes::copy_from_slice(piece)))
        .collect()
}

const UPSTREAM_BODY: &str = concat!(
    ": connected\n\n",
    "data: {\"id\":\"chatcmpl-9\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
    "data: {\"id\":\"chatcmpl-9\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"杭州\"}}]}\n\n",
    "data: {\"id\":\"chatcmpl-9\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: {\"id\":\"chatcmpl-9\",\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2,\"total_tokens\":7}}\n\n",
    "data: [DONE]\n\n",
);

#[tokio::test]
async fn test_byte_stream_to_wire_frames() {
    // Split at every 7 bytes so lines and UTF-8 sequences straddle reads.
    let source = futures_util::stream::iter(split_body(UPSTREAM_BODY, 7));
    let blocks: Vec<Bytes> = normalize_stream(
        chunk_stream(source),
        StreamConfig::default(),
        StreamHooks::new(),
    )
    .encoded()
    .collect()
    .await;
    let out: String = blocks
        .iter()
        .map(|block| String::from_utf8_lossy(block).into_owned())
        .collect();

    assert_eq!(
        out,
        concat!(
            "id: chatcmpl-9\nevent: text\ndata: \"\"\n\n",
            "id: chatcmpl-9\nevent: text\ndata: \"杭州\"\n\n",
            "id: chatcmpl-9\nevent: stop\ndata: \"stop\"\n\n",
            "id: chatcmpl-9\nevent: data\ndata: {\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2,\"total_tokens\":7}}\n\n",
        )
    );
}

#[tokio::test]
async fn test_truncated_utf8_at_end_of_stream_is_replaced() {
    let source = futures_util::stream::iter(vec![Ok::<_, Infallible>(Bytes::from_static(
        b"data: \"ab\xe6\x9d",
    ))]);
    let chunks: Vec<_> = chunk_stream(source).collect().await;
    assert_eq!(chunks, vec![serde_json::json!("\"ab\u{fffd}")]);
}

#[tokio::test]
async fn test_non_json_data_surfaces_as_error_frame() {
    let body = concat!(
        "data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        "data: upstream exploded\n\n",
    );
    let source = futures_util::stream::iter(split_body(body, 64));
    let frames: Vec<_> = normalize_stream(
        chunk_stream(source),
        StreamConfig::default(),
        StreamHooks::new(),
    )
    .collect()
    .await;

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].event, FrameEvent::Error);
    assert_eq!(frames[1].id, "a");
    assert_eq!(frames[1].data["body"]["context"]["chunk"], "upstream exploded");
    assert_eq!(frames[1].data["body"]["context"]["error"]["name"], "NotAnObject");
}

#[tokio::test]
async fn test_configured_error_message_and_tally() {
    let config = parse_config(
        "stream:\n  error_message: \"provider sent garbage\"\n  fallback_id_prefix: \"req\"\n",
    )
    .unwrap();
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"object\":\"chat.completion.chunk\"}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":1,\"total_tokens\":4}}\n\n",
        "data: {\"choices\":[{\"delta\":null,\"finish_reason\":\"stop\"}]}\n\n",
    );
    let source = futures_util::stream::iter(split_body(body, 16));
    let frames: Vec<_> =
        normalize_stream(chunk_stream(source), config.stream, StreamHooks::new())
            .collect()
            .await;

    assert!(frames.iter().all(|frame| frame.id.starts_with("req-")));
    assert_eq!(frames[1].data["body"]["message"], "provider sent garbage");

    let mut tally = UsageTally::new();
    for frame in &frames {
        tally.observe(frame);
    }
    assert_eq!(tally.text_frames, 1);
    assert_eq!(tally.error_frames, 1);
    assert_eq!(tally.data_frames, 1);
    assert_eq!(tally.finish_reason.as_deref(), Some("stop"));
    assert_eq!(tally.resolved_usage().total_tokens, Some(4));
}
