use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use scrapeqa_client::{progress_url, run_progress_socket};
use scrapeqa_core::Msg;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

async fn next_msg(rx: &mut mpsc::UnboundedReceiver<Msg>) -> Msg {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("message in time")
        .expect("channel open")
}

#[tokio::test]
async fn forwards_frames_then_reports_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"phase":"fetching","current":1,"total":3}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
    });

    let url = progress_url(&base, "/ws", "u1").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(run_progress_socket(url, 7, CancellationToken::new(), tx));

    assert_eq!(next_msg(&mut rx).await, Msg::ChannelEstablished { generation: 7 });
    assert_eq!(
        next_msg(&mut rx).await,
        Msg::ChannelMessage {
            generation: 7,
            payload: r#"{"phase":"fetching","current":1,"total":3}"#.to_string()
        }
    );
    assert_eq!(next_msg(&mut rx).await, Msg::ChannelDropped { generation: 7 });
}

#[tokio::test]
async fn failed_connect_reports_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let url = progress_url(&base, "/ws", "u1").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(run_progress_socket(url, 3, CancellationToken::new(), tx));

    assert_eq!(next_msg(&mut rx).await, Msg::ChannelDropped { generation: 3 });
}

#[tokio::test]
async fn cancelled_socket_closes_quietly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Hold the connection until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let url = progress_url(&base, "/ws", "u1").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_progress_socket(url, 1, cancel.clone(), tx));

    assert_eq!(next_msg(&mut rx).await, Msg::ChannelEstablished { generation: 1 });
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("socket task ends")
        .unwrap();

    assert_eq!(rx.recv().await, None);
}
