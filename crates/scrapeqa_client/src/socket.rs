use client_logging::{client_debug, client_info, client_warn};
use futures_util::{SinkExt, StreamExt};
use scrapeqa_core::{ClientError, Msg};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Push-channel URL for `session_id`: the API origin with a ws scheme, then
/// `progress_path`, then the session id as its own segment.
pub fn progress_url(
    api_base_url: &str,
    progress_path: &str,
    session_id: &str,
) -> Result<Url, ClientError> {
    let mut url = Url::parse(api_base_url)
        .map_err(|err| ClientError::Validation(format!("invalid api base url: {err}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ClientError::Validation(format!(
                "unsupported scheme {other} for progress channel"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Validation(format!("cannot use scheme {scheme}")))?;
    url.set_path(progress_path);
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| ClientError::Validation("api base url cannot carry a path".to_string()))?
        .pop_if_empty()
        .push(session_id);
    Ok(url)
}

/// Drives one progress connection until it closes or `cancel` fires.
///
/// Posts `ChannelEstablished`, then one `ChannelMessage` per text frame, then
/// `ChannelDropped` if the transport ends on its own. A cancelled connection
/// is closed quietly and posts nothing further.
pub async fn run_progress_socket(
    url: Url,
    generation: u64,
    cancel: CancellationToken,
    tx: UnboundedSender<Msg>,
) {
    let connect = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };
    let mut ws = match connect {
        Ok((ws, _)) => ws,
        Err(err) => {
            client_warn!("progress channel {} failed to connect: {}", generation, err);
            let _ = tx.send(Msg::ChannelDropped { generation });
            return;
        }
    };
    client_info!("progress channel {} connected", generation);
    if tx.send(Msg::ChannelEstablished { generation }).is_err() {
        return;
    }

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                client_debug!("progress channel {} closing", generation);
                let _ = ws.close(None).await;
                return;
            }
            frame = ws.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(payload))) => {
                if tx.send(Msg::ChannelMessage { generation, payload }).is_err() {
                    return;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                client_warn!("progress channel {} error: {}", generation, err);
                break;
            }
        }
    }

    client_info!("progress channel {} dropped", generation);
    let _ = tx.send(Msg::ChannelDropped { generation });
}
