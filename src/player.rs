use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::session::{EventSender, SessionEvent};

/// Identifies one playback of one video. Progress reported under an older
/// ticket belongs to a video that is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlaybackTicket(pub u64);

/// Something that can play a video by id and report progress back into the
/// session event queue.
pub trait PlaybackEngine {
  /// Point the engine at a new video, replacing whatever was playing.
  /// `volume` is the effective output level in `0.0..=1.0`.
  fn load(&mut self, ticket: PlaybackTicket, video_id: &str, volume: f32, paused: bool)
  -> impl Future<Output = Result<()>>;
  fn set_paused(&mut self, paused: bool) -> impl Future<Output = Result<()>>;
  fn set_volume(&mut self, volume: f32) -> impl Future<Output = Result<()>>;
  fn stop(&mut self) -> impl Future<Output = Result<()>>;
}

// --- mpv IPC ---

const TIME_POS_OBSERVER: u64 = 1;

/// How long the monitor waits for mpv to create its IPC socket.
const IPC_CONNECT_ATTEMPTS: u32 = 50;
const IPC_CONNECT_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct IpcMessage {
  event: Option<String>,
  name: Option<String>,
  data: Option<serde_json::Value>,
  reason: Option<String>,
  file_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum MpvEvent {
  TimePos(f64),
  EndOfFile,
  /// mpv gave up on the file, e.g. the URL could not be resolved.
  LoadFailed(String),
}

fn parse_ipc_line(line: &str) -> Option<MpvEvent> {
  let msg: IpcMessage = serde_json::from_str(line).ok()?;
  match msg.event.as_deref()? {
    "property-change" if msg.name.as_deref() == Some("time-pos") => {
      msg.data.and_then(|d| d.as_f64()).map(MpvEvent::TimePos)
    }
    "end-file" => match msg.reason.as_deref() {
      Some("eof") => Some(MpvEvent::EndOfFile),
      Some("error") => Some(MpvEvent::LoadFailed(msg.file_error.unwrap_or_else(|| "unknown error".to_string()))),
      _ => None,
    },
    _ => None,
  }
}

fn volume_percent(volume: f32) -> u32 {
  (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn command_line(command: serde_json::Value) -> Vec<u8> {
  let mut line = serde_json::json!({ "command": command }).to_string().into_bytes();
  line.push(b'\n');
  line
}

async fn connect_ipc(socket_path: &str) -> Option<UnixStream> {
  for attempt in 0..IPC_CONNECT_ATTEMPTS {
    match UnixStream::connect(socket_path).await {
      Ok(stream) => return Some(stream),
      Err(e) => {
        if attempt % 10 == 9 {
          debug!(attempt, err = %e, "mpv: IPC socket not ready yet");
        }
        tokio::time::sleep(IPC_CONNECT_DELAY).await;
      }
    }
  }
  None
}

/// Follow mpv's event stream for one playback and forward progress into the
/// session queue. Ends when mpv exits or the task is aborted.
async fn monitor_playback(socket_path: String, ticket: PlaybackTicket, events: EventSender) {
  let Some(mut stream) = connect_ipc(&socket_path).await else {
    warn!(ticket = ticket.0, "mpv: gave up waiting for IPC socket");
    return;
  };
  let observe = command_line(serde_json::json!(["observe_property", TIME_POS_OBSERVER, "time-pos"]));
  if let Err(e) = stream.write_all(&observe).await {
    warn!(err = %e, "mpv: failed to subscribe to time-pos");
    return;
  }

  let mut lines = TokioBufReader::new(stream).lines();
  while let Ok(Some(line)) = lines.next_line().await {
    let event = match parse_ipc_line(&line) {
      Some(MpvEvent::TimePos(elapsed)) => SessionEvent::Progress { ticket, elapsed },
      Some(MpvEvent::EndOfFile) => SessionEvent::PlaybackFinished { ticket },
      Some(MpvEvent::LoadFailed(message)) => {
        warn!(ticket = ticket.0, error = %message, "mpv: failed to load video");
        SessionEvent::PlaybackFailed { ticket, message }
      }
      None => continue,
    };
    if events.send(event).is_err() {
      break;
    }
  }
  debug!(ticket = ticket.0, "mpv: event stream closed");
}

/// Audio-only playback through an `mpv` child process controlled over its
/// JSON IPC socket.
pub struct MpvEngine {
  events: EventSender,
  current_process: Option<TokioChild>,
  monitor_handle: Option<JoinHandle<()>>,
  ipc_socket_path: Option<String>,
}

impl MpvEngine {
  pub fn new(events: EventSender) -> Self {
    Self { events, current_process: None, monitor_handle: None, ipc_socket_path: None }
  }

  async fn send_command(&self, command: serde_json::Value) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let mut stream = UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.write_all(&command_line(command)).await.context("Failed to send command to mpv")?;
    Ok(())
  }
}

impl PlaybackEngine for MpvEngine {
  async fn load(&mut self, ticket: PlaybackTicket, video_id: &str, volume: f32, paused: bool) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;

    let socket_path = std::env::temp_dir().join(format!("genrebox-mpv-{}-{}.sock", std::process::id(), ticket.0));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let url = format!("{}{}", constants().watch_url_prefix, video_id);
    let mut cmd = Command::new("mpv");
    cmd.args([
      "--no-video",
      "--no-terminal",
      &format!("--input-ipc-server={}", socket_path_str),
      &format!("--volume={}", volume_percent(volume)),
      if paused { "--pause=yes" } else { "--pause=no" },
      &url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    info!(ticket = ticket.0, video_id, "mpv: playback started");
    let monitor = tokio::spawn(monitor_playback(socket_path_str.clone(), ticket, self.events.clone()));

    self.current_process = Some(child);
    self.monitor_handle = Some(monitor);
    self.ipc_socket_path = Some(socket_path_str);
    Ok(())
  }

  async fn set_paused(&mut self, paused: bool) -> Result<()> {
    self.send_command(serde_json::json!(["set_property", "pause", paused])).await
  }

  async fn set_volume(&mut self, volume: f32) -> Result<()> {
    self.send_command(serde_json::json!(["set_property", "volume", volume_percent(volume)])).await
  }

  async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }

    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_time_pos_updates() {
    let line = r#"{"event":"property-change","id":1,"name":"time-pos","data":4.987}"#;
    assert_eq!(parse_ipc_line(line), Some(MpvEvent::TimePos(4.987)));
  }

  #[test]
  fn ignores_null_time_pos() {
    let line = r#"{"event":"property-change","id":1,"name":"time-pos","data":null}"#;
    assert_eq!(parse_ipc_line(line), None);
    let line = r#"{"event":"property-change","id":1,"name":"time-pos"}"#;
    assert_eq!(parse_ipc_line(line), None);
  }

  #[test]
  fn parses_end_file_by_reason() {
    assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"eof","playlist_entry_id":1}"#), Some(MpvEvent::EndOfFile));
    assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"stop"}"#), None);
    assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"quit"}"#), None);
  }

  #[test]
  fn load_errors_are_reported() {
    assert_eq!(
      parse_ipc_line(r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#),
      Some(MpvEvent::LoadFailed("loading failed".into()))
    );
    assert_eq!(
      parse_ipc_line(r#"{"event":"end-file","reason":"error"}"#),
      Some(MpvEvent::LoadFailed("unknown error".into()))
    );
  }

  #[test]
  fn ignores_replies_and_noise() {
    assert_eq!(parse_ipc_line(r#"{"data":null,"request_id":0,"error":"success"}"#), None);
    assert_eq!(parse_ipc_line(r#"{"event":"playback-restart"}"#), None);
    assert_eq!(parse_ipc_line("not json"), None);
    assert_eq!(parse_ipc_line(r#"{"event":"property-change","name":"volume","data":40}"#), None);
  }

  #[test]
  fn volume_maps_to_mpv_percent() {
    assert_eq!(volume_percent(0.0), 0);
    assert_eq!(volume_percent(0.5), 50);
    assert_eq!(volume_percent(1.0), 100);
    assert_eq!(volume_percent(1.7), 100);
    assert_eq!(volume_percent(-0.2), 0);
  }

  #[test]
  fn command_lines_are_newline_terminated_json() {
    let line = command_line(serde_json::json!(["set_property", "pause", true]));
    assert_eq!(line.last(), Some(&b'\n'));
    let value: serde_json::Value = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
    assert_eq!(value["command"][0], "set_property");
    assert_eq!(value["command"][2], true);
  }

  #[tokio::test]
  async fn commands_without_playback_are_no_ops() {
    let (tx, _rx) = crate::session::event_channel();
    let mut engine = MpvEngine::new(tx);
    engine.set_paused(true).await.unwrap();
    engine.set_volume(0.3).await.unwrap();
    engine.stop().await.unwrap();
  }
}
