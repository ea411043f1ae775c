use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use gb_bot_core::agent::ActionSet;
use gb_bot_core::agent::emulator::Emulator;
use gb_bot_core::screen::Frame;

/// Where the connection stood when its last request was dropped mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Ready,
    /// The request line may be partially written.
    Writing,
    /// The request was sent; its reply line is still (partly) unread.
    AwaitingReply,
}

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    state: ConnState,
}

impl ControlConn {
    async fn open(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect emulator bridge {addr}"))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
            state: ConnState::Ready,
        })
    }
}

/// Emulator reached over a JSON-lines bridge connection.
///
/// A request future dropped before completion (e.g. on interrupt) leaves the connection
/// marked; the next request first discards the abandoned reply, or reconnects if the request
/// line itself was cut short.
pub struct RemoteEmulator {
    addr: String,
    conn: Mutex<ControlConn>,
    rom_path: PathBuf,
    emulation_speed: f32,
}

impl RemoteEmulator {
    pub async fn connect(addr: &str, rom_path: PathBuf, emulation_speed: f32) -> anyhow::Result<Self> {
        let conn = ControlConn::open(addr).await?;
        info!(addr, "emulator.connect");
        Ok(Self {
            addr: addr.to_string(),
            conn: Mutex::new(conn),
            rom_path,
            emulation_speed,
        })
    }

    async fn resync(&self, conn: &mut ControlConn) -> anyhow::Result<()> {
        match conn.state {
            ConnState::Ready => {}
            ConnState::AwaitingReply => {
                let mut stale = String::new();
                let n = conn
                    .reader
                    .read_line(&mut stale)
                    .await
                    .context("drain abandoned bridge reply")?;
                if n == 0 {
                    anyhow::bail!("emulator bridge connection closed");
                }
                warn!(reply = stale.trim(), "emulator.resync dropped abandoned reply");
                conn.state = ConnState::Ready;
            }
            ConnState::Writing => {
                warn!(addr = %self.addr, "emulator.resync reconnecting after partial write");
                *conn = ControlConn::open(&self.addr).await?;
            }
        }
        Ok(())
    }

    async fn request_json(&self, req: Value) -> anyhow::Result<Value> {
        let line = format!("{req}\n");
        let mut conn = self.conn.lock().await;
        self.resync(&mut conn).await?;

        conn.state = ConnState::Writing;
        conn.writer
            .write_all(line.as_bytes())
            .await
            .context("bridge write")?;
        conn.writer.flush().await.context("bridge flush")?;
        conn.state = ConnState::AwaitingReply;

        let mut resp_line = String::new();
        let n = conn
            .reader
            .read_line(&mut resp_line)
            .await
            .context("bridge read")?;
        if n == 0 {
            anyhow::bail!("emulator bridge connection closed");
        }
        conn.state = ConnState::Ready;
        serde_json::from_str(resp_line.trim()).context("invalid bridge json response")
    }

    /// Sends `req` and fails unless the bridge answers `ok: true`.
    async fn request_ok(&self, op: &str, req: Value) -> anyhow::Result<Value> {
        let v = self.request_json(req).await?;
        if v.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = v
                .get("error")
                .and_then(Value::as_str)
                .map_or_else(|| v.to_string(), str::to_string);
            anyhow::bail!("{op} failed: {reason}");
        }
        Ok(v)
    }

    fn start_request(&self) -> Value {
        json!({
            "op": "start",
            "rom_path": self.rom_path.display().to_string(),
            "emulation_speed": self.emulation_speed,
        })
    }

    fn press_request(buttons: &ActionSet, frames: u32) -> Value {
        let names: Vec<&str> = buttons.buttons().iter().map(|b| b.name()).collect();
        json!({ "op": "press_and_tick", "buttons": names, "frames": frames })
    }
}

fn decode_frame(v: &Value) -> anyhow::Result<Frame> {
    let dim = |key: &str| -> anyhow::Result<u32> {
        let n = v
            .get(key)
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("missing {key} in screen response"))?;
        u32::try_from(n).with_context(|| format!("{key} out of range"))
    };
    let width = dim("width")?;
    let height = dim("height")?;
    let rgb_b64 = v
        .get("rgb")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing rgb in screen response"))?;
    let rgb = STANDARD.decode(rgb_b64).context("decode screen rgb")?;
    Frame::new(width, height, rgb)
}

fn decode_byte(v: &Value) -> anyhow::Result<u8> {
    let n = v
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow::anyhow!("missing value in read_memory response"))?;
    u8::try_from(n).with_context(|| format!("memory value {n} is not a byte"))
}

impl Emulator for RemoteEmulator {
    fn start<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.request_ok("start", self.start_request()).await?;
            Ok(())
        })
    }

    fn tick<'a>(
        &'a self,
        frames: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.request_ok("tick", json!({ "op": "tick", "frames": frames }))
                .await?;
            Ok(())
        })
    }

    fn press_and_tick<'a>(
        &'a self,
        buttons: ActionSet,
        frames: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.request_ok("press_and_tick", Self::press_request(&buttons, frames))
                .await?;
            Ok(())
        })
    }

    fn screen<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Frame>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.request_ok("screen", json!({ "op": "screen" })).await?;
            decode_frame(&v)
        })
    }

    fn read_memory<'a>(
        &'a self,
        address: u16,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u8>> + Send + 'a>> {
        Box::pin(async move {
            let v = self
                .request_ok("read_memory", json!({ "op": "read_memory", "address": address }))
                .await?;
            decode_byte(&v)
        })
    }

    fn stop<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.request_ok("stop", json!({ "op": "stop" })).await?;
            Ok(())
        })
    }
}
