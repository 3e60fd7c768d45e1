//! Hardware seams: network and panel behind traits so the cycle logic is
//! testable off-device. The shipped implementations are deliberately
//! plain; board-specific drivers slot in behind the same traits.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Network connectivity.
pub trait Network {
    /// Block until connectivity is confirmed or fail.
    fn connect(&mut self) -> Result<()>;
}

/// The e-paper panel (or a stand-in).
pub trait Panel {
    /// Native resolution, width x height.
    fn dimensions(&self) -> (u32, u32);

    /// Push a full frame (BMP bytes) to the panel.
    fn render(&mut self, frame: &[u8]) -> Result<()>;

    /// Paint a short status message. Used only for boot and error states.
    fn show_message(&mut self, message: &str) -> Result<()>;
}

/// Connectivity check via a TCP probe to a well-known endpoint. The OS
/// owns the actual wifi association; all the agent needs to know is
/// whether packets flow.
pub struct SystemNetwork {
    probe_addr: String,
    timeout: Duration,
}

impl SystemNetwork {
    pub fn new(probe_addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            timeout,
        }
    }
}

impl Default for SystemNetwork {
    fn default() -> Self {
        Self::new("1.1.1.1:53", Duration::from_secs(5))
    }
}

impl Network for SystemNetwork {
    fn connect(&mut self) -> Result<()> {
        let addr = self
            .probe_addr
            .to_socket_addrs()
            .map_err(|e| Error::Connectivity(format!("bad probe address: {e}")))?
            .next()
            .ok_or_else(|| Error::Connectivity("probe address resolved to nothing".to_string()))?;

        TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| Error::Connectivity(format!("probe to {addr} failed: {e}")))?;
        debug!("network probe to {addr} succeeded");
        Ok(())
    }
}

/// Panel stand-in that writes frames to disk. Useful for development and
/// for boards where a separate process owns the e-paper bus.
pub struct FilePanel {
    frame_path: PathBuf,
    status_path: PathBuf,
    width: u32,
    height: u32,
}

impl FilePanel {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        let dir = dir.into();
        Self {
            frame_path: dir.join("frame.bmp"),
            status_path: dir.join("status.txt"),
            width,
            height,
        }
    }
}

impl Panel for FilePanel {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, frame: &[u8]) -> Result<()> {
        std::fs::write(&self.frame_path, frame)?;
        debug!("wrote {} frame bytes to {:?}", frame.len(), self.frame_path);
        Ok(())
    }

    fn show_message(&mut self, message: &str) -> Result<()> {
        let mut f = std::fs::File::create(&self.status_path)?;
        writeln!(f, "{message}")?;
        Ok(())
    }
}
