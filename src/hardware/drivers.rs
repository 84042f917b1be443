//! Device bring-up for the real hardware.
//!
//! Each driver confirms its device node is present and usable before the
//! subsystem is reported ready. All I/O races the cancellation signal.

use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::hardware::{HardwareError, HardwareSubsystem};

pub const CAN_BUS: &str = "can-bus";
pub const GPIO: &str = "gpio";
pub const AUDIO: &str = "audio";

const NET_CLASS: &str = "/sys/class/net";

async fn cancellable<T>(
    subsystem: &str,
    cancel: &CancellationToken,
    io: impl Future<Output = Result<T, HardwareError>>,
) -> Result<T, HardwareError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(HardwareError::Cancelled { subsystem: subsystem.to_string() }),
        result = io => result,
    }
}

fn io_error(subsystem: &str, path: &Path, source: std::io::Error) -> HardwareError {
    if source.kind() == std::io::ErrorKind::NotFound {
        HardwareError::DeviceMissing {
            subsystem: subsystem.to_string(),
            path: path.to_path_buf(),
        }
    } else {
        HardwareError::Io {
            subsystem: subsystem.to_string(),
            path: path.to_path_buf(),
            source,
        }
    }
}

/// CAN bus network interface.
#[derive(Debug)]
pub struct CanBus {
    interface: PathBuf,
}

impl CanBus {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: Path::new(NET_CLASS).join(interface),
        }
    }
}

#[async_trait]
impl HardwareSubsystem for CanBus {
    fn name(&self) -> &str {
        CAN_BUS
    }

    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), HardwareError> {
        let operstate = self.interface.join("operstate");
        let state = cancellable(CAN_BUS, cancel, async {
            tokio::fs::read_to_string(&operstate)
                .await
                .map_err(|e| io_error(CAN_BUS, &self.interface, e))
        })
        .await?;

        if state.trim() == "down" {
            return Err(HardwareError::Failed {
                subsystem: CAN_BUS.to_string(),
                reason: format!("interface {} is down", self.interface.display()),
            });
        }
        tracing::debug!(interface = %self.interface.display(), state = %state.trim(), "CAN interface present");
        Ok(())
    }
}

/// GPIO character device.
#[derive(Debug)]
pub struct GpioController {
    chip: PathBuf,
}

impl GpioController {
    pub fn new(chip: PathBuf) -> Self {
        Self { chip }
    }
}

#[async_trait]
impl HardwareSubsystem for GpioController {
    fn name(&self) -> &str {
        GPIO
    }

    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), HardwareError> {
        cancellable(GPIO, cancel, async {
            tokio::fs::metadata(&self.chip)
                .await
                .map_err(|e| io_error(GPIO, &self.chip, e))
        })
        .await?;
        tracing::debug!(chip = %self.chip.display(), "GPIO chip present");
        Ok(())
    }
}

/// ALSA audio device directory; ready when it exposes at least one PCM node.
#[derive(Debug)]
pub struct AudioDevice {
    directory: PathBuf,
}

impl AudioDevice {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl HardwareSubsystem for AudioDevice {
    fn name(&self) -> &str {
        AUDIO
    }

    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), HardwareError> {
        let pcm_nodes = cancellable(AUDIO, cancel, async {
            let mut entries = tokio::fs::read_dir(&self.directory)
                .await
                .map_err(|e| io_error(AUDIO, &self.directory, e))?;
            let mut count = 0usize;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error(AUDIO, &self.directory, e))?
            {
                if entry.file_name().to_string_lossy().starts_with("pcm") {
                    count += 1;
                }
            }
            Ok::<_, HardwareError>(count)
        })
        .await?;

        if pcm_nodes == 0 {
            return Err(HardwareError::Failed {
                subsystem: AUDIO.to_string(),
                reason: format!("no PCM devices under {}", self.directory.display()),
            });
        }
        tracing::debug!(directory = %self.directory.display(), pcm_nodes, "Audio device present");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_gpio_chip() {
        let gpio = GpioController::new(PathBuf::from("/nonexistent/gpiochip9"));
        let err = gpio.initialize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, HardwareError::DeviceMissing { .. }));
    }

    #[tokio::test]
    async fn test_present_gpio_chip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let gpio = GpioController::new(file.path().to_path_buf());
        assert!(gpio.initialize(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_audio_requires_pcm_nodes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("controlC0"), b"").unwrap();
        let audio = AudioDevice::new(dir.path().to_path_buf());
        assert!(matches!(
            audio.initialize(&CancellationToken::new()).await,
            Err(HardwareError::Failed { .. })
        ));

        std::fs::write(dir.path().join("pcmC0D0p"), b"").unwrap();
        assert!(audio.initialize(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_before_io() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let can = CanBus::new("can-test-missing");
        // Either branch may win the race; both are failures.
        assert!(can.initialize(&cancel).await.is_err());
    }
}
