use crate::utils::command::is_available;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, info};

/// Системные звуки freedesktop, первый существующий используется как сигнал
const SOUND_CANDIDATES: &[&str] = &[
    "/usr/share/sounds/freedesktop/stereo/complete.oga",
    "/usr/share/sounds/freedesktop/stereo/message.oga",
    "/usr/share/sounds/gnome/default/alerts/drip.ogg",
    "/usr/share/sounds/sound-icons/prompt.wav",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum SoundBackend {
    Paplay(PathBuf),
    Bell,
    Muted,
}

/// Звуковой сигнал об авто-подтверждении. Никогда не блокирует цикл сканирования.
#[derive(Debug, Clone)]
pub struct SoundPlayer {
    backend: SoundBackend,
}

impl SoundPlayer {
    pub fn new(enabled: bool) -> Self {
        let backend = if !enabled {
            SoundBackend::Muted
        } else {
            match find_sound_file(SOUND_CANDIDATES.iter().map(Path::new)) {
                Some(path) if is_available("paplay") => SoundBackend::Paplay(path),
                _ => SoundBackend::Bell,
            }
        };
        info!("Звуковой сигнал: {:?}", backend);
        Self { backend }
    }

    pub fn muted() -> Self {
        Self {
            backend: SoundBackend::Muted,
        }
    }

    /// Запустить и забыть: процесс проигрывания ожидается в отдельной задаче
    pub fn play(&self) {
        match &self.backend {
            SoundBackend::Paplay(path) => {
                let spawned = tokio::process::Command::new("paplay")
                    .arg(path)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn();

                match spawned {
                    Ok(mut child) => {
                        tokio::spawn(async move {
                            let _ = child.wait().await;
                        });
                    }
                    Err(e) => debug!("Не удалось запустить paplay: {}", e),
                }
            }
            SoundBackend::Bell => ring_bell(&mut std::io::stdout()),
            SoundBackend::Muted => {}
        }
    }
}

/// Звонок терминала (BEL)
fn ring_bell(out: &mut impl Write) {
    let _ = out.write_all(b"\x07");
    let _ = out.flush();
}

fn find_sound_file<'a>(candidates: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .find(|path| path.is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_sound_file_takes_first_existing() {
        let dir = tempfile::TempDir::new().unwrap();
        let second = dir.path().join("second.oga");
        let third = dir.path().join("third.oga");
        std::fs::write(&second, b"").unwrap();
        std::fs::write(&third, b"").unwrap();
        let missing = dir.path().join("missing.oga");

        let found = find_sound_file([missing.as_path(), second.as_path(), third.as_path()]);
        assert_eq!(found, Some(second));
    }

    #[test]
    fn test_bell_writes_bel_byte() {
        let mut out = Vec::new();
        ring_bell(&mut out);
        assert_eq!(out, b"\x07");
    }

    #[test]
    fn test_muted_player_does_nothing() {
        let player = SoundPlayer::new(false);
        assert_eq!(player.backend, SoundBackend::Muted);
        player.play();
    }
}
