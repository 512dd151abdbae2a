use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{codec, writer, Session, SessionError, SessionResult};
use crate::config::AppConfig;
use crate::util::time;

/// Outcome of looking for an auto-save at startup.
#[derive(Debug)]
pub enum Recovery {
    /// No auto-save, or an empty one.
    None,
    Loaded(Session),
    /// The auto-save could not be read. `backup` is where it was moved, if
    /// anywhere; `warning` is meant for the status line.
    Corrupt {
        backup: Option<PathBuf>,
        warning: String,
    },
}

/// Clears the save flag however the save ends.
struct SaveGuard<'a>(&'a AtomicBool);

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Saves and loads sessions and owns the auto-save file.
///
/// Only one save runs at a time; a second one fails with
/// [`SessionError::SaveInProgress`] instead of waiting.
#[derive(Debug)]
pub struct SessionManager {
    sessions_dir: PathBuf,
    autosave_name: String,
    autosave_interval: Duration,
    last_autosave: Mutex<Option<Instant>>,
    saving: AtomicBool,
}

impl SessionManager {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            sessions_dir: config.sessions_dir.clone(),
            autosave_name: config.autosave_file_name.clone(),
            autosave_interval: config.auto_save_interval(),
            last_autosave: Mutex::new(None),
            saving: AtomicBool::new(false),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn autosave_path(&self) -> PathBuf {
        self.sessions_dir.join(&self.autosave_name)
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    fn begin_save(&self) -> SessionResult<SaveGuard<'_>> {
        self.saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SessionError::SaveInProgress)?;
        Ok(SaveGuard(&self.saving))
    }

    pub fn save(&self, session: &Session, path: &Path) -> SessionResult<()> {
        self.save_with(session, path, |_| Ok(()))
    }

    /// Save, running `before_replace` between the synced temp write and the
    /// rename over `path`.
    pub fn save_with<F>(&self, session: &Session, path: &Path, before_replace: F) -> SessionResult<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let _guard = self.begin_save()?;
        let json = codec::to_json(session)?;
        writer::write_atomic_with(path, json.as_bytes(), before_replace)?;
        log::info!("Saved session to {}", path.display());
        Ok(())
    }

    pub fn load(&self, path: &Path) -> SessionResult<Session> {
        let text = fs::read_to_string(path)?;
        let session = codec::from_json(&text)?;
        log::info!(
            "Loaded session {} with {} tab(s)",
            path.display(),
            session.tabs().len()
        );
        Ok(session)
    }

    pub fn auto_save(&self, session: &Session) -> SessionResult<()> {
        self.save(session, &self.autosave_path())?;
        *self.last_autosave.lock() = Some(Instant::now());
        Ok(())
    }

    pub fn should_autosave(&self) -> bool {
        match *self.last_autosave.lock() {
            Some(last) => last.elapsed() >= self.autosave_interval,
            None => true,
        }
    }

    /// Auto-save when the interval has passed. A save already running is not
    /// an error here; the next tick tries again.
    pub fn try_autosave(&self, session: &Session) -> SessionResult<bool> {
        if !self.should_autosave() {
            return Ok(false);
        }
        match self.auto_save(session) {
            Ok(()) => Ok(true),
            Err(SessionError::SaveInProgress) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Load the auto-save if there is one. A file that can't be read is moved
    /// aside as `<name>.corrupt_<UTC>`, or deleted if it can't be moved. This
    /// never fails; problems are reported through [`Recovery::Corrupt`].
    pub fn recover_auto_save(&self) -> Recovery {
        let path = self.autosave_path();
        match fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Recovery::None,
        }
        let err = match self.load(&path) {
            Ok(session) => return Recovery::Loaded(session),
            Err(err) => err,
        };
        if let SessionError::Io(io_err) = &err {
            let warning = format!("Auto-save could not be read: {io_err}");
            log::warn!("{warning}");
            return Recovery::Corrupt {
                backup: None,
                warning,
            };
        }

        log::warn!("Auto-save {} is corrupt: {err}", path.display());
        let backup = self
            .sessions_dir
            .join(format!("{}.corrupt_{}", self.autosave_name, time::utc_stamp()));
        match fs::rename(&path, &backup) {
            Ok(()) => Recovery::Corrupt {
                warning: format!(
                    "Auto-save was corrupt and has been moved to {}",
                    backup.display()
                ),
                backup: Some(backup),
            },
            Err(rename_err) => {
                log::warn!("Could not move corrupt auto-save aside: {rename_err}");
                match fs::remove_file(&path) {
                    Ok(()) => Recovery::Corrupt {
                        backup: None,
                        warning: "Auto-save was corrupt and has been deleted".to_string(),
                    },
                    Err(remove_err) => {
                        let warning = format!(
                            "Auto-save is corrupt and could not be moved or deleted: {remove_err}"
                        );
                        log::error!("{warning}");
                        Recovery::Corrupt {
                            backup: None,
                            warning,
                        }
                    }
                }
            }
        }
    }

    /// Session files in the sessions directory, newest first.
    pub fn list_sessions(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.sessions_dir) else {
            return Vec::new();
        };
        let mut sessions: Vec<_> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "sdm"))
            .collect();
        sessions.sort_by_key(|entry| {
            std::cmp::Reverse(
                entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            )
        });
        sessions.into_iter().map(|e| e.path()).collect()
    }
}
