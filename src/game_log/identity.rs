use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::model::PlayerIdentity;

const LOGIN_SUCCESS_MARKER: &str = "<Legacy login response> [CIG-net] User Login Success";
const HANDLE_MARKER: &str = "Handle[";
const CHARACTER_STATUS_MARKER: &str = "AccountLoginCharacterStatus_Character";
const GEID_FIELD_INDEX: usize = 11;

/// Supplies the tracked player's handle and global entity id.
///
/// Resolution may be partial; the worker keeps asking until the handle is
/// known.
pub trait IdentitySource: Send + Sync {
    fn resolve(&self) -> PlayerIdentity;
}

/// Identity known up front, e.g. from settings or the command line.
#[derive(Debug, Clone, Default)]
pub struct FixedIdentity(pub PlayerIdentity);

impl IdentitySource for FixedIdentity {
    fn resolve(&self) -> PlayerIdentity {
        self.0.clone()
    }
}

/// Scans the game log for the login and character status lines, with
/// optional overrides taking precedence over anything found in the log.
#[derive(Debug, Clone)]
pub struct LogScanIdentity {
    path: PathBuf,
    overrides: PlayerIdentity,
}

impl LogScanIdentity {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            overrides: PlayerIdentity::default(),
        }
    }

    pub fn with_overrides(mut self, handle: Option<String>, global_entity_id: Option<String>) -> Self {
        self.overrides = PlayerIdentity::new(handle, global_entity_id);
        self
    }

    fn scan(&self) -> std::io::Result<PlayerIdentity> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut buffer = Vec::new();
        let mut handle = None;
        let mut global_entity_id = None;

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches(['\r', '\n']);
            if handle.is_none() {
                handle = parse_handle(line);
            }
            if global_entity_id.is_none() {
                global_entity_id = parse_global_entity_id(line);
            }
            if handle.is_some() && global_entity_id.is_some() {
                break;
            }
        }

        Ok(PlayerIdentity::new(handle, global_entity_id))
    }
}

impl IdentitySource for LogScanIdentity {
    fn resolve(&self) -> PlayerIdentity {
        if self.overrides.is_fully_resolved() {
            return self.overrides.clone();
        }

        let scanned = match self.scan() {
            Ok(identity) => identity,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "Failed to scan game log for player identity"
                );
                PlayerIdentity::default()
            }
        };

        PlayerIdentity {
            handle: self.overrides.handle.clone().or(scanned.handle),
            global_entity_id: self
                .overrides
                .global_entity_id
                .clone()
                .or(scanned.global_entity_id),
        }
    }
}

fn parse_handle(line: &str) -> Option<String> {
    if !line.contains(LOGIN_SUCCESS_MARKER) {
        return None;
    }

    let (_, remainder) = line.split_once(HANDLE_MARKER)?;
    let token = remainder.split(' ').next()?;
    let handle = token.strip_suffix(']').unwrap_or(token);

    PlayerIdentity::new(Some(handle.to_string()), None).handle
}

fn parse_global_entity_id(line: &str) -> Option<String> {
    if !line.contains(CHARACTER_STATUS_MARKER) {
        return None;
    }

    let field = line.split(' ').nth(GEID_FIELD_INDEX)?;
    PlayerIdentity::new(None, Some(field.to_string())).global_entity_id
}
