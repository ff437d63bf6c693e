//! Resolution of connection parameters: an active OMERO CLI session wins, otherwise the
//! private credentials file is read.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

///Section of the credentials file holding the connection parameters
pub const CONFIG_SECTION: &str = "OMEROCredentials";
///Port used when a session file does not record one
pub const DEFAULT_PORT: u16 = 4064;

///Where and as whom to connect. Either `session_uuid` or `username`+`password` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_uuid: Option<String>,
}

///The two places credentials can come from
#[derive(Debug, Clone)]
pub struct CredentialSource {
    pub session_dir: Option<PathBuf>,
    pub config_file: PathBuf,
}

impl CredentialSource {
    ///Standard locations: the CLI session store and `~/.omero/config`
    pub fn new(config_file: Option<PathBuf>) -> Self {
        CredentialSource {
            session_dir: default_session_dir(),
            config_file: config_file.unwrap_or_else(default_config_file),
        }
    }

    ///First successful source wins, there is no retry
    pub fn resolve(&self) -> Result<ConnectionParams> {
        if let Some(dir) = &self.session_dir {
            if let Some(params) = params_from_session(dir)? {
                log::debug!(
                    "joining session for {} on {}",
                    params.username.as_deref().unwrap_or("?"),
                    params.host
                );
                return Ok(params);
            }
        }
        log::debug!("no active session, reading {}", self.config_file.display());
        params_from_config_file(&self.config_file)
    }
}

pub fn default_config_file() -> PathBuf {
    let mut p = home::home_dir().unwrap_or_default();
    p.push(".omero");
    p.push("config");
    p
}

///`$OMERO_SESSIONDIR`, then `$OMERO_USERDIR/sessions`, then `~/omero/sessions`
pub fn default_session_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("OMERO_SESSIONDIR") {
        return Some(dir.into());
    }
    if let Some(dir) = std::env::var_os("OMERO_USERDIR") {
        return Some(PathBuf::from(dir).join("sessions"));
    }
    home::home_dir().map(|h| h.join("omero").join("sessions"))
}

///Read a one-line marker file from the session store
fn read_marker(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

///Look up the current session: `._LASTHOST_` names the host, `<host>/._LASTUSER_` the user,
///`<host>/<user>/._LASTSESS_` the session uuid, whose properties file may carry `omero.port`.
///No uuid means there is no session.
pub fn params_from_session(dir: &Path) -> Result<Option<ConnectionParams>> {
    let Some(host) = read_marker(&dir.join("._LASTHOST_"))? else {
        return Ok(None);
    };
    let host_dir = dir.join(&host);
    let Some(user) = read_marker(&host_dir.join("._LASTUSER_"))? else {
        return Ok(None);
    };
    let user_dir = host_dir.join(&user);
    let Some(uuid) = read_marker(&user_dir.join("._LASTSESS_"))? else {
        return Ok(None);
    };
    let session_file = user_dir.join(&uuid);
    if !session_file.is_file() {
        //the marker outlived its session
        return Ok(None);
    }
    let props = parse_properties(&fs::read_to_string(&session_file)?);
    let port = match props.get("omero.port") {
        Some(p) => p.parse().map_err(|_| Error::Config {
            path: session_file.clone(),
            message: format!("omero.port {p:?} is not a port number"),
        })?,
        None => DEFAULT_PORT,
    };
    Ok(Some(ConnectionParams {
        host,
        port,
        username: Some(user),
        password: None,
        session_uuid: Some(uuid),
    }))
}

///`key=value` lines, `#` comments
fn parse_properties(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

///Sections of an INI file, keys lower-cased as the python config parser does
pub fn parse_ini(text: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some(section) = &current else {
            continue;
        };
        //both `key = value` and `key: value` are accepted
        let split = match (line.find('='), line.find(':')) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(i) = split {
            let key = line[..i].trim().to_lowercase();
            let value = line[i + 1..].trim().to_string();
            if let Some(entries) = sections.get_mut(section) {
                entries.insert(key, value);
            }
        }
    }
    sections
}

#[cfg(unix)]
fn check_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(Error::InsecureConfig(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_private(_path: &Path) -> Result<()> {
    Ok(())
}

///Read host, port, username and password from the private credentials file
pub fn params_from_config_file(path: &Path) -> Result<ConnectionParams> {
    if !path.is_file() {
        return Err(Error::NoCredentials(path.to_path_buf()));
    }
    check_private(path)?;
    let sections = parse_ini(&fs::read_to_string(path)?);
    let config_err = |message: String| Error::Config {
        path: path.to_path_buf(),
        message,
    };
    let section = sections
        .get(CONFIG_SECTION)
        .ok_or_else(|| config_err(format!("missing section [{CONFIG_SECTION}]")))?;
    let get = |key: &str| {
        section
            .get(key)
            .cloned()
            .ok_or_else(|| config_err(format!("missing option {key:?} in [{CONFIG_SECTION}]")))
    };
    let port = get("port")?;
    let port = port
        .parse()
        .map_err(|_| config_err(format!("port {port:?} is not an integer")))?;
    Ok(ConnectionParams {
        host: get("host")?,
        port,
        username: Some(get("username")?),
        password: Some(get("password")?),
        session_uuid: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const CONFIG: &str = "[OMEROCredentials]\nhost = omero.example.org\nport = 4064\n\
                          username = alice\npassword: s3cret\n";

    fn write_config(dir: &Path, mode: u32) -> PathBuf {
        let path = dir.join("config");
        fs::write(&path, CONFIG).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn config_file_with_private_permissions_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), 0o600);
        let params = params_from_config_file(&path).unwrap();
        assert_eq!(params.host, "omero.example.org");
        assert_eq!(params.port, 4064);
        assert_eq!(params.username.as_deref(), Some("alice"));
        assert_eq!(params.password.as_deref(), Some("s3cret"));
        assert_eq!(params.session_uuid, None);
    }

    #[test]
    fn group_readable_config_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), 0o640);
        assert!(matches!(
            params_from_config_file(&path),
            Err(Error::InsecureConfig(_))
        ));
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        assert!(matches!(
            params_from_config_file(&path),
            Err(Error::NoCredentials(p)) if p == path
        ));
    }

    #[test]
    fn non_integer_port_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, CONFIG.replace("4064", "lots")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(matches!(
            params_from_config_file(&path),
            Err(Error::Config { .. })
        ));
    }

    fn write_session(dir: &Path, port_line: &str) {
        fs::write(dir.join("._LASTHOST_"), "omero.example.org\n").unwrap();
        let host = dir.join("omero.example.org");
        fs::create_dir_all(host.join("bob")).unwrap();
        fs::write(host.join("._LASTUSER_"), "bob").unwrap();
        fs::write(host.join("bob").join("._LASTSESS_"), "abc-123").unwrap();
        fs::write(
            host.join("bob").join("abc-123"),
            format!("omero.host=omero.example.org\n{port_line}\n"),
        )
        .unwrap();
    }

    #[test]
    fn active_session_is_preferred() {
        let sessions = tempfile::tempdir().unwrap();
        write_session(sessions.path(), "omero.port=14064");
        let source = CredentialSource {
            session_dir: Some(sessions.path().to_path_buf()),
            config_file: sessions.path().join("missing-config"),
        };
        let params = source.resolve().unwrap();
        assert_eq!(params.session_uuid.as_deref(), Some("abc-123"));
        assert_eq!(params.username.as_deref(), Some("bob"));
        assert_eq!(params.password, None);
        assert_eq!(params.port, 14064);
    }

    #[test]
    fn empty_session_store_falls_back_to_config() {
        let sessions = tempfile::tempdir().unwrap();
        let conf = tempfile::tempdir().unwrap();
        let source = CredentialSource {
            session_dir: Some(sessions.path().to_path_buf()),
            config_file: write_config(conf.path(), 0o600),
        };
        let params = source.resolve().unwrap();
        assert_eq!(params.username.as_deref(), Some("alice"));
        assert_eq!(params.session_uuid, None);
    }

    #[test]
    fn session_without_port_uses_default() {
        let sessions = tempfile::tempdir().unwrap();
        write_session(sessions.path(), "# no port");
        let params = params_from_session(sessions.path()).unwrap().unwrap();
        assert_eq!(params.port, DEFAULT_PORT);
    }
}
