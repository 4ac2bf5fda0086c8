//! Loads and creates the PEM-encoded RSA private key that is a relay's
//! long-term identity.

use std::fs;
use std::path::{Path, PathBuf};

use fs_mistrust::Mistrust;
use tracing::{debug, info};
use veil_crypto::RsaPrivateKey;

use crate::err::{Error, Result};

/// Build the conventional path for a relay's key file: `<state_dir>/relay_<id>.pem`.
pub fn relay_key_path(state_dir: &Path, relay_id: &str) -> PathBuf {
    state_dir.join(format!("relay_{relay_id}.pem"))
}

fn check_permissions(mistrust: &Mistrust, path: &Path) -> Result<()> {
    mistrust
        .verifier()
        .check(path)
        .map_err(|source| Error::Permissions {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &str) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .and_then(|mut f| {
            use std::io::Write;
            f.write_all(pem.as_bytes())
        })
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &str) -> std::io::Result<()> {
    fs::write(path, pem.as_bytes())
}

/// Load the relay identity key at `path`, generating and persisting a
/// fresh one if no file exists yet.
///
/// The key file (and, for a not-yet-created file, its parent directory)
/// must pass an `fs-mistrust` permissions check before it is trusted;
/// a world- or group-writable key file is a [`Error::Permissions`]
/// rather than something this silently accepts.
pub fn load_or_generate_relay_key(mistrust: &Mistrust, path: &Path) -> Result<RsaPrivateKey> {
    if path.exists() {
        check_permissions(mistrust, path)?;
        let pem = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let key = veil_crypto::rsa_private_from_pem(&pem).map_err(|source| Error::Corrupted {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded existing relay identity key");
        Ok(key)
    } else {
        if let Some(parent) = path.parent() {
            if parent.exists() {
                check_permissions(mistrust, parent)?;
            }
        }
        info!(path = %path.display(), "generating new relay identity key");
        let key = veil_crypto::rsa_generate().map_err(Error::KeyGen)?;
        let pem = veil_crypto::rsa_private_to_pem(&key).map_err(Error::KeyGen)?;
        write_private(path, &pem).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        check_permissions(mistrust, path)?;
        Ok(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generates_then_reloads_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = relay_key_path(dir.path(), "0");
        let mistrust = Mistrust::new();

        let key1 = load_or_generate_relay_key(&mistrust, &path).unwrap();
        let key2 = load_or_generate_relay_key(&mistrust, &path).unwrap();

        assert_eq!(
            veil_crypto::rsa_private_to_pem(&key1).unwrap(),
            veil_crypto::rsa_private_to_pem(&key2).unwrap()
        );
    }

    #[test]
    fn path_naming_matches_convention() {
        let dir = Path::new("/var/lib/veil");
        assert_eq!(
            relay_key_path(dir, "3"),
            Path::new("/var/lib/veil/relay_3.pem")
        );
    }
}
