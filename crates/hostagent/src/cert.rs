//! Certificate storage
//!
//! The host keeps its self-signed certificate across restarts so clients
//! that pinned its fingerprint keep working.
//!
//! ## Storage Location
//!
//! - **macOS**: `~/Library/Application Support/textcast/`
//! - **Linux**: `~/.local/share/textcast/`
//! - **Windows**: `%LOCALAPPDATA%\textcast\`
//!
//! ## Files
//!
//! - `host.crt` - Certificate (DER format)
//! - `host.key` - Private key (PKCS#8 DER, permissions 0600 on Unix)

use anyhow::{Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fs;
use std::path::{Path, PathBuf};
use textcast_core::transport::SERVER_NAME;

/// Certificate storage
pub struct CertStore {
    data_dir: PathBuf,
}

impl CertStore {
    /// Store in the platform data directory, created if missing
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .context("No local data directory on this platform")?
            .join("textcast");
        Self::at(data_dir)
    }

    /// Store in an explicit directory, created if missing
    pub fn at(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    fn cert_path(&self) -> PathBuf {
        self.data_dir.join("host.crt")
    }

    fn key_path(&self) -> PathBuf {
        self.data_dir.join("host.key")
    }

    /// Load the stored pair, or `None` if either file is missing
    pub fn load(&self) -> Result<Option<(CertificateDer<'static>, PrivateKeyDer<'static>)>> {
        let cert_path = self.cert_path();
        let key_path = self.key_path();

        if !cert_path.exists() || !key_path.exists() {
            return Ok(None);
        }

        let cert = fs::read(&cert_path)
            .with_context(|| format!("Failed to read {}", cert_path.display()))?;
        let key = fs::read(&key_path)
            .with_context(|| format!("Failed to read {}", key_path.display()))?;

        Ok(Some((
            CertificateDer::from(cert),
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)),
        )))
    }

    /// Write the pair; the key file is readable by its owner only
    pub fn save(&self, cert: &CertificateDer<'_>, key: &[u8]) -> Result<()> {
        fs::write(self.cert_path(), cert.as_ref())?;
        fs::write(self.key_path(), key)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perm = fs::metadata(self.key_path())?.permissions();
            perm.set_mode(0o600); // rw-------
            fs::set_permissions(self.key_path(), perm)?;
        }

        Ok(())
    }

    /// Stored pair, generating and saving a new one on first run
    pub fn load_or_generate(&self) -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
        if let Some(pair) = self.load()? {
            tracing::debug!("Loaded certificate from {}", self.data_dir.display());
            return Ok(pair);
        }

        let generated = rcgen::generate_simple_self_signed([SERVER_NAME.to_string()])
            .context("Failed to generate certificate")?;
        let cert = CertificateDer::from(generated.cert);
        let key = generated.key_pair.serialize_der();
        self.save(&cert, &key)?;
        tracing::info!("Generated new host certificate in {}", self.data_dir.display());

        Ok((cert, PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textcast_core::transport::fingerprint;

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertStore::at(dir.path()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_generate_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertStore::at(dir.path().join("nested")).unwrap();
        let (first, _) = store.load_or_generate().unwrap();
        let (second, _) = store.load_or_generate().unwrap();
        assert_eq!(fingerprint(&first), fingerprint(&second));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = CertStore::at(dir.path()).unwrap();
        store.load_or_generate().unwrap();
        let mode = fs::metadata(store.key_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_generated_pair_configures_server() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertStore::at(dir.path()).unwrap();
        let (cert, key) = store.load_or_generate().unwrap();
        assert!(textcast_core::transport::configure_server(vec![cert], key).is_ok());
    }
}
