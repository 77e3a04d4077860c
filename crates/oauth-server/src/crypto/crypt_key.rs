//! Asymmetric key file resolution.
//!
//! A [`CryptKey`] is built from either inline PEM text or a filesystem path.
//! Inline material is written once to a content-addressed file in the temp
//! directory so the same PEM always resolves to the same path. Only the path
//! and the optional passphrase are retained; the key itself is read from disk
//! whenever it is needed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use sha2::{Digest, Sha256};

use crate::error::{Fault, OAuthError};

/// Scheme prefix carried by every resolved key path.
const FILE_SCHEME: &str = "file://";

/// File modes accepted without a warning.
const ALLOWED_MODES: [u32; 4] = [0o400, 0o440, 0o600, 0o660];

static PEM_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?s)^(-----BEGIN (RSA |ENCRYPTED )?(PUBLIC|PRIVATE) KEY-----)\r?\n.*(-----END (RSA |ENCRYPTED )?(PUBLIC|PRIVATE) KEY-----)(\r?\n)?$",
    )
    .expect("Invalid PEM regex")
});

/// Errors raised while resolving a key file.
#[derive(Debug, thiserror::Error)]
pub enum CryptKeyError {
    /// The resolved path does not exist or cannot be opened.
    #[error("Key path \"{path}\" does not exist or is not readable")]
    NotReadable {
        /// The `file://`-prefixed path.
        path: String,
    },

    /// Writing inline key material to disk failed.
    #[error("Failed to write key file \"{path}\": {message}")]
    Write {
        /// Target file path.
        path: String,
        /// Underlying I/O error.
        message: String,
    },

    /// A file already at the content-addressed path holds other bytes.
    #[error("Key file \"{path}\" exists with different contents")]
    Mismatch {
        /// Target file path.
        path: String,
    },
}

impl From<CryptKeyError> for Fault {
    fn from(err: CryptKeyError) -> Self {
        Fault::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<CryptKeyError> for OAuthError {
    fn from(err: CryptKeyError) -> Self {
        OAuthError::Fault(err.into())
    }
}

/// A PEM key resolved to a readable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptKey {
    key_path: String,
    pass_phrase: Option<String>,
}

impl CryptKey {
    /// Resolves `key_or_path` to a key file.
    ///
    /// Inline PEM text is materialized under the system temp directory.
    /// With `check_permissions` set, a file mode outside
    /// `{0400, 0440, 0600, 0660}` logs a warning.
    pub fn new(
        key_or_path: &str,
        pass_phrase: Option<String>,
        check_permissions: bool,
    ) -> Result<Self, CryptKeyError> {
        Self::with_temp_dir(key_or_path, pass_phrase, check_permissions, &std::env::temp_dir())
    }

    /// Same as [`CryptKey::new`] but materializes inline PEM under `temp_dir`.
    pub fn with_temp_dir(
        key_or_path: &str,
        pass_phrase: Option<String>,
        check_permissions: bool,
        temp_dir: &Path,
    ) -> Result<Self, CryptKeyError> {
        let key_path = if is_inline_pem(key_or_path) {
            let path = save_key_to_file(key_or_path, temp_dir)?;
            format!("{}{}", FILE_SCHEME, path.display())
        } else if key_or_path.starts_with(FILE_SCHEME) {
            key_or_path.to_string()
        } else {
            format!("{}{}", FILE_SCHEME, key_or_path)
        };

        let file_path = strip_scheme(&key_path);
        if File::open(file_path).is_err() {
            return Err(CryptKeyError::NotReadable { path: key_path });
        }

        if check_permissions {
            check_key_permissions(Path::new(file_path));
        }

        Ok(Self {
            key_path,
            pass_phrase,
        })
    }

    /// The `file://`-prefixed key path.
    #[must_use]
    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    /// The filesystem path without the scheme prefix.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        Path::new(strip_scheme(&self.key_path))
    }

    /// Passphrase protecting the key, if any.
    #[must_use]
    pub fn pass_phrase(&self) -> Option<&str> {
        self.pass_phrase.as_deref()
    }

    /// Reads the PEM text from disk.
    pub fn read_pem(&self) -> Result<String, CryptKeyError> {
        fs::read_to_string(self.file_path()).map_err(|_| CryptKeyError::NotReadable {
            path: self.key_path.clone(),
        })
    }
}

/// Returns `true` if `input` looks like a PEM key block.
#[must_use]
pub fn is_inline_pem(input: &str) -> bool {
    PEM_PATTERN.is_match(input)
}

/// Returns `true` if the permission bits of `mode` are in the allow-list.
#[must_use]
pub fn permissions_allowed(mode: u32) -> bool {
    ALLOWED_MODES.contains(&(mode & 0o777))
}

fn strip_scheme(path: &str) -> &str {
    path.strip_prefix(FILE_SCHEME).unwrap_or(path)
}

/// Writes `key` to `<temp_dir>/<sha256>.key` unless it already exists.
///
/// The content goes to a uniquely named sibling first and is then hard-linked
/// into place, so concurrent writers never expose a partially written file.
/// Losing the link race counts as success. A file already in place is only
/// accepted if it holds exactly `key`.
fn save_key_to_file(key: &str, temp_dir: &Path) -> Result<PathBuf, CryptKeyError> {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    let target = temp_dir.join(format!("{}.key", digest));

    if target.exists() {
        verify_existing(&target, key)?;
        return Ok(target);
    }

    let write_err = |e: io::Error| CryptKeyError::Write {
        path: target.display().to_string(),
        message: e.to_string(),
    };

    let staging = temp_dir.join(format!(".{}.{}.tmp", digest, uuid::Uuid::new_v4().simple()));
    let linked = write_owner_only(&staging, key.as_bytes())
        .and_then(|()| match fs::hard_link(&staging, &target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        });
    let _ = fs::remove_file(&staging);

    if !linked.map_err(write_err)? {
        verify_existing(&target, key)?;
        return Ok(target);
    }

    tracing::debug!(path = %target.display(), "Materialized inline key");
    Ok(target)
}

fn verify_existing(target: &Path, key: &str) -> Result<(), CryptKeyError> {
    let on_disk = fs::read(target).map_err(|e| CryptKeyError::Write {
        path: target.display().to_string(),
        message: e.to_string(),
    })?;

    if on_disk != key.as_bytes() {
        tracing::warn!(path = %target.display(), "Existing key file does not match inline key");
        return Err(CryptKeyError::Mismatch {
            path: target.display().to_string(),
        });
    }
    Ok(())
}

fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(unix)]
fn check_key_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    let mode = metadata.permissions().mode() & 0o777;

    if !permissions_allowed(mode) {
        tracing::warn!(
            path = %path.display(),
            mode = %format!("{:o}", mode),
            "Key file permissions are not correct, recommend changing to 600 or 660"
        );
    }
}

#[cfg(not(unix))]
fn check_key_permissions(_path: &Path) {}
