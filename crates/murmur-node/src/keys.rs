//! Private key files.
//!
//! A key file holds the hex encoding of a 64-byte Ed25519 keypair
//! (secret key followed by public key). Files are written owner-only.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use libp2p::identity::{ed25519, Keypair};

use crate::error::KeyError;

/// Encode a keypair for storage. Only Ed25519 keys are supported.
pub fn encode_keypair(keypair: &Keypair) -> Result<String, KeyError> {
    let ed = keypair
        .clone()
        .try_into_ed25519()
        .map_err(|e| KeyError::Decode(e.to_string()))?;
    Ok(hex::encode(ed.to_bytes()))
}

/// Decode a keypair from its hex file representation.
pub fn decode_keypair(encoded: &str) -> Result<Keypair, KeyError> {
    let mut bytes = hex::decode(encoded.trim())?;
    let ed = ed25519::Keypair::try_from_bytes(&mut bytes)
        .map_err(|e| KeyError::Decode(e.to_string()))?;
    Ok(Keypair::from(ed))
}

/// Generate a fresh Ed25519 keypair and write it to `path`.
pub fn generate_key_file(path: &Path) -> Result<Keypair, KeyError> {
    let keypair = Keypair::generate_ed25519();
    write_key_file(path, &keypair)?;
    tracing::info!(
        path = %path.display(),
        peer_id = %keypair.public().to_peer_id(),
        "wrote new private key"
    );
    Ok(keypair)
}

/// Write `keypair` to `path`, replacing any existing file.
pub fn write_key_file(path: &Path, keypair: &Keypair) -> Result<(), KeyError> {
    let encoded = encode_keypair(keypair)?;
    let write_err = |source| KeyError::Write {
        path: path.display().to_string(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(write_err)?;
    file.write_all(encoded.as_bytes()).map_err(write_err)?;
    Ok(())
}

/// Load a keypair previously written by [`write_key_file`].
pub fn load_key_file(path: &Path) -> Result<Keypair, KeyError> {
    let contents = std::fs::read_to_string(path).map_err(|source| KeyError::Read {
        path: path.display().to_string(),
        source,
    })?;
    decode_keypair(&contents)
}
