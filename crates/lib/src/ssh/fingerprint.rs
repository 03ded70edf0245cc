//! OpenSSH key fingerprints.
//!
//! `ssh-add -l -E sha256` lists keys as `SHA256:<base64 without padding>` of
//! the public key blob. Computing the same value from `<key>.pub` lets the
//! manager check exactly which identities an agent holds.

use std::path::{Path, PathBuf};

use base64ct::{Base64, Base64Unpadded, Encoding};
use sha2::{Digest, Sha256};

use super::SshError;
use crate::Result;

/// Path of the public key that accompanies `private_key`.
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut name = private_key.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// Fingerprint a single `authorized_keys`-style line: `<type> <base64 blob> [comment]`.
pub fn fingerprint_line(line: &str) -> Option<String> {
    let blob = line.split_whitespace().nth(1)?;
    let decoded = Base64::decode_vec(blob).ok()?;
    let digest = Sha256::digest(&decoded);
    Some(format!("SHA256:{}", Base64Unpadded::encode_string(&digest)))
}

/// Fingerprint of the public key next to `private_key`.
pub async fn fingerprint_for_key(private_key: &Path) -> Result<String> {
    let pub_path = public_key_path(private_key);
    let contents = match tokio::fs::read_to_string(&pub_path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SshError::PublicKeyMissing { path: pub_path }.into());
        }
        Err(e) => return Err(e.into()),
    };
    contents
        .lines()
        .find(|l| !l.trim().is_empty())
        .and_then(fingerprint_line)
        .ok_or_else(|| SshError::MalformedPublicKey { path: pub_path }.into())
}

/// Extract fingerprints from `ssh-add -l -E sha256` output.
pub fn parse_agent_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|field| field.starts_with("SHA256:"))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pub_path_appends_suffix() {
        assert_eq!(
            public_key_path(Path::new("/home/j/.ssh/id_work")),
            PathBuf::from("/home/j/.ssh/id_work.pub")
        );
    }

    #[test]
    fn fingerprint_matches_known_vector() {
        // sha256 of the bytes "abc", base64 without padding
        let blob = Base64::encode_string(b"abc");
        let fp = fingerprint_line(&format!("ssh-ed25519 {blob} jane@laptop")).unwrap();
        assert_eq!(fp, "SHA256:ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0");
    }

    #[test]
    fn garbage_line_has_no_fingerprint() {
        assert!(fingerprint_line("ssh-ed25519").is_none());
        assert!(fingerprint_line("ssh-ed25519 !!!notbase64").is_none());
    }

    #[test]
    fn agent_listing_parse() {
        let out = "256 SHA256:AAAA jane@laptop (ED25519)\n3072 SHA256:BBBB work (RSA)\n";
        assert_eq!(parse_agent_listing(out), vec!["SHA256:AAAA", "SHA256:BBBB"]);
        assert!(parse_agent_listing("The agent has no identities.\n").is_empty());
    }

    #[tokio::test]
    async fn missing_pub_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint_for_key(&dir.path().join("id_x")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
