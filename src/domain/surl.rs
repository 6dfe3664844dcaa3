use std::hash::{DefaultHasher, Hash, Hasher};

use url::Url;

use crate::error::{Error, Result};

/// A validated source or destination address of one file.
#[derive(Debug, Clone)]
pub struct Surl {
    pub raw: String,
    pub scheme: String,
    pub host: String,
}

impl Surl {
    /// Parses and validates one SURL.
    ///
    /// A SURL must carry a scheme other than `file`, a host, and a
    /// non-empty path unless a query string is present (SRM endpoints
    /// address files through `?SFN=` style queries).
    pub fn parse(raw: &str) -> Result<Surl> {
        let url = Url::parse(raw).map_err(|e| Error::validation(format!("Malformed SURL '{}': {}", raw, e)))?;

        if url.scheme() == "file" {
            return Err(Error::validation(format!("Local file SURLs are not transferable: '{}'", raw)));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(Error::validation(format!("SURL without a host: '{}'", raw))),
        };

        let path_empty = url.path().is_empty() || url.path() == "/";
        if path_empty && url.query().is_none() {
            return Err(Error::validation(format!("SURL without a path: '{}'", raw)));
        }

        Ok(Surl { raw: raw.to_string(), scheme: url.scheme().to_string(), host })
    }

    /// The storage endpoint this SURL lives on, `scheme://host`.
    pub fn se(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    pub fn is_srm(&self) -> bool {
        self.scheme == "srm"
    }
}

/// Whether a (source, destination) scheme pair can run as a third-party
/// transfer: both sides speak the same protocol, or either side is an
/// SRM endpoint that can negotiate the other's protocol.
pub fn valid_third_party_pair(source: &Surl, dest: &Surl) -> bool {
    source.scheme == dest.scheme || source.is_srm() || dest.is_srm()
}

/// Derives a balancing key from an id. Transfers sharing a key are
/// dispatched to the same execution path, so grouped transfers (reuse,
/// multihop, multi-replica, staging) all carry the key of their job
/// while independent transfers hash their own id.
pub fn hashed_id(seed: &str) -> u16 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    (hasher.finish() >> 48) as u16
}
