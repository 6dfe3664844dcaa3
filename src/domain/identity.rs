use serde::{Deserialize, Serialize};

/// The authenticated caller, as handed over by the external
/// authentication layer (X509/VOMS or token based, out of scope here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_dn: String,
    pub vo_list: Vec<String>,
    pub credential_id: String,
    pub voms_attributes: Vec<String>,
}

impl Identity {
    /// The VO a submission is accounted under: the first VO of the
    /// credential, or the DN itself for VO-less credentials.
    pub fn vo_name(&self) -> String {
        self.vo_list.first().cloned().unwrap_or_else(|| self.user_dn.clone())
    }
}
