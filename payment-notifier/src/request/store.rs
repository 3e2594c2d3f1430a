use crate::monitor::{PaymentRequest, RequestResolver};
use bitcoincore_rpc::bitcoin::Network;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// Only the fields we need, the wallet stores more
#[derive(Debug, Deserialize)]
struct RequestFile {
    address: Option<String>,
    amount: Option<u64>,
}

/// Payment requests stored by the merchant wallet as
/// `<requests_dir>/req/<id[0]>/<id[1]>/<id>/<id>.json`.
pub struct FileRequestStore {
    requests_dir: PathBuf,
    network: Network,
}

impl FileRequestStore {
    pub fn new(requests_dir: &Path, network: Network) -> Self {
        Self {
            requests_dir: requests_dir.to_path_buf(),
            network,
        }
    }

    pub fn requests_dir(&self) -> &Path {
        &self.requests_dir
    }

    // Request ids come straight from websocket clients, so they are checked
    // before being used as path components
    fn check_request_id(request_id: &str) -> Result<(), String> {
        if request_id.len() < 2 {
            return Err(format!("Request id too short: {:?}", request_id));
        }

        if !request_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("Invalid character in request id: {:?}", request_id));
        }

        Ok(())
    }

    pub fn request_file_path(&self, request_id: &str) -> Result<PathBuf, String> {
        Self::check_request_id(request_id)?;

        let path = self
            .requests_dir
            .join("req")
            .join(&request_id[0..1])
            .join(&request_id[1..2])
            .join(request_id)
            .join(format!("{}.json", request_id));

        Ok(path)
    }

    fn parse_request(&self, request_id: &str, data: &str) -> Result<PaymentRequest, String> {
        let file: RequestFile = serde_json::from_str(data)
            .map_err(|e| format!("Failed to parse request {}: {}", request_id, e))?;

        let address = file
            .address
            .ok_or_else(|| format!("Request {} has no address", request_id))?;
        let amount = file
            .amount
            .ok_or_else(|| format!("Request {} has no amount", request_id))?;

        merchant_util::parse_address(&address, self.network)
            .map_err(|e| format!("Request {} has invalid address: {}", request_id, e))?;

        Ok(PaymentRequest {
            request_id: request_id.to_string(),
            address,
            amount,
        })
    }

    /// Blocking variant, for command line tools.
    pub fn load_request(&self, request_id: &str) -> Result<PaymentRequest, String> {
        let path = self.request_file_path(request_id)?;
        let data = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read request file {}: {}", path.display(), e))?;

        self.parse_request(request_id, &data)
    }
}

#[async_trait::async_trait]
impl RequestResolver for FileRequestStore {
    async fn resolve_request(&self, request_id: &str) -> Result<PaymentRequest, String> {
        let path = self.request_file_path(request_id)?;
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("Failed to read request file {}: {}", path.display(), e))?;

        self.parse_request(request_id, &data)
    }
}

pub type FileRequestStoreRef = std::sync::Arc<FileRequestStore>;
