// Device directory and token issuer endpoints
//
// Both authenticate with the account token. The issuer turns a set of
// device ids plus a level into a short-lived device-scoped bearer token.

use secrecy::SecretString;
use serde_json::json;
use tracing::debug;

use crate::client::NodeClient;
use crate::error::Error;
use crate::models::{DevicesResponse, DevicesTokenRequest, TokenResponse};

const LIST: &str = "infinimesh.node.DevicesService/List";
const MAKE_DEVICES_TOKEN: &str = "infinimesh.node.DevicesService/MakeDevicesToken";

impl NodeClient {
    /// List every device visible to the account.
    pub async fn list_devices(&self) -> Result<DevicesResponse, Error> {
        let resp: DevicesResponse = self.call(LIST, &json!({}), None).await?;
        debug!(count = resp.devices.len(), "listed devices");
        Ok(resp)
    }

    /// Mint a device-scoped token.
    ///
    /// The returned secret is never logged.
    pub async fn make_devices_token(
        &self,
        request: &DevicesTokenRequest,
    ) -> Result<SecretString, Error> {
        debug!(
            devices = request.devices.len(),
            post = request.post,
            "requesting devices token"
        );
        let resp: TokenResponse = self.call(MAKE_DEVICES_TOKEN, request, None).await?;
        Ok(SecretString::from(resp.token))
    }
}
