// Shadow service endpoints
//
// Called with a device-scoped token rather than the account token.

use secrecy::SecretString;
use tracing::debug;

use crate::client::NodeClient;
use crate::error::Error;
use crate::models::{GetShadowsRequest, GetShadowsResponse, Shadow};

const GET: &str = "infinimesh.node.ShadowService/Get";
const PATCH: &str = "infinimesh.node.ShadowService/Patch";

impl NodeClient {
    /// Fetch the current shadows of every device in `pool`.
    ///
    /// The token must cover every id in the pool.
    pub async fn get_shadows(
        &self,
        token: &SecretString,
        pool: Vec<String>,
    ) -> Result<Vec<Shadow>, Error> {
        debug!(pool = pool.len(), "fetching shadows");
        let resp: GetShadowsResponse = self
            .call(GET, &GetShadowsRequest { pool }, Some(token))
            .await?;
        Ok(resp.shadows)
    }

    /// Send a patch for one device's `reported` or `desired` document.
    ///
    /// The response echoes the patched shadow; it is not authoritative and
    /// callers should re-fetch to observe the merged result.
    pub async fn patch_shadow(&self, token: &SecretString, patch: &Shadow) -> Result<Shadow, Error> {
        debug!(device = %patch.device, "patching shadow");
        self.call(PATCH, patch, Some(token)).await
    }
}
