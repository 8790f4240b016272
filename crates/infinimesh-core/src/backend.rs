// ── Collaborator seams ──
//
// The core talks to the outside world through four narrow traits. The
// gateway client implements all of them; tests substitute in-memory fakes.

use std::collections::BTreeSet;
use std::future::Future;

use futures_util::stream::{BoxStream, StreamExt};
use infinimesh_api::models::{DevicesTokenRequest, Level, Shadow};
use infinimesh_api::{NodeClient, StateStream};
use secrecy::SecretString;

use crate::error::CoreError;
use crate::model::{AccessLevel, Device, DeviceId, ShadowDelta, ShadowPatch};

/// Raw text frames from an open push channel.
///
/// The stream ending, or yielding an error, means the channel is gone.
pub type PushStream = BoxStream<'static, Result<String, CoreError>>;

/// Lists the devices visible to the account, with per-device access.
pub trait DeviceDirectory: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Device>, CoreError>> + Send;
}

/// Exchanges a device set and level for a scoped bearer credential.
pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        devices: &BTreeSet<DeviceId>,
        level: AccessLevel,
    ) -> impl Future<Output = Result<SecretString, CoreError>> + Send;
}

/// Shadow snapshot and patch endpoints, authorized by a scoped token.
pub trait ShadowService: Send + Sync {
    fn fetch(
        &self,
        token: &SecretString,
        pool: &[DeviceId],
    ) -> impl Future<Output = Result<Vec<ShadowDelta>, CoreError>> + Send;

    fn patch(
        &self,
        token: &SecretString,
        patch: &ShadowPatch,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Opens the push channel. Resolves once the handshake has succeeded.
pub trait PushConnector: Send + Sync {
    fn open(&self, token: &SecretString) -> impl Future<Output = Result<PushStream, CoreError>> + Send;
}

/// Everything [`ShadowSync`](crate::ShadowSync) needs from one backend.
pub trait Backend: DeviceDirectory + TokenIssuer + ShadowService + PushConnector + 'static {}

impl<T> Backend for T where T: DeviceDirectory + TokenIssuer + ShadowService + PushConnector + 'static {}

// ── Gateway implementation ───────────────────────────────────────────

impl DeviceDirectory for NodeClient {
    async fn list(&self) -> Result<Vec<Device>, CoreError> {
        let resp = self.list_devices().await?;
        Ok(resp.devices.into_iter().map(Device::from).collect())
    }
}

impl TokenIssuer for NodeClient {
    async fn issue(
        &self,
        devices: &BTreeSet<DeviceId>,
        level: AccessLevel,
    ) -> Result<SecretString, CoreError> {
        let wire_level = Level::from(level);
        let request = DevicesTokenRequest {
            devices: devices
                .iter()
                .map(|id| (id.to_string(), wire_level))
                .collect(),
            post: level.can_mutate(),
        };
        Ok(self.make_devices_token(&request).await?)
    }
}

impl ShadowService for NodeClient {
    async fn fetch(
        &self,
        token: &SecretString,
        pool: &[DeviceId],
    ) -> Result<Vec<ShadowDelta>, CoreError> {
        let pool = pool.iter().map(ToString::to_string).collect();
        let shadows = self.get_shadows(token, pool).await?;
        Ok(shadows.into_iter().map(ShadowDelta::from).collect())
    }

    async fn patch(&self, token: &SecretString, patch: &ShadowPatch) -> Result<(), CoreError> {
        self.patch_shadow(token, &Shadow::from(patch)).await?;
        Ok(())
    }
}

impl PushConnector for NodeClient {
    async fn open(&self, token: &SecretString) -> Result<PushStream, CoreError> {
        let url = self.stream_url()?;
        let stream = StateStream::connect(&url, token).await?;
        Ok(stream
            .into_text_stream()
            .map(|frame| frame.map_err(CoreError::from))
            .boxed())
    }
}
