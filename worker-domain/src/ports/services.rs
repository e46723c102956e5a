use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::NewAward;

#[async_trait]
pub trait BadgePublisher: Send + Sync {
    /// Renders the award's badge and uploads it under
    /// `badges/{player_id}/{award_id}.svg`, returning the public URL.
    /// Rendering is deterministic in the award fields.
    async fn generate_and_upload(&self, award_id: Uuid, award: &NewAward)
        -> anyhow::Result<String>;
}
