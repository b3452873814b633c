use crate::session::Session;
use crate::store::{keys, StoreConnection};

use super::ActionError;

/// Replace the store's connected-guild set with the guilds the bot is in.
///
/// The guild list is fetched before anything is deleted, so a session
/// failure leaves the stored set untouched. Returns the number of guilds.
pub async fn refresh_connected_guilds(
    session: &Session,
    conn: &mut StoreConnection,
) -> Result<usize, ActionError> {
    let guilds = session.current_user_guilds().await?;

    conn.del(keys::CONNECTED_GUILDS).await?;
    if guilds.is_empty() {
        return Ok(0);
    }

    let ids: Vec<&str> = guilds.iter().map(|g| g.id.as_str()).collect();
    conn.sadd(keys::CONNECTED_GUILDS, &ids).await?;
    Ok(guilds.len())
}
