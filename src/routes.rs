//! A handful of route templates for tests and doctests to call through.
//!
//! [`examples`] is explicitly not the route catalog described in §6 — a
//! real catalog covers every documented endpoint and is an external
//! collaborator this crate sits underneath, out of scope per spec.md §1.

pub mod examples {
    use crate::request::RouteIdentifier;

    pub fn get_current_user() -> RouteIdentifier {
        RouteIdentifier::new("/users/@me", "")
    }

    pub fn get_channel(channel_id: u64) -> RouteIdentifier {
        RouteIdentifier::new("/channels/{channel.id}", channel_id.to_string())
    }

    pub fn create_message(channel_id: u64) -> RouteIdentifier {
        RouteIdentifier::new("/channels/{channel.id}/messages", channel_id.to_string())
    }

    pub fn delete_message(channel_id: u64) -> RouteIdentifier {
        RouteIdentifier::new(
            "/channels/{channel.id}/messages/{message.id}",
            channel_id.to_string(),
        )
    }

    pub fn get_guild(guild_id: u64) -> RouteIdentifier {
        RouteIdentifier::new("/guilds/{guild.id}", guild_id.to_string())
    }

    /// Interaction callbacks aren't bound to the global limit (§4.D);
    /// callers build the request with `.bound_to_global(false)`.
    pub fn create_interaction_response(interaction_id: u64) -> RouteIdentifier {
        RouteIdentifier::new(
            "/interactions/{interaction.id}/{interaction.token}/callback",
            interaction_id.to_string(),
        )
    }
}
