//! Commonly used routes, grouped by resource

use super::Route;

// Gateway
pub const GET_GATEWAY: Route = Route::get("/gateway");
pub const GET_GATEWAY_BOT: Route = Route::get("/gateway/bot");

// Channels
pub const GET_CHANNEL: Route = Route::get("/channels/{channel.id}");
pub const MODIFY_CHANNEL: Route = Route::patch("/channels/{channel.id}");
pub const DELETE_CHANNEL: Route = Route::delete("/channels/{channel.id}");
pub const TRIGGER_TYPING: Route = Route::post("/channels/{channel.id}/typing");

// Messages
pub const GET_MESSAGES: Route = Route::get("/channels/{channel.id}/messages");
pub const CREATE_MESSAGE: Route = Route::post("/channels/{channel.id}/messages");
pub const GET_MESSAGE: Route = Route::get("/channels/{channel.id}/messages/{message.id}");
pub const EDIT_MESSAGE: Route = Route::patch("/channels/{channel.id}/messages/{message.id}");
pub const DELETE_MESSAGE: Route = Route::delete("/channels/{channel.id}/messages/{message.id}");
pub const BULK_DELETE_MESSAGES: Route = Route::post("/channels/{channel.id}/messages/bulk-delete");

// Reactions
pub const CREATE_REACTION: Route =
    Route::put("/channels/{channel.id}/messages/{message.id}/reactions/{emoji}/@me");
pub const DELETE_OWN_REACTION: Route =
    Route::delete("/channels/{channel.id}/messages/{message.id}/reactions/{emoji}/@me");
pub const DELETE_USER_REACTION: Route =
    Route::delete("/channels/{channel.id}/messages/{message.id}/reactions/{emoji}/{user.id}");
pub const GET_REACTIONS: Route =
    Route::get("/channels/{channel.id}/messages/{message.id}/reactions/{emoji}");
pub const DELETE_ALL_REACTIONS: Route =
    Route::delete("/channels/{channel.id}/messages/{message.id}/reactions");

// Guilds
pub const GET_GUILD: Route = Route::get("/guilds/{guild.id}");
pub const MODIFY_GUILD: Route = Route::patch("/guilds/{guild.id}");
pub const GET_GUILD_CHANNELS: Route = Route::get("/guilds/{guild.id}/channels");
pub const CREATE_GUILD_CHANNEL: Route = Route::post("/guilds/{guild.id}/channels");

// Members
pub const LIST_GUILD_MEMBERS: Route = Route::get("/guilds/{guild.id}/members");
pub const GET_GUILD_MEMBER: Route = Route::get("/guilds/{guild.id}/members/{user.id}");
pub const MODIFY_GUILD_MEMBER: Route = Route::patch("/guilds/{guild.id}/members/{user.id}");
pub const REMOVE_GUILD_MEMBER: Route = Route::delete("/guilds/{guild.id}/members/{user.id}");
pub const ADD_GUILD_MEMBER_ROLE: Route =
    Route::put("/guilds/{guild.id}/members/{user.id}/roles/{role.id}");
pub const REMOVE_GUILD_MEMBER_ROLE: Route =
    Route::delete("/guilds/{guild.id}/members/{user.id}/roles/{role.id}");

// Roles
pub const GET_GUILD_ROLES: Route = Route::get("/guilds/{guild.id}/roles");
pub const CREATE_GUILD_ROLE: Route = Route::post("/guilds/{guild.id}/roles");
pub const MODIFY_GUILD_ROLE: Route = Route::patch("/guilds/{guild.id}/roles/{role.id}");
pub const DELETE_GUILD_ROLE: Route = Route::delete("/guilds/{guild.id}/roles/{role.id}");

// Webhooks
pub const EXECUTE_WEBHOOK: Route = Route::post("/webhooks/{webhook.id}/{webhook.token}");
pub const GET_WEBHOOK_MESSAGE: Route =
    Route::get("/webhooks/{webhook.id}/{webhook.token}/messages/{message.id}");

// Invites
pub const GET_INVITE: Route = Route::get("/invites/{invite.code}");
pub const DELETE_INVITE: Route = Route::delete("/invites/{invite.code}");
pub const GET_CHANNEL_INVITES: Route = Route::get("/channels/{channel.id}/invites");
pub const CREATE_CHANNEL_INVITE: Route = Route::post("/channels/{channel.id}/invites");

// Users
pub const GET_CURRENT_USER: Route = Route::get("/users/@me");
pub const GET_USER: Route = Route::get("/users/{user.id}");
pub const CREATE_DM: Route = Route::post("/users/@me/channels");
