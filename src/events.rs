//! Event-type names used on the wire and emitted locally.
//!
//! Wire types travel inside the envelope's `type` field. Local events share
//! the same subscription surface but never appear on the wire.

/// Inbound and outbound wire event types.
pub mod wire {
    // Inbound (server -> client), re-emitted 1:1 as local events
    pub const NEW_MESSAGE: &str = "new_message";
    pub const TYPING_INDICATOR: &str = "typing_indicator";
    pub const USER_ONLINE: &str = "user_online";
    pub const USER_OFFLINE: &str = "user_offline";
    pub const FRIEND_REQUEST: &str = "friend_request";
    pub const FRIEND_REQUEST_ACCEPTED: &str = "friend_request_accepted";
    pub const GROUP_INVITATION: &str = "group_invitation";
    pub const GROUP_MEMBER_ADDED: &str = "group_member_added";
    pub const GROUP_MEMBER_REMOVED: &str = "group_member_removed";

    // Outbound (client -> server)
    pub const AUTHENTICATE: &str = "authenticate";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const JOIN_CHAT: &str = "join_chat";
    pub const LEAVE_CHAT: &str = "leave_chat";

    /// All inbound types the client recognizes and forwards to subscribers.
    ///
    /// Envelopes with a `type` outside this list are logged and dropped,
    /// so server-added event types never crash older clients.
    pub const INBOUND: &[&str] = &[
        NEW_MESSAGE,
        TYPING_INDICATOR,
        USER_ONLINE,
        USER_OFFLINE,
        FRIEND_REQUEST,
        FRIEND_REQUEST_ACCEPTED,
        GROUP_INVITATION,
        GROUP_MEMBER_ADDED,
        GROUP_MEMBER_REMOVED,
    ];
}

/// Local events emitted by the client itself.
pub mod local {
    /// Channel opened. Null payload.
    pub const CONNECTED: &str = "connected";
    /// Channel closed. Payload: `{"code": u16, "reason": string}`.
    pub const DISCONNECTED: &str = "disconnected";
    /// Automatic reconnection gave up. Null payload.
    pub const MAX_RECONNECT_ATTEMPTS_REACHED: &str = "max_reconnect_attempts_reached";
}
