//! Bot API method descriptors
//!
//! The static table driving the whole gateway: one descriptor per
//! upstream method, carrying its parameter specs, destination-scoped
//! flag, cache TTL, uploadable slots, and cross-field rules. No
//! per-method code paths anywhere else; the pipeline reads this table.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Rough functional grouping, used by the meta tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Messaging,
    ChatManagement,
    Stickers,
    Inline,
    Payments,
    Games,
    Updates,
    Forum,
    Business,
    Misc,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Messaging => "messaging",
            Category::ChatManagement => "chat_management",
            Category::Stickers => "stickers",
            Category::Inline => "inline",
            Category::Payments => "payments",
            Category::Games => "games",
            Category::Updates => "updates",
            Category::Forum => "forum",
            Category::Business => "business",
            Category::Misc => "misc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "messaging" => Some(Category::Messaging),
            "chat_management" => Some(Category::ChatManagement),
            "stickers" => Some(Category::Stickers),
            "inline" => Some(Category::Inline),
            "payments" => Some(Category::Payments),
            "games" => Some(Category::Games),
            "updates" => Some(Category::Updates),
            "forum" => Some(Category::Forum),
            "business" => Some(Category::Business),
            "misc" => Some(Category::Misc),
            _ => None,
        }
    }
}

/// Parameter type constraint. `Any` means presence-only checking.
#[derive(Debug, Clone)]
pub enum ParamKind {
    Any,
    Str,
    Int,
    IntRange(i64, i64),
    Num,
    NumRange(f64, f64),
    Bool,
    Choice(&'static [&'static str]),
    Array,
    Object,
    /// Integer id or `@username` string.
    ChatId,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

/// How an uploadable slot nests its file values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadShape {
    /// The slot value itself may be a file.
    Direct,
    /// Object whose listed fields may be files.
    Object(&'static [&'static str]),
    /// Array of objects whose listed fields may be files.
    Array(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub param: &'static str,
    pub shape: UploadShape,
}

/// Cross-field requirements beyond per-parameter checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossRule {
    None,
    /// `chat_id` + `message_id` together, or `inline_message_id` alone.
    ChatMessageOrInline,
}

/// Everything the pipeline needs to know about one upstream method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub params: Vec<ParamSpec>,
    pub destination_scoped: bool,
    pub cache_ttl: Option<Duration>,
    pub uploads: Vec<UploadSlot>,
    pub cross_rule: CrossRule,
}

impl MethodDescriptor {
    fn new(name: &'static str, description: &'static str, category: Category) -> Self {
        Self {
            name,
            description,
            category,
            params: Vec::new(),
            destination_scoped: false,
            cache_ttl: None,
            uploads: Vec::new(),
            cross_rule: CrossRule::None,
        }
    }

    fn req(mut self, name: &'static str, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name,
            kind,
            required: true,
        });
        self
    }

    fn opt(mut self, name: &'static str, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name,
            kind,
            required: false,
        });
        self
    }

    /// Mark as destination-scoped (subject to per-chat pacing).
    fn dest(mut self) -> Self {
        self.destination_scoped = true;
        self
    }

    fn cache(mut self, secs: u64) -> Self {
        self.cache_ttl = Some(Duration::from_secs(secs));
        self
    }

    fn upload(mut self, param: &'static str, shape: UploadShape) -> Self {
        self.uploads.push(UploadSlot { param, shape });
        self
    }

    fn cross(mut self, rule: CrossRule) -> Self {
        self.cross_rule = rule;
        self
    }

    /// Common optional parameters on every send-type method.
    fn send_opts(self) -> Self {
        self.opt("business_connection_id", ParamKind::Str)
            .opt("message_thread_id", ParamKind::Int)
            .opt("disable_notification", ParamKind::Bool)
            .opt("protect_content", ParamKind::Bool)
            .opt("allow_paid_broadcast", ParamKind::Bool)
            .opt("message_effect_id", ParamKind::Str)
            .opt("reply_parameters", ParamKind::Object)
            .opt("reply_markup", ParamKind::Object)
    }

    /// Common optional caption parameters on media send methods.
    fn caption_opts(self) -> Self {
        self.opt("caption", ParamKind::Str)
            .opt("parse_mode", ParamKind::Choice(PARSE_MODES))
            .opt("caption_entities", ParamKind::Array)
            .opt("show_caption_above_media", ParamKind::Bool)
    }

    pub fn required_names(&self) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect()
    }

    pub fn optional_names(&self) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| !p.required)
            .map(|p| p.name)
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_cacheable(&self) -> bool {
        self.cache_ttl.is_some()
    }

    /// JSON Schema fragment for the MCP tool surface.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for param in &self.params {
            properties.insert(param.name.to_string(), kind_schema(&param.kind));
        }

        let required: Vec<&str> = self.required_names();
        let mut schema = json!({
            "type": "object",
            "properties": Value::Object(properties),
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

fn kind_schema(kind: &ParamKind) -> Value {
    match kind {
        ParamKind::Any => json!({}),
        ParamKind::Str => json!({"type": "string"}),
        ParamKind::Int => json!({"type": "integer"}),
        ParamKind::IntRange(min, max) => json!({"type": "integer", "minimum": min, "maximum": max}),
        ParamKind::Num => json!({"type": "number"}),
        ParamKind::NumRange(min, max) => json!({"type": "number", "minimum": min, "maximum": max}),
        ParamKind::Bool => json!({"type": "boolean"}),
        ParamKind::Choice(options) => json!({"type": "string", "enum": options}),
        ParamKind::Array => json!({"type": "array"}),
        ParamKind::Object => json!({"type": "object"}),
        ParamKind::ChatId => json!({"anyOf": [{"type": "integer"}, {"type": "string"}]}),
    }
}

const PARSE_MODES: &[&str] = &["MarkdownV2", "HTML", "Markdown"];
const STICKER_FORMATS: &[&str] = &["static", "animated", "video"];
const CHAT_ACTIONS: &[&str] = &[
    "typing",
    "upload_photo",
    "record_video",
    "upload_video",
    "record_voice",
    "upload_voice",
    "upload_document",
    "choose_sticker",
    "find_location",
    "record_video_note",
    "upload_video_note",
];

fn build_registry() -> HashMap<&'static str, MethodDescriptor> {
    use Category::*;
    use ParamKind::*;

    let descriptors = vec![
        // ── Updates & identity ──────────────────────────────────────────
        MethodDescriptor::new("getUpdates", "Receive incoming updates via long polling", Updates)
            .opt("offset", Int)
            .opt("limit", IntRange(1, 100))
            .opt("timeout", Int)
            .opt("allowed_updates", Array),
        MethodDescriptor::new("setWebhook", "Specify a URL to receive incoming updates", Updates)
            .req("url", Str)
            .opt("certificate", Any)
            .opt("ip_address", Str)
            .opt("max_connections", IntRange(1, 100))
            .opt("allowed_updates", Array)
            .opt("drop_pending_updates", Bool)
            .opt("secret_token", Str)
            .upload("certificate", UploadShape::Direct),
        MethodDescriptor::new("deleteWebhook", "Remove webhook integration", Updates)
            .opt("drop_pending_updates", Bool),
        MethodDescriptor::new("getWebhookInfo", "Get current webhook status", Updates).cache(60),
        MethodDescriptor::new("getMe", "Get basic information about the bot", Misc).cache(3600),
        MethodDescriptor::new("logOut", "Log out from the cloud Bot API server", Misc),
        MethodDescriptor::new("close", "Close the bot instance before moving it", Misc),

        // ── Messaging ───────────────────────────────────────────────────
        MethodDescriptor::new("sendMessage", "Send a text message", Messaging)
            .req("chat_id", ChatId)
            .req("text", Str)
            .opt("parse_mode", Choice(PARSE_MODES))
            .opt("entities", Array)
            .opt("link_preview_options", Object)
            .send_opts()
            .dest(),
        MethodDescriptor::new("forwardMessage", "Forward a message", Messaging)
            .req("chat_id", ChatId)
            .req("from_chat_id", ChatId)
            .req("message_id", Int)
            .opt("message_thread_id", Int)
            .opt("video_start_timestamp", Int)
            .opt("disable_notification", Bool)
            .opt("protect_content", Bool)
            .dest(),
        MethodDescriptor::new("forwardMessages", "Forward multiple messages", Messaging)
            .req("chat_id", ChatId)
            .req("from_chat_id", ChatId)
            .req("message_ids", Array)
            .opt("message_thread_id", Int)
            .opt("disable_notification", Bool)
            .opt("protect_content", Bool)
            .dest(),
        MethodDescriptor::new("copyMessage", "Copy a message without a link to the original", Messaging)
            .req("chat_id", ChatId)
            .req("from_chat_id", ChatId)
            .req("message_id", Int)
            .opt("video_start_timestamp", Int)
            .caption_opts()
            .send_opts()
            .dest(),
        MethodDescriptor::new("copyMessages", "Copy multiple messages", Messaging)
            .req("chat_id", ChatId)
            .req("from_chat_id", ChatId)
            .req("message_ids", Array)
            .opt("message_thread_id", Int)
            .opt("disable_notification", Bool)
            .opt("protect_content", Bool)
            .opt("remove_caption", Bool)
            .dest(),
        MethodDescriptor::new("sendPhoto", "Send a photo", Messaging)
            .req("chat_id", ChatId)
            .req("photo", Any)
            .caption_opts()
            .opt("has_spoiler", Bool)
            .send_opts()
            .upload("photo", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendAudio", "Send an audio file", Messaging)
            .req("chat_id", ChatId)
            .req("audio", Any)
            .caption_opts()
            .opt("duration", Int)
            .opt("performer", Str)
            .opt("title", Str)
            .opt("thumbnail", Any)
            .send_opts()
            .upload("audio", UploadShape::Direct)
            .upload("thumbnail", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendDocument", "Send a general file", Messaging)
            .req("chat_id", ChatId)
            .req("document", Any)
            .opt("thumbnail", Any)
            .caption_opts()
            .opt("disable_content_type_detection", Bool)
            .send_opts()
            .upload("document", UploadShape::Direct)
            .upload("thumbnail", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendVideo", "Send a video", Messaging)
            .req("chat_id", ChatId)
            .req("video", Any)
            .opt("duration", Int)
            .opt("width", Int)
            .opt("height", Int)
            .opt("thumbnail", Any)
            .opt("cover", Any)
            .opt("start_timestamp", Int)
            .caption_opts()
            .opt("has_spoiler", Bool)
            .opt("supports_streaming", Bool)
            .send_opts()
            .upload("video", UploadShape::Direct)
            .upload("thumbnail", UploadShape::Direct)
            .upload("cover", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendAnimation", "Send an animation (GIF or soundless video)", Messaging)
            .req("chat_id", ChatId)
            .req("animation", Any)
            .opt("duration", Int)
            .opt("width", Int)
            .opt("height", Int)
            .opt("thumbnail", Any)
            .caption_opts()
            .opt("has_spoiler", Bool)
            .send_opts()
            .upload("animation", UploadShape::Direct)
            .upload("thumbnail", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendVoice", "Send a voice message", Messaging)
            .req("chat_id", ChatId)
            .req("voice", Any)
            .caption_opts()
            .opt("duration", Int)
            .send_opts()
            .upload("voice", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendVideoNote", "Send a round video message", Messaging)
            .req("chat_id", ChatId)
            .req("video_note", Any)
            .opt("duration", Int)
            .opt("length", Int)
            .opt("thumbnail", Any)
            .send_opts()
            .upload("video_note", UploadShape::Direct)
            .upload("thumbnail", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("sendPaidMedia", "Send paid media", Messaging)
            .req("chat_id", ChatId)
            .req("star_count", IntRange(1, 10_000))
            .req("media", Array)
            .opt("payload", Str)
            .caption_opts()
            .send_opts()
            .upload("media", UploadShape::Array(&["media", "thumbnail", "cover"]))
            .dest(),
        MethodDescriptor::new("sendMediaGroup", "Send a group of photos, videos, documents or audios as an album", Messaging)
            .req("chat_id", ChatId)
            .req("media", Array)
            .send_opts()
            .upload("media", UploadShape::Array(&["media", "thumbnail", "cover"]))
            .dest(),
        MethodDescriptor::new("sendLocation", "Send a point on the map", Messaging)
            .req("chat_id", ChatId)
            .req("latitude", NumRange(-90.0, 90.0))
            .req("longitude", NumRange(-180.0, 180.0))
            .opt("horizontal_accuracy", NumRange(0.0, 1500.0))
            .opt("live_period", Int)
            .opt("heading", IntRange(1, 360))
            .opt("proximity_alert_radius", IntRange(1, 100_000))
            .send_opts()
            .dest(),
        MethodDescriptor::new("sendVenue", "Send information about a venue", Messaging)
            .req("chat_id", ChatId)
            .req("latitude", NumRange(-90.0, 90.0))
            .req("longitude", NumRange(-180.0, 180.0))
            .req("title", Str)
            .req("address", Str)
            .opt("foursquare_id", Str)
            .opt("foursquare_type", Str)
            .opt("google_place_id", Str)
            .opt("google_place_type", Str)
            .send_opts()
            .dest(),
        MethodDescriptor::new("sendContact", "Send a phone contact", Messaging)
            .req("chat_id", ChatId)
            .req("phone_number", Str)
            .req("first_name", Str)
            .opt("last_name", Str)
            .opt("vcard", Str)
            .send_opts()
            .dest(),
        MethodDescriptor::new("sendPoll", "Send a native poll", Messaging)
            .req("chat_id", ChatId)
            .req("question", Str)
            .req("options", Array)
            .opt("question_parse_mode", Choice(PARSE_MODES))
            .opt("is_anonymous", Bool)
            .opt("type", Choice(&["quiz", "regular"]))
            .opt("allows_multiple_answers", Bool)
            .opt("correct_option_id", Int)
            .opt("explanation", Str)
            .opt("explanation_parse_mode", Choice(PARSE_MODES))
            .opt("open_period", IntRange(5, 600))
            .opt("close_date", Int)
            .opt("is_closed", Bool)
            .send_opts()
            .dest(),
        MethodDescriptor::new("sendDice", "Send an animated emoji with a random value", Messaging)
            .req("chat_id", ChatId)
            .opt("emoji", Choice(&["🎲", "🎯", "🏀", "⚽", "🎳", "🎰"]))
            .send_opts()
            .dest(),
        MethodDescriptor::new("sendChatAction", "Tell the user something is happening on the bot's side", Messaging)
            .req("chat_id", ChatId)
            .req("action", Choice(CHAT_ACTIONS))
            .opt("business_connection_id", Str)
            .opt("message_thread_id", Int)
            .dest(),
        MethodDescriptor::new("setMessageReaction", "Change reactions on a message", Messaging)
            .req("chat_id", ChatId)
            .req("message_id", Int)
            .opt("reaction", Array)
            .opt("is_big", Bool),
        MethodDescriptor::new("getUserProfilePhotos", "Get a user's profile pictures", Misc)
            .req("user_id", Int)
            .opt("offset", Int)
            .opt("limit", IntRange(1, 100))
            .cache(120),
        MethodDescriptor::new("setUserEmojiStatus", "Change a user's emoji status", Misc)
            .req("user_id", Int)
            .opt("emoji_status_custom_emoji_id", Str)
            .opt("emoji_status_expiration_date", Int),
        MethodDescriptor::new("getFile", "Get basic info about a file for downloading", Misc)
            .req("file_id", Str),

        // ── Message editing ─────────────────────────────────────────────
        MethodDescriptor::new("editMessageText", "Edit text of a message", Messaging)
            .req("text", Str)
            .opt("business_connection_id", Str)
            .opt("chat_id", ChatId)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .opt("parse_mode", Choice(PARSE_MODES))
            .opt("entities", Array)
            .opt("link_preview_options", Object)
            .opt("reply_markup", Object)
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("editMessageCaption", "Edit caption of a message", Messaging)
            .opt("business_connection_id", Str)
            .opt("chat_id", ChatId)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .caption_opts()
            .opt("reply_markup", Object)
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("editMessageMedia", "Edit animation, audio, document, photo, or video of a message", Messaging)
            .req("media", Object)
            .opt("business_connection_id", Str)
            .opt("chat_id", ChatId)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .opt("reply_markup", Object)
            .upload("media", UploadShape::Object(&["media", "thumbnail", "cover"]))
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("editMessageLiveLocation", "Edit a live location message", Messaging)
            .req("latitude", NumRange(-90.0, 90.0))
            .req("longitude", NumRange(-180.0, 180.0))
            .opt("business_connection_id", Str)
            .opt("chat_id", ChatId)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .opt("live_period", Int)
            .opt("horizontal_accuracy", NumRange(0.0, 1500.0))
            .opt("heading", IntRange(1, 360))
            .opt("proximity_alert_radius", IntRange(1, 100_000))
            .opt("reply_markup", Object)
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("stopMessageLiveLocation", "Stop updating a live location", Messaging)
            .opt("business_connection_id", Str)
            .opt("chat_id", ChatId)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .opt("reply_markup", Object)
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("editMessageReplyMarkup", "Edit only the reply markup of a message", Messaging)
            .opt("business_connection_id", Str)
            .opt("chat_id", ChatId)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .opt("reply_markup", Object)
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("stopPoll", "Stop a poll", Messaging)
            .req("chat_id", ChatId)
            .req("message_id", Int)
            .opt("business_connection_id", Str)
            .opt("reply_markup", Object),
        MethodDescriptor::new("deleteMessage", "Delete a message", Messaging)
            .req("chat_id", ChatId)
            .req("message_id", Int),
        MethodDescriptor::new("deleteMessages", "Delete multiple messages", Messaging)
            .req("chat_id", ChatId)
            .req("message_ids", Array),

        // ── Chat management ─────────────────────────────────────────────
        MethodDescriptor::new("banChatMember", "Ban a user in a group, supergroup or channel", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int)
            .opt("until_date", Int)
            .opt("revoke_messages", Bool),
        MethodDescriptor::new("unbanChatMember", "Unban a previously banned user", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int)
            .opt("only_if_banned", Bool),
        MethodDescriptor::new("restrictChatMember", "Restrict a user in a supergroup", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int)
            .req("permissions", Object)
            .opt("use_independent_chat_permissions", Bool)
            .opt("until_date", Int),
        MethodDescriptor::new("promoteChatMember", "Promote or demote a user in a supergroup or channel", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int)
            .opt("is_anonymous", Bool)
            .opt("can_manage_chat", Bool)
            .opt("can_delete_messages", Bool)
            .opt("can_manage_video_chats", Bool)
            .opt("can_restrict_members", Bool)
            .opt("can_promote_members", Bool)
            .opt("can_change_info", Bool)
            .opt("can_invite_users", Bool)
            .opt("can_post_stories", Bool)
            .opt("can_edit_stories", Bool)
            .opt("can_delete_stories", Bool)
            .opt("can_post_messages", Bool)
            .opt("can_edit_messages", Bool)
            .opt("can_pin_messages", Bool)
            .opt("can_manage_topics", Bool),
        MethodDescriptor::new("setChatAdministratorCustomTitle", "Set a custom title for an administrator", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int)
            .req("custom_title", Str),
        MethodDescriptor::new("banChatSenderChat", "Ban a channel chat in a supergroup or channel", ChatManagement)
            .req("chat_id", ChatId)
            .req("sender_chat_id", Int),
        MethodDescriptor::new("unbanChatSenderChat", "Unban a previously banned channel chat", ChatManagement)
            .req("chat_id", ChatId)
            .req("sender_chat_id", Int),
        MethodDescriptor::new("setChatPermissions", "Set default chat permissions for all members", ChatManagement)
            .req("chat_id", ChatId)
            .req("permissions", Object)
            .opt("use_independent_chat_permissions", Bool),
        MethodDescriptor::new("exportChatInviteLink", "Generate a new primary invite link", ChatManagement)
            .req("chat_id", ChatId),
        MethodDescriptor::new("createChatInviteLink", "Create an additional invite link", ChatManagement)
            .req("chat_id", ChatId)
            .opt("name", Str)
            .opt("expire_date", Int)
            .opt("member_limit", IntRange(1, 99_999))
            .opt("creates_join_request", Bool),
        MethodDescriptor::new("editChatInviteLink", "Edit a non-primary invite link", ChatManagement)
            .req("chat_id", ChatId)
            .req("invite_link", Str)
            .opt("name", Str)
            .opt("expire_date", Int)
            .opt("member_limit", IntRange(1, 99_999))
            .opt("creates_join_request", Bool),
        MethodDescriptor::new("createChatSubscriptionInviteLink", "Create a subscription invite link", ChatManagement)
            .req("chat_id", ChatId)
            .req("subscription_period", Int)
            .req("subscription_price", IntRange(1, 10_000))
            .opt("name", Str),
        MethodDescriptor::new("editChatSubscriptionInviteLink", "Edit a subscription invite link", ChatManagement)
            .req("chat_id", ChatId)
            .req("invite_link", Str)
            .opt("name", Str),
        MethodDescriptor::new("revokeChatInviteLink", "Revoke an invite link", ChatManagement)
            .req("chat_id", ChatId)
            .req("invite_link", Str),
        MethodDescriptor::new("approveChatJoinRequest", "Approve a chat join request", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int),
        MethodDescriptor::new("declineChatJoinRequest", "Decline a chat join request", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int),
        MethodDescriptor::new("setChatPhoto", "Set a new chat photo", ChatManagement)
            .req("chat_id", ChatId)
            .req("photo", Any)
            .upload("photo", UploadShape::Direct),
        MethodDescriptor::new("deleteChatPhoto", "Delete the chat photo", ChatManagement)
            .req("chat_id", ChatId),
        MethodDescriptor::new("setChatTitle", "Change the title of a chat", ChatManagement)
            .req("chat_id", ChatId)
            .req("title", Str),
        MethodDescriptor::new("setChatDescription", "Change the description of a chat", ChatManagement)
            .req("chat_id", ChatId)
            .opt("description", Str),
        MethodDescriptor::new("pinChatMessage", "Pin a message in a chat", ChatManagement)
            .req("chat_id", ChatId)
            .req("message_id", Int)
            .opt("business_connection_id", Str)
            .opt("disable_notification", Bool),
        MethodDescriptor::new("unpinChatMessage", "Unpin a message in a chat", ChatManagement)
            .req("chat_id", ChatId)
            .opt("business_connection_id", Str)
            .opt("message_id", Int),
        MethodDescriptor::new("unpinAllChatMessages", "Unpin all messages in a chat", ChatManagement)
            .req("chat_id", ChatId),
        MethodDescriptor::new("leaveChat", "Leave a group, supergroup or channel", ChatManagement)
            .req("chat_id", ChatId),
        MethodDescriptor::new("getChat", "Get up-to-date information about a chat", ChatManagement)
            .req("chat_id", ChatId)
            .cache(120),
        MethodDescriptor::new("getChatAdministrators", "Get the list of chat administrators", ChatManagement)
            .req("chat_id", ChatId)
            .cache(120),
        MethodDescriptor::new("getChatMemberCount", "Get the number of members in a chat", ChatManagement)
            .req("chat_id", ChatId)
            .cache(120),
        MethodDescriptor::new("getChatMember", "Get information about a chat member", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int),
        MethodDescriptor::new("setChatStickerSet", "Set the group sticker set", ChatManagement)
            .req("chat_id", ChatId)
            .req("sticker_set_name", Str),
        MethodDescriptor::new("deleteChatStickerSet", "Delete the group sticker set", ChatManagement)
            .req("chat_id", ChatId),
        MethodDescriptor::new("answerCallbackQuery", "Answer a callback query from an inline keyboard", Messaging)
            .req("callback_query_id", Str)
            .opt("text", Str)
            .opt("show_alert", Bool)
            .opt("url", Str)
            .opt("cache_time", Int),
        MethodDescriptor::new("getUserChatBoosts", "Get boosts a user added to a chat", ChatManagement)
            .req("chat_id", ChatId)
            .req("user_id", Int),

        // ── Forum topics ────────────────────────────────────────────────
        MethodDescriptor::new("getForumTopicIconStickers", "Get custom emoji stickers usable as topic icons", Forum)
            .cache(3600),
        MethodDescriptor::new("createForumTopic", "Create a topic in a forum supergroup", Forum)
            .req("chat_id", ChatId)
            .req("name", Str)
            .opt("icon_color", Int)
            .opt("icon_custom_emoji_id", Str),
        MethodDescriptor::new("editForumTopic", "Edit name and icon of a forum topic", Forum)
            .req("chat_id", ChatId)
            .req("message_thread_id", Int)
            .opt("name", Str)
            .opt("icon_custom_emoji_id", Str),
        MethodDescriptor::new("closeForumTopic", "Close an open forum topic", Forum)
            .req("chat_id", ChatId)
            .req("message_thread_id", Int),
        MethodDescriptor::new("reopenForumTopic", "Reopen a closed forum topic", Forum)
            .req("chat_id", ChatId)
            .req("message_thread_id", Int),
        MethodDescriptor::new("deleteForumTopic", "Delete a forum topic with all its messages", Forum)
            .req("chat_id", ChatId)
            .req("message_thread_id", Int),
        MethodDescriptor::new("unpinAllForumTopicMessages", "Unpin all messages in a forum topic", Forum)
            .req("chat_id", ChatId)
            .req("message_thread_id", Int),
        MethodDescriptor::new("editGeneralForumTopic", "Edit the General topic name", Forum)
            .req("chat_id", ChatId)
            .req("name", Str),
        MethodDescriptor::new("closeGeneralForumTopic", "Close the General forum topic", Forum)
            .req("chat_id", ChatId),
        MethodDescriptor::new("reopenGeneralForumTopic", "Reopen the General forum topic", Forum)
            .req("chat_id", ChatId),
        MethodDescriptor::new("hideGeneralForumTopic", "Hide the General forum topic", Forum)
            .req("chat_id", ChatId),
        MethodDescriptor::new("unhideGeneralForumTopic", "Unhide the General forum topic", Forum)
            .req("chat_id", ChatId),
        MethodDescriptor::new("unpinAllGeneralForumTopicMessages", "Unpin all messages in the General topic", Forum)
            .req("chat_id", ChatId),

        // ── Bot profile ─────────────────────────────────────────────────
        MethodDescriptor::new("setMyCommands", "Set the bot's command list", Misc)
            .req("commands", Array)
            .opt("scope", Object)
            .opt("language_code", Str),
        MethodDescriptor::new("deleteMyCommands", "Delete the bot's command list", Misc)
            .opt("scope", Object)
            .opt("language_code", Str),
        MethodDescriptor::new("getMyCommands", "Get the bot's command list", Misc)
            .opt("scope", Object)
            .opt("language_code", Str)
            .cache(300),
        MethodDescriptor::new("setMyName", "Change the bot's name", Misc)
            .opt("name", Str)
            .opt("language_code", Str),
        MethodDescriptor::new("getMyName", "Get the bot's name", Misc)
            .opt("language_code", Str)
            .cache(600),
        MethodDescriptor::new("setMyDescription", "Change the bot's description", Misc)
            .opt("description", Str)
            .opt("language_code", Str),
        MethodDescriptor::new("getMyDescription", "Get the bot's description", Misc)
            .opt("language_code", Str)
            .cache(600),
        MethodDescriptor::new("setMyShortDescription", "Change the bot's short description", Misc)
            .opt("short_description", Str)
            .opt("language_code", Str),
        MethodDescriptor::new("getMyShortDescription", "Get the bot's short description", Misc)
            .opt("language_code", Str)
            .cache(600),
        MethodDescriptor::new("setChatMenuButton", "Change the bot's menu button", Misc)
            .opt("chat_id", Int)
            .opt("menu_button", Object),
        MethodDescriptor::new("getChatMenuButton", "Get the bot's current menu button", Misc)
            .opt("chat_id", Int)
            .cache(300),
        MethodDescriptor::new("setMyDefaultAdministratorRights", "Change default administrator rights", Misc)
            .opt("rights", Object)
            .opt("for_channels", Bool),
        MethodDescriptor::new("getMyDefaultAdministratorRights", "Get default administrator rights", Misc)
            .opt("for_channels", Bool),

        // ── Stickers ────────────────────────────────────────────────────
        MethodDescriptor::new("sendSticker", "Send a static, animated, or video sticker", Stickers)
            .req("chat_id", ChatId)
            .req("sticker", Any)
            .opt("emoji", Str)
            .send_opts()
            .upload("sticker", UploadShape::Direct)
            .dest(),
        MethodDescriptor::new("getStickerSet", "Get a sticker set", Stickers)
            .req("name", Str)
            .cache(300),
        MethodDescriptor::new("getCustomEmojiStickers", "Get custom emoji stickers by id", Stickers)
            .req("custom_emoji_ids", Array)
            .cache(600),
        MethodDescriptor::new("uploadStickerFile", "Upload a sticker file for later use", Stickers)
            .req("user_id", Int)
            .req("sticker", Any)
            .req("sticker_format", Choice(STICKER_FORMATS))
            .upload("sticker", UploadShape::Direct),
        MethodDescriptor::new("createNewStickerSet", "Create a new sticker set owned by a user", Stickers)
            .req("user_id", Int)
            .req("name", Str)
            .req("title", Str)
            .req("stickers", Array)
            .opt("sticker_type", Choice(&["regular", "mask", "custom_emoji"]))
            .opt("needs_repainting", Bool)
            .upload("stickers", UploadShape::Array(&["sticker"])),
        MethodDescriptor::new("addStickerToSet", "Add a new sticker to a set", Stickers)
            .req("user_id", Int)
            .req("name", Str)
            .req("sticker", Object)
            .upload("sticker", UploadShape::Object(&["sticker"])),
        MethodDescriptor::new("setStickerPositionInSet", "Move a sticker to a position in its set", Stickers)
            .req("sticker", Str)
            .req("position", Int),
        MethodDescriptor::new("deleteStickerFromSet", "Delete a sticker from its set", Stickers)
            .req("sticker", Str),
        MethodDescriptor::new("replaceStickerInSet", "Replace an existing sticker in a set", Stickers)
            .req("user_id", Int)
            .req("name", Str)
            .req("old_sticker", Str)
            .req("sticker", Object)
            .upload("sticker", UploadShape::Object(&["sticker"])),
        MethodDescriptor::new("setStickerEmojiList", "Change the emoji assigned to a sticker", Stickers)
            .req("sticker", Str)
            .req("emoji_list", Array),
        MethodDescriptor::new("setStickerKeywords", "Change search keywords of a sticker", Stickers)
            .req("sticker", Str)
            .opt("keywords", Array),
        MethodDescriptor::new("setStickerMaskPosition", "Change the mask position of a mask sticker", Stickers)
            .req("sticker", Str)
            .opt("mask_position", Object),
        MethodDescriptor::new("setStickerSetTitle", "Set the title of a sticker set", Stickers)
            .req("name", Str)
            .req("title", Str),
        MethodDescriptor::new("setStickerSetThumbnail", "Set the thumbnail of a sticker set", Stickers)
            .req("name", Str)
            .req("user_id", Int)
            .req("format", Choice(STICKER_FORMATS))
            .opt("thumbnail", Any)
            .upload("thumbnail", UploadShape::Direct),
        MethodDescriptor::new("setCustomEmojiStickerSetThumbnail", "Set the thumbnail of a custom emoji sticker set", Stickers)
            .req("name", Str)
            .opt("custom_emoji_id", Str),
        MethodDescriptor::new("deleteStickerSet", "Delete a sticker set", Stickers)
            .req("name", Str),

        // ── Gifts & verification ────────────────────────────────────────
        MethodDescriptor::new("getAvailableGifts", "Get gifts the bot can send", Misc).cache(3600),
        MethodDescriptor::new("sendGift", "Send a gift to a user or chat", Misc)
            .req("gift_id", Str)
            .opt("user_id", Int)
            .opt("chat_id", ChatId)
            .opt("pay_for_upgrade", Bool)
            .opt("text", Str)
            .opt("text_parse_mode", Choice(PARSE_MODES))
            .opt("text_entities", Array),
        MethodDescriptor::new("giftPremiumSubscription", "Gift a Telegram Premium subscription", Misc)
            .req("user_id", Int)
            .req("month_count", IntRange(1, 12))
            .req("star_count", Int)
            .opt("text", Str)
            .opt("text_parse_mode", Choice(PARSE_MODES))
            .opt("text_entities", Array),
        MethodDescriptor::new("verifyUser", "Verify a user on behalf of the organization", Misc)
            .req("user_id", Int)
            .opt("custom_description", Str),
        MethodDescriptor::new("verifyChat", "Verify a chat on behalf of the organization", Misc)
            .req("chat_id", ChatId)
            .opt("custom_description", Str),
        MethodDescriptor::new("removeUserVerification", "Remove verification from a user", Misc)
            .req("user_id", Int),
        MethodDescriptor::new("removeChatVerification", "Remove verification from a chat", Misc)
            .req("chat_id", ChatId),

        // ── Business accounts ───────────────────────────────────────────
        MethodDescriptor::new("getBusinessConnection", "Get information about a business connection", Business)
            .req("business_connection_id", Str)
            .cache(300),
        MethodDescriptor::new("readBusinessMessage", "Mark a business message as read", Business)
            .req("business_connection_id", Str)
            .req("chat_id", Int)
            .req("message_id", Int),
        MethodDescriptor::new("deleteBusinessMessages", "Delete messages on behalf of a business account", Business)
            .req("business_connection_id", Str)
            .req("message_ids", Array),
        MethodDescriptor::new("setBusinessAccountName", "Change the first and last name of a business account", Business)
            .req("business_connection_id", Str)
            .req("first_name", Str)
            .opt("last_name", Str),
        MethodDescriptor::new("setBusinessAccountUsername", "Change the username of a business account", Business)
            .req("business_connection_id", Str)
            .opt("username", Str),
        MethodDescriptor::new("setBusinessAccountBio", "Change the bio of a business account", Business)
            .req("business_connection_id", Str)
            .opt("bio", Str),
        MethodDescriptor::new("setBusinessAccountProfilePhoto", "Change the profile photo of a business account", Business)
            .req("business_connection_id", Str)
            .req("photo", Object)
            .opt("is_public", Bool)
            .upload("photo", UploadShape::Object(&["photo", "animation"])),
        MethodDescriptor::new("removeBusinessAccountProfilePhoto", "Remove the profile photo of a business account", Business)
            .req("business_connection_id", Str)
            .opt("is_public", Bool),
        MethodDescriptor::new("setBusinessAccountGiftSettings", "Change gift acceptance settings of a business account", Business)
            .req("business_connection_id", Str)
            .req("show_gift_button", Bool)
            .req("accepted_gift_types", Object),
        MethodDescriptor::new("getBusinessAccountStarBalance", "Get the Star balance of a business account", Business)
            .req("business_connection_id", Str),
        MethodDescriptor::new("transferBusinessAccountStars", "Transfer Stars from the business account balance", Business)
            .req("business_connection_id", Str)
            .req("star_count", IntRange(1, 10_000)),
        MethodDescriptor::new("getBusinessAccountGifts", "Get gifts owned by a business account", Business)
            .req("business_connection_id", Str)
            .opt("exclude_unsaved", Bool)
            .opt("exclude_saved", Bool)
            .opt("exclude_unlimited", Bool)
            .opt("exclude_limited", Bool)
            .opt("exclude_unique", Bool)
            .opt("sort_by_price", Bool)
            .opt("offset", Str)
            .opt("limit", IntRange(1, 100)),
        MethodDescriptor::new("convertGiftToStars", "Convert an owned gift to Stars", Business)
            .req("business_connection_id", Str)
            .req("owned_gift_id", Str),
        MethodDescriptor::new("upgradeGift", "Upgrade an owned regular gift to a unique one", Business)
            .req("business_connection_id", Str)
            .req("owned_gift_id", Str)
            .opt("keep_original_details", Bool)
            .opt("star_count", Int),
        MethodDescriptor::new("transferGift", "Transfer an owned unique gift to another user", Business)
            .req("business_connection_id", Str)
            .req("owned_gift_id", Str)
            .req("new_owner_chat_id", Int)
            .opt("star_count", Int),
        MethodDescriptor::new("postStory", "Post a story on behalf of a business account", Business)
            .req("business_connection_id", Str)
            .req("content", Object)
            .req("active_period", Int)
            .opt("caption", Str)
            .opt("parse_mode", Choice(PARSE_MODES))
            .opt("caption_entities", Array)
            .opt("areas", Array)
            .opt("post_to_chat_page", Bool)
            .opt("protect_content", Bool)
            .upload("content", UploadShape::Object(&["photo", "video"])),
        MethodDescriptor::new("editStory", "Edit a story posted by the bot", Business)
            .req("business_connection_id", Str)
            .req("story_id", Int)
            .req("content", Object)
            .opt("caption", Str)
            .opt("parse_mode", Choice(PARSE_MODES))
            .opt("caption_entities", Array)
            .opt("areas", Array)
            .upload("content", UploadShape::Object(&["photo", "video"])),
        MethodDescriptor::new("deleteStory", "Delete a story posted by the bot", Business)
            .req("business_connection_id", Str)
            .req("story_id", Int),

        // ── Inline mode ─────────────────────────────────────────────────
        MethodDescriptor::new("answerInlineQuery", "Answer an inline query", Inline)
            .req("inline_query_id", Str)
            .req("results", Array)
            .opt("cache_time", Int)
            .opt("is_personal", Bool)
            .opt("next_offset", Str)
            .opt("button", Object),
        MethodDescriptor::new("answerWebAppQuery", "Set the result of a Web App interaction", Inline)
            .req("web_app_query_id", Str)
            .req("result", Object),
        MethodDescriptor::new("savePreparedInlineMessage", "Store a message to be sent by a user of a Mini App", Inline)
            .req("user_id", Int)
            .req("result", Object)
            .opt("allow_user_chats", Bool)
            .opt("allow_bot_chats", Bool)
            .opt("allow_group_chats", Bool)
            .opt("allow_channel_chats", Bool),

        // ── Payments ────────────────────────────────────────────────────
        MethodDescriptor::new("sendInvoice", "Send an invoice", Payments)
            .req("chat_id", ChatId)
            .req("title", Str)
            .req("description", Str)
            .req("payload", Str)
            .req("currency", Str)
            .req("prices", Array)
            .opt("provider_token", Str)
            .opt("max_tip_amount", Int)
            .opt("suggested_tip_amounts", Array)
            .opt("start_parameter", Str)
            .opt("provider_data", Str)
            .opt("photo_url", Str)
            .opt("photo_size", Int)
            .opt("photo_width", Int)
            .opt("photo_height", Int)
            .opt("need_name", Bool)
            .opt("need_phone_number", Bool)
            .opt("need_email", Bool)
            .opt("need_shipping_address", Bool)
            .opt("send_phone_number_to_provider", Bool)
            .opt("send_email_to_provider", Bool)
            .opt("is_flexible", Bool)
            .send_opts()
            .dest(),
        MethodDescriptor::new("createInvoiceLink", "Create a link for an invoice", Payments)
            .req("title", Str)
            .req("description", Str)
            .req("payload", Str)
            .req("currency", Str)
            .req("prices", Array)
            .opt("business_connection_id", Str)
            .opt("provider_token", Str)
            .opt("subscription_period", Int)
            .opt("max_tip_amount", Int)
            .opt("suggested_tip_amounts", Array)
            .opt("provider_data", Str)
            .opt("photo_url", Str)
            .opt("photo_size", Int)
            .opt("photo_width", Int)
            .opt("photo_height", Int)
            .opt("need_name", Bool)
            .opt("need_phone_number", Bool)
            .opt("need_email", Bool)
            .opt("need_shipping_address", Bool)
            .opt("send_phone_number_to_provider", Bool)
            .opt("send_email_to_provider", Bool)
            .opt("is_flexible", Bool),
        MethodDescriptor::new("answerShippingQuery", "Reply to a shipping query", Payments)
            .req("shipping_query_id", Str)
            .req("ok", Bool)
            .opt("shipping_options", Array)
            .opt("error_message", Str),
        MethodDescriptor::new("answerPreCheckoutQuery", "Respond to a pre-checkout query", Payments)
            .req("pre_checkout_query_id", Str)
            .req("ok", Bool)
            .opt("error_message", Str),
        MethodDescriptor::new("getStarTransactions", "Get the bot's Star transactions", Payments)
            .opt("offset", Int)
            .opt("limit", IntRange(1, 100)),
        MethodDescriptor::new("refundStarPayment", "Refund a successful Star payment", Payments)
            .req("user_id", Int)
            .req("telegram_payment_charge_id", Str),
        MethodDescriptor::new("editUserStarSubscription", "Cancel or re-enable a Star subscription", Payments)
            .req("user_id", Int)
            .req("telegram_payment_charge_id", Str)
            .req("is_canceled", Bool),

        // ── Games ───────────────────────────────────────────────────────
        MethodDescriptor::new("sendGame", "Send a game", Games)
            .req("chat_id", Int)
            .req("game_short_name", Str)
            .send_opts()
            .dest(),
        MethodDescriptor::new("setGameScore", "Set the score of a user in a game", Games)
            .req("user_id", Int)
            .req("score", Int)
            .opt("force", Bool)
            .opt("disable_edit_message", Bool)
            .opt("chat_id", Int)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .cross(CrossRule::ChatMessageOrInline),
        MethodDescriptor::new("getGameHighScores", "Get high scores for a game", Games)
            .req("user_id", Int)
            .opt("chat_id", Int)
            .opt("message_id", Int)
            .opt("inline_message_id", Str)
            .cross(CrossRule::ChatMessageOrInline),
    ];

    descriptors.into_iter().map(|d| (d.name, d)).collect()
}

static REGISTRY: Lazy<HashMap<&'static str, MethodDescriptor>> = Lazy::new(build_registry);

/// Look up one method descriptor.
pub fn get(name: &str) -> Option<&'static MethodDescriptor> {
    REGISTRY.get(name)
}

/// All descriptors, unordered.
pub fn all() -> impl Iterator<Item = &'static MethodDescriptor> {
    REGISTRY.values()
}

pub fn count() -> usize {
    REGISTRY.len()
}

/// Per-method cache TTL table, consumed by the response cache.
pub fn cache_ttls() -> HashMap<String, Duration> {
    REGISTRY
        .values()
        .filter_map(|d| d.cache_ttl.map(|ttl| (d.name.to_string(), ttl)))
        .collect()
}

/// Ranked search over the descriptor table for the meta tool surface.
pub fn search(
    query: &str,
    category: Option<&str>,
    limit: usize,
) -> Vec<&'static MethodDescriptor> {
    let category = category.and_then(Category::parse);
    let query = query.to_lowercase();

    let mut scored: Vec<(i32, &'static MethodDescriptor)> = REGISTRY
        .values()
        .filter(|d| category.map(|c| d.category == c).unwrap_or(true))
        .filter_map(|d| {
            let score = score_match(d, &query);
            if score > 0 || query.is_empty() {
                Some((score, d))
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(b.1.name)));
    scored.into_iter().take(limit).map(|(_, d)| d).collect()
}

fn score_match(descriptor: &MethodDescriptor, query: &str) -> i32 {
    if query.is_empty() {
        return 1;
    }

    let name = descriptor.name.to_lowercase();
    let mut score = 0;

    if name == query {
        score += 100;
    } else if name.starts_with(query) {
        score += 80;
    } else if name.contains(query) {
        score += 60;
    }

    let description = descriptor.description.to_lowercase();
    for word in query.split_whitespace() {
        if description.contains(word) {
            score += 20;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_large_and_consistent() {
        assert!(count() > 140, "expected the full surface, got {}", count());
        for d in all() {
            assert!(!d.description.is_empty(), "{} lacks a description", d.name);
            // Uploadable slots must name declared parameters
            for slot in &d.uploads {
                assert!(
                    d.param(slot.param).is_some(),
                    "{} upload slot {} not declared",
                    d.name,
                    slot.param
                );
            }
        }
    }

    #[test]
    fn destination_scoped_set() {
        assert!(get("sendMessage").unwrap().destination_scoped);
        assert!(get("sendPhoto").unwrap().destination_scoped);
        assert!(get("sendChatAction").unwrap().destination_scoped);
        assert!(!get("getMe").unwrap().destination_scoped);
        assert!(!get("getChat").unwrap().destination_scoped);
        assert!(!get("deleteMessage").unwrap().destination_scoped);
    }

    #[test]
    fn cacheable_ttls() {
        assert_eq!(
            get("getMe").unwrap().cache_ttl,
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            get("getWebhookInfo").unwrap().cache_ttl,
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            get("getStickerSet").unwrap().cache_ttl,
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            get("getChat").unwrap().cache_ttl,
            Some(Duration::from_secs(120))
        );
        assert!(get("sendMessage").unwrap().cache_ttl.is_none());

        let ttls = cache_ttls();
        assert!(ttls.contains_key("getMe"));
        assert!(!ttls.contains_key("sendMessage"));
    }

    #[test]
    fn required_and_optional_lists() {
        let send = get("sendMessage").unwrap();
        assert_eq!(send.required_names(), vec!["chat_id", "text"]);
        assert!(send.optional_names().contains(&"parse_mode"));
        assert!(send.optional_names().contains(&"reply_markup"));
    }

    #[test]
    fn cross_rules_marked() {
        assert_eq!(
            get("editMessageText").unwrap().cross_rule,
            CrossRule::ChatMessageOrInline
        );
        assert_eq!(get("sendMessage").unwrap().cross_rule, CrossRule::None);
    }

    #[test]
    fn input_schema_shape() {
        let schema = get("sendMessage").unwrap().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert!(schema["required"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("chat_id")));
    }

    #[test]
    fn search_ranks_exact_name_first() {
        let results = search("getme", None, 5);
        assert_eq!(results[0].name, "getMe");

        let results = search("sticker", Some("stickers"), 50);
        assert!(!results.is_empty());
        assert!(results.iter().all(|d| d.category == Category::Stickers));
    }

    #[test]
    fn search_empty_query_lists_category() {
        let results = search("", Some("payments"), 100);
        assert!(results.iter().any(|d| d.name == "sendInvoice"));
        assert!(results.iter().all(|d| d.category == Category::Payments));
    }

    #[test]
    fn upload_slots_nested_shapes() {
        let media_group = get("sendMediaGroup").unwrap();
        assert!(matches!(
            media_group.uploads[0].shape,
            UploadShape::Array(fields) if fields.contains(&"media")
        ));

        let add_sticker = get("addStickerToSet").unwrap();
        assert!(matches!(
            add_sticker.uploads[0].shape,
            UploadShape::Object(fields) if fields.contains(&"sticker")
        ));
    }
}
