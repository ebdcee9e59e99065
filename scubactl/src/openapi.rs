//! OpenAPI documentation for the `/api/*` surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::ai::{ModelInfo, Usage};
use crate::api::handlers;
use crate::api::models::{auth, chat, instructions, settings, users};
use crate::db::models::messages::MessageRole;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "scubactl API",
        description = "Chat backend: JWT auth, conversation persistence, and a Groq completions proxy"
    ),
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::get_profile,
        handlers::auth::update_profile,
        handlers::auth::change_password,
        handlers::auth::logout,
        handlers::auth::list_users,
        handlers::auth::toggle_user_active,
        handlers::chat::list_conversations,
        handlers::chat::create_conversation,
        handlers::chat::get_conversation,
        handlers::chat::rename_conversation,
        handlers::chat::delete_conversation,
        handlers::chat::send_message,
        handlers::chat::delete_message,
        handlers::chat::list_models,
        handlers::instructions::list_instructions,
        handlers::instructions::create_instruction,
        handlers::instructions::get_instruction,
        handlers::instructions::update_instruction,
        handlers::instructions::delete_instruction,
        handlers::instructions::set_default_instruction,
        handlers::settings::list_system_settings,
        handlers::settings::create_system_setting,
        handlers::settings::get_system_setting,
        handlers::settings::update_system_setting,
        handlers::settings::delete_system_setting,
        handlers::settings::get_preferences,
        handlers::settings::export_data,
    ),
    components(schemas(
        handlers::health::HealthResponse,
        users::UserResponse,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::LoginResponse,
        auth::RefreshResponse,
        auth::ProfileUpdateRequest,
        auth::ChangePasswordRequest,
        auth::AckResponse,
        chat::ConversationResponse,
        chat::ConversationCreateRequest,
        chat::ConversationRenameRequest,
        chat::ConversationDetailResponse,
        chat::MessageResponse,
        chat::SendMessageRequest,
        chat::SendMessageResponse,
        chat::ModelsListResponse,
        instructions::InstructionCreateRequest,
        instructions::InstructionUpdateRequest,
        instructions::InstructionResponse,
        settings::SystemSettingCreateRequest,
        settings::SystemSettingUpdateRequest,
        settings::SystemSettingResponse,
        settings::PreferencesResponse,
        settings::ExportConversation,
        settings::ExportResponse,
        MessageRole,
        ModelInfo,
        Usage,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login, tokens, and account management"),
        (name = "chat", description = "Conversations, messages, and the AI proxy"),
        (name = "settings", description = "Custom instructions, system settings, preferences, export"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "BearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/health"));
        assert!(doc.paths.paths.contains_key("/api/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/chat/conversations/{id}/messages"));
        assert!(doc.paths.paths.contains_key("/api/settings/export"));
    }
}
