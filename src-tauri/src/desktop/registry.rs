/// Single source of truth for all commands
/// This macro takes a wrapper macro path and applies it to the command list
#[macro_export]
macro_rules! with_commands {
    ($($wrapper:tt)*) => {
        $($wrapper)*![
            // Model catalog
            $crate::desktop::commands::list_models,
            $crate::desktop::commands::list_available_models,
            $crate::desktop::commands::list_downloaded_models,
            $crate::desktop::commands::download_model,
            $crate::desktop::commands::delete_model,
            // Active model
            $crate::desktop::commands::get_active_model,
            $crate::desktop::commands::set_active_model,
            $crate::desktop::commands::list_active_model_options,
            $crate::desktop::commands::is_service_running,
            // Chat
            $crate::desktop::commands::send_message,
            $crate::desktop::commands::create_chat,
            $crate::desktop::commands::delete_chat,
            $crate::desktop::commands::list_chats,
            // App configuration
            $crate::desktop::commands::load_app_config,
        ]
    };
}
