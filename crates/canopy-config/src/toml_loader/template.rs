//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Canopy Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[completion]
# max_iterations = 5     # 1-50, LLM round trips when tools are offered

[completion.truncation]
# max_messages = 20      # longer contexts are truncated
# keep_first = 3         # keep_first + keep_last < max_messages
# keep_last = 16

[session]
# flush_grace_ms = 5000      # 100-60000
# subscriber_capacity = 256  # 1-65536
# title_max_chars = 80       # 10-500
# ai_instructions = ""       # project guidance given to the model

[protocol]
# server_name = "canopy"
# instructions = ""

[store]
# data_dir = ""          # empty = platform data dir

[logging]
# level = "info"         # debug, info, warn, error
"##
    .to_string()
}
