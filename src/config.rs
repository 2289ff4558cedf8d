//! Configuration collaborator — env-first, keychain-backed secrets.
//!
//! All settings come from environment variables (optionally seeded from
//! `.env.local` / `.env` at startup, see `run()`). The third-party API key
//! is resolved env-first, then from the OS keychain; a key found in the
//! keychain is loaded into the env so later lookups are cheap.
//!
//! Read-only from the core's perspective: nothing here writes config files.

use std::time::Duration;

/// Keychain service name for stored credentials.
const KEYRING_SERVICE: &str = "answerglass";

/// System prompt used to seed every new session.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Default cooldown before an already-processed clipboard image may be
/// dispatched again.
const DEFAULT_COOLDOWN_SECS: u64 = 30;

/// Which backend the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    /// Relay with transparent fallback to the local model.
    Auto,
    /// The token-authenticated third-party service.
    ThirdParty,
}

/// Answer language, forwarded to the relay backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Portuguese,
}

impl Language {
    /// Tag understood by the relay backend.
    pub fn relay_tag(&self) -> &'static str {
        match self {
            Language::English => "ENGLISH",
            Language::Portuguese => "PORTUGUESE",
        }
    }

    fn default_prompt_instruction(&self) -> &'static str {
        match self {
            Language::English => "How to answer this question in up to 65 words: ",
            Language::Portuguese => "Como responder essa questão em até 65 palavras: ",
        }
    }
}

/// Snapshot of the environment-derived configuration.
pub struct AppConfig {
    language: Language,
    prompt_instruction: String,
    relay_url: Option<String>,
    relay_directory_url: Option<String>,
    relay_token: Option<String>,
    ollama_url: String,
    ollama_model: String,
    openai_url: String,
    openai_model: String,
    cooldown: Duration,
    clipboard_watch: bool,
    stream_responses: bool,
    ocr_languages: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let language = match std::env::var("ANSWER_LANGUAGE").as_deref() {
            Ok("pt-br") => Language::Portuguese,
            _ => Language::English,
        };
        let prompt_instruction = std::env::var("ANSWER_PROMPT_PREFIX")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| language.default_prompt_instruction().to_string());
        let cooldown = std::env::var("CLIPBOARD_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_COOLDOWN_SECS));

        Self {
            language,
            prompt_instruction,
            relay_url: non_empty_env("RELAY_URL"),
            relay_directory_url: non_empty_env("RELAY_DIRECTORY_URL"),
            relay_token: non_empty_env("RELAY_TOKEN"),
            ollama_url: non_empty_env("OLLAMA_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            ollama_model: non_empty_env("OLLAMA_MODEL").unwrap_or_else(|| "llama3".to_string()),
            openai_url: non_empty_env("OPENAI_API_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            openai_model: non_empty_env("OPENAI_MODEL")
                .unwrap_or_else(|| "gpt-4.1-nano".to_string()),
            cooldown,
            clipboard_watch: flag_env("CLIPBOARD_WATCH", true),
            stream_responses: flag_env("STREAM_RESPONSES", false),
            ocr_languages: non_empty_env("OCR_LANGS").unwrap_or_else(|| "eng".to_string()),
        }
    }

    /// Which provider the user asked for.
    ///
    /// Priority:
    /// 1. ANSWER_PROVIDER env var ("openai" selects the third-party service)
    /// 2. Auto (relay with local-model fallback)
    pub fn selected_provider(&self) -> ProviderChoice {
        if let Ok(p) = std::env::var("ANSWER_PROVIDER") {
            if p.eq_ignore_ascii_case("openai") {
                log::info!("[CONFIG] Provider override: openai");
                return ProviderChoice::ThirdParty;
            }
        }
        ProviderChoice::Auto
    }

    /// Third-party API key: env var first, then OS keychain.
    /// A key found in the keychain is loaded into the env.
    pub fn openai_token(&self) -> Option<String> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, "openai") {
            if let Ok(key) = entry.get_password() {
                if !key.is_empty() {
                    std::env::set_var("OPENAI_API_KEY", &key);
                    log::info!("[CONFIG] Loaded openai key from OS keychain");
                    return Some(key);
                }
            }
        }
        None
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Instruction prefixed to every outgoing question.
    pub fn prompt_instruction(&self) -> &str {
        &self.prompt_instruction
    }

    /// Fixed relay base URL, if set. Skips directory discovery.
    pub fn relay_url(&self) -> Option<&str> {
        self.relay_url.as_deref()
    }

    /// Directory endpoint the relay discovers its base URL from.
    pub fn relay_directory_url(&self) -> Option<&str> {
        self.relay_directory_url.as_deref()
    }

    pub fn relay_token(&self) -> Option<&str> {
        self.relay_token.as_deref()
    }

    pub fn ollama_url(&self) -> &str {
        &self.ollama_url
    }

    pub fn ollama_model(&self) -> &str {
        &self.ollama_model
    }

    pub fn openai_url(&self) -> &str {
        &self.openai_url
    }

    pub fn openai_model(&self) -> &str {
        &self.openai_model
    }

    /// Cooldown before an already-processed clipboard image is eligible again.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether clipboard image ingestion is enabled.
    pub fn clipboard_watch(&self) -> bool {
        self.clipboard_watch
    }

    /// Whether manual questions stream tokens as they arrive.
    pub fn stream_responses(&self) -> bool {
        self.stream_responses
    }

    /// Tesseract language list, e.g. "eng" or "eng+por".
    pub fn ocr_languages(&self) -> &str {
        &self.ocr_languages
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag_env(key: &str, default: bool) -> bool {
    match std::env::var(key).as_deref() {
        Ok("1") | Ok("true") | Ok("on") => true,
        Ok("0") | Ok("false") | Ok("off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_tags_match_backend_names() {
        assert_eq!(Language::English.relay_tag(), "ENGLISH");
        assert_eq!(Language::Portuguese.relay_tag(), "PORTUGUESE");
    }

    #[test]
    fn default_instruction_follows_language() {
        assert!(Language::English
            .default_prompt_instruction()
            .starts_with("How to answer"));
        assert!(Language::Portuguese
            .default_prompt_instruction()
            .starts_with("Como responder"));
    }
}
