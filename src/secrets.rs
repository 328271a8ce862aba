use keyring::{Entry, Error as KeyringError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const KEYRING_ACCOUNT: &str = "session";
pub const KEYRING_SERVICE: &str = "org.redmine-report.cli";

/// Connection parameters remembered by `login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub base_url: String,
    pub api_key: String,
}

impl StoredCredentials {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, String> {
        let base_url = base_url.trim().trim_end_matches('/');
        let api_key = api_key.trim();
        if base_url.is_empty() {
            return Err("Redmine URL must not be empty".into());
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(format!("Redmine URL must start with http:// or https://: {base_url}"));
        }
        if api_key.is_empty() {
            return Err("API key must not be empty".into());
        }
        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct SecretsManager {
    inner: Arc<SecretsInner>,
}

struct SecretsInner {
    keyring_service: String,
    session_cache: Mutex<Option<StoredCredentials>>,
}

impl SecretsManager {
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        let service = if service.trim().is_empty() {
            KEYRING_SERVICE.to_string()
        } else {
            service
        };

        SecretsManager {
            inner: Arc::new(SecretsInner {
                keyring_service: service,
                session_cache: Mutex::new(None),
            }),
        }
    }

    pub fn save_session(&self, base_url: &str, api_key: &str) -> Result<StoredCredentials, String> {
        let session = StoredCredentials::new(base_url, api_key)?;
        self.persist_session(Some(&session))?;
        *self.cache() = Some(session.clone());
        Ok(session)
    }

    pub fn get_session(&self) -> Result<Option<StoredCredentials>, String> {
        {
            let cache = self.cache();
            if cache.is_some() {
                return Ok(cache.clone());
            }
        }

        let session = self.load_session_from_store()?;
        *self.cache() = session.clone();
        Ok(session)
    }

    pub fn clear_session(&self) -> Result<(), String> {
        self.persist_session(None)?;
        *self.cache() = None;
        Ok(())
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<StoredCredentials>> {
        self.inner
            .session_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_session_from_store(&self) -> Result<Option<StoredCredentials>, String> {
        let entry = self.session_entry()?;
        match entry.get_password() {
            Ok(secret) => decode_session(&secret).map(Some),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(format!("Failed to read credentials from keyring: {err}")),
        }
    }

    fn persist_session(&self, session: Option<&StoredCredentials>) -> Result<(), String> {
        let entry = self.session_entry()?;
        match session {
            Some(data) => {
                let payload = encode_session(data)?;
                entry
                    .set_password(&payload)
                    .map_err(|err| format!("Failed to store credentials in keyring: {err}"))
            }
            None => match entry.delete_credential() {
                Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
                Err(err) => Err(format!("Failed to delete credentials from keyring: {err}")),
            },
        }
    }

    fn session_entry(&self) -> Result<Entry, String> {
        Entry::new(&self.inner.keyring_service, KEYRING_ACCOUNT)
            .map_err(|err| format!("Failed to open keyring entry: {err}"))
    }
}

fn encode_session(session: &StoredCredentials) -> Result<String, String> {
    serde_json::to_string(session).map_err(|err| format!("Failed to serialize credentials: {err}"))
}

fn decode_session(secret: &str) -> Result<StoredCredentials, String> {
    serde_json::from_str(secret).map_err(|err| format!("Failed to decode stored credentials: {err}"))
}

/// Replaces every occurrence of `api_key` in `text` so errors can be shown safely.
pub fn redact(text: &str, api_key: &str) -> String {
    if api_key.is_empty() {
        return text.to_string();
    }
    text.replace(api_key, "[redacted]")
}

#[cfg(test)]
mod tests {
    use super::{decode_session, encode_session, redact, StoredCredentials};

    #[test]
    fn credentials_are_trimmed_and_validated() {
        let creds = StoredCredentials::new(" https://redmine.example.com/ ", " key ").unwrap();
        assert_eq!(creds.base_url, "https://redmine.example.com");
        assert_eq!(creds.api_key, "key");

        assert!(StoredCredentials::new("", "key").is_err());
        assert!(StoredCredentials::new("redmine.example.com", "key").is_err());
        assert!(StoredCredentials::new("http://localhost:3000", "  ").is_err());
    }

    #[test]
    fn stored_payload_round_trips() {
        let creds = StoredCredentials::new("http://localhost:3000", "abc").unwrap();
        let payload = encode_session(&creds).unwrap();
        assert_eq!(decode_session(&payload).unwrap(), creds);
        assert!(decode_session("not json").is_err());
    }

    #[test]
    fn redact_hides_api_key() {
        assert_eq!(
            redact("GET http://x/issues.json?key=abc123 failed", "abc123"),
            "GET http://x/issues.json?key=[redacted] failed"
        );
        assert_eq!(redact("nothing here", ""), "nothing here");
    }
}
